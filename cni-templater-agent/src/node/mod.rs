use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::{
    runtime::{
        controller::{Action, Error as ControllerError},
        reflector::ObjectRef,
        watcher::{Config, Error as WatcherError},
        Controller,
    },
    Api, Client,
};
use log::{info, log, Level};

use self::reconciler::{
    context::ReconcilerContext, error::ReconcilerError, reconcile_node, reconcile_node_error,
};

pub mod reconciler;

pub async fn main_node_watch(client: Client, context: Arc<ReconcilerContext>) {
    info!("Watching node '{}' for pod CIDR assignments...", context.node_name);

    let watcher_config = Config::default().fields(&format!("metadata.name={}", context.node_name));

    Controller::new(Api::<Node>::all(client), watcher_config)
        .shutdown_on_signal()
        .run(reconcile_node, reconcile_node_error, context)
        .for_each(|result| {
            log_node_reconciliation(result);
            std::future::ready(())
        })
        .await;

    info!("Node watch stopped!");
}

fn log_node_reconciliation(
    result: Result<(ObjectRef<Node>, Action), ControllerError<ReconcilerError, WatcherError>>,
) {
    if let Some((level, message)) = describe_node_reconciliation(result) {
        log!(level, "{message}");
    }
}

fn describe_node_reconciliation(
    result: Result<(ObjectRef<Node>, Action), ControllerError<ReconcilerError, WatcherError>>,
) -> Option<(Level, String)> {
    match result {
        Ok((node, action)) => Some((
            Level::Info,
            format!(
                "CNI config for node '{}' is up to date. Next check: {action:?}",
                node.name
            ),
        )),
        Err(ControllerError::ObjectNotFound(_)) => None, // node is gone, nothing left to configure
        Err(ControllerError::ReconcilerFailed(err, node)) => Some((
            Level::Warn,
            format!("CNI config reconciliation failed for node '{}': {err}", node.name),
        )),
        Err(ControllerError::QueueError(watcher_err)) => Some((
            Level::Error,
            format!("Node watcher has failed! {watcher_err:#?}"),
        )),
    }
}
