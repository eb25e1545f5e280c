use std::{sync::Arc, time::Duration};

use cni_templater_core::{
    reconciler::error::ReconcilerErrorKind, runtime::UpdateRuntimeConfigRequest,
};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::controller::Action;
use log::debug;

use self::{context::ReconcilerContext, error::ReconcilerError};

pub mod context;
pub mod error;

const SUCCESS_REQUEUE_SECS: u64 = 60 * 5;

const DEFAULT_ERROR_REQUEUE_SECS: u64 = 10;
const TEMPLATE_ERROR_REQUEUE_SECS: u64 = 60;

pub async fn reconcile_node(
    object: Arc<Node>,
    context: Arc<ReconcilerContext>,
) -> Result<Action, ReconcilerError> {
    let pod_cidr = get_pod_cidr(&object);

    debug!(
        "Reconciling node '{}' (pod CIDR: '{pod_cidr}')",
        context.node_name
    );

    context
        .config_reconciler
        .update_runtime_config(&UpdateRuntimeConfigRequest::with_pod_cidr(pod_cidr))
        .await
        .map_err(ReconcilerError::CniConfigError)?;

    Ok(Action::requeue(Duration::from_secs(SUCCESS_REQUEUE_SECS)))
}

pub fn reconcile_node_error(
    _object: Arc<Node>,
    error: &ReconcilerError,
    _context: Arc<ReconcilerContext>,
) -> Action {
    Action::requeue(match error {
        ReconcilerError::CniConfigError(error) => match error.kind() {
            ReconcilerErrorKind::TemplateParse | ReconcilerErrorKind::Render => {
                Duration::from_secs(TEMPLATE_ERROR_REQUEUE_SECS)
            }
            _ => Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
        },
    })
}

/// `spec.podCIDR`, falling back to the first entry of `spec.podCIDRs`.
fn get_pod_cidr(node: &Node) -> String {
    node.spec
        .as_ref()
        .and_then(|spec| {
            spec.pod_cidr
                .clone()
                .filter(|cidr| !cidr.is_empty())
                .or_else(|| {
                    spec.pod_cidrs
                        .as_ref()
                        .and_then(|cidrs| cidrs.first().cloned())
                })
        })
        .unwrap_or_default()
}
