use std::{process::exit, sync::Arc};

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, GlobalArgs, LogLevel};
use cni_templater_core::{
    plugin::cni::CniPlugin,
    reconciler::{context::ReconcilerConfigBuilder, ConfigReconciler},
    runtime::UpdateRuntimeConfigRequest,
    template::field::FieldTemplateRenderer,
};
use env_logger::Target;
use kube::Client;
use log::{error, info, LevelFilter};
use node::{
    main_node_watch,
    reconciler::context::{CniConfigReconciler, ReconcilerContext},
};

mod cli;
mod node;

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    configure_logging(&cli.global_args);

    let config_reconciler = create_config_reconciler(&cli.global_args)?;

    info!(
        "CNI config template: {:?}, CNI config directory: {:?}",
        config_reconciler.config().template_path(),
        config_reconciler.config().config_directory()
    );

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            let context = ReconcilerContext {
                node_name: get_node_name(&cli.global_args),
                config_reconciler,
            };
            let client = create_client().await;

            main_node_watch(client, Arc::new(context)).await
        }
        Commands::Once(args) => {
            config_reconciler
                .update_runtime_config(&UpdateRuntimeConfigRequest::with_pod_cidr(args.pod_cidr))
                .await
                .context("Couldn't update the CNI config!")?;
        }
    }

    Ok(())
}

fn create_config_reconciler(global_args: &GlobalArgs) -> anyhow::Result<CniConfigReconciler> {
    let config = ReconcilerConfigBuilder::default()
        .template_path(global_args.conf_template.clone())
        .config_directory(global_args.conf_dir.clone())
        .build()
        .context("Invalid CNI config reconciler configuration!")?;
    let plugin = Arc::new(CniPlugin::new(config.config_directory()));

    Ok(ConfigReconciler::new(
        config,
        plugin.clone(),
        plugin,
        FieldTemplateRenderer::new(),
    ))
}

fn get_node_name(global_args: &GlobalArgs) -> String {
    match global_args.node_name {
        Some(ref node_name) => node_name.to_owned(),
        None => {
            error!("Node name must be set (--node-name or NODE_NAME) to watch the node!");
            exit(5)
        }
    }
}

async fn create_client() -> Client {
    match Client::try_default().await {
        Ok(client) => client,
        Err(error) => {
            error!("Couldn't create client! {error:?}");
            exit(6)
        }
    }
}

fn configure_logging(global_args: &GlobalArgs) {
    let log_level = global_args.get_log_level();
    let mut logger = env_logger::builder();

    logger
        .default_format()
        .format_module_path(matches!(log_level, LogLevel::Trace))
        .target(Target::Stderr);

    match log_level {
        LogLevel::Normal => logger.filter_level(LevelFilter::Info),
        LogLevel::Verbose => logger.filter(Some("cni_templater"), LevelFilter::Debug),
        LogLevel::Trace => logger.filter(None, LevelFilter::Trace),
    };

    logger.init();
}
