use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cni_templater_core::DEFAULT_CNI_CONFIG_DIRECTORY;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// name of the node this agent runs on, required when watching
    #[arg(long, global = true, env = "NODE_NAME")]
    pub node_name: Option<String>,
    /// CNI config template, config generation is left to other components when empty
    #[arg(long, global = true, env = "CNI_CONF_TEMPLATE")]
    pub conf_template: Option<PathBuf>,
    /// directory the generated CNI config is written to
    #[arg(long, global = true, env = "CNI_CONF_DIR", default_value = DEFAULT_CNI_CONFIG_DIRECTORY)]
    pub conf_dir: PathBuf,
    /// enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose_logging: bool,
    /// enable trace output (more detailed than verbose, overrides it if present)
    #[arg(long = "trace", global = true)]
    pub trace_logging: bool,
}

impl GlobalArgs {
    pub fn get_log_level(&self) -> LogLevel {
        if self.trace_logging {
            return LogLevel::Trace;
        }

        if self.verbose_logging {
            return LogLevel::Verbose;
        }

        LogLevel::Normal
    }
}

pub enum LogLevel {
    Normal,
    Verbose,
    Trace,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// watch the node and generate the CNI config once it gets a pod CIDR (default)
    #[command(alias = "w")]
    Watch,
    /// generate the CNI config for the given pod CIDR and exit
    #[command(alias = "o")]
    Once(OnceArgs),
}

#[derive(Debug, Args)]
pub struct OnceArgs {
    /// pod CIDR assigned to the node
    #[arg(long)]
    pub pod_cidr: String,
}
