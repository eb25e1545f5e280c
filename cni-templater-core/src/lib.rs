pub mod plugin;
pub mod reconciler;
pub mod runtime;
pub mod template;

/// Name of the CNI config file generated from the template.
pub const CNI_CONFIG_FILE_NAME: &str = "10-containerd-net.conflist";

pub const DEFAULT_CNI_CONFIG_DIRECTORY: &str = "/etc/cni/net.d";
