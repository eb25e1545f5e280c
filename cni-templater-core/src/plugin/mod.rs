use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;

pub mod cni;

/// Options passed to [`PluginConfigLoader::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub include_loopback: bool,
    pub include_default: bool,
}

impl LoadOptions {
    /// Loopback network plus the default network from the config directory.
    pub fn standard() -> Self {
        Self {
            include_loopback: true,
            include_default: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("CNI plugin is not initialized! Loaded networks: {loaded}, required: {required}")]
    NotInitialized { loaded: usize, required: usize },
    #[error("Couldn't read CNI config directory {path:?}! Reason: {source}")]
    ConfigDirectory { path: PathBuf, source: io::Error },
    #[error("No usable network config found in {0:?}!")]
    NoConfigFound(PathBuf),
    #[error("CNI plugin state lock is poisoned!")]
    StatePoisoned,
}

/// Reports whether the network plugin is operational.
pub trait PluginStatusProbe {
    fn status(&self) -> Result<(), PluginError>;
}

/// Loads on-disk network plugin configuration.
pub trait PluginConfigLoader {
    fn load(&self, options: LoadOptions) -> Result<(), PluginError>;
}

impl<T: PluginStatusProbe + ?Sized> PluginStatusProbe for Arc<T> {
    fn status(&self) -> Result<(), PluginError> {
        (**self).status()
    }
}

impl<T: PluginConfigLoader + ?Sized> PluginConfigLoader for Arc<T> {
    fn load(&self, options: LoadOptions) -> Result<(), PluginError> {
        (**self).load(options)
    }
}
