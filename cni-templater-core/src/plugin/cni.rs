use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use log::{debug, info};
use serde_json::Value;

use super::{LoadOptions, PluginConfigLoader, PluginError, PluginStatusProbe};

pub const LOOPBACK_NETWORK_NAME: &str = "cni-loopback";

const CONFIG_FILE_EXTENSIONS: [&str; 3] = ["conf", "conflist", "json"];
const CONFLIST_EXTENSION: &str = "conflist";

// loopback + default network
const REQUIRED_NETWORK_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDefinition {
    pub name: String,
    pub source: Option<PathBuf>,
}

impl NetworkDefinition {
    fn loopback() -> Self {
        Self {
            name: LOOPBACK_NETWORK_NAME.to_owned(),
            source: None,
        }
    }
}

/// CNI plugin view backed by a config directory.
pub struct CniPlugin {
    config_directory: PathBuf,
    networks: RwLock<Vec<NetworkDefinition>>,
}

impl CniPlugin {
    pub fn new(config_directory: impl Into<PathBuf>) -> Self {
        Self {
            config_directory: config_directory.into(),
            networks: RwLock::new(Vec::new()),
        }
    }

    pub fn networks(&self) -> Result<Vec<NetworkDefinition>, PluginError> {
        Ok(self
            .networks
            .read()
            .map_err(|_| PluginError::StatePoisoned)?
            .clone())
    }

    fn load_default_network(&self) -> Result<NetworkDefinition, PluginError> {
        let mut candidates = fs::read_dir(&self.config_directory)
            .map_err(|source| PluginError::ConfigDirectory {
                path: self.config_directory.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_config_extension(path))
            .collect::<Vec<_>>();

        candidates.sort_unstable();

        candidates
            .into_iter()
            .find_map(|path| parse_network_file(&path))
            .ok_or_else(|| PluginError::NoConfigFound(self.config_directory.clone()))
    }
}

impl PluginStatusProbe for CniPlugin {
    fn status(&self) -> Result<(), PluginError> {
        let loaded = self
            .networks
            .read()
            .map_err(|_| PluginError::StatePoisoned)?
            .len();

        if loaded < REQUIRED_NETWORK_COUNT {
            return Err(PluginError::NotInitialized {
                loaded,
                required: REQUIRED_NETWORK_COUNT,
            });
        }

        Ok(())
    }
}

impl PluginConfigLoader for CniPlugin {
    fn load(&self, options: LoadOptions) -> Result<(), PluginError> {
        let mut networks = Vec::new();

        if options.include_loopback {
            networks.push(NetworkDefinition::loopback());
        }

        if options.include_default {
            let network = self.load_default_network()?;
            info!(
                "Loaded CNI network '{}' from {:?}",
                network.name,
                network.source.as_deref().unwrap_or(Path::new("---"))
            );
            networks.push(network);
        }

        *self
            .networks
            .write()
            .map_err(|_| PluginError::StatePoisoned)? = networks;

        Ok(())
    }
}

fn has_config_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| CONFIG_FILE_EXTENSIONS.contains(&extension))
        .unwrap_or(false)
}

fn parse_network_file(path: &Path) -> Option<NetworkDefinition> {
    let content = fs::read(path)
        .map_err(|err| debug!("Couldn't read {path:?}: {err}"))
        .ok()?;
    let config = serde_json::from_slice::<Value>(&content)
        .map_err(|err| debug!("{path:?} is not a valid JSON! {err}"))
        .ok()?;

    let is_conflist = path
        .extension()
        .map(|extension| extension == CONFLIST_EXTENSION)
        .unwrap_or(false);

    let usable = if is_conflist {
        config
            .get("plugins")
            .and_then(|plugins| plugins.as_array())
            .map(|plugins| !plugins.is_empty())
            .unwrap_or(false)
    } else {
        config.get("type").and_then(|kind| kind.as_str()).is_some()
    };

    if !usable {
        debug!("{path:?} doesn't contain a usable network config, skipping...");
        return None;
    }

    let name = config
        .get("name")
        .and_then(|name| name.as_str())
        .map(str::to_owned)
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })?;

    Some(NetworkDefinition {
        name,
        source: Some(path.to_owned()),
    })
}
