use std::path::{Path, PathBuf};

use derive_builder::Builder;

use crate::{CNI_CONFIG_FILE_NAME, DEFAULT_CNI_CONFIG_DIRECTORY};

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct ReconcilerConfig {
    #[builder(default)]
    template_path: Option<PathBuf>,
    #[builder(default = "DEFAULT_CNI_CONFIG_DIRECTORY.into()")]
    config_directory: PathBuf,
}

impl ReconcilerConfig {
    /// Configured template, an empty path counts as not configured.
    pub fn template_path(&self) -> Option<&Path> {
        self.template_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.config_directory.join(CNI_CONFIG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::ReconcilerConfigBuilder;

    #[test]
    fn defaults_to_standard_directory_without_template() {
        let config = ReconcilerConfigBuilder::default().build().unwrap();

        assert_eq!(config.template_path(), None);
        assert_eq!(
            config.config_file_path(),
            PathBuf::from("/etc/cni/net.d/10-containerd-net.conflist")
        );
    }

    #[test]
    fn empty_template_path_is_not_configured() {
        let config = ReconcilerConfigBuilder::default()
            .template_path(Some(PathBuf::new()))
            .config_directory("/tmp/net.d")
            .build()
            .unwrap();

        assert_eq!(config.template_path(), None);
        assert_eq!(config.config_directory(), Path::new("/tmp/net.d"));
    }
}
