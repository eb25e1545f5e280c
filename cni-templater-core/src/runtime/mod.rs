use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuntimeConfigRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_config: Option<RuntimeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_config: Option<NetworkConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub pod_cidr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRuntimeConfigResponse {}

impl UpdateRuntimeConfigRequest {
    pub fn with_pod_cidr(pod_cidr: impl Into<String>) -> Self {
        Self {
            runtime_config: Some(RuntimeConfig {
                network_config: Some(NetworkConfig {
                    pod_cidr: pod_cidr.into(),
                }),
            }),
        }
    }

    /// Pod CIDR carried by the request, empty when any part of the path is missing.
    pub fn pod_cidr(&self) -> &str {
        self.runtime_config
            .as_ref()
            .and_then(|config| config.network_config.as_ref())
            .map(|network| network.pod_cidr.as_str())
            .unwrap_or_default()
    }
}
