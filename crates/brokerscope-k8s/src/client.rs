//! Kubernetes client construction

use kube::{Client, Config};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Kubernetes connection configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeClientConfig {
    /// Kubernetes API server URL (empty = infer from environment)
    #[serde(default)]
    pub api_server: String,

    /// Namespace to watch for brokers (empty = all namespaces)
    #[serde(default)]
    pub namespace: String,
}

/// Build a client from the environment (in-cluster service account or
/// local kubeconfig), optionally overriding the API server URL.
pub async fn init_client(config: &KubeClientConfig) -> anyhow::Result<Client> {
    let mut kube_config = Config::infer().await?;
    if !config.api_server.is_empty() {
        kube_config.cluster_url = config.api_server.parse()?;
    }
    info!(cluster_url = %kube_config.cluster_url, "Kubernetes client configured");
    Client::try_from(kube_config).map_err(Into::into)
}
