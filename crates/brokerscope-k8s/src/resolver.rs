//! Installed-group resolution via Kubernetes API discovery
//!
//! The engine consumes this capability to learn which optional API groups
//! (cert-manager, trust-manager, monitoring) actually exist on the cluster
//! before any optional fetcher runs.

use std::collections::HashSet;

use async_trait::async_trait;
use kube::discovery::Discovery;
use kube::Client;
use tracing::debug;

use brokerscope_api::traits::InstalledGroupResolver;

/// Resolver backed by a discovery sweep of the API server
pub struct DiscoveryGroupResolver {
    client: Client,
}

impl DiscoveryGroupResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InstalledGroupResolver for DiscoveryGroupResolver {
    async fn resolve_installed_groups(&self) -> anyhow::Result<HashSet<String>> {
        let discovery = Discovery::new(self.client.clone()).run().await?;
        let groups: HashSet<String> = discovery
            .groups()
            .map(|g| g.name().to_string())
            .collect();
        debug!(count = groups.len(), "Resolved installed API groups");
        Ok(groups)
    }
}

/// Fixed resolver for tests and deployments with a known group set
pub struct StaticGroupResolver {
    groups: HashSet<String>,
}

impl StaticGroupResolver {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl InstalledGroupResolver for StaticGroupResolver {
    async fn resolve_installed_groups(&self) -> anyhow::Result<HashSet<String>> {
        Ok(self.groups.clone())
    }
}
