//! Trait seams between the engine and its external collaborators

use std::collections::HashSet;

use async_trait::async_trait;

use brokerscope_common::FetchErrorKind;

use crate::model::{BrokerKey, FetchOutcome, ResourceDescriptor};
use crate::status::BrokerStatusResponse;

/// Retrieves zero-or-more instances of one resource kind for a broker key.
///
/// Fetchers are independent and may be invoked concurrently. A fetcher
/// never retries internally (the engine owns retry policy) and never lets
/// a fault cross this boundary: every failure is a `FetchOutcome` with an
/// error kind.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    fn descriptor(&self) -> ResourceDescriptor;

    async fn fetch(&self, key: &BrokerKey) -> FetchOutcome;
}

/// Consumed capability reporting which API groups are installed.
///
/// The engine uses this to gate optional fetchers before they run, so a
/// cluster without cert-manager never produces spurious fetch failures.
#[async_trait]
pub trait InstalledGroupResolver: Send + Sync {
    async fn resolve_installed_groups(&self) -> anyhow::Result<HashSet<String>>;
}

/// One poll against the broker's management endpoint.
///
/// Timeouts, non-2xx responses, undecodable bodies, and a non-successful
/// status document are all reported through the same failure taxonomy as
/// resource fetches.
#[async_trait]
pub trait BrokerStatusSource: Send + Sync {
    async fn fetch_status(&self, key: &BrokerKey) -> Result<BrokerStatusResponse, FetchErrorKind>;
}
