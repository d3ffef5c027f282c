//! Brokerscope API - shared model and trait seams
//!
//! This crate provides:
//! - The resource model shared by fetchers and the correlation engine
//!   (`BrokerKey`, `ResourceDescriptor`, `RawResource`, `FetchOutcome`)
//! - The posture snapshot and its derived health
//! - The static descriptor registry
//! - The typed view of the broker management endpoint response
//! - Trait seams towards the cluster (`ResourceFetcher`,
//!   `InstalledGroupResolver`) and the management endpoint
//!   (`BrokerStatusSource`)

pub mod model;
pub mod registry;
pub mod snapshot;
pub mod status;
pub mod traits;

pub use model::{BrokerKey, FetchOutcome, OwnerRef, RawResource, ResourceDescriptor};
pub use snapshot::{
    CertificateHealth, CertificateSummary, MetricsSummary, MonitoringSummary, OverallHealth,
    PostureSnapshot, SecurityPosture, TrustBundleSummary,
};
pub use status::BrokerStatusResponse;
pub use traits::{BrokerStatusSource, InstalledGroupResolver, ResourceFetcher};
