//! Brokerscope Engine - resource correlation and polling aggregation
//!
//! This crate is the stateful core of Brokerscope:
//! - `correlate`: joins fetched resources for one broker into a posture
//! - `store`: the snapshot store with atomic per-key upserts and
//!   generation-ordered subscriptions
//! - `poller`: per-broker metrics polling with backoff
//! - `endpoint`: the HTTP source for the broker management endpoint
//! - `service`: the posture service tying the pipeline together per key

pub mod correlate;
pub mod endpoint;
pub mod poller;
pub mod service;
pub mod store;

pub use correlate::{CorrelatedPosture, CorrelationConfig, correlate};
pub use endpoint::{HttpStatusSource, StatusEndpointConfig};
pub use poller::{MetricsPoller, PollState, PollerConfig, PollerStatus};
pub use service::{PostureService, PostureServiceConfig};
pub use store::SnapshotStore;
