//! Brokerscope Kubernetes adapters
//!
//! This crate provides everything that talks to the Kubernetes API:
//! - Client construction (in-cluster or explicit API server)
//! - A dynamic fetcher per registry descriptor, normalizing objects into
//!   the common resource shape
//! - An installed-group resolver backed by API discovery
//! - A broker watch that drives the tracking lifecycle

pub mod client;
pub mod fetcher;
pub mod resolver;
pub mod watch;

pub use client::{KubeClientConfig, init_client};
pub use fetcher::{DynamicResourceFetcher, registry_fetchers};
pub use resolver::{DiscoveryGroupResolver, StaticGroupResolver};
pub use watch::{BrokerEvent, watch_brokers};
