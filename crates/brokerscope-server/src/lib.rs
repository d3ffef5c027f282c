//! Brokerscope Server - console API over the posture engine
//!
//! Dashboards read exclusively through this API; every endpoint is backed
//! by the snapshot store's `get`/`subscribe`, plus one manual refresh
//! trigger. There is no external write path to snapshots.

pub mod api;
pub mod config;
pub mod model;
