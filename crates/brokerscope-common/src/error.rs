//! Error types for Brokerscope
//!
//! This module defines:
//! - `FetchErrorKind`: the failure taxonomy carried inside fetch outcomes
//! - `CorrelationError`: per-cycle failures of the correlation engine

use serde::{Deserialize, Serialize};

/// Failure taxonomy for resource fetches and endpoint polls.
///
/// Fetchers never let faults cross their boundary; every failure is
/// reported as one of these kinds inside a `FetchOutcome`.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchErrorKind {
    /// Zero instances exist. An empty list result is not an error; this
    /// kind is reported only when the API server answers 404 for a named
    /// read.
    #[error("not found")]
    NotFound,

    /// The credentials in use may not read this kind (401/403).
    #[error("unauthorized")]
    Unauthorized,

    /// The API group is not installed on the cluster, or the endpoint is
    /// down.
    #[error("unavailable")]
    Unavailable,

    /// The response decoded but did not match the expected shape.
    #[error("malformed")]
    Malformed,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::NotFound => "notFound",
            FetchErrorKind::Unauthorized => "unauthorized",
            FetchErrorKind::Unavailable => "unavailable",
            FetchErrorKind::Malformed => "malformed",
        }
    }
}

/// Failures of a single correlation cycle.
///
/// Both variants abort only the current cycle's write; the previous
/// snapshot, if any, stays intact with an unchanged generation.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum CorrelationError {
    /// No broker instance matched the key this cycle.
    #[error("no broker instance found for '{0}'")]
    MissingBrokerInstance(String),

    /// A required kind's fetch failed, so the cycle cannot produce a
    /// consistent snapshot.
    #[error("fetch of required kind '{kind}' failed for '{key}': {error}")]
    RequiredFetchFailed {
        key: String,
        kind: String,
        error: FetchErrorKind,
    },
}
