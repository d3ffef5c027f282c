//! The posture snapshot: the unified security/health view of one broker
//!
//! Snapshots are long-lived, one per broker key, created on the first
//! successful correlation and patched in place afterwards. The overall
//! health is always derived from the other fields; the store recomputes it
//! on every write so it can never be set independently.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::BrokerKey;

/// Whether the broker has security (TLS + credentials) materialized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPosture {
    /// None until the certificate and secret kinds have been correlated at
    /// least once; optional kinds that are not installed leave this unknown
    pub enabled: Option<bool>,
}

/// Validity classification of one certificate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateHealth {
    Valid,
    Expiring,
    Expired,
    Unknown,
}

impl CertificateHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificateHealth::Valid => "valid",
            CertificateHealth::Expiring => "expiring",
            CertificateHealth::Expired => "expired",
            CertificateHealth::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CertificateHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One matched certificate, as the dashboard sees it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    pub name: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub issuer_ref: Option<String>,
    /// Name of the secret the certificate materializes into
    pub secret_name: Option<String>,
    pub status: CertificateHealth,
}

/// Trust bundle presence and its declared target namespaces
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustBundleSummary {
    pub present: bool,
    pub targets: BTreeSet<String>,
}

/// Whether a monitoring rule scrapes this broker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSummary {
    pub rule_present: bool,
}

/// The poller's contribution to the snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub reachable: bool,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub values: BTreeMap<String, f64>,
}

impl Default for MetricsSummary {
    fn default() -> Self {
        // Reachable until proven otherwise; `last_polled_at == None` marks
        // that no poll has completed yet, which keeps the overall health at
        // unknown rather than unreachable.
        Self {
            reachable: true,
            last_polled_at: None,
            values: BTreeMap::new(),
        }
    }
}

/// Overall verdict derived from the other snapshot fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unknown,
    Unreachable,
}

impl OverallHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallHealth::Healthy => "healthy",
            OverallHealth::Degraded => "degraded",
            OverallHealth::Unknown => "unknown",
            OverallHealth::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The unified, point-in-time security/health view of one broker instance
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureSnapshot {
    pub key: BrokerKey,
    pub security: SecurityPosture,
    pub certificates: Vec<CertificateSummary>,
    pub trust_bundle: TrustBundleSummary,
    pub monitoring: MonitoringSummary,
    pub metrics: MetricsSummary,
    pub overall_health: OverallHealth,
    /// Strictly increases on every store write
    pub generation: u64,
    pub last_updated_at: DateTime<Utc>,
}

impl PostureSnapshot {
    /// A blank snapshot for a key, before any correlation has contributed
    pub fn new(key: BrokerKey) -> Self {
        Self {
            key,
            security: SecurityPosture::default(),
            certificates: Vec::new(),
            trust_bundle: TrustBundleSummary::default(),
            monitoring: MonitoringSummary::default(),
            metrics: MetricsSummary::default(),
            overall_health: OverallHealth::Unknown,
            generation: 0,
            last_updated_at: Utc::now(),
        }
    }

    /// Derive the overall health from the other fields.
    ///
    /// Precedence: unreachable (poller gave up) beats degraded beats
    /// unknown. A snapshot with no completed poll can never be
    /// unreachable.
    pub fn derived_health(&self) -> OverallHealth {
        if !self.metrics.reachable && self.metrics.last_polled_at.is_some() {
            return OverallHealth::Unreachable;
        }

        let cert_trouble = self.certificates.iter().any(|c| {
            matches!(
                c.status,
                CertificateHealth::Expired | CertificateHealth::Expiring
            )
        });
        let bundle_missing = self.security.enabled == Some(true) && !self.trust_bundle.present;
        if cert_trouble || bundle_missing {
            return OverallHealth::Degraded;
        }

        if self.security.enabled.is_none() && self.metrics.last_polled_at.is_none() {
            return OverallHealth::Unknown;
        }

        OverallHealth::Healthy
    }

    /// Recompute and store the derived health
    pub fn refresh_health(&mut self) {
        self.overall_health = self.derived_health();
    }
}
