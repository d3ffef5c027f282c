//! Joins fetched resources for one broker into a posture
//!
//! Correlation is synchronous and CPU-only: it partitions the cycle's
//! outcomes by kind, keeps the instances that belong to the broker (by
//! owner-reference chain or naming convention), and derives the
//! security/certificate/trust-bundle fields. The caller writes the result
//! through the snapshot store.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use brokerscope_api::{
    BrokerKey, CertificateHealth, CertificateSummary, FetchOutcome, MonitoringSummary,
    PostureSnapshot, RawResource, SecurityPosture, TrustBundleSummary, registry,
};
use brokerscope_common::{BROKER_KIND, CorrelationError, FetchErrorKind};

/// Correlation tuning
#[derive(Clone, Debug)]
pub struct CorrelationConfig {
    /// Certificates expiring within this many days are flagged `expiring`
    pub expiry_warning_days: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            expiry_warning_days: 30,
        }
    }
}

/// The resource-derived part of a snapshot, produced by one cycle.
///
/// Metrics are deliberately absent: the poller owns that field.
#[derive(Clone, Debug, Default)]
pub struct CorrelatedPosture {
    pub security: SecurityPosture,
    pub certificates: Vec<CertificateSummary>,
    pub trust_bundle: TrustBundleSummary,
    pub monitoring: MonitoringSummary,
}

impl CorrelatedPosture {
    /// Patch the resource-derived fields into a snapshot, leaving the
    /// poller-owned metrics untouched
    pub fn apply_to(&self, snapshot: &mut PostureSnapshot) {
        snapshot.security = self.security;
        snapshot.certificates = self.certificates.clone();
        snapshot.trust_bundle = self.trust_bundle.clone();
        snapshot.monitoring = self.monitoring;
    }
}

/// Classify a certificate's validity against `now`.
///
/// A missing expiry timestamp is unknown, never assumed valid.
pub fn classify_validity(
    valid_to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    warning_window: Duration,
) -> CertificateHealth {
    match valid_to {
        None => CertificateHealth::Unknown,
        Some(t) if t <= now => CertificateHealth::Expired,
        Some(t) if t <= now + warning_window => CertificateHealth::Expiring,
        Some(_) => CertificateHealth::Valid,
    }
}

fn items_of<'a>(
    by_kind: &HashMap<&'a str, &'a FetchOutcome>,
    kind: &str,
) -> Option<&'a [RawResource]> {
    by_kind.get(kind).and_then(|o| o.result.as_deref().ok())
}

fn payload_str(res: &RawResource, pointer: &str) -> Option<String> {
    res.payload
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn payload_time(res: &RawResource, pointer: &str) -> Option<DateTime<Utc>> {
    res.payload
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Whether a name follows the broker-asset naming convention
fn matches_convention(name: &str, broker: &str) -> bool {
    name == broker || name.strip_prefix(broker).is_some_and(|rest| rest.starts_with('-'))
}

/// Resolve an instance's owner chain to a broker name, by kind and name
/// equality only. Chains may pass through other fetched instances (for
/// example a Certificate owned by an Issuer owned by the broker).
fn resolve_owner_broker<'a>(
    res: &'a RawResource,
    instances: &HashMap<(&'a str, &'a str), &'a RawResource>,
    visited: &mut HashSet<(&'a str, &'a str)>,
) -> Option<&'a str> {
    for owner in &res.owner_refs {
        if owner.kind == BROKER_KIND {
            return Some(owner.name.as_str());
        }
        let link = (owner.kind.as_str(), owner.name.as_str());
        if !visited.insert(link) {
            continue;
        }
        if let Some(parent) = instances.get(&link)
            && let Some(broker) = resolve_owner_broker(parent, instances, visited)
        {
            return Some(broker);
        }
    }
    None
}

/// Keep only the instances belonging to this broker.
///
/// Ownership evidence outranks the naming convention: an instance whose
/// name matches the convention but whose owner chain resolves to a
/// different broker is an ownership conflict, logged and dropped.
fn match_instances<'a>(
    key: &BrokerKey,
    items: &'a [RawResource],
    instances: &HashMap<(&'a str, &'a str), &'a RawResource>,
) -> Vec<&'a RawResource> {
    let mut matched = Vec::new();
    for res in items {
        let mut visited = HashSet::new();
        match resolve_owner_broker(res, instances, &mut visited) {
            Some(owner) if owner == key.name => matched.push(res),
            Some(owner) => {
                if matches_convention(&res.name, &key.name) {
                    warn!(
                        broker = %key,
                        kind = res.descriptor.kind,
                        name = %res.name,
                        owner = %owner,
                        "Ownership conflict: name matches this broker but owner chain resolves elsewhere"
                    );
                }
                // Belongs to another broker in the same namespace
            }
            None => {
                if matches_convention(&res.name, &key.name) {
                    matched.push(res);
                }
            }
        }
    }
    matched
}

fn certificate_summary(
    res: &RawResource,
    config: &CorrelationConfig,
    now: DateTime<Utc>,
) -> CertificateSummary {
    let valid_to = payload_time(res, "/status/notAfter");
    CertificateSummary {
        name: res.name.clone(),
        valid_from: payload_time(res, "/status/notBefore"),
        valid_to,
        issuer_ref: payload_str(res, "/spec/issuerRef/name"),
        secret_name: payload_str(res, "/spec/secretName"),
        status: classify_validity(valid_to, now, Duration::days(config.expiry_warning_days)),
    }
}

/// Correlate one cycle's outcomes into the resource-derived posture.
///
/// Required kinds (broker, secret) must be present and successful; their
/// failure aborts the cycle without touching the previous snapshot.
/// Optional kinds that are unavailable (group not installed) contribute
/// nothing and cause no error.
pub fn correlate(
    key: &BrokerKey,
    outcomes: &[FetchOutcome],
    config: &CorrelationConfig,
    now: DateTime<Utc>,
) -> Result<CorrelatedPosture, CorrelationError> {
    let by_kind: HashMap<&str, &FetchOutcome> = outcomes.iter().map(|o| (o.kind(), o)).collect();

    // Required kinds first: a failed or absent outcome is fatal for the cycle
    for descriptor in registry::list().iter().filter(|d| registry::is_required(d)) {
        match by_kind.get(descriptor.kind) {
            Some(outcome) => {
                if let Err(error) = &outcome.result {
                    return Err(CorrelationError::RequiredFetchFailed {
                        key: key.to_key_string(),
                        kind: descriptor.kind.to_string(),
                        error: *error,
                    });
                }
            }
            None => {
                return Err(CorrelationError::RequiredFetchFailed {
                    key: key.to_key_string(),
                    kind: descriptor.kind.to_string(),
                    error: FetchErrorKind::Unavailable,
                });
            }
        }
    }

    // Exactly one broker instance must match the key
    let brokers = items_of(&by_kind, registry::BROKER.kind).unwrap_or_default();
    if !brokers
        .iter()
        .any(|b| b.name == key.name && b.namespace == key.namespace)
    {
        return Err(CorrelationError::MissingBrokerInstance(key.to_key_string()));
    }

    // Name index across all fetched instances, for owner-chain resolution
    let mut instances: HashMap<(&str, &str), &RawResource> = HashMap::new();
    for outcome in outcomes {
        if let Ok(items) = &outcome.result {
            for res in items {
                instances.insert((res.descriptor.kind, res.name.as_str()), res);
            }
        }
    }

    let certificates: Vec<CertificateSummary> = items_of(&by_kind, registry::CERTIFICATE.kind)
        .map(|items| {
            match_instances(key, items, &instances)
                .into_iter()
                .map(|res| certificate_summary(res, config, now))
                .collect()
        })
        .unwrap_or_default();

    let matched_secrets: HashSet<&str> = items_of(&by_kind, registry::SECRET.kind)
        .map(|items| {
            match_instances(key, items, &instances)
                .into_iter()
                .map(|res| res.name.as_str())
                .collect()
        })
        .unwrap_or_default();

    // Security is decidable only once the certificate kind is applicable;
    // a cluster without cert-manager leaves it unknown.
    let security = SecurityPosture {
        enabled: items_of(&by_kind, registry::CERTIFICATE.kind).map(|_| {
            certificates.iter().any(|c| {
                c.secret_name
                    .as_deref()
                    .is_some_and(|s| matched_secrets.contains(s))
            })
        }),
    };

    let mut trust_bundle = TrustBundleSummary::default();
    if let Some(items) = items_of(&by_kind, registry::TRUST_BUNDLE.kind) {
        for res in match_instances(key, items, &instances) {
            trust_bundle.present = true;
            if let Some(targets) = res
                .payload
                .pointer("/spec/targetNamespaces")
                .and_then(|v| v.as_array())
            {
                trust_bundle
                    .targets
                    .extend(targets.iter().filter_map(|t| t.as_str()).map(str::to_string));
            }
        }
    }

    let monitoring = MonitoringSummary {
        rule_present: items_of(&by_kind, registry::SERVICE_MONITOR.kind)
            .map(|items| !match_instances(key, items, &instances).is_empty())
            .unwrap_or(false),
    };

    debug!(
        broker = %key,
        certificates = certificates.len(),
        secrets = matched_secrets.len(),
        bundle = trust_bundle.present,
        "Correlated posture"
    );

    Ok(CorrelatedPosture {
        security,
        certificates,
        trust_bundle,
        monitoring,
    })
}
