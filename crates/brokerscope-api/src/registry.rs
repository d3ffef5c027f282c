//! Static catalog of the resource kinds the engine may fetch
//!
//! The registry is pure data: `list()` is deterministic and side-effect
//! free, and `is_optional` marks the kinds whose API group may legitimately
//! be absent from a cluster.

use brokerscope_common::{
    BROKER_API_GROUP, BROKER_API_VERSION, BROKER_KIND, CERT_MANAGER_API_GROUP,
    CERT_MANAGER_API_VERSION, CERTIFICATE_KIND, CORE_API_GROUP, CORE_API_VERSION, ISSUER_KIND,
    MONITORING_API_GROUP, MONITORING_API_VERSION, SECRET_KIND, SERVICE_MONITOR_KIND,
    TRUST_API_GROUP, TRUST_API_VERSION, TRUST_BUNDLE_KIND,
};

use crate::model::ResourceDescriptor;

pub const BROKER: ResourceDescriptor = ResourceDescriptor {
    api_group: BROKER_API_GROUP,
    version: BROKER_API_VERSION,
    kind: BROKER_KIND,
    plural: "activemqartemises",
};

pub const CERTIFICATE: ResourceDescriptor = ResourceDescriptor {
    api_group: CERT_MANAGER_API_GROUP,
    version: CERT_MANAGER_API_VERSION,
    kind: CERTIFICATE_KIND,
    plural: "certificates",
};

pub const ISSUER: ResourceDescriptor = ResourceDescriptor {
    api_group: CERT_MANAGER_API_GROUP,
    version: CERT_MANAGER_API_VERSION,
    kind: ISSUER_KIND,
    plural: "issuers",
};

pub const TRUST_BUNDLE: ResourceDescriptor = ResourceDescriptor {
    api_group: TRUST_API_GROUP,
    version: TRUST_API_VERSION,
    kind: TRUST_BUNDLE_KIND,
    plural: "bundles",
};

pub const SECRET: ResourceDescriptor = ResourceDescriptor {
    api_group: CORE_API_GROUP,
    version: CORE_API_VERSION,
    kind: SECRET_KIND,
    plural: "secrets",
};

pub const SERVICE_MONITOR: ResourceDescriptor = ResourceDescriptor {
    api_group: MONITORING_API_GROUP,
    version: MONITORING_API_VERSION,
    kind: SERVICE_MONITOR_KIND,
    plural: "servicemonitors",
};

const ALL: [ResourceDescriptor; 6] = [
    BROKER,
    CERTIFICATE,
    ISSUER,
    TRUST_BUNDLE,
    SECRET,
    SERVICE_MONITOR,
];

/// Every descriptor the engine knows how to fetch
pub fn list() -> &'static [ResourceDescriptor] {
    &ALL
}

/// Whether absence of this descriptor's API group is tolerated.
///
/// cert-manager, trust-manager, and the Prometheus operator are optional
/// cluster add-ons; the broker kind and core secrets are required, and
/// their absence is a fatal configuration error for the key.
pub fn is_optional(descriptor: &ResourceDescriptor) -> bool {
    matches!(
        descriptor.api_group,
        CERT_MANAGER_API_GROUP | TRUST_API_GROUP | MONITORING_API_GROUP
    )
}

pub fn is_required(descriptor: &ResourceDescriptor) -> bool {
    !is_optional(descriptor)
}
