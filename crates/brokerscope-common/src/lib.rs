//! Brokerscope Common - shared error types and constants
//!
//! This crate provides the foundational pieces used across all Brokerscope
//! components:
//! - Error taxonomy for fetch and correlation failures
//! - API group/version/kind constants for the resource kinds the engine
//!   knows how to fetch

pub mod error;

// Re-exports for convenience
pub use error::{CorrelationError, FetchErrorKind};

/// API group of the broker custom resource
pub const BROKER_API_GROUP: &str = "broker.amq.io";
pub const BROKER_API_VERSION: &str = "v1beta1";
pub const BROKER_KIND: &str = "ActiveMQArtemis";

/// cert-manager certificate and issuer kinds
pub const CERT_MANAGER_API_GROUP: &str = "cert-manager.io";
pub const CERT_MANAGER_API_VERSION: &str = "v1";
pub const CERTIFICATE_KIND: &str = "Certificate";
pub const ISSUER_KIND: &str = "Issuer";

/// trust-manager bundle kind
pub const TRUST_API_GROUP: &str = "trust.cert-manager.io";
pub const TRUST_API_VERSION: &str = "v1alpha1";
pub const TRUST_BUNDLE_KIND: &str = "Bundle";

/// Core API group (empty group name in the Kubernetes API)
pub const CORE_API_GROUP: &str = "";
pub const CORE_API_VERSION: &str = "v1";
pub const SECRET_KIND: &str = "Secret";

/// Prometheus-operator monitoring kinds
pub const MONITORING_API_GROUP: &str = "monitoring.coreos.com";
pub const MONITORING_API_VERSION: &str = "v1";
pub const SERVICE_MONITOR_KIND: &str = "ServiceMonitor";

/// The only status value the broker management endpoint reports on success
pub const ENDPOINT_STATUS_SUCCESSFUL: &str = "successful";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_constants() {
        assert_eq!(BROKER_API_GROUP, "broker.amq.io");
        assert_eq!(CERT_MANAGER_API_GROUP, "cert-manager.io");
        assert_eq!(TRUST_API_GROUP, "trust.cert-manager.io");
        assert_eq!(CORE_API_GROUP, "");
        assert_eq!(MONITORING_API_GROUP, "monitoring.coreos.com");
    }
}
