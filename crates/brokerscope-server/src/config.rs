//! Configuration management for the Brokerscope server
//!
//! Settings come from an optional YAML file plus `BROKERSCOPE_*`
//! environment variables, with a few command-line overrides on top.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment};

use brokerscope_engine::correlate::CorrelationConfig;
use brokerscope_engine::endpoint::StatusEndpointConfig;
use brokerscope_engine::poller::PollerConfig;
use brokerscope_engine::service::PostureServiceConfig;
use brokerscope_k8s::KubeClientConfig;

const DEFAULT_SERVER_PORT: u16 = 9090;

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command()]
struct Cli {
    #[arg(short = 'n', long = "namespace")]
    namespace: Option<String>,
    #[arg(long = "api-server", env = "KUBERNETES_API_SERVER")]
    api_server: Option<String>,
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
}

/// Application configuration loaded from config file and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> Self {
        let args = Cli::parse();
        let mut config_builder = Config::builder()
            .add_source(
                Environment::with_prefix("brokerscope")
                    .separator(".")
                    .try_parsing(true),
            )
            .add_source(config::File::with_name("conf/application.yml").required(false));

        if let Some(v) = args.namespace {
            config_builder = config_builder
                .set_override("kubernetes.namespace", v)
                .expect("Failed to set namespace override");
        }
        if let Some(v) = args.api_server {
            config_builder = config_builder
                .set_override("kubernetes.api_server", v)
                .expect("Failed to set API server override");
        }
        if let Some(v) = args.port {
            config_builder = config_builder
                .set_override("server.port", i64::from(v))
                .expect("Failed to set port override");
        }

        let app_config = config_builder
            .build()
            .expect("Failed to build configuration - check conf/application.yml");

        Configuration { config: app_config }
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string("server.address")
            .unwrap_or("0.0.0.0".to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int("server.port")
            .ok()
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    // ========================================================================
    // Kubernetes
    // ========================================================================

    pub fn kube_client_config(&self) -> KubeClientConfig {
        KubeClientConfig {
            api_server: self
                .config
                .get_string("kubernetes.api_server")
                .unwrap_or_default(),
            namespace: self
                .config
                .get_string("kubernetes.namespace")
                .unwrap_or_default(),
        }
    }

    /// Namespace the broker watch is scoped to, None = all namespaces
    pub fn watch_namespace(&self) -> Option<String> {
        let namespace = self
            .config
            .get_string("kubernetes.namespace")
            .unwrap_or_default();
        if namespace.is_empty() { None } else { Some(namespace) }
    }

    // ========================================================================
    // Engine
    // ========================================================================

    fn duration_secs(&self, property: &str, default: u64) -> Duration {
        let secs = self
            .config
            .get_int(property)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default);
        Duration::from_secs(secs)
    }

    pub fn service_config(&self) -> PostureServiceConfig {
        PostureServiceConfig {
            refresh_interval: self.duration_secs("engine.refresh_interval_seconds", 30),
            correlation: CorrelationConfig {
                expiry_warning_days: self
                    .config
                    .get_int("engine.expiry_warning_days")
                    .unwrap_or(30),
            },
            poller: PollerConfig {
                base_interval: self.duration_secs("poller.interval_seconds", 10),
                max_interval: self.duration_secs("poller.max_interval_seconds", 120),
                failure_threshold: self
                    .config
                    .get_int("poller.failure_threshold")
                    .ok()
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(3),
                request_timeout: self.duration_secs("poller.request_timeout_seconds", 5),
            },
        }
    }

    pub fn endpoint_config(&self) -> StatusEndpointConfig {
        let defaults = StatusEndpointConfig::default();
        StatusEndpointConfig {
            url_template: self
                .config
                .get_string("endpoint.url_template")
                .unwrap_or(defaults.url_template),
            connect_timeout: self.duration_secs("endpoint.connect_timeout_seconds", 5),
            read_timeout: self.duration_secs("endpoint.read_timeout_seconds", 10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let configuration = Configuration::default();
        assert_eq!(configuration.server_address(), "0.0.0.0");
        assert_eq!(configuration.server_port(), 9090);
        assert!(configuration.watch_namespace().is_none());

        let service = configuration.service_config();
        assert_eq!(service.refresh_interval, Duration::from_secs(30));
        assert_eq!(service.correlation.expiry_warning_days, 30);
        assert_eq!(service.poller.base_interval, Duration::from_secs(10));
        assert_eq!(service.poller.failure_threshold, 3);
    }

    #[test]
    fn test_overrides() {
        let config = Config::builder()
            .set_override("server.port", 8080)
            .unwrap()
            .set_override("kubernetes.namespace", "messaging")
            .unwrap()
            .set_override("engine.expiry_warning_days", 14)
            .unwrap()
            .build()
            .unwrap();
        let configuration = Configuration { config };

        assert_eq!(configuration.server_port(), 8080);
        assert_eq!(configuration.watch_namespace().as_deref(), Some("messaging"));
        assert_eq!(configuration.service_config().correlation.expiry_warning_days, 14);
        assert_eq!(configuration.kube_client_config().namespace, "messaging");
    }
}
