//! Typed view of the broker management endpoint response
//!
//! The endpoint reports a JSON body whose `status` field is `"successful"`
//! on success; anything else is a poll failure. The numeric projection of
//! the body is what the poller merges into the snapshot's metrics values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use brokerscope_common::ENDPOINT_STATUS_SUCCESSFUL;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityFlags {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPaths {
    #[serde(default)]
    pub get: Vec<String>,
    #[serde(default)]
    pub post: Vec<String>,
}

/// The management endpoint's status document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStatusResponse {
    pub status: String,
    #[serde(default)]
    pub security: SecurityFlags,
    #[serde(default)]
    pub info: EndpointInfo,
    #[serde(default)]
    pub paths: EndpointPaths,
    /// Free-form numeric gauges, when the endpoint exposes them
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl BrokerStatusResponse {
    pub fn is_successful(&self) -> bool {
        self.status == ENDPOINT_STATUS_SUCCESSFUL
    }

    /// Project the typed fields into the snapshot's name→number mapping.
    /// Booleans are reported as 0/1.
    pub fn numeric_values(&self) -> BTreeMap<String, f64> {
        let mut values = self.metrics.clone();
        values.insert(
            "security.enabled".to_string(),
            if self.security.enabled { 1.0 } else { 0.0 },
        );
        values.insert("paths.get".to_string(), self.paths.get.len() as f64);
        values.insert("paths.post".to_string(), self.paths.post.len() as f64);
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_successful_response() {
        let body = r#"{
            "status": "successful",
            "security": {"enabled": true},
            "info": {"name": "amq-broker", "description": "", "version": "7.12.0"},
            "paths": {"get": ["/status", "/metrics"], "post": ["/login"]},
            "metrics": {"queueCount": 4.0}
        }"#;
        let resp: BrokerStatusResponse = serde_json::from_str(body).unwrap();
        assert!(resp.is_successful());
        assert_eq!(resp.info.version, "7.12.0");

        let values = resp.numeric_values();
        assert_eq!(values.get("security.enabled"), Some(&1.0));
        assert_eq!(values.get("paths.get"), Some(&2.0));
        assert_eq!(values.get("paths.post"), Some(&1.0));
        assert_eq!(values.get("queueCount"), Some(&4.0));
    }

    #[test]
    fn test_non_successful_status() {
        let body = r#"{"status": "error"}"#;
        let resp: BrokerStatusResponse = serde_json::from_str(body).unwrap();
        assert!(!resp.is_successful());
    }

    #[test]
    fn test_missing_sections_default() {
        let body = r#"{"status": "successful"}"#;
        let resp: BrokerStatusResponse = serde_json::from_str(body).unwrap();
        assert!(resp.is_successful());
        assert!(!resp.security.enabled);
        assert!(resp.paths.get.is_empty());
        assert_eq!(resp.numeric_values().get("security.enabled"), Some(&0.0));
    }
}
