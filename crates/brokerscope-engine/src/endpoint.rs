//! HTTP source for the broker management endpoint

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use brokerscope_api::traits::BrokerStatusSource;
use brokerscope_api::{BrokerKey, BrokerStatusResponse};
use brokerscope_common::FetchErrorKind;

/// Configuration for the management endpoint client
#[derive(Clone, Debug)]
pub struct StatusEndpointConfig {
    /// URL template with `{namespace}` and `{name}` placeholders
    pub url_template: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read timeout
    pub read_timeout: Duration,
}

impl Default for StatusEndpointConfig {
    fn default() -> Self {
        Self {
            url_template: "http://{name}-wconsj-0-svc.{namespace}.svc:8161/console/jolokia"
                .to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Polls the management endpoint over HTTP
pub struct HttpStatusSource {
    client: reqwest::Client,
    config: StatusEndpointConfig,
}

impl HttpStatusSource {
    pub fn new(config: StatusEndpointConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn url_for(&self, key: &BrokerKey) -> String {
        self.config
            .url_template
            .replace("{namespace}", &key.namespace)
            .replace("{name}", &key.name)
    }
}

#[async_trait]
impl BrokerStatusSource for HttpStatusSource {
    async fn fetch_status(&self, key: &BrokerKey) -> Result<BrokerStatusResponse, FetchErrorKind> {
        let url = self.url_for(key);

        let response = self.client.get(&url).send().await.map_err(|e| {
            debug!(broker = %key, url = %url, error = %e, "Status request failed");
            FetchErrorKind::Unavailable
        })?;

        if !response.status().is_success() {
            debug!(broker = %key, status = %response.status(), "Status endpoint returned non-2xx");
            return Err(FetchErrorKind::Unavailable);
        }

        let body: BrokerStatusResponse = response.json().await.map_err(|e| {
            debug!(broker = %key, error = %e, "Status body did not decode");
            FetchErrorKind::Malformed
        })?;

        if !body.is_successful() {
            debug!(broker = %key, status = %body.status, "Status document not successful");
            return Err(FetchErrorKind::Malformed);
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_substitution() {
        let source = HttpStatusSource::new(StatusEndpointConfig::default()).unwrap();
        let url = source.url_for(&BrokerKey::new("messaging", "ex-aao"));
        assert_eq!(
            url,
            "http://ex-aao-wconsj-0-svc.messaging.svc:8161/console/jolokia"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let source = HttpStatusSource::new(StatusEndpointConfig {
            url_template: "http://127.0.0.1:9/{namespace}/{name}".to_string(),
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(500),
        })
        .unwrap();
        let err = source
            .fetch_status(&BrokerKey::new("messaging", "ex-aao"))
            .await
            .unwrap_err();
        assert_eq!(err, FetchErrorKind::Unavailable);
    }
}
