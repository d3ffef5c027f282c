//! Broker watch driving the tracking lifecycle
//!
//! Applied broker resources start a per-key pipeline; a delete event is
//! the explicit removal signal that untracks the key.

use futures::TryStreamExt;
use kube::api::{Api, DynamicObject};
use kube::runtime::watcher::{self, Event};
use kube::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use brokerscope_api::{registry, BrokerKey};

use crate::fetcher::api_resource;

/// Lifecycle event for one broker instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerEvent {
    Applied(BrokerKey),
    Deleted(BrokerKey),
}

fn key_of(obj: &DynamicObject) -> Option<BrokerKey> {
    let namespace = obj.metadata.namespace.as_deref()?;
    let name = obj.metadata.name.as_deref()?;
    Some(BrokerKey::new(namespace, name))
}

/// Watch broker resources and forward lifecycle events.
///
/// Runs until the watch stream or the receiving side ends.
pub async fn watch_brokers(
    client: Client,
    namespace: Option<String>,
    tx: mpsc::Sender<BrokerEvent>,
) {
    let ar = api_resource(&registry::BROKER);
    let api: Api<DynamicObject> = match namespace.as_deref() {
        Some(ns) if !ns.is_empty() => Api::namespaced_with(client, ns, &ar),
        _ => Api::all_with(client, &ar),
    };

    info!("Starting broker watcher");

    let stream = watcher::watcher(api, watcher::Config::default());
    tokio::pin!(stream);

    loop {
        match stream.try_next().await {
            Ok(Some(event)) => match event {
                Event::Apply(obj) | Event::InitApply(obj) => {
                    if let Some(key) = key_of(&obj)
                        && tx.send(BrokerEvent::Applied(key)).await.is_err()
                    {
                        break;
                    }
                }
                Event::Delete(obj) => {
                    if let Some(key) = key_of(&obj)
                        && tx.send(BrokerEvent::Deleted(key)).await.is_err()
                    {
                        break;
                    }
                }
                Event::Init => {
                    debug!("Broker watcher initialized");
                }
                Event::InitDone => {
                    info!("Broker watcher initial sync complete");
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Broker watch error, stream will retry");
            }
        }
    }

    info!("Broker watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    #[test]
    fn test_key_of() {
        let obj = DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("ex-aao".to_string()),
                namespace: Some("messaging".to_string()),
                ..Default::default()
            },
            data: serde_json::Value::Null,
        };
        assert_eq!(key_of(&obj), Some(BrokerKey::new("messaging", "ex-aao")));

        let nameless = DynamicObject {
            types: None,
            metadata: ObjectMeta::default(),
            data: serde_json::Value::Null,
        };
        assert_eq!(key_of(&nameless), None);
    }
}
