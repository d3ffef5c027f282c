//! Dynamic fetchers for the resource kinds in the registry
//!
//! One fetcher per descriptor, all sharing the same implementation: list
//! the kind in the key's namespace through a dynamically-typed API and
//! normalize each object into the common resource shape. Retry policy and
//! ownership matching are the engine's job, not the fetcher's.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::Client;
use tracing::debug;

use brokerscope_api::{registry, BrokerKey, FetchOutcome, OwnerRef, RawResource, ResourceDescriptor};
use brokerscope_api::traits::ResourceFetcher;
use brokerscope_common::FetchErrorKind;

/// Fetches one resource kind through `Api<DynamicObject>`
pub struct DynamicResourceFetcher {
    client: Client,
    descriptor: ResourceDescriptor,
}

impl DynamicResourceFetcher {
    pub fn new(client: Client, descriptor: ResourceDescriptor) -> Self {
        Self { client, descriptor }
    }
}

/// The kube-side identity of a descriptor
pub(crate) fn api_resource(descriptor: &ResourceDescriptor) -> ApiResource {
    ApiResource {
        group: descriptor.api_group.to_string(),
        version: descriptor.version.to_string(),
        api_version: descriptor.api_version(),
        kind: descriptor.kind.to_string(),
        plural: descriptor.plural.to_string(),
    }
}

/// Map a kube failure onto the fetch taxonomy.
///
/// A 404 for a list means the group/kind is not served on this cluster,
/// which is `Unavailable` (and tolerated for optional descriptors).
pub(crate) fn classify_kube_error(err: &kube::Error) -> FetchErrorKind {
    match err {
        kube::Error::Api(resp) if resp.code == 401 || resp.code == 403 => {
            FetchErrorKind::Unauthorized
        }
        kube::Error::Api(_) => FetchErrorKind::Unavailable,
        kube::Error::SerdeError(_) => FetchErrorKind::Malformed,
        _ => FetchErrorKind::Unavailable,
    }
}

/// Normalize a fetched object into the common resource shape
pub(crate) fn convert_object(descriptor: ResourceDescriptor, obj: DynamicObject) -> RawResource {
    let namespace = obj.metadata.namespace.clone().unwrap_or_default();
    let name = obj.metadata.name.clone().unwrap_or_default();
    let owner_refs = obj
        .metadata
        .owner_references
        .as_ref()
        .map(|refs| {
            refs.iter()
                .map(|r| OwnerRef::new(&r.kind, &r.name))
                .collect()
        })
        .unwrap_or_default();

    RawResource::new(descriptor, &namespace, &name, owner_refs, obj.data)
}

#[async_trait]
impl ResourceFetcher for DynamicResourceFetcher {
    fn descriptor(&self) -> ResourceDescriptor {
        self.descriptor
    }

    async fn fetch(&self, key: &BrokerKey) -> FetchOutcome {
        if key.namespace.is_empty() {
            return FetchOutcome::failure(self.descriptor, key.clone(), FetchErrorKind::Malformed);
        }

        let api: Api<DynamicObject> = Api::namespaced_with(
            self.client.clone(),
            &key.namespace,
            &api_resource(&self.descriptor),
        );

        match api.list(&ListParams::default()).await {
            Ok(list) => {
                debug!(
                    kind = self.descriptor.kind,
                    namespace = %key.namespace,
                    count = list.items.len(),
                    "Listed resources"
                );
                let items = list
                    .items
                    .into_iter()
                    .map(|obj| convert_object(self.descriptor, obj))
                    .collect();
                FetchOutcome::success(self.descriptor, key.clone(), items)
            }
            Err(e) => {
                debug!(
                    kind = self.descriptor.kind,
                    namespace = %key.namespace,
                    error = %e,
                    "List failed"
                );
                FetchOutcome::failure(self.descriptor, key.clone(), classify_kube_error(&e))
            }
        }
    }
}

/// One fetcher per registry descriptor, sharing the client
pub fn registry_fetchers(client: &Client) -> Vec<Arc<dyn ResourceFetcher>> {
    registry::list()
        .iter()
        .map(|d| Arc::new(DynamicResourceFetcher::new(client.clone(), *d)) as Arc<dyn ResourceFetcher>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::api::ObjectMeta;
    use kube::core::ErrorResponse;
    use serde_json::json;

    fn create_test_object() -> DynamicObject {
        DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("ex-aao-cert".to_string()),
                namespace: Some("messaging".to_string()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "broker.amq.io/v1beta1".to_string(),
                    kind: "ActiveMQArtemis".to_string(),
                    name: "ex-aao".to_string(),
                    uid: String::new(),
                    controller: Some(true),
                    block_owner_deletion: None,
                }]),
                ..Default::default()
            },
            data: json!({"spec": {"secretName": "ex-aao-cert-secret"}}),
        }
    }

    #[test]
    fn test_api_resource_mapping() {
        let ar = api_resource(&registry::BROKER);
        assert_eq!(ar.group, "broker.amq.io");
        assert_eq!(ar.api_version, "broker.amq.io/v1beta1");
        assert_eq!(ar.plural, "activemqartemises");

        let ar = api_resource(&registry::SECRET);
        assert_eq!(ar.group, "");
        assert_eq!(ar.api_version, "v1");
    }

    #[test]
    fn test_convert_object() {
        let raw = convert_object(registry::CERTIFICATE, create_test_object());
        assert_eq!(raw.name, "ex-aao-cert");
        assert_eq!(raw.namespace, "messaging");
        assert_eq!(raw.owner_refs.len(), 1);
        assert_eq!(raw.owner_refs[0].kind, "ActiveMQArtemis");
        assert_eq!(raw.owner_refs[0].name, "ex-aao");
        assert_eq!(
            raw.payload.pointer("/spec/secretName").and_then(|v| v.as_str()),
            Some("ex-aao-cert-secret")
        );
    }

    #[test]
    fn test_classify_kube_error() {
        let forbidden = kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        });
        assert_eq!(classify_kube_error(&forbidden), FetchErrorKind::Unauthorized);

        let missing = kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "the server could not find the requested resource".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert_eq!(classify_kube_error(&missing), FetchErrorKind::Unavailable);

        let conflict = kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "conflict".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        });
        assert_eq!(classify_kube_error(&conflict), FetchErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_empty_namespace_is_malformed() {
        // A client that never connects is fine here; the namespace check
        // happens before any request.
        let config = kube::Config::new("http://127.0.0.1:9".parse().unwrap());
        let client = Client::try_from(config).unwrap();
        let fetcher = DynamicResourceFetcher::new(client, registry::BROKER);

        let outcome = fetcher.fetch(&BrokerKey::new("", "ex-aao")).await;
        assert_eq!(outcome.result.unwrap_err(), FetchErrorKind::Malformed);
    }
}
