//! Resource model shared by fetchers and the correlation engine

use serde::{Deserialize, Serialize};

use brokerscope_common::FetchErrorKind;

/// Key for one broker instance: (namespace, name).
///
/// Everything the engine tracks is keyed by this.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerKey {
    pub namespace: String,
    pub name: String,
}

impl BrokerKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Create a unique key string for internal storage and logging
    pub fn to_key_string(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Parse a key string back to a BrokerKey
    pub fn parse_key_string(key_string: &str) -> Option<BrokerKey> {
        let (namespace, name) = key_string.split_once('/')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(BrokerKey::new(namespace, name))
    }
}

impl std::fmt::Display for BrokerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The (group, version, kind) identity of a fetchable resource type.
///
/// Descriptors are immutable and defined at process start; the registry
/// owns the full catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub api_group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    /// Lowercase plural resource name used on the API path
    pub plural: &'static str,
}

impl ResourceDescriptor {
    /// The `apiVersion` string as it appears on manifests
    pub fn api_version(&self) -> String {
        if self.api_group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.api_group, self.version)
        }
    }
}

impl std::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

/// An owner reference carried by a fetched resource, by kind and name.
///
/// UIDs are deliberately not tracked; correlation resolves ownership by
/// name equality only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

impl OwnerRef {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

/// One fetched resource instance, normalized into a common shape.
///
/// The payload is kept opaque; the correlation engine extracts the fields
/// it needs per kind.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResource {
    pub descriptor: ResourceDescriptor,
    pub namespace: String,
    pub name: String,
    pub owner_refs: Vec<OwnerRef>,
    pub payload: serde_json::Value,
}

impl RawResource {
    pub fn new(
        descriptor: ResourceDescriptor,
        namespace: &str,
        name: &str,
        owner_refs: Vec<OwnerRef>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            descriptor,
            namespace: namespace.to_string(),
            name: name.to_string(),
            owner_refs,
            payload,
        }
    }
}

/// The result of one fetcher invocation for one broker key.
///
/// Consumed immediately by the correlation engine; failures are values,
/// never faults crossing the fetcher boundary.
#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub descriptor: ResourceDescriptor,
    pub key: BrokerKey,
    pub result: Result<Vec<RawResource>, FetchErrorKind>,
}

impl FetchOutcome {
    pub fn success(descriptor: ResourceDescriptor, key: BrokerKey, items: Vec<RawResource>) -> Self {
        Self {
            descriptor,
            key,
            result: Ok(items),
        }
    }

    pub fn failure(descriptor: ResourceDescriptor, key: BrokerKey, error: FetchErrorKind) -> Self {
        Self {
            descriptor,
            key,
            result: Err(error),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.descriptor.kind
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
