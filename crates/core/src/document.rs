//! The external DID document and the patch composer that mutates it (C4).
//!
//! The composer is pure and deterministic: given a document and an ordered
//! patch list it always produces the same output, and iteration order in
//! the output mirrors insertion order (spec §4.4).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const USAGE_SIGNING: &str = "signing";
pub const USAGE_RECOVERY: &str = "recovery";

const HUB_CONTEXT: &str = "schema.identity.foundation/hub";
const HUB_SERVICE_TYPE: &str = "UserServiceEndpoint";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    /// Always server-enforced to equal the owning document's `id`; any
    /// client-supplied value in an `add-public-keys` patch is discarded
    /// (spec §4.4 rule 1).
    pub controller: String,
    pub usage: String,
    #[serde(rename = "publicKeyHex", skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpointBody {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type")]
    pub endpoint_type: String,
    pub instances: Vec<String>,
}

impl ServiceEndpointBody {
    fn new_hub() -> Self {
        ServiceEndpointBody {
            context: HUB_CONTEXT.to_string(),
            endpoint_type: HUB_SERVICE_TYPE.to_string(),
            instances: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: ServiceEndpointBody,
}

/// The DID document as it is exposed to resolvers. Unknown top-level
/// fields (e.g. a future `@context`) pass through opaquely so patches
/// never lose data the typed model above doesn't know about (SPEC_FULL §11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    pub id: String,
    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKeyEntry>,
    #[serde(default)]
    pub service: Vec<ServiceEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl DidDocument {
    pub fn new(id: String) -> Self {
        DidDocument {
            id,
            public_key: Vec::new(),
            service: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A single document mutation. `Unknown` is a no-op so operations carrying
/// forward-compatible patch types don't break replay (spec §4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    AddPublicKeys(Vec<PublicKeyEntry>),
    RemovePublicKeys(Vec<String>),
    AddServiceEndpoints {
        service_type: String,
        service_endpoints: Vec<String>,
    },
    RemoveServiceEndpoints {
        service_type: String,
        service_endpoints: Vec<String>,
    },
    Unknown,
}

impl<'de> Deserialize<'de> for Patch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let action = value.get("action").and_then(Value::as_str);

        let patch = match action {
            Some("add-public-keys") => {
                let keys: Vec<PublicKeyEntry> = value
                    .get("publicKeys")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(serde::de::Error::custom)?
                    .unwrap_or_default();
                Patch::AddPublicKeys(keys)
            }
            Some("remove-public-keys") => {
                let ids: Vec<String> = value
                    .get("publicKeys")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(serde::de::Error::custom)?
                    .unwrap_or_default();
                Patch::RemovePublicKeys(ids)
            }
            Some("add-service-endpoints") => Patch::AddServiceEndpoints {
                service_type: value
                    .get("serviceType")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                service_endpoints: value
                    .get("serviceEndpoints")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(serde::de::Error::custom)?
                    .unwrap_or_default(),
            },
            Some("remove-service-endpoints") => Patch::RemoveServiceEndpoints {
                service_type: value
                    .get("serviceType")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                service_endpoints: value
                    .get("serviceEndpoints")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(serde::de::Error::custom)?
                    .unwrap_or_default(),
            },
            _ => Patch::Unknown,
        };

        Ok(patch)
    }
}

/// Applies `patches` to `document` in order, mutating it in place.
pub fn apply_patches(document: &mut DidDocument, patches: &[Patch]) {
    for patch in patches {
        apply_patch(document, patch);
    }
}

fn apply_patch(document: &mut DidDocument, patch: &Patch) {
    match patch {
        Patch::AddPublicKeys(keys) => add_public_keys(document, keys),
        Patch::RemovePublicKeys(ids) => remove_public_keys(document, ids),
        Patch::AddServiceEndpoints {
            service_type,
            service_endpoints,
        } => add_service_endpoints(document, service_type, service_endpoints),
        Patch::RemoveServiceEndpoints {
            service_type,
            service_endpoints,
        } => remove_service_endpoints(document, service_type, service_endpoints),
        Patch::Unknown => {}
    }
}

fn add_public_keys(document: &mut DidDocument, keys: &[PublicKeyEntry]) {
    let controller = document.id.clone();
    for key in keys {
        if document.public_key.iter().any(|existing| existing.id == key.id) {
            continue;
        }
        let mut key = key.clone();
        key.controller = controller.clone();
        document.public_key.push(key);
    }
}

fn remove_public_keys(document: &mut DidDocument, ids: &[String]) {
    document.public_key.retain(|key| {
        let targeted = ids.iter().any(|id| id == &key.id);
        !targeted || key.usage == USAGE_RECOVERY
    });
}

fn add_service_endpoints(document: &mut DidDocument, service_type: &str, endpoints: &[String]) {
    let entry = match document
        .service
        .iter_mut()
        .find(|entry| entry.service_type == service_type)
    {
        Some(entry) => entry,
        None => {
            document.service.push(ServiceEntry {
                service_type: service_type.to_string(),
                service_endpoint: ServiceEndpointBody::new_hub(),
            });
            document.service.last_mut().expect("just pushed")
        }
    };

    for endpoint in endpoints {
        if !entry.service_endpoint.instances.iter().any(|i| i == endpoint) {
            entry.service_endpoint.instances.push(endpoint.clone());
        }
    }
}

fn remove_service_endpoints(document: &mut DidDocument, service_type: &str, endpoints: &[String]) {
    if let Some(entry) = document
        .service
        .iter_mut()
        .find(|entry| entry.service_type == service_type)
    {
        entry
            .service_endpoint
            .instances
            .retain(|instance| !endpoints.iter().any(|e| e == instance));
    }
}
