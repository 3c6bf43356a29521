//! Repository configuration.
//!
//! The config is stored as JSON under `/config`. Only the fields this crate
//! reads are typed; every section keeps unknown fields in an `extra` bag so
//! a read-modify-write cycle never drops what another tool wrote.
//!
//! Fields are addressed with dotted selectors such as `Datastore.StorageMax`.
//! Each segment matches exactly first and falls back to a case-insensitive
//! match.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RepoError, Result};

/// Selector of the identity private key, guarded on partial updates.
pub const PRIV_KEY_SELECTOR: &str = "Identity.PrivKey";

/// Selector of the unsupported datastore spec.
pub const DATASTORE_SPEC_SELECTOR: &str = "Datastore.Spec";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepoConfig {
    #[serde(default)]
    pub identity: Identity,
    #[serde(default)]
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub addresses: Addresses,
    #[serde(default)]
    pub bootstrap: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "PeerID", default)]
    pub peer_id: String,
    #[serde(rename = "PrivKey", default, skip_serializing_if = "Option::is_none")]
    pub priv_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("peer_id", &self.peer_id)
            .field("priv_key", &self.priv_key.as_ref().map(|_| "[REDACTED]"))
            .field("extra", &self.extra)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatastoreConfig {
    #[serde(default)]
    pub storage_max: String,
    #[serde(rename = "StorageGCWatermark", default)]
    pub storage_gc_watermark: i64,
    #[serde(rename = "GCPeriod", default)]
    pub gc_period: String,
    /// Pluggable datastore layout. Not supported by this repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            storage_max: "10GB".to_string(),
            storage_gc_watermark: 90,
            gc_period: "1h".to_string(),
            spec: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Addresses {
    #[serde(default)]
    pub swarm: Vec<String>,
    #[serde(rename = "API", default)]
    pub api: Vec<String>,
    #[serde(default)]
    pub gateway: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RepoConfig {
    /// A default config carrying the given identity.
    pub fn with_identity(peer_id: impl Into<String>, priv_key: Option<String>) -> Self {
        Self {
            identity: Identity {
                peer_id: peer_id.into(),
                priv_key,
                extra: Map::new(),
            },
            ..Self::default()
        }
    }

    /// Whether the config asks for a pluggable datastore layout.
    pub fn has_datastore_spec(&self) -> bool {
        self.datastore.spec.as_ref().is_some_and(|spec| !spec.is_empty())
    }

    /// The config as an untyped JSON object.
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(RepoError::Config("config is not a JSON object".to_string())),
        }
    }

    /// Validate an untyped JSON object against the typed config.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| RepoError::Config(format!("invalid config: {}", e)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Parse stored config bytes into an untyped JSON object.
pub fn map_from_bytes(bytes: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice(bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(RepoError::Config("stored config is not a JSON object".to_string())),
    }
}

fn split_selector(selector: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = selector.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(RepoError::InvalidInput(format!(
            "invalid config selector: {:?}",
            selector
        )));
    }
    Ok(parts)
}

/// Find `name` in `map`: exact match first, then case-insensitive.
fn resolve_field(map: &Map<String, Value>, name: &str) -> Option<String> {
    if map.contains_key(name) {
        return Some(name.to_string());
    }
    map.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned()
}

/// Read the value at a dotted selector.
pub fn map_get(map: &Map<String, Value>, selector: &str) -> Result<Value> {
    let parts = split_selector(selector)?;
    let mut current = map;
    let mut walked = Vec::with_capacity(parts.len());

    for (i, part) in parts.iter().enumerate() {
        let field = resolve_field(current, part).ok_or_else(|| {
            RepoError::Config(format!("key has no attribute {}", walked_path(&walked, part)))
        })?;
        walked.push(*part);
        let value = &current[&field];
        if i + 1 == parts.len() {
            return Ok(value.clone());
        }
        current = value.as_object().ok_or_else(|| {
            RepoError::Config(format!("{} is not a map", walked.join(".")))
        })?;
    }
    Err(RepoError::InvalidInput("empty config selector".to_string()))
}

/// Set the value at a dotted selector, creating intermediate maps.
pub fn map_set(map: &mut Map<String, Value>, selector: &str, value: Value) -> Result<()> {
    let parts = split_selector(selector)?;
    let Some((last, parents)) = parts.split_last() else {
        return Err(RepoError::InvalidInput("empty config selector".to_string()));
    };

    let mut current = map;
    for part in parents {
        let field = resolve_field(current, part).unwrap_or_else(|| part.to_string());
        let entry = current
            .entry(field)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(inner) => inner,
            _ => return Err(RepoError::Config(format!("{} is not a map", part))),
        };
    }

    let field = resolve_field(current, last).unwrap_or_else(|| last.to_string());
    current.insert(field, value);
    Ok(())
}

/// Remove the value at a dotted selector. Missing paths are ignored.
pub fn map_remove(map: &mut Map<String, Value>, selector: &str) -> Result<()> {
    let parts = split_selector(selector)?;
    let Some((last, parents)) = parts.split_last() else {
        return Ok(());
    };

    let mut current = map;
    for part in parents {
        let Some(field) = resolve_field(current, part) else {
            return Ok(());
        };
        current = match current.get_mut(&field) {
            Some(Value::Object(inner)) => inner,
            _ => return Ok(()),
        };
    }
    if let Some(field) = resolve_field(current, last) {
        current.remove(&field);
    }
    Ok(())
}

fn walked_path(walked: &[&str], next: &str) -> String {
    let mut parts = walked.to_vec();
    parts.push(next);
    parts.join(".")
}
