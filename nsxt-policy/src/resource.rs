//! Control-plane resource representations.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields owned by the control plane. Never compared, never overwritten.
pub const SERVER_MANAGED_FIELDS: &[&str] = &[
    "_revision",
    "_create_time",
    "_create_user",
    "_last_modified_time",
    "_last_modified_user",
    "_system_owned",
    "_protection",
    "realization_status",
    "path",
    "parent_path",
    "relative_path",
    "unique_id",
    "marked_for_delete",
    "overridden",
];

pub fn is_server_managed(field: &str) -> bool {
    SERVER_MANAGED_FIELDS.contains(&field)
}

/// Hierarchical resource path, e.g.
/// `/infra/sites/default/enforcement-points/default/edge-clusters/ec-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Compose `base_url + "/" + id`, percent-encoding the id as one segment.
    pub fn new(base_url: &str, id: &str) -> Self {
        Self(format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(id)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Realization state reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealizationStatus {
    InProgress,
    Success,
    Error,
    Orphaned,
    Stale,
    #[serde(other)]
    Unknown,
}

impl RealizationStatus {
    /// Whether polling can stop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RealizationStatus::Success | RealizationStatus::Error | RealizationStatus::Orphaned
        )
    }
}

/// A `{scope, tag}` pair. Unique as a pair within a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    pub tag: String,
}

/// The control plane's current representation of a resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteResource {
    body: Map<String, Value>,
}

impl RemoteResource {
    /// Wrap a response body; non-object bodies yield an empty resource.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(body) => Self { body },
            _ => Self::default(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.body.get("display_name").and_then(Value::as_str)
    }

    /// Optimistic-concurrency token.
    pub fn revision(&self) -> Option<&Value> {
        self.body.get("_revision")
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}
