//! Invocation input: the fields every resource kind accepts.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ConnectionParams;
use crate::error::{RealizeError, Result};
use crate::resource::Tag;

/// Desired existence of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Present,
    Absent,
}

/// Fields shared by all resource kinds.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonParams {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    pub state: State,
    #[serde(default)]
    pub do_wait_till_create: bool,
    /// Decide without applying.
    #[serde(default)]
    pub check_mode: bool,
}

impl CommonParams {
    /// Identity of the managed resource: `id`, else `display_name`.
    pub fn resource_id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.display_name.as_deref().filter(|s| !s.is_empty()))
            .ok_or_else(|| RealizeError::validation("either id or display_name must be specified"))
    }

    fn validate(&self) -> Result<()> {
        self.resource_id()?;
        if let Some(tags) = &self.tags {
            let mut seen = HashSet::new();
            for tag in tags {
                if !seen.insert((&tag.scope, &tag.tag)) {
                    return Err(RealizeError::validation(format!(
                        "duplicate tag {{scope: '{}', tag: '{}'}}",
                        tag.scope, tag.tag
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One parsed invocation: connection, common and raw resource-specific input.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub connection: ConnectionParams,
    pub common: CommonParams,
    /// The full input object; resource kinds pick their fields from it.
    pub raw: Map<String, Value>,
}

impl Invocation {
    pub fn from_value(value: Value) -> Result<Self> {
        let raw = match value {
            Value::Object(map) => map,
            other => {
                return Err(RealizeError::validation(format!(
                    "invocation parameters must be an object, got {}",
                    other
                )));
            }
        };
        let connection: ConnectionParams = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| RealizeError::validation(format!("invalid connection parameters: {}", e)))?;
        let common: CommonParams = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| RealizeError::validation(format!("invalid parameters: {}", e)))?;
        common.validate()?;
        Ok(Self {
            connection,
            common,
            raw,
        })
    }
}
