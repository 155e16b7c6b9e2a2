//! Payload builder - maps validated input onto the wire representation.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RealizeError, Result};
use crate::kinds::ResourceKind;
use crate::params::Invocation;
use crate::resolver::ReferenceResolver;
use crate::schema;

/// Desired wire representation of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Fields validated against the kind's schema, references still unresolved.
#[derive(Debug, Clone)]
pub struct ValidatedFields(Map<String, Value>);

/// Builds payloads for one resource kind.
pub struct PayloadBuilder<'k> {
    kind: &'k dyn ResourceKind,
}

impl<'k> PayloadBuilder<'k> {
    pub fn new(kind: &'k dyn ResourceKind) -> Self {
        Self { kind }
    }

    /// Check the resource-specific fields. No network access.
    pub fn validate(&self, invocation: &Invocation) -> Result<ValidatedFields> {
        let fields = schema::extract_fields(self.kind.spec_fields(), &invocation.raw)?;
        self.kind.validate(&fields)?;
        Ok(ValidatedFields(fields))
    }

    /// Resolve references and assemble the final payload.
    pub async fn resolve(
        &self,
        invocation: &Invocation,
        validated: ValidatedFields,
        resolver: &ReferenceResolver<'_>,
    ) -> Result<Payload> {
        let ValidatedFields(mut fields) = validated;
        self.kind.transform(&mut fields, resolver).await?;

        let common = &invocation.common;
        let id = common.resource_id()?.to_string();
        fields.insert("id".to_string(), Value::from(id));
        fields.insert(
            "resource_type".to_string(),
            Value::from(self.kind.resource_type()),
        );
        if let Some(display_name) = &common.display_name {
            fields.insert("display_name".to_string(), Value::from(display_name.as_str()));
        }
        if let Some(description) = &common.description {
            fields.insert("description".to_string(), Value::from(description.as_str()));
        }
        if let Some(tags) = &common.tags {
            let tags = serde_json::to_value(tags)
                .map_err(|e| RealizeError::validation(format!("tags: {}", e)))?;
            fields.insert("tags".to_string(), tags);
        }

        debug!(
            "Built {} payload with fields {:?}",
            self.kind.resource_type(),
            fields.keys().collect::<Vec<_>>()
        );
        Ok(Payload { fields })
    }

    /// Validate, then resolve.
    pub async fn build(
        &self,
        invocation: &Invocation,
        resolver: &ReferenceResolver<'_>,
    ) -> Result<Payload> {
        let validated = self.validate(invocation)?;
        self.resolve(invocation, validated, resolver).await
    }
}

#[cfg(test)]
impl Payload {
    pub(crate) fn from_value(value: Value) -> Self {
        Self {
            fields: value.as_object().cloned().unwrap_or_default(),
        }
    }
}
