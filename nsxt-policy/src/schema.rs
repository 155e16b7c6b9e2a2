//! Static field schemas for resource kinds.
//!
//! Each resource kind declares a table of [`FieldSpec`]s. The payload builder
//! checks caller input against it once, before anything touches the wire.

use serde_json::{Map, Value};

use crate::error::{RealizeError, Result};

/// Wire type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    StrList,
    /// Nested sub-spec (e.g. a reference).
    Object,
    ObjectList,
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::Int => "integer",
            FieldType::StrList => "list of strings",
            FieldType::Object => "dict",
            FieldType::ObjectList => "list of dicts",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::StrList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldType::Object => value.is_object(),
            FieldType::ObjectList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }
}

/// Declared bound on a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Inclusive integer range.
    IntRange { min: i64, max: i64 },
    /// Maximum number of list items.
    MaxItems(usize),
}

/// Value applied when the caller omits a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Int(i64),
}

impl FieldDefault {
    fn to_value(self) -> Value {
        match self {
            FieldDefault::Int(i) => Value::from(i),
        }
    }
}

/// One resource-specific input field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<FieldDefault>,
    pub constraint: Option<Constraint>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            constraint: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Check one raw value against this spec.
    pub fn check(&self, value: &Value) -> Result<()> {
        if !self.ty.matches(value) {
            return Err(RealizeError::validation(format!(
                "{} must be a {}",
                self.name,
                self.ty.name()
            )));
        }
        match self.constraint {
            Some(Constraint::IntRange { min, max }) => {
                let in_range = match value.as_i64() {
                    Some(i) => i >= min && i <= max,
                    None => false,
                };
                if !in_range {
                    return Err(RealizeError::validation(format!(
                        "{} must be between {} and {}, got {}",
                        self.name, min, max, value
                    )));
                }
            }
            Some(Constraint::MaxItems(max)) => {
                let len = value.as_array().map(Vec::len).unwrap_or(0);
                if len > max {
                    return Err(RealizeError::validation(format!(
                        "{} accepts at most {} items, got {}",
                        self.name, max, len
                    )));
                }
            }
            None => {}
        }
        Ok(())
    }
}

/// Extract the declared fields from caller input.
///
/// Applies defaults, enforces required fields, types and bounds. Fields not
/// declared in `specs` are dropped; explicit `null`s count as absent.
pub fn extract_fields(specs: &[FieldSpec], input: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for spec in specs {
        let value = match input.get(spec.name).filter(|v| !v.is_null()) {
            Some(v) => v.clone(),
            None => match spec.default {
                Some(default) => default.to_value(),
                None if spec.required => {
                    return Err(RealizeError::validation(format!(
                        "missing required field: {}",
                        spec.name
                    )));
                }
                None => continue,
            },
        };
        spec.check(&value)?;
        out.insert(spec.name.to_string(), value);
    }
    Ok(out)
}
