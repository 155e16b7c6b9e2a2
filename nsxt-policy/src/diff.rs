//! Diff & state decider - compares desired and current state and picks an action.
//!
//! Only fields present in the desired payload are compared. Server-managed
//! fields are ignored. Tags compare as sets; every other list compares as a
//! sequence, so caller-significant ordering (preferred edge paths) counts.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::ControlPlaneClient;
use crate::error::Result;
use crate::params::State;
use crate::payload::Payload;
use crate::resource::{RemoteResource, is_server_managed};

/// What the engine must do to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    NoOp,
    Delete,
}

impl Action {
    pub fn changes(&self) -> bool {
        !matches!(self, Action::NoOp)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::NoOp => "no-op",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Outcome of the decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// Current remote representation, if the resource exists.
    pub current: Option<RemoteResource>,
    /// Body to send for CREATE/UPDATE.
    pub body: Option<Value>,
    /// Desired fields that differ from the current state (UPDATE only).
    pub changed_fields: Vec<String>,
}

/// Fetch the current resource at `path` and decide.
///
/// `desired` is required for `State::Present` and ignored for `State::Absent`.
pub async fn decide(
    state: State,
    desired: Option<&Payload>,
    path: &str,
    client: &ControlPlaneClient,
) -> Result<Decision> {
    let current = client.get(path).await?;
    let decision = plan(state, desired, current);
    debug!("Decided {} for {}", decision.action, path);
    Ok(decision)
}

/// Pure decision over already-fetched state.
pub fn plan(state: State, desired: Option<&Payload>, current: Option<RemoteResource>) -> Decision {
    match (state, desired, current) {
        (State::Absent, _, None) => Decision {
            action: Action::NoOp,
            current: None,
            body: None,
            changed_fields: vec![],
        },
        (State::Absent, _, Some(current)) => Decision {
            action: Action::Delete,
            current: Some(current),
            body: None,
            changed_fields: vec![],
        },
        (State::Present, desired, None) => Decision {
            action: Action::Create,
            current: None,
            body: desired.map(|d| Value::Object(d.fields().clone())),
            changed_fields: vec![],
        },
        (State::Present, None, Some(current)) => Decision {
            action: Action::NoOp,
            current: Some(current),
            body: None,
            changed_fields: vec![],
        },
        (State::Present, Some(desired), Some(current)) => {
            let changed = differing_fields(desired.fields(), current.body());
            if changed.is_empty() {
                Decision {
                    action: Action::NoOp,
                    current: Some(current),
                    body: None,
                    changed_fields: vec![],
                }
            } else {
                debug!("Fields differing from current state: {:?}", changed);
                let body = merge(desired.fields(), &current);
                Decision {
                    action: Action::Update,
                    current: Some(current),
                    body: Some(body),
                    changed_fields: changed,
                }
            }
        }
    }
}

/// Names of desired fields whose value differs from the current one.
pub fn differing_fields(desired: &Map<String, Value>, current: &Map<String, Value>) -> Vec<String> {
    desired
        .iter()
        .filter(|(name, _)| !is_server_managed(name))
        .filter(|(name, want)| !field_matches(name, want, current.get(name.as_str())))
        .map(|(name, _)| name.clone())
        .collect()
}

fn field_matches(name: &str, want: &Value, have: Option<&Value>) -> bool {
    if name == "tags" {
        return tag_set(Some(want)) == tag_set(have);
    }
    match have {
        Some(have) => have == want,
        None => want.is_null(),
    }
}

/// Tags as a set of `(scope, tag)` pairs. Missing or null means empty.
fn tag_set(value: Option<&Value>) -> BTreeSet<(String, String)> {
    value
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .map(|t| {
                    let field = |k: &str| t.get(k).and_then(Value::as_str).unwrap_or_default().to_string();
                    (field("scope"), field("tag"))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Overlay desired fields on the current representation, keeping
/// server-managed fields (including the revision token) from the server.
fn merge(desired: &Map<String, Value>, current: &RemoteResource) -> Value {
    let mut body = current.body().clone();
    for (name, value) in desired {
        if !is_server_managed(name) {
            body.insert(name.clone(), value.clone());
        }
    }
    if let Some(revision) = current.revision() {
        body.insert("_revision".to_string(), revision.clone());
    }
    Value::Object(body)
}
