//! Realization engine - composes builder, resolver, decider, client and waiter.
//!
//! One invocation runs a sequential state machine:
//!
//! ```text
//! VALIDATING → RESOLVING → DIFFING → APPLYING → WAITING (opt-in) → DONE
//!      └───────────┴──────────┴──────────┴───────────┴──────────→ FAILED
//! ```
//!
//! Every failure aborts the invocation; no state retries another. Engines
//! share nothing between invocations, so concurrent runs are independent.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::audit::ChangeAudit;
use crate::client::ControlPlaneClient;
use crate::config::{RetryPolicy, WaitPolicy};
use crate::diff::{self, Action};
use crate::error::{RealizeError, Result};
use crate::kinds::ResourceKind;
use crate::params::{Invocation, State};
use crate::payload::PayloadBuilder;
use crate::resolver::ReferenceResolver;
use crate::resource::{RemoteResource, ResourcePath};
use crate::waiter::RealizationWaiter;

/// Engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Resolving,
    Diffing,
    Applying,
    Waiting,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Validating => "VALIDATING",
            Phase::Resolving => "RESOLVING",
            Phase::Diffing => "DIFFING",
            Phase::Applying => "APPLYING",
            Phase::Waiting => "WAITING",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Result of one realize operation.
#[derive(Debug)]
pub struct OutcomeRecord {
    pub changed: bool,
    /// `None` when the invocation failed before a decision was made.
    pub action: Option<Action>,
    pub resource: Option<RemoteResource>,
    pub error: Option<RealizeError>,
}

impl OutcomeRecord {
    pub fn failure(error: RealizeError) -> Self {
        Self {
            changed: false,
            action: None,
            resource: None,
            error: Some(error),
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Render the invocation output, keyed by the kind's output key.
    pub fn to_output(&self, output_key: &str) -> Value {
        let mut out = Map::new();
        out.insert("changed".to_string(), Value::Bool(self.changed));
        out.insert("failed".to_string(), Value::Bool(self.failed()));
        if let Some(action) = self.action {
            out.insert(
                "action".to_string(),
                serde_json::to_value(action).unwrap_or(Value::Null),
            );
        }
        out.insert(
            output_key.to_string(),
            self.resource
                .clone()
                .map(RemoteResource::into_value)
                .unwrap_or(Value::Null),
        );
        if let Some(error) = &self.error {
            out.insert("msg".to_string(), Value::from(error.to_string()));
            out.insert("error_kind".to_string(), Value::from(error.kind()));
        }
        Value::Object(out)
    }
}

/// A write that went through during APPLYING.
#[derive(Debug)]
struct Applied {
    action: Action,
    resource: Option<RemoteResource>,
}

/// Drives invocations against one control plane.
pub struct RealizationEngine<'a> {
    client: &'a ControlPlaneClient,
    wait: WaitPolicy,
}

impl<'a> RealizationEngine<'a> {
    pub fn new(client: &'a ControlPlaneClient, wait: WaitPolicy) -> Self {
        Self { client, wait }
    }

    /// Realize the declared state of one resource.
    pub async fn realize(&self, kind: &dyn ResourceKind, invocation: &Invocation) -> OutcomeRecord {
        self.realize_tracked(kind, invocation, &Mutex::new(None)).await
    }

    /// [`realize`](Self::realize) bounded by an overall deadline.
    ///
    /// A deadline that fires after a write went through still reports the
    /// write as a change.
    pub async fn realize_within(
        &self,
        kind: &dyn ResourceKind,
        invocation: &Invocation,
        deadline: Option<Duration>,
    ) -> OutcomeRecord {
        let Some(deadline) = deadline else {
            return self.realize(kind, invocation).await;
        };
        let applied = Mutex::new(None);
        match tokio::time::timeout(deadline, self.realize_tracked(kind, invocation, &applied)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let written = applied.lock().ok().and_then(|mut slot| slot.take());
                error!(
                    "{} realization exceeded {:?} (applied: {})",
                    kind.resource_type(),
                    deadline,
                    written.is_some()
                );
                let error = RealizeError::InvocationTimeout {
                    timeout: deadline,
                    applied: written.is_some(),
                };
                match written {
                    Some(Applied { action, resource }) => OutcomeRecord {
                        changed: true,
                        action: Some(action),
                        resource,
                        error: Some(error),
                    },
                    None => OutcomeRecord::failure(error),
                }
            }
        }
    }

    async fn realize_tracked(
        &self,
        kind: &dyn ResourceKind,
        invocation: &Invocation,
        applied: &Mutex<Option<Applied>>,
    ) -> OutcomeRecord {
        match self.run(kind, invocation, applied).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(phase = %Phase::Failed, "{} realization failed: {}", kind.resource_type(), e);
                OutcomeRecord::failure(e)
            }
        }
    }

    async fn run(
        &self,
        kind: &dyn ResourceKind,
        invocation: &Invocation,
        applied: &Mutex<Option<Applied>>,
    ) -> Result<OutcomeRecord> {
        let common = &invocation.common;
        let id = common.resource_id()?;
        let path = ResourcePath::new(kind.base_url(), id);
        let audit = ChangeAudit::new(kind.resource_type());

        enter(Phase::Validating, &path);
        let builder = PayloadBuilder::new(kind);
        let desired = match common.state {
            State::Present => {
                let validated = builder.validate(invocation)?;
                enter(Phase::Resolving, &path);
                let resolver = ReferenceResolver::new(self.client);
                Some(builder.resolve(invocation, validated, &resolver).await?)
            }
            // Deletion needs the identity only.
            State::Absent => None,
        };

        enter(Phase::Diffing, &path);
        let decision = diff::decide(common.state, desired.as_ref(), path.as_str(), self.client).await?;
        let action = decision.action;
        info!("{} {}: {}", kind.resource_type(), id, action);

        if common.check_mode {
            debug!("Check mode: skipping {} of {}", action, path);
            enter(Phase::Done, &path);
            return Ok(OutcomeRecord {
                changed: action.changes(),
                action: Some(action),
                resource: decision.current,
                error: None,
            });
        }

        enter(Phase::Applying, &path);
        let resource = match (action, &decision.body) {
            (Action::Create, Some(body)) => {
                let created = self.client.put(path.as_str(), body).await?;
                audit.created(id, path.as_str());
                Some(created)
            }
            (Action::Update, Some(body)) => {
                let updated = self.client.put(path.as_str(), body).await?;
                audit.updated(id, path.as_str(), &decision.changed_fields);
                Some(updated)
            }
            (Action::Delete, _) => {
                self.client.delete(path.as_str()).await?;
                audit.deleted(id, path.as_str());
                None
            }
            (Action::NoOp, _) => decision.current,
            (Action::Create | Action::Update, None) => {
                return Err(RealizeError::validation(format!(
                    "no payload to {} {}",
                    action, path
                )));
            }
        };

        if action.changes() {
            if let Ok(mut slot) = applied.lock() {
                *slot = Some(Applied {
                    action,
                    resource: resource.clone(),
                });
            }
        }

        if common.do_wait_till_create && action.changes() {
            enter(Phase::Waiting, &path);
            let waiter = RealizationWaiter::new(self.client, self.wait.clone());
            let waited = match action {
                Action::Delete => waiter.wait_until_deleted(path.as_str()).await.map(|_| None),
                _ => waiter.wait_until_realized(path.as_str()).await.map(Some),
            };
            match waited {
                Ok(realized) => {
                    enter(Phase::Done, &path);
                    return Ok(OutcomeRecord {
                        changed: true,
                        action: Some(action),
                        resource: realized,
                        error: None,
                    });
                }
                Err(e) => {
                    error!(phase = %Phase::Failed, "{} was applied but did not settle: {}", path, e);
                    return Ok(OutcomeRecord {
                        changed: true,
                        action: Some(action),
                        resource,
                        error: Some(e),
                    });
                }
            }
        }

        enter(Phase::Done, &path);
        Ok(OutcomeRecord {
            changed: action.changes(),
            action: Some(action),
            resource,
            error: None,
        })
    }
}

fn enter(phase: Phase, path: &ResourcePath) {
    debug!(phase = %phase, "{}", path);
}

/// Runner-level settings that are not part of the invocation input.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub retry: RetryPolicy,
    pub wait: WaitPolicy,
    pub invocation_timeout: Option<Duration>,
    /// URL scheme of the manager; `https` outside of lab setups.
    pub scheme: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            wait: WaitPolicy::default(),
            invocation_timeout: None,
            scheme: "https".to_string(),
        }
    }
}

/// Parse raw invocation input, connect, and realize.
///
/// Input and connection problems come back as a failed record, like any
/// other failure.
pub async fn run_invocation(
    kind: &dyn ResourceKind,
    input: Value,
    settings: &RunnerSettings,
) -> OutcomeRecord {
    let prepared = Invocation::from_value(input).and_then(|invocation| {
        let mut config = invocation.connection.clone().into_client_config()?;
        config.retry = settings.retry.clone();
        config.scheme = settings.scheme.clone();
        let client = ControlPlaneClient::new(config)?;
        Ok((invocation, client))
    });

    match prepared {
        Ok((invocation, client)) => {
            RealizationEngine::new(&client, settings.wait.clone())
                .realize_within(kind, &invocation, settings.invocation_timeout)
                .await
        }
        Err(e) => {
            error!("{} invocation rejected: {}", kind.resource_type(), e);
            OutcomeRecord::failure(e)
        }
    }
}
