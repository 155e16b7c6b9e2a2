//! Realization error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can abort a realization.
#[derive(Debug, Error)]
pub enum RealizeError {
    /// Bad or missing input. Never sent over the wire.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No resource of the referenced kind carries the display name.
    #[error("{kind} with display name '{display_name}' not found")]
    ReferenceNotFound { kind: String, display_name: String },

    /// More than one resource of the referenced kind carries the display name.
    #[error("{count} {kind} resources share the display name '{display_name}'; specify the id instead")]
    AmbiguousReference {
        kind: String,
        display_name: String,
        count: usize,
    },

    /// 401/403 from the control plane.
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// 409 on a write (optimistic concurrency control).
    #[error("concurrent modification of {path}: {message}; re-run to pick up the current revision")]
    ConcurrencyConflict { path: String, message: String },

    /// Connection failure or 5xx after all retries were used up.
    #[error("transport error after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    /// Any other non-success response.
    #[error("control plane rejected request (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The backend reported ERROR/ORPHANED for the resource.
    #[error("realization of {path} failed: {detail} (the resource may already exist on the control plane)")]
    RealizationFailed { path: String, detail: String },

    /// The backend did not report the desired state in time.
    #[error("realization of {path} did not complete within {timeout:?} (the resource may already exist on the control plane)")]
    RealizationTimeout { path: String, timeout: Duration },

    /// The overall invocation deadline elapsed. `applied` is set when a
    /// write had already gone through.
    #[error("invocation did not complete within {:?}{}", .timeout, may_exist_note(.applied))]
    InvocationTimeout { timeout: Duration, applied: bool },
}

fn may_exist_note(applied: &bool) -> &'static str {
    if *applied {
        " (the resource may already exist on the control plane)"
    } else {
        ""
    }
}

impl RealizeError {
    /// Stable machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            RealizeError::Validation(_) => "validation_error",
            RealizeError::ReferenceNotFound { .. } => "reference_not_found",
            RealizeError::AmbiguousReference { .. } => "ambiguous_reference",
            RealizeError::Auth { .. } => "auth_error",
            RealizeError::ConcurrencyConflict { .. } => "concurrency_conflict",
            RealizeError::Transport { .. } => "transport_error",
            RealizeError::Api { .. } => "api_error",
            RealizeError::RealizationFailed { .. } => "realization_failed",
            RealizeError::RealizationTimeout { .. } => "realization_timeout",
            RealizeError::InvocationTimeout { .. } => "invocation_timeout",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        RealizeError::Validation(msg.into())
    }
}

/// Result type for realization operations.
pub type Result<T> = std::result::Result<T, RealizeError>;
