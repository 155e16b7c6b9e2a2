//! Declarative realization of NSX-T Policy resources.
//!
//! A caller supplies a possibly-partial desired state for one resource; the
//! [`RealizationEngine`] validates it, resolves display-name references into
//! policy paths, compares it against the control plane, applies the needed
//! create/update/delete and optionally waits for the change to be realized.
//!
//! # Example
//! ```ignore
//! use nsxt_policy::kinds::DhcpRelayConfig;
//! use nsxt_policy::{RunnerSettings, run_invocation};
//!
//! let outcome = run_invocation(&DhcpRelayConfig, params, &RunnerSettings::default()).await;
//! println!("{}", outcome.to_output("dhcp_relay_config"));
//! ```

pub mod audit;
pub mod client;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod kinds;
pub mod params;
pub mod payload;
pub mod resolver;
pub mod resource;
pub mod schema;
pub mod urls;
pub mod waiter;

pub use client::ControlPlaneClient;
pub use config::{ClientConfig, ConnectionParams, Credentials, RetryPolicy, WaitPolicy};
pub use diff::{Action, Decision};
pub use engine::{OutcomeRecord, Phase, RealizationEngine, RunnerSettings, run_invocation};
pub use error::{RealizeError, Result};
pub use kinds::{ResourceKind, kind_by_name};
pub use params::{CommonParams, Invocation, State};
pub use payload::{Payload, PayloadBuilder};
pub use resolver::{Reference, ReferenceKind, ReferenceResolver, Scope};
pub use resource::{RealizationStatus, RemoteResource, ResourcePath, Tag};
pub use waiter::RealizationWaiter;
