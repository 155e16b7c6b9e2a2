//! Resource kinds managed by the engine.
//!
//! Each kind declares its field schema, collection URL and the rewrite that
//! turns validated input into the wire payload. The engine is generic over
//! this trait; kinds hold no state.

pub mod dhcp_relay;
pub mod dhcp_server;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::resolver::ReferenceResolver;
use crate::schema::FieldSpec;

pub use dhcp_relay::DhcpRelayConfig;
pub use dhcp_server::DhcpServerConfig;

/// Capability interface of one resource kind.
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Key of the resource in the invocation output, e.g. `dhcp_relay_config`.
    fn output_key(&self) -> &'static str;

    /// `resource_type` stamped on every payload.
    fn resource_type(&self) -> &'static str;

    /// Resource-specific input fields.
    fn spec_fields(&self) -> &'static [FieldSpec];

    /// Collection URL; a resource lives at `base_url/id`.
    fn base_url(&self) -> &'static str;

    /// Checks beyond the field table (element formats, nested sub-specs).
    /// Runs before anything touches the network.
    fn validate(&self, _fields: &Map<String, Value>) -> Result<()> {
        Ok(())
    }

    /// Rewrite extracted fields into wire form, resolving nested references.
    async fn transform(
        &self,
        _fields: &mut Map<String, Value>,
        _resolver: &ReferenceResolver<'_>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Look up a kind by its output key or its dashed CLI name.
pub fn kind_by_name(name: &str) -> Option<Box<dyn ResourceKind>> {
    match name.replace('-', "_").as_str() {
        "dhcp_relay_config" => Some(Box::new(DhcpRelayConfig)),
        "dhcp_server_config" => Some(Box::new(DhcpServerConfig)),
        _ => None,
    }
}
