//! DHCP relay config.

use std::net::IpAddr;

use serde_json::{Map, Value};

use super::ResourceKind;
use crate::error::{RealizeError, Result};
use crate::schema::{FieldSpec, FieldType};
use crate::urls::DHCP_RELAY_CONFIG_URL;

static FIELDS: &[FieldSpec] = &[FieldSpec::new("server_addresses", FieldType::StrList).required()];

/// DHCP relay configuration: forwards DHCP to a list of server addresses.
pub struct DhcpRelayConfig;

impl ResourceKind for DhcpRelayConfig {
    fn output_key(&self) -> &'static str {
        "dhcp_relay_config"
    }

    fn resource_type(&self) -> &'static str {
        "DhcpRelayConfig"
    }

    fn spec_fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn base_url(&self) -> &'static str {
        DHCP_RELAY_CONFIG_URL
    }

    fn validate(&self, fields: &Map<String, Value>) -> Result<()> {
        let addresses = fields
            .get("server_addresses")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if addresses.is_empty() {
            return Err(RealizeError::validation(
                "server_addresses must contain at least one address",
            ));
        }
        for addr in addresses.iter().filter_map(Value::as_str) {
            addr.parse::<IpAddr>().map_err(|_| {
                RealizeError::validation(format!(
                    "server_addresses: '{}' is not an IPv4 or IPv6 address",
                    addr
                ))
            })?;
        }
        Ok(())
    }
}
