//! DHCP server config with edge-cluster / edge-node placement.
//!
//! `edge_cluster_info` is resolved into `edge_cluster_path`, and each entry
//! of `preferred_edge_nodes_info` into an element of `preferred_edge_paths`.
//! The order of preferred edge nodes is significant (first is active, second
//! standby) and is kept as given.

use async_trait::async_trait;
use ipnet::IpNet;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ResourceKind;
use crate::error::{RealizeError, Result};
use crate::resolver::{Reference, ReferenceKind, ReferenceResolver, Scope};
use crate::schema::{Constraint, FieldDefault, FieldSpec, FieldType};
use crate::urls::DHCP_SERVER_CONFIG_URL;

pub const DEFAULT_LEASE_TIME: i64 = 86400;
pub const MIN_LEASE_TIME: i64 = 60;
pub const MAX_LEASE_TIME: i64 = 4294967295;

const MAX_IPV4_PREFIX: u8 = 30;
const MAX_IPV6_PREFIX: u8 = 126;

static FIELDS: &[FieldSpec] = &[
    FieldSpec::new("edge_cluster_info", FieldType::Object),
    FieldSpec::new("lease_time", FieldType::Int)
        .default(FieldDefault::Int(DEFAULT_LEASE_TIME))
        .constraint(Constraint::IntRange {
            min: MIN_LEASE_TIME,
            max: MAX_LEASE_TIME,
        }),
    FieldSpec::new("preferred_edge_nodes_info", FieldType::ObjectList),
    FieldSpec::new("server_addresses", FieldType::StrList).constraint(Constraint::MaxItems(2)),
];

/// Edge cluster the DHCP server is allocated to.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeClusterInfo {
    site_id: Option<String>,
    enforcementpoint_id: Option<String>,
    edge_cluster_id: Option<String>,
    edge_cluster_display_name: Option<String>,
}

impl EdgeClusterInfo {
    fn scope(&self) -> Scope {
        Scope::new(self.site_id.as_deref(), self.enforcementpoint_id.as_deref())
    }

    fn reference(&self) -> Reference<'_> {
        Reference::new(
            self.edge_cluster_id.as_deref(),
            self.edge_cluster_display_name.as_deref(),
        )
    }
}

/// One preferred edge node, located by its cluster and its own id or name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeNodeInfo {
    site_id: Option<String>,
    enforcementpoint_id: Option<String>,
    edge_cluster_id: Option<String>,
    edge_cluster_display_name: Option<String>,
    edge_node_id: Option<String>,
    edge_node_display_name: Option<String>,
}

impl EdgeNodeInfo {
    fn scope(&self) -> Scope {
        Scope::new(self.site_id.as_deref(), self.enforcementpoint_id.as_deref())
    }

    fn cluster_reference(&self) -> Reference<'_> {
        Reference::new(
            self.edge_cluster_id.as_deref(),
            self.edge_cluster_display_name.as_deref(),
        )
    }

    fn node_reference(&self) -> Reference<'_> {
        Reference::new(
            self.edge_node_id.as_deref(),
            self.edge_node_display_name.as_deref(),
        )
    }
}

fn parse_edge_cluster_info(value: &Value) -> Result<EdgeClusterInfo> {
    let info: EdgeClusterInfo = serde_json::from_value(value.clone())
        .map_err(|e| RealizeError::validation(format!("edge_cluster_info: {}", e)))?;
    let r = info.reference();
    if r.id.is_none() && r.display_name.is_none() {
        return Err(RealizeError::validation(
            "edge_cluster_info: either edge_cluster_id or edge_cluster_display_name must be specified",
        ));
    }
    Ok(info)
}

fn parse_edge_nodes_info(value: &Value) -> Result<Vec<EdgeNodeInfo>> {
    let nodes: Vec<EdgeNodeInfo> = serde_json::from_value(value.clone())
        .map_err(|e| RealizeError::validation(format!("preferred_edge_nodes_info: {}", e)))?;
    for (i, node) in nodes.iter().enumerate() {
        let c = node.cluster_reference();
        if c.id.is_none() && c.display_name.is_none() {
            return Err(RealizeError::validation(format!(
                "preferred_edge_nodes_info[{}]: either edge_cluster_id or edge_cluster_display_name must be specified",
                i
            )));
        }
        let n = node.node_reference();
        if n.id.is_none() && n.display_name.is_none() {
            return Err(RealizeError::validation(format!(
                "preferred_edge_nodes_info[{}]: either edge_node_id or edge_node_display_name must be specified",
                i
            )));
        }
    }
    Ok(nodes)
}

fn check_server_address(addr: &str) -> Result<()> {
    let net: IpNet = addr.parse().map_err(|_| {
        RealizeError::validation(format!(
            "server_addresses: '{}' is not in CIDR format",
            addr
        ))
    })?;
    let max = match net {
        IpNet::V4(_) => MAX_IPV4_PREFIX,
        IpNet::V6(_) => MAX_IPV6_PREFIX,
    };
    if net.prefix_len() > max {
        return Err(RealizeError::validation(format!(
            "server_addresses: prefix length of '{}' must be at most {}",
            addr, max
        )));
    }
    Ok(())
}

/// DHCP server configuration.
pub struct DhcpServerConfig;

#[async_trait]
impl ResourceKind for DhcpServerConfig {
    fn output_key(&self) -> &'static str {
        "dhcp_server_config"
    }

    fn resource_type(&self) -> &'static str {
        "DhcpServerConfig"
    }

    fn spec_fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn base_url(&self) -> &'static str {
        DHCP_SERVER_CONFIG_URL
    }

    fn validate(&self, fields: &Map<String, Value>) -> Result<()> {
        if let Some(addresses) = fields.get("server_addresses").and_then(Value::as_array) {
            for addr in addresses.iter().filter_map(Value::as_str) {
                check_server_address(addr)?;
            }
        }
        if let Some(info) = fields.get("edge_cluster_info") {
            parse_edge_cluster_info(info)?;
        }
        if let Some(nodes) = fields.get("preferred_edge_nodes_info") {
            parse_edge_nodes_info(nodes)?;
        }
        Ok(())
    }

    async fn transform(
        &self,
        fields: &mut Map<String, Value>,
        resolver: &ReferenceResolver<'_>,
    ) -> Result<()> {
        if let Some(raw) = fields.remove("edge_cluster_info") {
            let info = parse_edge_cluster_info(&raw)?;
            let path = resolver
                .resolve(&ReferenceKind::EdgeCluster, &info.scope(), &info.reference())
                .await?;
            fields.insert("edge_cluster_path".to_string(), Value::from(path.into_string()));
        }

        if let Some(raw) = fields.remove("preferred_edge_nodes_info") {
            let nodes = parse_edge_nodes_info(&raw)?;
            let mut paths = Vec::with_capacity(nodes.len());
            for node in &nodes {
                let scope = node.scope();
                let cluster_kind = ReferenceKind::EdgeCluster;
                let edge_cluster_id = resolver
                    .resolve_id(
                        &cluster_kind,
                        &cluster_kind.base_url(&scope),
                        &node.cluster_reference(),
                    )
                    .await?;
                let path = resolver
                    .resolve(
                        &ReferenceKind::EdgeNode { edge_cluster_id },
                        &scope,
                        &node.node_reference(),
                    )
                    .await?;
                paths.push(Value::from(path.into_string()));
            }
            fields.insert("preferred_edge_paths".to_string(), Value::Array(paths));
        }

        Ok(())
    }
}
