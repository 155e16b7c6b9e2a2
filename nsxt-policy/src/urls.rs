//! Policy API URL templates.
//!
//! All paths are relative to the Policy API root (`/policy/api/v1`).

pub const POLICY_API_ROOT: &str = "/policy/api/v1";

pub const DHCP_RELAY_CONFIG_URL: &str = "/infra/dhcp-relay-configs";
pub const DHCP_SERVER_CONFIG_URL: &str = "/infra/dhcp-server-configs";

/// Suffix appended to a resource path to read its realization status.
pub const REALIZATION_STATUS_SUFFIX: &str = "/realization-status";

pub const DEFAULT_SITE_ID: &str = "default";
pub const DEFAULT_ENFORCEMENTPOINT_ID: &str = "default";

/// Edge clusters of an enforcement point.
pub fn edge_cluster_url(site_id: &str, enforcementpoint_id: &str) -> String {
    format!(
        "/infra/sites/{}/enforcement-points/{}/edge-clusters",
        site_id, enforcementpoint_id
    )
}

/// Edge nodes of an edge cluster.
pub fn edge_node_url(site_id: &str, enforcementpoint_id: &str, edge_cluster_id: &str) -> String {
    format!(
        "{}/{}/edge-nodes",
        edge_cluster_url(site_id, enforcementpoint_id),
        edge_cluster_id
    )
}

pub fn realization_status_url(resource_path: &str) -> String {
    format!("{}{}", resource_path, REALIZATION_STATUS_SUFFIX)
}
