//! Reference resolver - turns display-name references into canonical paths.

use tracing::debug;

use crate::client::ControlPlaneClient;
use crate::error::{RealizeError, Result};
use crate::resource::ResourcePath;
use crate::urls::{self, DEFAULT_ENFORCEMENTPOINT_ID, DEFAULT_SITE_ID};

/// Site / enforcement point a referenced resource lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub site_id: String,
    pub enforcementpoint_id: String,
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            site_id: DEFAULT_SITE_ID.to_string(),
            enforcementpoint_id: DEFAULT_ENFORCEMENTPOINT_ID.to_string(),
        }
    }
}

impl Scope {
    /// Missing parts fall back to `"default"`.
    pub fn new(site_id: Option<&str>, enforcementpoint_id: Option<&str>) -> Self {
        Self {
            site_id: site_id.unwrap_or(DEFAULT_SITE_ID).to_string(),
            enforcementpoint_id: enforcementpoint_id
                .unwrap_or(DEFAULT_ENFORCEMENTPOINT_ID)
                .to_string(),
        }
    }
}

/// Kinds of resources that can be referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    EdgeCluster,
    /// Edge nodes are listed per edge cluster.
    EdgeNode { edge_cluster_id: String },
}

impl ReferenceKind {
    /// Short tag, e.g. `edge_cluster`.
    pub fn tag(&self) -> &'static str {
        match self {
            ReferenceKind::EdgeCluster => "edge_cluster",
            ReferenceKind::EdgeNode { .. } => "edge_node",
        }
    }

    /// Human-readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceKind::EdgeCluster => "Edge Cluster",
            ReferenceKind::EdgeNode { .. } => "Edge Node",
        }
    }

    /// Collection URL candidates are listed from.
    pub fn base_url(&self, scope: &Scope) -> String {
        match self {
            ReferenceKind::EdgeCluster => {
                urls::edge_cluster_url(&scope.site_id, &scope.enforcementpoint_id)
            }
            ReferenceKind::EdgeNode { edge_cluster_id } => {
                urls::edge_node_url(&scope.site_id, &scope.enforcementpoint_id, edge_cluster_id)
            }
        }
    }
}

/// Canonical id and/or display name of a referenced resource.
/// The id takes precedence when both are given.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reference<'a> {
    pub id: Option<&'a str>,
    pub display_name: Option<&'a str>,
}

impl<'a> Reference<'a> {
    pub fn new(id: Option<&'a str>, display_name: Option<&'a str>) -> Self {
        Self {
            id: id.filter(|s| !s.is_empty()),
            display_name: display_name.filter(|s| !s.is_empty()),
        }
    }
}

/// Resolves references by listing candidates on the control plane.
///
/// Holds no cache: every invocation re-reads the listing.
pub struct ReferenceResolver<'a> {
    client: &'a ControlPlaneClient,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(client: &'a ControlPlaneClient) -> Self {
        Self { client }
    }

    /// Resolve a reference into its full path.
    pub async fn resolve(
        &self,
        kind: &ReferenceKind,
        scope: &Scope,
        reference: &Reference<'_>,
    ) -> Result<ResourcePath> {
        let base_url = kind.base_url(scope);
        let id = self.resolve_id(kind, &base_url, reference).await?;
        Ok(ResourcePath::new(&base_url, &id))
    }

    /// Resolve a reference into its canonical id.
    ///
    /// A given id short-circuits without any network call.
    pub async fn resolve_id(
        &self,
        kind: &ReferenceKind,
        base_url: &str,
        reference: &Reference<'_>,
    ) -> Result<String> {
        if let Some(id) = reference.id {
            return Ok(id.to_string());
        }

        let display_name = reference.display_name.ok_or_else(|| {
            RealizeError::validation(format!(
                "either {tag}_id or {tag}_display_name must be specified",
                tag = kind.tag()
            ))
        })?;

        let candidates = self.client.list(base_url).await?;
        let matches: Vec<&str> = candidates
            .iter()
            .filter(|r| r.display_name() == Some(display_name))
            .filter_map(|r| r.id())
            .collect();

        match matches.as_slice() {
            [] => Err(RealizeError::ReferenceNotFound {
                kind: kind.label().to_string(),
                display_name: display_name.to_string(),
            }),
            [id] => {
                debug!(
                    "Resolved {} '{}' to id {}",
                    kind.label(),
                    display_name,
                    id
                );
                Ok(id.to_string())
            }
            many => Err(RealizeError::AmbiguousReference {
                kind: kind.label().to_string(),
                display_name: display_name.to_string(),
                count: many.len(),
            }),
        }
    }
}
