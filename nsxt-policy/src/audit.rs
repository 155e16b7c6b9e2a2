use tracing::info;

/// Change audit for applied actions, emitted on the `audit` tracing target.
pub struct ChangeAudit {
    resource_kind: &'static str,
}

impl ChangeAudit {
    pub fn new(resource_kind: &'static str) -> Self {
        Self { resource_kind }
    }

    pub fn created(&self, id: &str, path: &str) {
        info!(
            target: "audit",
            resource_kind = self.resource_kind,
            id,
            path,
            action = "create",
            "{} created: {}",
            self.resource_kind,
            id
        );
    }

    pub fn updated(&self, id: &str, path: &str, fields: &[String]) {
        info!(
            target: "audit",
            resource_kind = self.resource_kind,
            id,
            path,
            action = "update",
            "{} updated: {} (fields: {})",
            self.resource_kind,
            id,
            fields.join(", ")
        );
    }

    pub fn deleted(&self, id: &str, path: &str) {
        info!(
            target: "audit",
            resource_kind = self.resource_kind,
            id,
            path,
            action = "delete",
            "{} deleted: {}",
            self.resource_kind,
            id
        );
    }
}
