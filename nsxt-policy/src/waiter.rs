//! Realization waiter - polls the control plane until a change is applied.

use serde_json::Value;
use tracing::{debug, info};

use crate::client::ControlPlaneClient;
use crate::config::WaitPolicy;
use crate::error::{RealizeError, Result};
use crate::resource::{RealizationStatus, RemoteResource};
use crate::urls::realization_status_url;

/// Status report read from `{path}/realization-status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: RealizationStatus,
    pub detail: Option<String>,
}

impl StatusReport {
    /// Accepts `{"consolidated_status": {"consolidated_status": S}}`,
    /// `{"consolidated_status": S}` and `{"realization_status": S}`.
    pub fn from_value(body: &Value) -> Self {
        let raw = body
            .get("consolidated_status")
            .map(|c| c.get("consolidated_status").unwrap_or(c))
            .or_else(|| body.get("realization_status"))
            .cloned();
        let status = raw
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or(RealizationStatus::Unknown);
        let detail = body
            .get("status_message")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self { status, detail }
    }
}

/// Read-only poller. Never mutates the control plane.
pub struct RealizationWaiter<'a> {
    client: &'a ControlPlaneClient,
    policy: WaitPolicy,
}

impl<'a> RealizationWaiter<'a> {
    pub fn new(client: &'a ControlPlaneClient, policy: WaitPolicy) -> Self {
        Self { client, policy }
    }

    /// Poll until SUCCESS (returns the freshly read resource), ERROR or
    /// ORPHANED (`RealizationFailed`), or the timeout (`RealizationTimeout`).
    pub async fn wait_until_realized(&self, path: &str) -> Result<RemoteResource> {
        info!("Waiting for realization of {}", path);
        let status_url = realization_status_url(path);

        let poll = async {
            loop {
                let report = match self.client.get_value(&status_url).await? {
                    Some(body) => StatusReport::from_value(&body),
                    None => StatusReport {
                        status: RealizationStatus::Unknown,
                        detail: None,
                    },
                };
                debug!("Realization status of {}: {:?}", path, report.status);

                if report.status == RealizationStatus::Success {
                    return Ok::<(), RealizeError>(());
                }
                if report.status.is_terminal() {
                    return Err(RealizeError::RealizationFailed {
                        path: path.to_string(),
                        detail: report.detail.unwrap_or_else(|| {
                            format!("control plane reported {:?}", report.status)
                        }),
                    });
                }
                tokio::time::sleep(self.policy.poll_interval).await;
            }
        };

        self.bounded(path, poll).await?;

        self.client
            .get(path)
            .await?
            .ok_or_else(|| RealizeError::RealizationFailed {
                path: path.to_string(),
                detail: "resource disappeared after realization".to_string(),
            })
    }

    /// Poll until the resource reads as absent.
    pub async fn wait_until_deleted(&self, path: &str) -> Result<()> {
        info!("Waiting for deletion of {}", path);
        let poll = async {
            while self.client.get(path).await?.is_some() {
                debug!("{} still present", path);
                tokio::time::sleep(self.policy.poll_interval).await;
            }
            Ok::<(), RealizeError>(())
        };
        self.bounded(path, poll).await
    }

    async fn bounded<F>(&self, path: &str, poll: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match tokio::time::timeout(self.policy.timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(RealizeError::RealizationTimeout {
                path: path.to_string(),
                timeout: self.policy.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_report_shapes() {
        let r = StatusReport::from_value(&json!({
            "consolidated_status": {"consolidated_status": "IN_PROGRESS"}
        }));
        assert_eq!(r.status, RealizationStatus::InProgress);

        let r = StatusReport::from_value(&json!({
            "consolidated_status": "ERROR",
            "status_message": "edge cluster has no members"
        }));
        assert_eq!(r.status, RealizationStatus::Error);
        assert_eq!(r.detail.as_deref(), Some("edge cluster has no members"));

        let r = StatusReport::from_value(&json!({"realization_status": "SUCCESS"}));
        assert_eq!(r.status, RealizationStatus::Success);

        let r = StatusReport::from_value(&json!({}));
        assert_eq!(r.status, RealizationStatus::Unknown);
    }
}
