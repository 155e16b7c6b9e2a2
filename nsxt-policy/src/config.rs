//! Connection and runner configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RealizeError, Result};

/// How the client proves its identity to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    /// Principal-identity client certificate.
    ClientCertificate { cert_path: PathBuf, key_path: PathBuf },
}

/// Bounded exponential backoff for transient failures (5xx, connection errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Realization polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Everything the control-plane client needs to talk to one manager.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub hostname: String,
    pub port: Option<u16>,
    /// `https` in production; tests point at a plain-HTTP fake.
    pub scheme: String,
    pub credentials: Credentials,
    pub ca_path: Option<PathBuf>,
    pub validate_certs: bool,
    pub request_headers: HashMap<String, String>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(hostname: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            hostname: hostname.into(),
            port: None,
            scheme: "https".to_string(),
            credentials,
            ca_path: None,
            validate_certs: false,
            request_headers: HashMap::new(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Root URL of the Policy API, e.g. `https://nsx.local/policy/api/v1`.
    pub fn api_root(&self) -> String {
        let host = match self.port {
            Some(port) => format!("{}:{}", self.hostname, port),
            None => self.hostname.clone(),
        };
        format!("{}://{}{}", self.scheme, host, crate::urls::POLICY_API_ROOT)
    }
}

/// Connection fields of the invocation input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionParams {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_path: Option<PathBuf>,
    pub nsx_cert_path: Option<PathBuf>,
    pub nsx_key_path: Option<PathBuf>,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    #[serde(default)]
    pub validate_certs: bool,
}

impl ConnectionParams {
    /// Validate the credential combination and produce a client config.
    pub fn into_client_config(self) -> Result<ClientConfig> {
        let hostname = self
            .hostname
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RealizeError::validation("hostname is required"))?;

        let credentials = match (self.username, self.password, self.nsx_cert_path, self.nsx_key_path) {
            (Some(_), _, Some(_), _) => {
                return Err(RealizeError::validation(
                    "username and nsx_cert_path are mutually exclusive",
                ));
            }
            (Some(username), Some(password), None, _) => Credentials::Basic { username, password },
            (Some(_), None, None, _) => {
                return Err(RealizeError::validation(
                    "password must be specified if username is specified",
                ));
            }
            (None, _, Some(cert_path), Some(key_path)) => {
                Credentials::ClientCertificate { cert_path, key_path }
            }
            (None, _, Some(_), None) => {
                return Err(RealizeError::validation(
                    "nsx_key_path must be specified if nsx_cert_path is specified",
                ));
            }
            (None, _, None, _) => {
                return Err(RealizeError::validation(
                    "either username/password or nsx_cert_path/nsx_key_path must be specified",
                ));
            }
        };

        let mut config = ClientConfig::new(hostname, credentials);
        config.port = self.port;
        config.ca_path = self.ca_path;
        config.validate_certs = self.validate_certs;
        config.request_headers = self.request_headers;
        Ok(config)
    }
}
