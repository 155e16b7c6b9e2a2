//! Control-plane client: authenticated verbs against the Policy API.
//!
//! Response interpretation:
//! - 401/403 → [`RealizeError::Auth`], never retried
//! - 404 on GET → absent; 404 on DELETE → already gone
//! - 409 on writes → [`RealizeError::ConcurrencyConflict`], never retried
//! - 5xx and connection failures → retried per [`RetryPolicy`], then
//!   [`RealizeError::Transport`]

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, Credentials, RetryPolicy};
use crate::error::{RealizeError, Result};
use crate::resource::RemoteResource;

/// Authenticated HTTP client for one Policy API endpoint.
///
/// Owns its connection pool; dropping the client releases it.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    api_root: String,
    credentials: Credentials,
    retry: RetryPolicy,
}

impl ControlPlaneClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(!config.validate_certs);

        if let Some(ca_path) = &config.ca_path {
            let pem = std::fs::read(ca_path).map_err(|e| {
                RealizeError::validation(format!("cannot read ca_path {}: {}", ca_path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| RealizeError::validation(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        if let Credentials::ClientCertificate { cert_path, key_path } = &config.credentials {
            let mut pem = std::fs::read(cert_path).map_err(|e| {
                RealizeError::validation(format!(
                    "cannot read nsx_cert_path {}: {}",
                    cert_path.display(),
                    e
                ))
            })?;
            let key = std::fs::read(key_path).map_err(|e| {
                RealizeError::validation(format!(
                    "cannot read nsx_key_path {}: {}",
                    key_path.display(),
                    e
                ))
            })?;
            pem.push(b'\n');
            pem.extend_from_slice(&key);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| RealizeError::validation(format!("invalid client certificate: {}", e)))?;
            builder = builder.identity(identity);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &config.request_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RealizeError::validation(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RealizeError::validation(format!("invalid header value: {}", e)))?;
            headers.insert(name, value);
        }
        builder = builder.default_headers(headers);

        let http = builder
            .build()
            .map_err(|e| RealizeError::validation(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_root: config.api_root(),
            credentials: config.credentials,
            retry: config.retry,
        })
    }

    /// Fetch a resource. `None` when the control plane answers 404.
    pub async fn get(&self, path: &str) -> Result<Option<RemoteResource>> {
        Ok(self.get_value(path).await?.map(RemoteResource::from_value))
    }

    /// Fetch an arbitrary JSON document. `None` on 404.
    pub async fn get_value(&self, path: &str) -> Result<Option<Value>> {
        let (status, body) = self.request(Method::GET, path, &[], None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(status, &body, path)?;
        Ok(Some(body))
    }

    /// List every resource under a collection URL, following `cursor`
    /// continuation tokens until the listing is exhausted.
    pub async fn list(&self, path: &str) -> Result<Vec<RemoteResource>> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match &cursor {
                Some(c) => vec![("cursor", c.as_str())],
                None => vec![],
            };
            let (status, body) = self.request(Method::GET, path, &query, None).await?;
            if status == StatusCode::NOT_FOUND {
                return Ok(results);
            }
            check_status(status, &body, path)?;

            if let Some(page) = body.get("results").and_then(Value::as_array) {
                results.extend(page.iter().cloned().map(RemoteResource::from_value));
            }

            match body.get("cursor").and_then(Value::as_str) {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next) => {
                    cursor = Some(next.to_string());
                }
                _ => break,
            }
        }

        debug!("Listed {} resources at {}", results.len(), path);
        Ok(results)
    }

    /// Create or replace a resource.
    pub async fn put(&self, path: &str, body: &Value) -> Result<RemoteResource> {
        let (status, response) = self.request(Method::PUT, path, &[], Some(body)).await?;
        check_status(status, &response, path)?;
        Ok(RemoteResource::from_value(response))
    }

    /// Merge fields into a resource. The control plane may answer with an
    /// empty body.
    pub async fn patch(&self, path: &str, body: &Value) -> Result<RemoteResource> {
        let (status, response) = self.request(Method::PATCH, path, &[], Some(body)).await?;
        check_status(status, &response, path)?;
        Ok(RemoteResource::from_value(response))
    }

    /// Delete a resource. A 404 counts as success.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let (status, body) = self.request(Method::DELETE, path, &[], None).await?;
        if status == StatusCode::NOT_FOUND {
            debug!("{} already absent", path);
            return Ok(());
        }
        check_status(status, &body, path)
    }

    /// Send one request, retrying transient failures.
    ///
    /// Returns the status and JSON body (or `Null` for an empty body) of the
    /// first non-5xx response.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let url = format!("{}{}", self.api_root, path);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!("{} {} (attempt {})", method, url, attempt);

            let mut req = self.http.request(method.clone(), &url);
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Credentials::Basic { username, password } = &self.credentials {
                req = req.basic_auth(username, Some(password));
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            let failure = match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    match resp.text().await {
                        Ok(text) => {
                            let value = parse_body(&text);
                            if !status.is_server_error() {
                                return Ok((status, value));
                            }
                            format!("HTTP {}: {}", status.as_u16(), error_message(&value, status))
                        }
                        Err(e) => format!("failed to read response body: {}", e),
                    }
                }
                Err(e) => format!("request failed: {}", e),
            };

            if attempt >= self.retry.max_attempts.max(1) {
                return Err(RealizeError::Transport {
                    attempts: attempt,
                    message: format!("{} {}: {}", method, path, failure),
                });
            }

            let delay = self.retry.backoff(attempt);
            warn!(
                "{} {} failed ({}), retrying in {:?} ({}/{})",
                method, path, failure, delay, attempt, self.retry.max_attempts
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Best-effort human-readable message from a Policy API error body.
fn error_message(body: &Value, status: StatusCode) -> String {
    match body {
        Value::Object(map) => map
            .get("error_message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
    }
}

/// Map a non-5xx status onto the error taxonomy.
fn check_status(status: StatusCode, body: &Value, path: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let message = error_message(body, status);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RealizeError::Auth {
            status: status.as_u16(),
            message,
        },
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            RealizeError::ConcurrencyConflict {
                path: path.to_string(),
                message,
            }
        }
        _ => RealizeError::Api {
            status: status.as_u16(),
            message,
        },
    })
}
