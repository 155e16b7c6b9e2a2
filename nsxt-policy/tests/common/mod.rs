//! Shared test utilities: an in-process fake of the NSX Policy API.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use nsxt_policy::{
    ClientConfig, ControlPlaneClient, Credentials, RetryPolicy, RunnerSettings, WaitPolicy,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const STATUS_SUFFIX: &str = "/realization-status";

/// One request as seen by the fake.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// A scripted failure answered instead of the normal response.
#[derive(Debug, Clone)]
struct Injected {
    method: Option<Method>,
    status: u16,
    remaining: usize,
}

/// Mutable state of the fake control plane.
#[derive(Debug, Default)]
pub struct FakeState {
    /// Resources by path (relative to the API root).
    pub resources: HashMap<String, Value>,
    /// Listing contents by collection path.
    pub listings: HashMap<String, Vec<Value>>,
    /// Page size for listings; `None` returns everything at once.
    pub page_size: Option<usize>,
    /// Realization status sequence per resource path; the last one sticks.
    pub realization: HashMap<String, VecDeque<Value>>,
    pub requests: Vec<RecordedRequest>,
    injected: Vec<Injected>,
}

/// Fake Policy API served on a random local port.
pub struct FakeNsx {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<FakeState>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl FakeNsx {
    /// Spawn the fake on 127.0.0.1 with an OS-assigned port.
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(FakeState::default()));

        let router = Router::new()
            .route("/policy/api/v1/{*path}", any(handle))
            .with_state(state.clone());

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
        let actual_addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr: actual_addr,
            state,
            shutdown_tx,
        }
    }

    /// Invocation input pointing at this fake, merged with `fields`.
    pub fn params(&self, fields: Value) -> Value {
        let mut params = json!({
            "hostname": "127.0.0.1",
            "port": self.addr.port(),
            "username": "admin",
            "password": "secret",
            "validate_certs": false,
        });
        if let (Some(base), Some(extra)) = (params.as_object_mut(), fields.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        params
    }

    /// Client for direct use of the collaborators.
    pub fn client(&self) -> ControlPlaneClient {
        let mut config = ClientConfig::new(
            "127.0.0.1",
            Credentials::Basic {
                username: "admin".to_string(),
                password: "secret".to_string(),
            },
        );
        config.port = Some(self.addr.port());
        config.scheme = "http".to_string();
        config.retry = fast_retry();
        ControlPlaneClient::new(config).expect("Failed to build client")
    }

    pub fn insert_resource(&self, path: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .resources
            .insert(path.to_string(), body);
    }

    pub fn resource(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().resources.get(path).cloned()
    }

    /// Stored resource paths under `prefix`, sorted.
    pub fn resource_paths(&self, prefix: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .resources
            .keys()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Add an entry to a listing.
    pub fn add_listed(&self, collection: &str, id: &str, display_name: &str) {
        self.state
            .lock()
            .unwrap()
            .listings
            .entry(collection.to_string())
            .or_default()
            .push(json!({"id": id, "display_name": display_name}));
    }

    pub fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    /// Script realization statuses for a resource path.
    pub fn script_realization(&self, path: &str, statuses: &[Value]) {
        self.state
            .lock()
            .unwrap()
            .realization
            .insert(path.to_string(), statuses.iter().cloned().collect());
    }

    /// Answer the next `times` requests (of `method`, or any) with `status`.
    pub fn fail_next(&self, method: Option<Method>, status: u16, times: usize) {
        self.state.lock().unwrap().injected.push(Injected {
            method,
            status,
            remaining: times,
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of requests with `method` whose path starts with `prefix`.
    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .count()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Millisecond-scale retry policy so retry tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    }
}

pub fn fast_wait() -> WaitPolicy {
    WaitPolicy {
        poll_interval: Duration::from_millis(20),
        timeout: Duration::from_millis(300),
    }
}

pub fn settings() -> RunnerSettings {
    RunnerSettings {
        retry: fast_retry(),
        wait: fast_wait(),
        invocation_timeout: None,
        scheme: "http".to_string(),
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"error_code": status.as_u16(), "error_message": message})),
    )
        .into_response()
}

async fn handle(
    State(state): State<Arc<Mutex<FakeState>>>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = format!("/{}", path.trim_end_matches('/'));
    let body: Option<Value> = serde_json::from_slice(&body).ok();

    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        headers: headers.clone(),
        body: body.clone(),
    });

    if let Some(injected) = state
        .injected
        .iter_mut()
        .find(|i| i.remaining > 0 && i.method.as_ref().is_none_or(|m| *m == method))
    {
        injected.remaining -= 1;
        let status = StatusCode::from_u16(injected.status).unwrap();
        return error(status, "injected failure");
    }

    if method == Method::GET {
        if let Some(resource_path) = path.strip_suffix(STATUS_SUFFIX) {
            return realization_status(&mut state, resource_path);
        }
        if let Some(resource) = state.resources.get(&path) {
            return Json(resource.clone()).into_response();
        }
        if let Some(items) = state.listings.get(&path) {
            let start: usize = query
                .get("cursor")
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            let size = state.page_size.unwrap_or(items.len().max(1));
            let page: Vec<Value> = items.iter().skip(start).take(size).cloned().collect();
            let mut listing = json!({"results": page, "result_count": items.len()});
            if start + size < items.len() {
                listing["cursor"] = json!((start + size).to_string());
            }
            return Json(listing).into_response();
        }
        return error(StatusCode::NOT_FOUND, "not found");
    }

    if method == Method::PUT {
        let Some(Value::Object(mut incoming)) = body else {
            return error(StatusCode::BAD_REQUEST, "body must be an object");
        };
        let next_revision = match state.resources.get(&path) {
            Some(existing) => {
                let current = existing.get("_revision").cloned().unwrap_or(json!(0));
                if incoming.get("_revision") != Some(&current) {
                    return error(StatusCode::CONFLICT, "revision mismatch");
                }
                current.as_u64().unwrap_or(0) + 1
            }
            None => 0,
        };
        incoming.insert("_revision".to_string(), json!(next_revision));
        incoming.insert("path".to_string(), json!(path));
        let stored = Value::Object(incoming);
        state.resources.insert(path, stored.clone());
        return Json(stored).into_response();
    }

    if method == Method::PATCH {
        let Some(Value::Object(incoming)) = body else {
            return error(StatusCode::BAD_REQUEST, "body must be an object");
        };
        let entry = state
            .resources
            .entry(path.clone())
            .or_insert_with(|| json!({"_revision": 0, "path": path}));
        if let Some(existing) = entry.as_object_mut() {
            for (k, v) in incoming {
                existing.insert(k, v);
            }
        }
        return StatusCode::OK.into_response();
    }

    if method == Method::DELETE {
        state.resources.remove(&path);
        return StatusCode::OK.into_response();
    }

    error(StatusCode::METHOD_NOT_ALLOWED, "unsupported method")
}

fn realization_status(state: &mut FakeState, resource_path: &str) -> Response {
    let scripted = state.realization.get_mut(resource_path).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });
    let report = match scripted {
        Some(report) if report.is_string() => {
            json!({"consolidated_status": {"consolidated_status": report}})
        }
        Some(report) => report,
        None if state.resources.contains_key(resource_path) => {
            json!({"consolidated_status": {"consolidated_status": "SUCCESS"}})
        }
        None => return error(StatusCode::NOT_FOUND, "not found"),
    };
    Json(report).into_response()
}
