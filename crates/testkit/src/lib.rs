//! In-process stand-ins for the GitHub REST API and the Arc write endpoint.
//!
//! Both servers bind an ephemeral port on 127.0.0.1, record every request
//! they see and stop when dropped.

pub mod fixtures;

use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use flate2::read::GzDecoder;
use serde_json::Value;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Request body, already gunzipped when it arrived gzip-encoded.
    pub body: Vec<u8>,
}

impl RecordedRequest {
    fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Self {
        let headers: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let gzipped = headers
            .iter()
            .any(|(k, v)| k == "content-encoding" && v.eq_ignore_ascii_case("gzip"));
        let body = if gzipped {
            gunzip(body).unwrap_or_else(|_| body.to_vec())
        } else {
            body.to_vec()
        };
        Self {
            method: method.as_str().to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn gunzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(body).read_to_end(&mut out)?;
    Ok(out)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Server {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Server {
    async fn spawn(app: Router) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, task })
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
struct GitHubState {
    repos: Mutex<HashMap<String, (Value, Value)>>,
    fail_status: Mutex<Option<u16>>,
    issues_status: Mutex<HashMap<String, u16>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Serves `/repos/{owner}/{name}` and `/repos/{owner}/{name}/issues` for
/// registered repositories and 404 for everything else.
pub struct MockGitHub {
    state: Arc<GitHubState>,
    server: Server,
}

impl MockGitHub {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(GitHubState::default());
        let app = Router::new()
            .fallback(github_handler)
            .with_state(state.clone());
        let server = Server::spawn(app).await?;
        Ok(Self { state, server })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.server.addr)
    }

    pub fn add_repo(&self, full_name: &str, repo: Value, issues: Value) {
        lock(&self.state.repos).insert(full_name.to_string(), (repo, issues));
    }

    /// Every later request is answered with `status` and an error body.
    pub fn fail_with(&self, status: u16) {
        *lock(&self.state.fail_status) = Some(status);
    }

    /// Answers the issue listing of `full_name` with `status`, the way GitHub
    /// answers 410 when a repository has issues disabled.
    pub fn fail_issues_with(&self, full_name: &str, status: u16) {
        lock(&self.state.issues_status).insert(full_name.to_string(), status);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state.requests).len()
    }
}

async fn github_handler(
    State(state): State<Arc<GitHubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    lock(&state.requests).push(RecordedRequest::capture(&method, &uri, &headers, &body));

    if let Some(status) = *lock(&state.fail_status) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, axum::Json(serde_json::json!({ "message": "mock failure" })))
            .into_response();
    }

    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();
    if let ["repos", owner, name, "issues"] = segments.as_slice()
        && let Some(status) = lock(&state.issues_status).get(&format!("{owner}/{name}")).copied()
    {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            axum::Json(serde_json::json!({ "message": "Issues are disabled for this repo" })),
        )
            .into_response();
    }

    let repos = lock(&state.repos);
    let found = match segments.as_slice() {
        ["repos", owner, name] => repos
            .get(&format!("{owner}/{name}"))
            .map(|(repo, _)| repo.clone()),
        ["repos", owner, name, "issues"] => repos
            .get(&format!("{owner}/{name}"))
            .map(|(_, issues)| issues.clone()),
        _ => None,
    };

    match found {
        Some(body) => axum::Json(body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "message": "Not Found" })),
        )
            .into_response(),
    }
}

struct ArcState {
    status: Mutex<u16>,
    writes: Mutex<Vec<RecordedRequest>>,
}

/// Accepts `POST /write/v2/msgpack` and keeps the decompressed bodies.
pub struct MockArc {
    state: Arc<ArcState>,
    server: Server,
}

impl MockArc {
    pub const WRITE_PATH: &'static str = "/write/v2/msgpack";

    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(ArcState {
            status: Mutex::new(204),
            writes: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route(Self::WRITE_PATH, post(arc_write))
            .with_state(state.clone());
        let server = Server::spawn(app).await?;
        Ok(Self { state, server })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.server.addr)
    }

    pub fn respond_with(&self, status: u16) {
        *lock(&self.state.status) = status;
    }

    pub fn writes(&self) -> Vec<RecordedRequest> {
        lock(&self.state.writes).clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.state.writes).len()
    }
}

async fn arc_write(
    State(state): State<Arc<ArcState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    lock(&state.writes).push(RecordedRequest::capture(&method, &uri, &headers, &body));
    let status = *lock(&state.status);
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
