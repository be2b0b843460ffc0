//! In-process mock of the remote enhancement service.
//!
//! Serves the token endpoint, the four media endpoints, and a presigned upload
//! target on `127.0.0.1:0`. Every call is recorded so tests can assert which
//! stages actually reached the network.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Form, Json, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use enhance_batch::app_state::{AppContext, PollPolicy};
use enhance_batch::config::AppConfig;
use enhance_batch::pipeline::JitterBackoff;
use enhance_batch::services::enhance::EnhanceClient;

pub const APP_KEY: &str = "test-key";
pub const APP_SECRET: &str = "test-secret";
pub const TOKEN: &str = "test-token";

/// How the mock service misbehaves, if at all.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Input refs whose registration answers 500.
    pub fail_inputs: HashSet<String>,
    /// Enhance answers 200 without a job id.
    pub empty_job_id: bool,
    /// Time from job submission until progress reaches 100.
    pub job_latency: Duration,
    /// Poll reports the job as `Failed`.
    pub job_fails: bool,
    /// Delay before every status answer.
    pub poll_stall: Duration,
    /// Status returned by the output endpoint instead of the artifact.
    pub output_status: Option<u16>,
}

struct Job {
    input_ref: String,
    output_ref: String,
    submitted: Instant,
}

#[derive(Default)]
struct Recorded {
    calls: Vec<String>,
    token_requests: usize,
    presigned: Vec<String>,
    uploads: HashMap<String, Vec<u8>>,
    jobs: HashMap<String, Job>,
}

pub struct MockState {
    base_url: String,
    behavior: MockBehavior,
    recorded: Mutex<Recorded>,
}

pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(MockState {
            base_url: base_url.clone(),
            behavior,
            recorded: Mutex::new(Recorded::default()),
        });

        let app = Router::new()
            .route("/v1/auth/token", post(issue_token))
            .route("/media/input", post(create_input))
            .route("/upload/{slot}", put(receive_upload))
            .route("/media/enhance", post(submit_job).get(job_status))
            .route("/media/output", get(fetch_output))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self { base_url, state }
    }

    pub fn auth_url(&self) -> String {
        format!("{}/v1/auth/token", self.base_url)
    }

    /// Every call seen so far, as `"<operation> <argument>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.recorded.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn token_requests(&self) -> usize {
        self.state.recorded.lock().unwrap().token_requests
    }

    pub fn uploaded(&self, input_ref: &str) -> Option<Vec<u8>> {
        self.state
            .recorded
            .lock()
            .unwrap()
            .uploads
            .get(input_ref)
            .cloned()
    }

    /// Context wired straight to this server, bypassing credential bootstrap.
    pub fn context(&self, output_dir: &FsPath, timeout: Duration) -> AppContext {
        AppContext::new(
            EnhanceClient::new(reqwest::Client::new(), &self.base_url, TOKEN.to_string()),
            output_dir.to_path_buf(),
            "mp3".to_string(),
            "studio".to_string(),
            PollPolicy {
                timeout,
                backoff: JitterBackoff::new(Duration::from_millis(10), Duration::from_millis(30)),
            },
        )
    }

    /// Full configuration pointing at this server.
    pub fn config(&self, source_dir: &FsPath, extra: &[(&str, String)]) -> AppConfig {
        let mut vars: Vec<(String, String)> = vec![
            ("SOURCE_DIR".into(), source_dir.display().to_string()),
            ("ENHANCE_APP_KEY".into(), APP_KEY.into()),
            ("ENHANCE_APP_SECRET".into(), APP_SECRET.into()),
            ("ENHANCE_API_URL".into(), self.base_url.clone()),
            ("ENHANCE_AUTH_URL".into(), self.auth_url()),
            ("POLL_TIMEOUT_SECS".into(), "10".into()),
            ("POLL_MIN_DELAY_MS".into(), "10".into()),
            ("POLL_MAX_DELAY_MS".into(), "30".into()),
            ("REQUEST_TIMEOUT_SECS".into(), "10".into()),
        ];
        vars.retain(|(k, _)| !extra.iter().any(|(e, _)| e == k));
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));
        AppConfig::from_vars(vars).expect("test config")
    }
}

fn record_call(state: &MockState, call: String) {
    state.recorded.lock().unwrap().calls.push(call);
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TOKEN}"))
        .unwrap_or(false)
}

fn basic_credentials_ok(headers: &HeaderMap) -> bool {
    // base64("test-key:test-secret")
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Basic dGVzdC1rZXk6dGVzdC1zZWNyZXQ=")
        .unwrap_or(false)
}

async fn issue_token(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.recorded.lock().unwrap().token_requests += 1;
    record_call(&state, "token".to_string());

    if !basic_credentials_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if form.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({ "access_token": TOKEN, "expires_in": 1800 })).into_response()
}

#[derive(Deserialize)]
struct UrlBody {
    url: String,
}

async fn create_input(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<UrlBody>,
) -> Response {
    record_call(&state, format!("input {}", body.url));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.behavior.fail_inputs.contains(&body.url) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut recorded = state.recorded.lock().unwrap();
    recorded.presigned.push(body.url);
    let slot = recorded.presigned.len() - 1;
    Json(json!({ "url": format!("{}/upload/{slot}", state.base_url) })).into_response()
}

async fn receive_upload(
    State(state): State<Arc<MockState>>,
    Path(slot): Path<usize>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    record_call(&state, format!("upload {slot}"));

    // Presigned targets reject chunked bodies.
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared != Some(body.len()) {
        return StatusCode::LENGTH_REQUIRED.into_response();
    }

    let mut recorded = state.recorded.lock().unwrap();
    let Some(input_ref) = recorded.presigned.get(slot).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    recorded.uploads.insert(input_ref, body.to_vec());
    StatusCode::OK.into_response()
}

#[derive(Deserialize)]
struct EnhanceBody {
    input: String,
    output: String,
    content: EnhanceContentBody,
}

#[derive(Deserialize)]
struct EnhanceContentBody {
    #[serde(rename = "type")]
    kind: String,
}

async fn submit_job(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<EnhanceBody>,
) -> Response {
    record_call(
        &state,
        format!("enhance {} -> {} ({})", body.input, body.output, body.content.kind),
    );
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.behavior.empty_job_id {
        return Json(json!({})).into_response();
    }

    let mut recorded = state.recorded.lock().unwrap();
    if !recorded.uploads.contains_key(&body.input) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let job_id = format!("job-{}", recorded.jobs.len() + 1);
    recorded.jobs.insert(
        job_id.clone(),
        Job {
            input_ref: body.input,
            output_ref: body.output,
            submitted: Instant::now(),
        },
    );
    Json(json!({ "job_id": job_id })).into_response()
}

fn progress_of(job: &Job, latency: Duration) -> u32 {
    if latency.is_zero() {
        return 100;
    }
    let ratio = job.submitted.elapsed().as_secs_f64() / latency.as_secs_f64();
    (ratio * 100.0).min(100.0) as u32
}

async fn job_status(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let job_id = query.get("job_id").cloned().unwrap_or_default();
    record_call(&state, format!("poll {job_id}"));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !state.behavior.poll_stall.is_zero() {
        tokio::time::sleep(state.behavior.poll_stall).await;
    }

    let recorded = state.recorded.lock().unwrap();
    let Some(job) = recorded.jobs.get(&job_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if state.behavior.job_fails {
        return Json(json!({ "path": "/media/enhance", "status": "Failed", "progress": 40 }))
            .into_response();
    }

    let progress = progress_of(job, state.behavior.job_latency);
    let status = if progress >= 100 { "Success" } else { "Running" };
    Json(json!({ "path": "/media/enhance", "status": status, "progress": progress }))
        .into_response()
}

async fn fetch_output(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let output_ref = query.get("url").cloned().unwrap_or_default();
    record_call(&state, format!("output {output_ref}"));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(code) = state.behavior.output_status {
        return StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }

    let recorded = state.recorded.lock().unwrap();
    let Some(job) = recorded.jobs.values().find(|j| j.output_ref == output_ref) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if progress_of(job, state.behavior.job_latency) < 100 {
        return StatusCode::CONFLICT.into_response();
    }

    let mut artifact = b"enhanced:".to_vec();
    artifact.extend(recorded.uploads.get(&job.input_ref).cloned().unwrap_or_default());
    artifact.into_response()
}

/// Scratch source and output directories.
pub struct Workspace {
    pub root: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// Default output location (`<source>/out`).
    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    pub fn add_source(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.path().join(name);
        std::fs::write(&path, contents).expect("write source file");
        path
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir().join("status.csv")
    }

    /// Status log rows, header included.
    pub fn log_rows(&self) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(self.log_path())
            .expect("open status log");
        reader
            .records()
            .map(|r| r.expect("log row").iter().map(str::to_string).collect())
            .collect()
    }
}
