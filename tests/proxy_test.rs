use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dcr_proxy::config::ProxyConfig;
use dcr_proxy::services::upstream::{UploadFields, UpstreamApi, UpstreamError};
use dcr_proxy::{AppState, create_app};
use flate2::read::GzDecoder;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Default)]
struct MockUpstream {
    json_responses: Mutex<VecDeque<String>>,
    json_calls: Mutex<Vec<(String, Value)>>,
    /// (endpoint, fields, archive bytes captured at call time)
    file_calls: Mutex<Vec<(String, UploadFields, Vec<u8>)>>,
    file_response: Mutex<String>,
}

impl MockUpstream {
    fn with_json_responses(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            json_responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        })
    }

    fn call_count(&self) -> usize {
        self.json_calls.lock().unwrap().len() + self.file_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl UpstreamApi for MockUpstream {
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<String, UpstreamError> {
        self.json_calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), body.clone()));
        Ok(self
            .json_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no response queued"))
    }

    async fn post_file(
        &self,
        endpoint: &str,
        fields: &UploadFields,
        archive: &Path,
    ) -> Result<String, UpstreamError> {
        let bytes = std::fs::read(archive).expect("staged archive must exist at call time");
        self.file_calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), fields.clone(), bytes));
        Ok(self.file_response.lock().unwrap().clone())
    }
}

fn test_state(upstream: Arc<MockUpstream>, workspace: &Path, staging: &Path) -> AppState {
    AppState {
        upstream,
        config: ProxyConfig {
            backend_host: "api.example.com".to_string(),
            user_token: "tok".to_string(),
            workspace_dir: workspace.to_path_buf(),
            staging_dir: staging.to_path_buf(),
            ..Default::default()
        },
    }
}

async fn send(
    state: AppState,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-forwarded-user", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = create_app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_requests_without_identity_are_unauthorized() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let upstream = Arc::new(MockUpstream::default());

    for (method, uri) in [
        ("POST", "/jobs"),
        ("GET", "/jobs"),
        ("POST", "/output"),
        ("GET", "/attestation"),
    ] {
        let state = test_state(upstream.clone(), workspace.path(), staging.path());
        let body = (method == "POST").then(|| json!({}));
        let (status, _) = send(state, method, uri, None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_submit_missing_path_fails_before_any_upstream_call() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let upstream = Arc::new(MockUpstream::default());
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, _) = send(
        state,
        "POST",
        "/jobs",
        Some("alice"),
        Some(json!({ "filename": "analysis.ipynb" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(upstream.call_count(), 0);
    // nothing was staged either
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_submit_packs_workspace_and_relays_upstream_response() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(workspace.path().join("analysis.ipynb"), b"{\"cells\":[]}").unwrap();
    std::fs::write(workspace.path().join(".secret"), b"hidden").unwrap();
    let staging = tempfile::tempdir().unwrap();

    let upstream = Arc::new(MockUpstream::default());
    *upstream.file_response.lock().unwrap() = r#"{"code":0,"msg":"job created"}"#.to_string();
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, body) = send(
        state,
        "POST",
        "/jobs",
        Some("alice"),
        Some(json!({
            "filename": "analysis.ipynb",
            "path": "analysis.ipynb",
            "creator": "mallory"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"code":0,"msg":"job created"}"#);

    let file_calls = upstream.file_calls.lock().unwrap();
    assert_eq!(file_calls.len(), 1);
    let (endpoint, fields, archive_bytes) = &file_calls[0];
    assert_eq!(endpoint, "v1/job/submit");
    // the client-sent creator never wins
    assert_eq!(fields.creator, "alice");
    assert_eq!(fields.filename, "analysis.ipynb");

    // the staged archive is a valid tar.gz rooted under {creator}-workspace,
    // with hidden entries excluded
    let mut archive = tar::Archive::new(GzDecoder::new(archive_bytes.as_slice()));
    let paths: Vec<PathBuf> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().into_owned())
        .collect();
    assert!(paths.contains(&PathBuf::from("alice-workspace/analysis.ipynb")));
    assert!(!paths.iter().any(|p| p.to_string_lossy().contains(".secret")));

    // staged archive removed after the upload
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_list_jobs_uses_default_paging() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let upstream = MockUpstream::with_json_responses(&[r#"{"code":0,"jobs":[]}"#]);
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, body) = send(state, "GET", "/jobs", Some("alice"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"code":0,"jobs":[]}"#);

    let json_calls = upstream.json_calls.lock().unwrap();
    assert_eq!(json_calls.len(), 1);
    let (endpoint, request) = &json_calls[0];
    assert_eq!(endpoint, "v1/job/query");
    assert_eq!(
        request,
        &json!({ "page": 1, "page_size": 10, "creator": "alice" })
    );
}

#[tokio::test]
async fn test_list_jobs_rejects_zero_page() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let upstream = Arc::new(MockUpstream::default());
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, _) = send(state, "GET", "/jobs?page=0", Some("alice"), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_output_attrs_rejection_is_relayed_verbatim_without_files() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let attrs = r#"{"code":1,"msg":"job still running"}"#;
    let upstream = MockUpstream::with_json_responses(&[attrs]);
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, body) = send(state, "POST", "/output", Some("alice"), Some(json!({ "id": 42 }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, attrs);
    assert_eq!(std::fs::read_dir(workspace.path()).unwrap().count(), 0);

    // the attrs request carried the injected creator
    let json_calls = upstream.json_calls.lock().unwrap();
    assert_eq!(json_calls.len(), 1);
    assert_eq!(json_calls[0].1["creator"], json!("alice"));
}

#[tokio::test]
async fn test_output_download_writes_file_and_returns_success_envelope() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let attrs = json!({ "code": 0, "filename": "result.csv", "size": 5 }).to_string();
    let chunk = json!({ "code": 0, "content": BASE64.encode(b"a,b\n1") }).to_string();
    let upstream = MockUpstream::with_json_responses(&[attrs.as_str(), chunk.as_str()]);
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, body) = send(state, "POST", "/output", Some("alice"), Some(json!({ "id": 42 }))).await;

    assert_eq!(status, StatusCode::OK);
    let envelope: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        envelope,
        json!({ "code": 0, "msg": "Success", "filename": "result.csv" })
    );
    assert_eq!(
        std::fs::read(workspace.path().join("result.csv")).unwrap(),
        b"a,b\n1"
    );
}

#[tokio::test]
async fn test_output_chunk_error_relays_body_and_keeps_partial_file() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let attrs = json!({ "code": 0, "filename": "big.bin", "size": 8 }).to_string();
    let first = json!({ "code": 0, "content": BASE64.encode(b"1234") }).to_string();
    let error = r#"{"code":7,"msg":"storage failure"}"#;
    let upstream = MockUpstream::with_json_responses(&[attrs.as_str(), first.as_str(), error]);
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, body) = send(state, "POST", "/output", Some("alice"), Some(json!({ "id": 42 }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, error);
    // attrs + 2 chunk calls, then the loop stopped
    assert_eq!(upstream.call_count(), 3);
    assert_eq!(
        std::fs::read(workspace.path().join("big.bin")).unwrap(),
        b"1234"
    );
}

#[tokio::test]
async fn test_stalled_download_is_a_server_error() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let attrs = json!({ "code": 0, "filename": "stuck.bin", "size": 10 }).to_string();
    let empty = json!({ "code": 0, "content": "" }).to_string();
    let upstream =
        MockUpstream::with_json_responses(&[attrs.as_str(), empty.as_str(), empty.as_str(), empty.as_str()]);
    let state = test_state(upstream.clone(), workspace.path(), staging.path());

    let (status, _) = send(state, "POST", "/output", Some("alice"), Some(json!({ "id": 42 }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_attestation_defaults_and_explicit_id() {
    let workspace = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let upstream =
        MockUpstream::with_json_responses(&[r#"{"code":0,"report":"r1"}"#, r#"{"code":0,"report":"r7"}"#]);

    let state = test_state(upstream.clone(), workspace.path(), staging.path());
    let (status, body) = send(state, "GET", "/attestation", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"code":0,"report":"r1"}"#);

    let state = test_state(upstream.clone(), workspace.path(), staging.path());
    let (status, _) = send(state, "GET", "/attestation?id=7", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);

    let json_calls = upstream.json_calls.lock().unwrap();
    assert_eq!(json_calls[0].0, "v1/job/attestation/");
    assert_eq!(json_calls[0].1, json!({ "id": 1, "creator": "alice" }));
    assert_eq!(json_calls[1].1, json!({ "id": 7, "creator": "alice" }));
}
