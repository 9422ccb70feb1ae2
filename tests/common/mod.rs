//! Shared harness for router-level tests: in-memory SQLite, temp directories,
//! and a processor that records jobs instead of decoding video.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use pose_server::{
    config::AppConfig,
    db,
    pipeline::{Fourcc, PipelineError, ProcessReport, VideoProcessor},
    routes::routes,
    state::AppState,
};
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "----pose-server-test-boundary";

#[derive(Default)]
pub struct RecordingProcessor {
    pub jobs: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl VideoProcessor for RecordingProcessor {
    fn process(&self, input: &Path, output: &Path) -> Result<ProcessReport, PipelineError> {
        self.jobs
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf()));
        Ok(ProcessReport {
            frames: 0,
            codec: Fourcc::MP4V,
        })
    }
}

pub struct TestContext {
    pub app: Router,
    pub dir: TempDir,
    pub cfg: AppConfig,
    pub processor: Arc<RecordingProcessor>,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_upload_limit(16 * 1024 * 1024).await
    }

    pub async fn with_upload_limit(max_upload_bytes: usize) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let cfg = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "sqlite::memory:".into(),
            public_dir: dir.path().join("public"),
            avatar_dir: dir.path().join("avatars"),
            jwt_secret: "test-secret".into(),
            token_ttl_minutes: 30,
            model_path: dir.path().join("model.onnx"),
            ffmpeg_bin: "definitely-not-an-installed-transcoder".into(),
            max_upload_bytes,
        };

        let pool = Arc::new(db::connect_in_memory().await?);
        let processor = Arc::new(RecordingProcessor::default());
        let state = AppState::new(pool, &cfg, processor.clone());
        let app = routes::app(state, cfg.max_upload_bytes);

        Ok(Self {
            app,
            dir,
            cfg,
            processor,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn register(&self, username: &str, email: Option<&str>, password: &str) -> Response<Body> {
        let body = serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        });
        self.send(json_request("/users/", &body, None)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        let form = format!("username={}&password={}", username, password);
        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(request).await
    }

    /// Register + login, returning the bearer token.
    pub async fn token_for(&self, username: &str, password: &str) -> String {
        let resp = self.register(username, None, password).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = self.login(username, password).await;
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

pub fn json_request(uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Single-field multipart request carrying `contents` as `filename`.
pub fn multipart_request(
    uri: &str,
    field: &str,
    filename: &str,
    contents: &[u8],
    token: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until `check` passes or roughly two seconds elapse.
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    false
}
