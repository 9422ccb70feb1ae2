//! Router-level tests for the account and upload flows.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TestContext, body_json, json_request, multipart_request, wait_for};
use serde_json::json;
use std::path::Path;

#[tokio::test]
async fn root_greets() {
    let ctx = TestContext::new().await.unwrap();
    let resp = ctx
        .send(Request::get("/").body(Body::empty()).unwrap())
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["message"].is_string());
}

#[tokio::test]
async fn health_and_readiness() {
    let ctx = TestContext::new().await.unwrap();

    let resp = ctx
        .send(Request::get("/healthz").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .send(Request::get("/readyz").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["disk"]["ok"], true);
}

#[tokio::test]
async fn register_returns_public_record() {
    let ctx = TestContext::new().await.unwrap();
    let resp = ctx.register("alice", Some("alice@example.com"), "pw").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["is_active"], true);
    assert!(body["avatar_path"].is_null());
    assert!(body["id"].is_string());
    assert!(body.get("hashed_password").is_none());
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let ctx = TestContext::new().await.unwrap();
    assert_eq!(ctx.register("alice", None, "pw").await.status(), StatusCode::OK);

    let resp = ctx.register("alice", None, "other").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["detail"], "Username already registered");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let ctx = TestContext::new().await.unwrap();
    let resp = ctx.register("alice", Some("shared@example.com"), "pw").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx.register("bob", Some("shared@example.com"), "pw").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["detail"], "Email already registered");
}

#[tokio::test]
async fn login_accepts_correct_and_rejects_wrong_password() {
    let ctx = TestContext::new().await.unwrap();
    ctx.register("alice", None, "correct").await;

    let resp = ctx.login("alice", "correct").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["token_type"], "bearer");
    assert!(!body["access_token"].as_str().unwrap().is_empty());

    let resp = ctx.login("alice", "wrong").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    assert_eq!(body_json(resp).await["detail"], "Incorrect username or password");

    let resp = ctx.login("nobody", "correct").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_requires_correct_old_password() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.token_for("alice", "old-pw").await;

    let wrong = json!({ "old_password": "nope", "new_password": "new-pw" });
    let resp = ctx
        .send(json_request("/users/me/password", &wrong, Some(&token)))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["detail"], "Incorrect old password");

    let right = json!({ "old_password": "old-pw", "new_password": "new-pw" });
    let resp = ctx
        .send(json_request("/users/me/password", &right, Some(&token)))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["username"], "alice");

    assert_eq!(ctx.login("alice", "new-pw").await.status(), StatusCode::OK);
    assert_eq!(ctx.login("alice", "old-pw").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let ctx = TestContext::new().await.unwrap();
    let change = json!({ "old_password": "a", "new_password": "b" });

    let resp = ctx.send(json_request("/users/me/password", &change, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = ctx
        .send(json_request("/users/me/password", &change, Some("garbage")))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["detail"], "Could not validate credentials");
}

#[tokio::test]
async fn avatar_upload_points_at_stored_file() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.token_for("alice", "pw").await;

    let resp = ctx
        .send(multipart_request(
            "/users/me/avatar",
            "file",
            "me.png",
            b"\x89PNG fake",
            Some(&token),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    let id = body["id"].as_str().unwrap();
    let avatar_path = body["avatar_path"].as_str().unwrap();

    assert!(avatar_path.ends_with(&format!("{}.png", id)));
    assert!(Path::new(avatar_path).starts_with(&ctx.cfg.avatar_dir));
    assert_eq!(std::fs::read(avatar_path).unwrap(), b"\x89PNG fake");
}

#[tokio::test]
async fn avatar_upload_without_token_is_unauthorized() {
    let ctx = TestContext::new().await.unwrap();
    let resp = ctx
        .send(multipart_request("/users/me/avatar", "file", "me.png", b"x", None))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_video_returns_marked_url_and_schedules_job() {
    let ctx = TestContext::new().await.unwrap();
    let resp = ctx
        .send(multipart_request(
            "/upload-video",
            "file",
            "first serve.mp4",
            b"not really a video",
            None,
        ))
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["filename"], "first_serve.mp4");
    assert_eq!(body["marked_url"], "/public/marked_videos/marked_first_serve.mp4");
    assert_eq!(body["status"], "processing");

    let stored = ctx.cfg.public_dir.join("videos").join("first_serve.mp4");
    assert_eq!(std::fs::read(&stored).unwrap(), b"not really a video");

    let processor = ctx.processor.clone();
    assert!(wait_for(|| !processor.jobs.lock().unwrap().is_empty()).await);
    let jobs = processor.jobs.lock().unwrap();
    assert_eq!(jobs[0].0, stored);
    assert_eq!(
        jobs[0].1,
        ctx.cfg.public_dir.join("marked_videos").join("marked_first_serve.mp4")
    );
}

#[tokio::test]
async fn upload_video_without_file_field_is_bad_request() {
    let ctx = TestContext::new().await.unwrap();
    let resp = ctx
        .send(multipart_request("/upload-video", "video", "a.mp4", b"x", None))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_above_axum_default_but_within_limit_is_accepted() {
    let ctx = TestContext::with_upload_limit(4 * 1024 * 1024).await.unwrap();
    let contents = vec![7u8; 3 * 1024 * 1024];
    let resp = ctx
        .send(multipart_request("/upload-video", "file", "long.mp4", &contents, None))
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let stored = ctx.cfg.public_dir.join("videos").join("long.mp4");
    assert_eq!(std::fs::metadata(&stored).unwrap().len(), contents.len() as u64);
}

#[tokio::test]
async fn upload_over_limit_is_payload_too_large() {
    let ctx = TestContext::with_upload_limit(64 * 1024).await.unwrap();
    let contents = vec![7u8; 256 * 1024];
    let resp = ctx
        .send(multipart_request("/upload-video", "file", "huge.mp4", &contents, None))
        .await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!ctx.cfg.public_dir.join("videos").join("huge.mp4").exists());
    assert!(ctx.processor.jobs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn public_mount_serves_stored_files() {
    let ctx = TestContext::new().await.unwrap();
    let marked = ctx.cfg.public_dir.join("marked_videos");
    std::fs::create_dir_all(&marked).unwrap();
    std::fs::write(marked.join("marked_a.mp4"), b"annotated").unwrap();

    let resp = ctx
        .send(
            Request::get("/public/marked_videos/marked_a.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"annotated");
}
