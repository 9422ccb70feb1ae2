//! Defines every HTTP route.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET  /`        — greeting
//!   - `GET  /healthz` — liveness
//!   - `GET  /readyz`  — readiness (SQLite + disk)
//!
//! - **Video endpoints**
//!   - `POST /upload-video`   — store upload, schedule pose overlay
//!   - `GET  /public/{*path}` — static files, including marked videos
//!
//! - **Account endpoints**
//!   - `POST /users/`           — register
//!   - `POST /token`            — password login, returns a bearer token
//!   - `POST /users/me/avatar`  — bearer; multipart avatar upload
//!   - `POST /users/me/password`— bearer; change password

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        user_handlers::{change_password, create_user, login_for_access_token, upload_avatar},
        video_handlers::{root, upload_video},
    },
    services::video_service::PUBLIC_MOUNT,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Build the router for all routes, without state or middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/upload-video", post(upload_video))
        .route("/users/", post(create_user))
        .route("/token", post(login_for_access_token))
        .route("/users/me/avatar", post(upload_avatar))
        .route("/users/me/password", post(change_password))
}

/// Full application: routes, static mount, body limit, CORS, and tracing.
///
/// CORS is fully open (any origin, method, header; no credentials).
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    let static_files = ServeDir::new(&state.videos.public_dir);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes()
        .nest_service(PUBLIC_MOUNT, static_files)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
