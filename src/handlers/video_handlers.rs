//! Upload endpoint and the root greeting.

use axum::{
    Json,
    extract::{Multipart, State},
};
use futures::StreamExt;
use serde_json::{Value, json};
use std::io;

use crate::{errors::AppError, models::video::UploadResponse, state::AppState};

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the pose video backend!" }))
}

/// `POST /upload-video`, multipart field `file`.
///
/// Streams the upload to disk, schedules pose processing, and returns
/// immediately with the URL the marked video will eventually have.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let stream = field.map(|chunk| chunk.map_err(io::Error::other));
        let response = state.videos.accept_upload(&filename, stream).await?;
        return Ok(Json(response));
    }

    Err(AppError::bad_request("Missing file field"))
}
