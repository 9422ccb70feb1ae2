//! Account endpoints: registration, token login, avatar upload, password change.

use axum::{
    Form, Json,
    extract::{Multipart, State},
};
use futures::StreamExt;
use std::{io, path::Path};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    errors::AppError,
    models::user::{LoginForm, PasswordChange, TokenResponse, UserCreate, UserResponse},
    services::file_store,
    state::AppState,
};

/// `POST /users/`
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserCreate>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.create_user(payload).await?;
    Ok(Json(user.into()))
}

/// `POST /token`, OAuth2 password-flow form.
pub async fn login_for_access_token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .users
        .authenticate(&form.username, &form.password)
        .await?
        .ok_or_else(|| AppError::unauthorized("Incorrect username or password"))?;

    let token = state.tokens.issue(&user.username)?;
    Ok(Json(TokenResponse::bearer(token)))
}

/// `POST /users/me/avatar`, multipart field `file`, stored as `<avatar_dir>/<id><ext>`.
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let path = state.avatar_dir.join(avatar_file_name(user.id, &filename));
        let stream = field.map(|chunk| chunk.map_err(io::Error::other));
        file_store::write_stream(&path, stream).await?;

        let updated = state
            .users
            .update_avatar(user.id, &path.to_string_lossy())
            .await?;
        info!(user_id = %updated.id, "stored avatar at {}", path.display());
        return Ok(Json(updated.into()));
    }

    Err(AppError::bad_request("Missing file field"))
}

/// `POST /users/me/password`
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PasswordChange>,
) -> Result<Json<UserResponse>, AppError> {
    let updated = state
        .users
        .change_password(&user, &payload.old_password, &payload.new_password)
        .await?
        .ok_or_else(|| AppError::bad_request("Incorrect old password"))?;

    Ok(Json(updated.into()))
}

/// `<id>` plus the original extension with its dot, if any.
fn avatar_file_name(user_id: Uuid, original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}{}", user_id, ext)
}
