//! Represents a registered account and the request/response shapes around it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user account as stored in SQLite.
///
/// Carries the password hash, so it is never serialized directly; handlers
/// return [`UserResponse`] instead.
#[derive(Clone, FromRow, Debug)]
pub struct User {
    /// Identifier generated at registration.
    pub id: Uuid,

    /// Unique login name.
    pub username: String,

    /// Optional contact address, unique when present.
    pub email: Option<String>,

    /// Argon2 PHC string.
    pub hashed_password: String,

    pub is_active: bool,

    /// Filesystem path of the last uploaded avatar.
    pub avatar_path: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Public view of a [`User`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub avatar_path: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            avatar_path: user.avatar_path,
        }
    }
}

/// Body of `POST /users/`.
#[derive(Deserialize, Debug)]
pub struct UserCreate {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

/// Form body of `POST /token`. Extra OAuth2 fields (grant_type, scope, ...) are ignored.
#[derive(Deserialize, Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Body of `POST /users/me/password`.
#[derive(Deserialize, Debug)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".into(),
        }
    }
}
