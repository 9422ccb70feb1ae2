//! UserService: account storage backed by SQLite.
//!
//! Uniqueness of username and email is checked before insert; the UNIQUE
//! constraints in the schema catch the race between two concurrent
//! registrations and surface it as the same duplicate error.

use crate::{
    auth::password::{self, PasswordError},
    models::user::{User, UserCreate},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("username already registered")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type UserResult<T> = Result<T, UserError>;

const USER_COLUMNS: &str =
    "id, username, email, hashed_password, is_active, avatar_path, created_at";

/// Account queries and mutations over the `users` table.
#[derive(Clone)]
pub struct UserService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl UserService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> UserResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE {} = ?",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(UserError::NotFound)
    }

    pub async fn get_by_username(&self, username: &str) -> UserResult<User> {
        self.fetch_one_by("username", username).await
    }

    pub async fn get_by_email(&self, email: &str) -> UserResult<User> {
        self.fetch_one_by("email", email).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> UserResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(UserError::NotFound)
    }

    /// Register a new account.
    ///
    /// Checks the username first, then the email (only when one is given),
    /// hashes the password, and inserts an active user with no avatar.
    pub async fn create_user(&self, req: UserCreate) -> UserResult<User> {
        if found(self.get_by_username(&req.username).await)? {
            return Err(UserError::UsernameTaken);
        }
        if let Some(email) = req.email.as_deref() {
            if found(self.get_by_email(email).await)? {
                return Err(UserError::EmailTaken);
            }
        }

        let hashed_password = password::hash_password(&req.password)?;
        let user = self.insert(&req, &hashed_password).await?;
        info!(user_id = %user.id, username = %user.username, "registered user");
        Ok(user)
    }

    /// Insert without the existence checks; the UNIQUE constraints still
    /// reject duplicates that slipped past them.
    async fn insert(&self, req: &UserCreate, hashed_password: &str) -> UserResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, hashed_password, is_active, avatar_path, created_at)
             VALUES (?, ?, ?, ?, 1, NULL, ?)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&req.username)
        .bind(req.email.as_deref())
        .bind(hashed_password)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                unique_violation_kind(&err)
            } else {
                UserError::Sqlx(err)
            }
        })
    }

    /// Look up `username` and check `password` against its hash.
    ///
    /// Returns `Ok(None)` for both an unknown user and a wrong password.
    pub async fn authenticate(&self, username: &str, password: &str) -> UserResult<Option<User>> {
        let user = match self.get_by_username(username).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        if password::verify_password(password, &user.hashed_password)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub async fn update_avatar(&self, id: Uuid, avatar_path: &str) -> UserResult<User> {
        self.update_column(id, "avatar_path", avatar_path).await
    }

    /// Replace the stored hash after checking `old_password`.
    ///
    /// Returns `Ok(None)` when `old_password` does not match.
    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
    ) -> UserResult<Option<User>> {
        if !password::verify_password(old_password, &user.hashed_password)? {
            return Ok(None);
        }
        let hashed = password::hash_password(new_password)?;
        self.update_column(user.id, "hashed_password", &hashed)
            .await
            .map(Some)
    }

    async fn update_column(&self, id: Uuid, column: &str, value: &str) -> UserResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET {} = ? WHERE id = ? RETURNING {}",
            column, USER_COLUMNS
        ))
        .bind(value)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(UserError::NotFound)
    }
}

fn found(lookup: UserResult<User>) -> UserResult<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(UserError::NotFound) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// SQLite names the offending column in the message, e.g. `UNIQUE constraint failed: users.email`.
fn unique_violation_kind(err: &sqlx::Error) -> UserError {
    match err {
        sqlx::Error::Database(db_err) if db_err.message().contains("users.email") => {
            UserError::EmailTaken
        }
        _ => UserError::UsernameTaken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn service() -> UserService {
        let pool = db::connect_in_memory().await.unwrap();
        UserService::new(Arc::new(pool))
    }

    fn new_user(username: &str, email: Option<&str>) -> UserCreate {
        UserCreate {
            username: username.into(),
            email: email.map(Into::into),
            password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn create_user_is_active_without_avatar() {
        let svc = service().await;
        let user = svc.create_user(new_user("alice", Some("a@x.io"))).await.unwrap();
        assert!(user.is_active);
        assert!(user.avatar_path.is_none());
        assert_ne!(user.hashed_password, "pw");

        let fetched = svc.get_by_id(user.id).await.unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_rejected() {
        let svc = service().await;
        svc.create_user(new_user("alice", Some("a@x.io"))).await.unwrap();

        let err = svc.create_user(new_user("alice", None)).await.unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken));

        let err = svc.create_user(new_user("bob", Some("a@x.io"))).await.unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn constraint_violation_on_insert_is_reported_as_taken() {
        let svc = service().await;
        svc.create_user(new_user("alice", Some("a@x.io"))).await.unwrap();

        let err = svc.insert(&new_user("bob", Some("a@x.io")), "hash").await.unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));

        let err = svc.insert(&new_user("alice", None), "hash").await.unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken));

        let err = svc.insert(&new_user("alice", Some("other@x.io")), "hash").await.unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken));
    }

    #[tokio::test]
    async fn users_without_email_do_not_collide() {
        let svc = service().await;
        svc.create_user(new_user("alice", None)).await.unwrap();
        svc.create_user(new_user("bob", None)).await.unwrap();
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let svc = service().await;
        svc.create_user(new_user("alice", None)).await.unwrap();

        assert!(svc.authenticate("alice", "pw").await.unwrap().is_some());
        assert!(svc.authenticate("alice", "wrong").await.unwrap().is_none());
        assert!(svc.authenticate("nobody", "pw").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn change_password_requires_old_password() {
        let svc = service().await;
        let user = svc.create_user(new_user("alice", None)).await.unwrap();

        assert!(svc.change_password(&user, "wrong", "new").await.unwrap().is_none());
        let updated = svc.change_password(&user, "pw", "new").await.unwrap().unwrap();

        assert!(svc.authenticate("alice", "new").await.unwrap().is_some());
        assert!(svc.authenticate("alice", "pw").await.unwrap().is_none());
        assert_ne!(updated.hashed_password, user.hashed_password);
    }

    #[tokio::test]
    async fn update_avatar_for_missing_user_is_not_found() {
        let svc = service().await;
        let err = svc.update_avatar(Uuid::new_v4(), "x.png").await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }
}
