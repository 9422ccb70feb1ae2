//! Data models for accounts and upload responses.
//!
//! `User` maps to the `users` table via `sqlx::FromRow`; the remaining types
//! are request/response bodies serialized with `serde`.

pub mod user;
pub mod video;
