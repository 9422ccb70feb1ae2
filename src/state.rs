//! Shared state handed to every handler.

use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

use crate::{
    auth::token::TokenIssuer,
    config::AppConfig,
    pipeline::{Transcoder, VideoProcessor},
    services::{user_service::UserService, video_service::VideoService},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub users: UserService,
    pub videos: VideoService,
    pub tokens: TokenIssuer,
    pub avatar_dir: PathBuf,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, cfg: &AppConfig, processor: Arc<dyn VideoProcessor>) -> Self {
        Self {
            users: UserService::new(db.clone()),
            videos: VideoService::new(
                cfg.public_dir.clone(),
                processor,
                Transcoder::new(cfg.ffmpeg_bin.clone()),
            ),
            tokens: TokenIssuer::new(&cfg.jwt_secret, cfg.token_ttl_minutes),
            avatar_dir: cfg.avatar_dir.clone(),
            db,
        }
    }
}
