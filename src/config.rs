use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr};

/// Placeholder signing key used when `POSE_SERVER_JWT_SECRET` is not set.
pub const DEV_JWT_SECRET: &str = "insecure-development-secret-change-me";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Root of the statically served tree (`videos/` and `marked_videos/` live here).
    pub public_dir: PathBuf,
    pub avatar_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub model_path: PathBuf,
    pub ffmpeg_bin: String,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Pose-estimation video backend")]
pub struct Args {
    /// Host to bind to (overrides POSE_SERVER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides POSE_SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides POSE_SERVER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory served under /public (overrides POSE_SERVER_PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<PathBuf>,

    /// Directory where avatars are written (overrides POSE_SERVER_AVATAR_DIR)
    #[arg(long)]
    pub avatar_dir: Option<PathBuf>,

    /// ONNX pose model (overrides POSE_SERVER_MODEL_PATH)
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// Transcoder executable (overrides POSE_SERVER_FFMPEG_BIN)
    #[arg(long)]
    pub ffmpeg_bin: Option<String>,

    /// Access token lifetime in minutes (overrides POSE_SERVER_TOKEN_TTL_MINUTES)
    #[arg(long)]
    pub token_ttl_minutes: Option<i64>,

    /// Request body limit for uploads (overrides POSE_SERVER_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::from_args(Args::parse())
    }

    fn from_args(args: Args) -> Result<(Self, bool)> {
        let cfg = Self::merge(args.host, args.port, args.database_url)?;

        let cfg = Self {
            public_dir: args.public_dir.unwrap_or(cfg.public_dir),
            avatar_dir: args.avatar_dir.unwrap_or(cfg.avatar_dir),
            model_path: args.model_path.unwrap_or(cfg.model_path),
            ffmpeg_bin: args.ffmpeg_bin.unwrap_or(cfg.ffmpeg_bin),
            token_ttl_minutes: args.token_ttl_minutes.unwrap_or(cfg.token_ttl_minutes),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(cfg.max_upload_bytes),
            ..cfg
        };

        Ok((cfg, args.migrate))
    }

    /// Environment-only configuration, with the connection flags optionally overridden.
    fn merge(host: Option<String>, port: Option<u16>, database_url: Option<String>) -> Result<Self> {
        let env_host = env::var("POSE_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("POSE_SERVER_PORT", 8000u16)?;
        let env_db = env::var("POSE_SERVER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/app.db".into());

        Ok(Self {
            host: host.unwrap_or(env_host),
            port: port.unwrap_or(env_port),
            database_url: database_url.unwrap_or(env_db),
            public_dir: env_path("POSE_SERVER_PUBLIC_DIR", "./public"),
            avatar_dir: env_path("POSE_SERVER_AVATAR_DIR", "./avatars"),
            jwt_secret: env::var("POSE_SERVER_JWT_SECRET")
                .unwrap_or_else(|_| DEV_JWT_SECRET.into()),
            token_ttl_minutes: parse_env("POSE_SERVER_TOKEN_TTL_MINUTES", 30i64)?,
            model_path: env_path("POSE_SERVER_MODEL_PATH", "models/movenet_lightning.onnx"),
            ffmpeg_bin: env::var("POSE_SERVER_FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".into()),
            max_upload_bytes: parse_env("POSE_SERVER_MAX_UPLOAD_BYTES", 512 * 1024 * 1024usize)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_to_default_when_unset() {
        let value = parse_env("POSE_SERVER_TEST_UNSET_VALUE", 42u16).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn limit_and_ttl_flags_override_defaults() {
        let args = Args::try_parse_from([
            "pose-server",
            "--token-ttl-minutes",
            "5",
            "--max-upload-bytes",
            "1048576",
            "--migrate",
        ])
        .unwrap();
        let (cfg, migrate) = AppConfig::from_args(args).unwrap();
        assert_eq!(cfg.token_ttl_minutes, 5);
        assert_eq!(cfg.max_upload_bytes, 1024 * 1024);
        assert!(migrate);
    }

    #[test]
    fn explicit_connection_flags_win_over_environment() {
        let cfg = AppConfig::merge(Some("127.0.0.1".into()), Some(9001), Some("sqlite::memory:".into()))
            .unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:9001");
        assert_eq!(cfg.database_url, "sqlite::memory:");
    }
}
