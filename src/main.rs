use anyhow::Result;
use pose_server::{
    config::AppConfig,
    db,
    pipeline::VideoProcessor,
    routes::routes,
    state::AppState,
};
use std::{io::ErrorKind, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pose_server=info,tower_http=info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting pose-server with config: {:?}", redacted(&cfg));
    if cfg.uses_dev_secret() {
        tracing::warn!("POSE_SERVER_JWT_SECRET is not set; using the development signing key");
    }

    // --- Initialize SQLite and create the schema ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);
    db::run_migrations(&db).await?;

    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Ensure served and upload directories exist ---
    for dir in [&cfg.public_dir, &cfg.avatar_dir] {
        if !fs::try_exists(dir).await.unwrap_or(false) {
            fs::create_dir_all(dir).await?;
            tracing::info!("Created directory {}", dir.display());
        }
    }

    // --- Pose pipeline ---
    let processor = build_processor(&cfg)?;

    // --- Build router ---
    let state = AppState::new(db, &cfg, processor);
    let app = routes::app(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "vision")]
fn build_processor(cfg: &AppConfig) -> Result<Arc<dyn VideoProcessor>> {
    use pose_server::pipeline::{FramePipeline, cv_backend::OpenCvBackend};

    tracing::info!("Loading pose model from {}", cfg.model_path.display());
    let backend = OpenCvBackend::new(&cfg.model_path)?;
    Ok(Arc::new(FramePipeline::new(backend)))
}

#[cfg(not(feature = "vision"))]
fn build_processor(_cfg: &AppConfig) -> Result<Arc<dyn VideoProcessor>> {
    use pose_server::pipeline::UnavailableProcessor;

    tracing::warn!("built without the `vision` feature; uploads will be stored but not processed");
    Ok(Arc::new(UnavailableProcessor::new(
        "built without the `vision` feature",
    )))
}

/// Config for the startup log line, with the signing key masked.
fn redacted(cfg: &AppConfig) -> AppConfig {
    AppConfig {
        jwt_secret: "***".into(),
        ..cfg.clone()
    }
}
