//! VideoService stores uploads under `<public>/videos` and schedules the
//! pose-overlay job that writes `<public>/marked_videos/marked_<name>`.

use bytes::Bytes;
use futures::Stream;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::{
    models::video::UploadResponse,
    pipeline::{Transcoder, VideoJob, VideoProcessor},
    services::file_store,
};

pub const VIDEOS_DIR: &str = "videos";
pub const MARKED_VIDEOS_DIR: &str = "marked_videos";
pub const MARKED_PREFIX: &str = "marked_";
/// URL prefix the public directory is mounted under.
pub const PUBLIC_MOUNT: &str = "/public";

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("invalid filename `{0}`")]
    InvalidFilename(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Clone)]
pub struct VideoService {
    pub public_dir: PathBuf,
    processor: Arc<dyn VideoProcessor>,
    transcoder: Transcoder,
}

impl VideoService {
    pub fn new(
        public_dir: impl Into<PathBuf>,
        processor: Arc<dyn VideoProcessor>,
        transcoder: Transcoder,
    ) -> Self {
        Self {
            public_dir: public_dir.into(),
            processor,
            transcoder,
        }
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.public_dir.join(VIDEOS_DIR)
    }

    pub fn marked_dir(&self) -> PathBuf {
        self.public_dir.join(MARKED_VIDEOS_DIR)
    }

    /// Store an uploaded video and schedule its processing.
    ///
    /// Returns as soon as the upload is on disk and the job is spawned; the
    /// marked URL may not exist yet, or ever.
    pub async fn accept_upload<S>(
        &self,
        original_filename: &str,
        stream: S,
    ) -> Result<UploadResponse, VideoError>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let safe_filename = sanitize_filename(original_filename)
            .ok_or_else(|| VideoError::InvalidFilename(original_filename.to_string()))?;

        let video_dir = self.videos_dir();
        let marked_dir = self.marked_dir();
        fs::create_dir_all(&video_dir).await?;
        fs::create_dir_all(&marked_dir).await?;

        let input = video_dir.join(&safe_filename);
        let output_filename = marked_filename(&safe_filename);
        let output = marked_dir.join(&output_filename);

        let size = file_store::write_stream(&input, stream).await?;
        info!(bytes = size, "stored upload {}", input.display());

        VideoJob::new(input, output).spawn(self.processor.clone(), self.transcoder.clone());

        Ok(UploadResponse {
            marked_url: marked_url(&output_filename),
            filename: safe_filename,
            status: "processing".into(),
        })
    }
}

/// Reduce a client-supplied name to a bare file name with spaces replaced by `_`.
///
/// Directory components (either separator) are dropped. Returns `None` when
/// nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);
    let safe = base.replace(' ', "_");
    if safe.is_empty() || safe == "." || safe == ".." || Path::new(&safe).file_name().is_none() {
        return None;
    }
    Some(safe)
}

pub fn marked_filename(safe_filename: &str) -> String {
    format!("{}{}", MARKED_PREFIX, safe_filename)
}

pub fn marked_url(marked_filename: &str) -> String {
    format!("{}/{}/{}", PUBLIC_MOUNT, MARKED_VIDEOS_DIR, marked_filename)
}
