//! Re-encode finished outputs to H.264/yuv420p with an external ffmpeg so
//! browsers can play them.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, process::Command};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeOutcome {
    /// The output was replaced by the H.264 re-encode.
    Replaced,
    /// The transcoder binary is not installed; the output is left as is.
    Skipped,
    /// The transcoder ran and failed; the output is left as is.
    Failed,
}

#[derive(Debug, Clone)]
pub struct Transcoder {
    program: String,
}

impl Transcoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Rewrite `video` in place via `<stem>_h264.mp4`.
    ///
    /// Never returns an error: every failure is logged and reported through
    /// the outcome, and any temporary output is removed.
    pub async fn ensure_h264(&self, video: &Path) -> TranscodeOutcome {
        let temp_output = temp_output_path(video);

        let result = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .args(["-c:v", "libx264", "-preset", "fast", "-pix_fmt", "yuv420p"])
            .arg(&temp_output)
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "Skipping H.264 transcode because {} is not installed",
                    self.program
                );
                return TranscodeOutcome::Skipped;
            }
            Err(err) => {
                error!(
                    "Unexpected error while running {} on {}: {}",
                    self.program,
                    video.display(),
                    err
                );
                remove_if_exists(&temp_output).await;
                return TranscodeOutcome::Failed;
            }
        };

        if !output.status.success() {
            error!(
                "{} failed to re-encode {} ({}): {}",
                self.program,
                video.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            remove_if_exists(&temp_output).await;
            return TranscodeOutcome::Failed;
        }

        match fs::rename(&temp_output, video).await {
            Ok(()) => {
                info!(
                    "Re-encoded {} with libx264 for browser compatibility",
                    video.display()
                );
                TranscodeOutcome::Replaced
            }
            Err(err) => {
                error!(
                    "could not move {} over {}: {}",
                    temp_output.display(),
                    video.display(),
                    err
                );
                remove_if_exists(&temp_output).await;
                TranscodeOutcome::Failed
            }
        }
    }
}

/// `dir/name.mp4` -> `dir/name_h264.mp4`
pub fn temp_output_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    video.with_file_name(format!("{}_h264.mp4", stem))
}

async fn remove_if_exists(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("failed to remove {}: {}", path.display(), err),
    }
}
