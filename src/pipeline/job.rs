//! Fire-and-forget background job: frame pass on the blocking pool, then
//! the async transcode step. Outcomes only reach the log.

use std::{path::PathBuf, sync::Arc};
use tokio::task;
use tracing::{error, info};

use super::{PipelineError, ProcessReport, TranscodeOutcome, Transcoder, VideoProcessor};

#[derive(Debug, Clone)]
pub struct VideoJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl VideoJob {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self { input, output }
    }

    /// Detach the job onto the runtime. Nothing tracks or bounds it.
    pub fn spawn(self, processor: Arc<dyn VideoProcessor>, transcoder: Transcoder) {
        tokio::spawn(async move {
            self.run(processor, transcoder).await;
        });
    }

    /// Run to completion, returning the transcode outcome when the frame
    /// pass succeeded.
    pub async fn run(
        self,
        processor: Arc<dyn VideoProcessor>,
        transcoder: Transcoder,
    ) -> Option<TranscodeOutcome> {
        info!("processing {} -> {}", self.input.display(), self.output.display());

        let report = match self.process(processor).await {
            Ok(report) => report,
            Err(err) => {
                error!("Error: {}", err);
                return None;
            }
        };
        info!(
            frames = report.frames,
            codec = %report.codec,
            "frame pass complete for {}",
            self.output.display()
        );

        let outcome = transcoder.ensure_h264(&self.output).await;
        info!("Finished processing video: {}", self.output.display());
        Some(outcome)
    }

    async fn process(
        &self,
        processor: Arc<dyn VideoProcessor>,
    ) -> Result<ProcessReport, PipelineError> {
        let (input, output) = (self.input.clone(), self.output.clone());
        task::spawn_blocking(move || processor.process(&input, &output))
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))?
    }
}
