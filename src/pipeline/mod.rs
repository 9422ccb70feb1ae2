//! Decode -> per-frame pose inference -> overlay -> encode.
//!
//! The pipeline is generic over a [`VideoBackend`] so the orchestration
//! (codec fallback, frame loop, release order) does not depend on OpenCV.
//! The OpenCV/ONNX Runtime backend lives behind the `vision` feature.

pub mod job;
#[cfg(feature = "vision")]
pub mod cv_backend;
pub mod pose;
pub mod transcode;

use std::{
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use job::VideoJob;
pub use transcode::{TranscodeOutcome, Transcoder};

/// Four-character codec code handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fourcc(pub [u8; 4]);

impl Fourcc {
    /// MPEG-4 Part 2; available in software on almost every build.
    pub const MP4V: Fourcc = Fourcc(*b"mp4v");
    /// H.264; often missing where no hardware/licensed encoder is present.
    pub const AVC1: Fourcc = Fourcc(*b"avc1");

    pub fn chars(&self) -> [char; 4] {
        self.0.map(char::from)
    }
}

impl fmt::Display for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.chars() {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Codecs tried in order when opening the output; the first that opens wins.
pub const PREFERRED_CODECS: [Fourcc; 2] = [Fourcc::MP4V, Fourcc::AVC1];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not open video {0}")]
    SourceUnavailable(PathBuf),
    #[error("could not create video writer for {0}")]
    NoCodec(PathBuf),
    #[error("pose pipeline unavailable: {0}")]
    Unavailable(String),
    #[error("video backend error: {0}")]
    Backend(String),
    #[error("processing task panicked or was cancelled: {0}")]
    Join(String),
}

/// Sequential reader over decoded frames.
pub trait FrameSource: Send {
    type Frame;

    fn properties(&self) -> VideoProperties;

    /// Next frame, or `None` at end of stream.
    fn read_frame(&mut self) -> Result<Option<Self::Frame>, PipelineError>;
}

/// Encoder for annotated frames.
pub trait FrameSink: Send {
    type Frame;

    fn write_frame(&mut self, frame: &Self::Frame) -> Result<(), PipelineError>;

    /// Flush and close the container.
    fn finish(self) -> Result<(), PipelineError>;
}

/// Everything the frame loop needs from a decode/inference/encode stack.
pub trait VideoBackend: Send + Sync + 'static {
    type Frame;
    type Source: FrameSource<Frame = Self::Frame>;
    type Sink: FrameSink<Frame = Self::Frame>;

    /// `Ok(None)` when the file cannot be opened as video.
    fn open_source(&self, path: &Path) -> Result<Option<Self::Source>, PipelineError>;

    /// `Ok(None)` when the encoder rejects `codec`.
    fn open_sink(
        &self,
        path: &Path,
        codec: Fourcc,
        props: &VideoProperties,
    ) -> Result<Option<Self::Sink>, PipelineError>;

    /// Run pose inference on `frame` and draw the result onto it.
    fn annotate(&self, frame: &mut Self::Frame, props: &VideoProperties)
        -> Result<(), PipelineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub frames: u64,
    pub codec: Fourcc,
}

/// Object-safe entry point used by the HTTP layer.
///
/// Implementations block; callers run them on the blocking pool.
pub trait VideoProcessor: Send + Sync {
    fn process(&self, input: &Path, output: &Path) -> Result<ProcessReport, PipelineError>;
}

/// Frame loop over any [`VideoBackend`].
pub struct FramePipeline<B> {
    backend: B,
}

impl<B: VideoBackend> FramePipeline<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn open_sink(
        &self,
        output: &Path,
        props: &VideoProperties,
    ) -> Option<(B::Sink, Fourcc)> {
        for (rank, codec) in PREFERRED_CODECS.into_iter().enumerate() {
            match self.backend.open_sink(output, codec, props) {
                Ok(Some(sink)) => {
                    if rank > 0 {
                        info!("Using '{}' codec for {}", codec, output.display());
                    }
                    return Some((sink, codec));
                }
                Ok(None) => warn!("'{}' codec failed for {}", codec, output.display()),
                Err(err) => warn!("'{}' codec failed for {}: {}", codec, output.display(), err),
            }
        }
        None
    }
}

impl<B: VideoBackend> VideoProcessor for FramePipeline<B> {
    fn process(&self, input: &Path, output: &Path) -> Result<ProcessReport, PipelineError> {
        let mut source = self
            .backend
            .open_source(input)?
            .ok_or_else(|| PipelineError::SourceUnavailable(input.to_path_buf()))?;
        let props = source.properties();
        debug!(
            width = props.width,
            height = props.height,
            fps = props.fps,
            "opened {}",
            input.display()
        );

        let (mut sink, codec) = self
            .open_sink(output, &props)
            .ok_or_else(|| PipelineError::NoCodec(output.to_path_buf()))?;

        let mut frames = 0u64;
        while let Some(mut frame) = source.read_frame()? {
            self.backend.annotate(&mut frame, &props)?;
            sink.write_frame(&frame)?;
            frames += 1;
        }

        drop(source);
        sink.finish()?;

        Ok(ProcessReport { frames, codec })
    }
}

/// Stand-in used when the binary was built without an inference backend.
pub struct UnavailableProcessor {
    reason: String,
}

impl UnavailableProcessor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl VideoProcessor for UnavailableProcessor {
    fn process(&self, _input: &Path, _output: &Path) -> Result<ProcessReport, PipelineError> {
        Err(PipelineError::Unavailable(self.reason.clone()))
    }
}
