//! OpenCV decode/encode with MoveNet (ONNX Runtime) pose inference.

use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, CV_32FC3, Mat, Point, Scalar, Size, Vec3f},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};
use std::{fmt::Display, path::Path, sync::Mutex};

use super::{
    Fourcc, FrameSink, FrameSource, PipelineError, VideoBackend, VideoProperties,
    pose::{CONFIDENCE_THRESHOLD, Keypoint, KeypointIndex, Overlay, Pose},
};

/// MoveNet input edge length.
pub const MOVENET_INPUT_SIZE: i32 = 192;

const KEYPOINT_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0); // green (BGR)
const SKELETON_COLOR: (f64, f64, f64) = (0.0, 255.0, 255.0); // yellow (BGR)

fn backend_err(err: impl Display) -> PipelineError {
    PipelineError::Backend(err.to_string())
}

fn bgr((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// MoveNet single-pose detector.
pub struct PoseDetector {
    session: Session,
}

impl PoseDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(backend_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(backend_err)?
            .commit_from_file(model_path.as_ref())
            .map_err(|e| {
                PipelineError::Unavailable(format!(
                    "failed to load ONNX model {}: {}",
                    model_path.as_ref().display(),
                    e
                ))
            })?;

        Ok(Self { session })
    }

    /// Input: [1, 192, 192, 3] f32 RGB (0.0-255.0). Output: 17 keypoints.
    pub fn detect(&mut self, input: Array4<f32>) -> Result<Pose, PipelineError> {
        let input_tensor = Tensor::from_array(input).map_err(backend_err)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .map_err(backend_err)?;

        // [1, 1, 17, 3] as (y, x, confidence)
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .map_err(backend_err)?;

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            let y = output[[0, 0, i, 0]];
            let x = output[[0, 0, i, 1]];
            let confidence = output[[0, 0, i, 2]];
            *kp = Keypoint::new(x, y, confidence);
        }

        Ok(Pose::new(keypoints))
    }
}

/// BGR frame -> [1, 192, 192, 3] RGB f32 tensor.
pub fn preprocess_for_movenet(frame: &Mat) -> Result<Array4<f32>, PipelineError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(
        frame,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(backend_err)?;

    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(MOVENET_INPUT_SIZE, MOVENET_INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .map_err(backend_err)?;

    let mut float_mat = Mat::default();
    resized
        .convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)
        .map_err(backend_err)?;

    let side = MOVENET_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, side, side, 3));
    for y in 0..MOVENET_INPUT_SIZE {
        for x in 0..MOVENET_INPUT_SIZE {
            let pixel = float_mat.at_2d::<Vec3f>(y, x).map_err(backend_err)?;
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c];
            }
        }
    }

    Ok(tensor)
}

fn draw_overlay(frame: &mut Mat, overlay: &Overlay) -> Result<(), PipelineError> {
    for &((x1, y1), (x2, y2)) in &overlay.segments {
        imgproc::line(
            frame,
            Point::new(x1, y1),
            Point::new(x2, y2),
            bgr(SKELETON_COLOR),
            2,
            imgproc::LINE_AA,
            0,
        )
        .map_err(backend_err)?;
    }
    for &(x, y) in &overlay.points {
        imgproc::circle(
            frame,
            Point::new(x, y),
            4,
            bgr(KEYPOINT_COLOR),
            -1,
            imgproc::LINE_8,
            0,
        )
        .map_err(backend_err)?;
    }
    Ok(())
}

/// One model shared by every job; inference is serialized by the mutex.
pub struct OpenCvBackend {
    detector: Mutex<PoseDetector>,
}

impl OpenCvBackend {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self, PipelineError> {
        Ok(Self {
            detector: Mutex::new(PoseDetector::new(model_path)?),
        })
    }
}

pub struct CaptureSource {
    capture: VideoCapture,
    props: VideoProperties,
}

impl FrameSource for CaptureSource {
    type Frame = Mat;

    fn properties(&self) -> VideoProperties {
        self.props
    }

    fn read_frame(&mut self) -> Result<Option<Mat>, PipelineError> {
        let mut frame = Mat::default();
        let ok = self.capture.read(&mut frame).map_err(backend_err)?;
        if !ok || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

pub struct WriterSink {
    writer: VideoWriter,
}

impl FrameSink for WriterSink {
    type Frame = Mat;

    fn write_frame(&mut self, frame: &Mat) -> Result<(), PipelineError> {
        self.writer.write(frame).map_err(backend_err)
    }

    fn finish(mut self) -> Result<(), PipelineError> {
        self.writer.release().map_err(backend_err)
    }
}

impl VideoBackend for OpenCvBackend {
    type Frame = Mat;
    type Source = CaptureSource;
    type Sink = WriterSink;

    fn open_source(&self, path: &Path) -> Result<Option<CaptureSource>, PipelineError> {
        let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            .map_err(backend_err)?;
        if !capture.is_opened().map_err(backend_err)? {
            return Ok(None);
        }

        let props = VideoProperties {
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(backend_err)? as u32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(backend_err)? as u32,
            fps: capture.get(videoio::CAP_PROP_FPS).map_err(backend_err)?,
        };

        Ok(Some(CaptureSource { capture, props }))
    }

    fn open_sink(
        &self,
        path: &Path,
        codec: Fourcc,
        props: &VideoProperties,
    ) -> Result<Option<WriterSink>, PipelineError> {
        let [a, b, c, d] = codec.chars();
        let fourcc = VideoWriter::fourcc(a, b, c, d).map_err(backend_err)?;
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            props.fps,
            Size::new(props.width as i32, props.height as i32),
            true,
        )
        .map_err(backend_err)?;

        if writer.is_opened().map_err(backend_err)? {
            Ok(Some(WriterSink { writer }))
        } else {
            Ok(None)
        }
    }

    fn annotate(&self, frame: &mut Mat, props: &VideoProperties) -> Result<(), PipelineError> {
        let input = preprocess_for_movenet(frame)?;
        let pose = {
            let mut detector = self
                .detector
                .lock()
                .map_err(|_| backend_err("pose detector mutex poisoned"))?;
            detector.detect(input)?
        };

        let overlay = Overlay::from_pose(&pose, props.width, props.height, CONFIDENCE_THRESHOLD);
        draw_overlay(frame, &overlay)
    }
}
