use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::region::DetectionResult;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to load face model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Domain interface for face detection.
///
/// Implementations may keep per-call scratch state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectionError>;
}
