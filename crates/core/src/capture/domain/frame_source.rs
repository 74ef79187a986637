use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame source not started")]
    NotStarted,
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    #[error("capture failed: {0}")]
    Backend(String),
}

/// Domain interface for the camera.
///
/// `snapshot` may block until the device delivers a frame. Implementations
/// are driven from one thread at a time, hence `&mut self`.
pub trait FrameSource: Send {
    /// Whether the underlying device or input exists at all.
    fn is_available(&self) -> bool;

    /// Opens the device. Called once per remote connection.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Decodes the current view.
    fn snapshot(&mut self) -> Result<Frame, CaptureError>;
}
