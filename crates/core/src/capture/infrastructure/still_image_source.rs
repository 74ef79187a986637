use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::shared::frame::Frame;

/// Serves one decoded image file as if it were a camera that never moves.
///
/// Useful on a bench without a camera attached: the loop still exercises
/// encode, detect and actuate with real pixels.
pub struct StillImageSource {
    path: PathBuf,
    frame: Option<Frame>,
    sequence: u64,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
            sequence: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StillImageSource {
    fn is_available(&self) -> bool {
        self.path.is_file()
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let img = image::open(&self.path)
            .map_err(|e| CaptureError::Unavailable(format!("{}: {e}", self.path.display())))?
            .to_rgb8();
        log::info!(
            "Still image loaded: {} ({}x{})",
            self.path.display(),
            img.width(),
            img.height()
        );
        self.frame = Some(Frame::from_rgb_image(img, 0));
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Frame, CaptureError> {
        let frame = self.frame.as_ref().ok_or(CaptureError::NotStarted)?;
        let snapshot = frame.with_sequence(self.sequence);
        self.sequence += 1;
        Ok(snapshot)
    }
}
