use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode frame with {0} channels")]
    UnsupportedChannels(u8),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Turns a frame into a text payload for the remote peer.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<String, EncodeError>;
}
