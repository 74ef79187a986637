use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::remote::domain::frame_encoder::{EncodeError, FrameEncoder};
use crate::shared::constants::DEFAULT_JPEG_QUALITY;
use crate::shared::frame::Frame;

/// Encodes frames as JPEG at a fixed quality, then as padded standard base64.
///
/// The payload carries no length prefix or framing of its own.
pub struct JpegBase64Encoder {
    quality: u8,
}

impl JpegBase64Encoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        let color = match frame.channels() {
            3 => ExtendedColorType::Rgb8,
            1 => ExtendedColorType::L8,
            n => return Err(EncodeError::UnsupportedChannels(n)),
        };
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality).encode(
            frame.data(),
            frame.width(),
            frame.height(),
            color,
        )?;
        Ok(buf)
    }
}

impl Default for JpegBase64Encoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegBase64Encoder {
    fn encode(&self, frame: &Frame) -> Result<String, EncodeError> {
        let jpeg = self.encode_jpeg(frame)?;
        Ok(STANDARD.encode(jpeg))
    }
}
