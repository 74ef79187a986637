use std::path::Path;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::shared::frame::Frame;

/// Frame source backed by ffmpeg-next (libavformat + libavcodec).
///
/// `input` is anything libavformat can open: a capture device, an RTSP or
/// HTTP MJPEG stream, or a video file. Each snapshot decodes the next frame
/// and converts it to RGB24. File inputs rewind at end of stream.
pub struct FfmpegCameraSource {
    input: String,
    session: Option<DecodeSession>,
    sequence: u64,
}

struct DecodeSession {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
}

// Safety: FfmpegCameraSource is only driven from one thread at a time (it
// sits behind a mutex). The raw pointers inside ffmpeg types are never shared.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            session: None,
            sequence: 0,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

fn is_network_url(input: &str) -> bool {
    input.contains("://")
}

fn backend_err(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Backend(e.to_string())
}

impl FrameSource for FfmpegCameraSource {
    fn is_available(&self) -> bool {
        is_network_url(&self.input) || Path::new(&self.input).exists()
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if !self.is_available() {
            return Err(CaptureError::Unavailable(self.input.clone()));
        }

        ffmpeg_next::init().map_err(backend_err)?;
        ffmpeg_next::device::register_all();

        let ictx = ffmpeg_next::format::input(&self.input).map_err(backend_err)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::Unavailable(format!("{}: no video stream", self.input)))?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(backend_err)?;
        let decoder = codec_ctx.decoder().video().map_err(backend_err)?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(backend_err)?;

        log::info!("Camera opened: {} ({width}x{height})", self.input);
        self.session = Some(DecodeSession {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
        });
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Frame, CaptureError> {
        let rewindable = !is_network_url(&self.input);
        let session = self.session.as_mut().ok_or(CaptureError::NotStarted)?;

        let frame = match session.next_frame(self.sequence)? {
            Some(frame) => frame,
            None if rewindable => {
                session.rewind()?;
                session
                    .next_frame(self.sequence)?
                    .ok_or_else(|| CaptureError::Backend("input has no decodable frames".into()))?
            }
            None => return Err(CaptureError::Unavailable(format!("{}: stream ended", self.input))),
        };
        self.sequence += 1;
        Ok(frame)
    }
}

impl DecodeSession {
    /// Decodes the next video frame, or `None` at end of stream.
    fn next_frame(&mut self, sequence: u64) -> Result<Option<Frame>, CaptureError> {
        if let Some(frame) = self.try_receive(sequence)? {
            return Ok(Some(frame));
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                return self.try_receive(sequence);
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(frame) = self.try_receive(sequence)? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self, sequence: u64) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(backend_err)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, sequence)))
    }

    fn rewind(&mut self) -> Result<(), CaptureError> {
        self.ictx.seek(0, ..).map_err(backend_err)?;
        self.decoder.flush();
        Ok(())
    }
}

/// Copies RGB24 rows out of an ffmpeg frame, dropping the stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
