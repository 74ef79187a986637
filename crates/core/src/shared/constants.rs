/// Face model asset, loaded once at startup. Relative to the working directory.
pub const FACE_MODEL_PATH: &str = "assets/blazeface.onnx";

/// Minimum face score for a detection to count.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Stance height commanded per detected face.
pub const DEFAULT_STANCE_SCALE: f64 = 50.0;

/// JPEG quality for telemetry snapshots.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Telemetry payloads buffered for the remote peer before new ones are dropped.
pub const DEFAULT_TELEMETRY_QUEUE: usize = 4;

/// Pause after a failed iteration so a dead camera does not spin the loop.
pub const DEFAULT_FAILURE_BACKOFF_MS: u64 = 100;

/// Log a progress line every N completed iterations.
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

pub const COMMAND_START: &str = "start";
pub const COMMAND_STOP: &str = "stop";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
