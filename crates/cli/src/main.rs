use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use facestance_core::actuation::infrastructure::logging_actuator::LoggingActuator;
use facestance_core::capture::domain::frame_source::FrameSource;
use facestance_core::capture::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use facestance_core::capture::infrastructure::still_image_source::StillImageSource;
use facestance_core::control::control_loop::{Collaborators, LoopConfig};
use facestance_core::detection::domain::face_detector::FaceDetector;
use facestance_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use facestance_core::remote::infrastructure::channel_transport::ChannelTransport;
use facestance_core::remote::infrastructure::jpeg_base64_encoder::JpegBase64Encoder;
use facestance_core::remote::infrastructure::websocket_host::WebSocketHost;
use facestance_core::shared::config::SkillConfig;
use facestance_core::shared::constants::{FACE_MODEL_PATH, IMAGE_EXTENSIONS};
use facestance_core::skill::face_stance_skill::FaceStanceSkill;
use facestance_core::skill::lifecycle::Skill;

/// Stands the robot taller the more faces it sees, driven by a remote peer.
#[derive(Parser, Debug)]
#[command(name = "facestance")]
struct Cli {
    /// Address the remote peer connects to.
    #[arg(long, default_value = "0.0.0.0:8765")]
    listen: String,

    /// Camera device, stream URL or video file. An image file is served as a
    /// static view.
    #[arg(long, default_value = "/dev/video0")]
    source: String,

    /// JSON file with tunables; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = SkillConfig::load_or_default(cli.config.as_deref())?;

    let detector = build_detector(&config)?;
    let (transport, outgoing) = ChannelTransport::bounded(config.telemetry_queue);
    let collaborators = Collaborators::new(
        open_source(&cli.source),
        detector,
        Arc::new(JpegBase64Encoder::new(config.jpeg_quality)),
        Arc::new(transport),
        Arc::new(LoggingActuator::new()),
    );

    let skill = Arc::new(FaceStanceSkill::new(
        collaborators,
        LoopConfig::from(&config),
    ));
    skill.on_start();

    let handler_skill = skill.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupted, shutting down");
        handler_skill.on_close();
        process::exit(0);
    })?;

    let host = WebSocketHost::bind(&cli.listen)?;
    log::info!("Waiting for remote on ws://{}", host.local_addr()?);
    host.serve(skill.as_ref(), &outgoing)?;
    Ok(())
}

fn build_detector(config: &SkillConfig) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model_path = Path::new(FACE_MODEL_PATH);
    log::info!("Loading face model: {}", model_path.display());
    Ok(Box::new(OnnxBlazefaceDetector::new(
        model_path,
        config.detector_confidence,
    )?))
}

fn is_image(source: &str) -> bool {
    Path::new(source)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn open_source(source: &str) -> Box<dyn FrameSource> {
    if is_image(source) {
        Box::new(StillImageSource::new(source))
    } else {
        Box::new(FfmpegCameraSource::new(source))
    }
}
