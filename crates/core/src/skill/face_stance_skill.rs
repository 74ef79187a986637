use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::actuation::domain::actuator::{Actuator, ActuatorError};
use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::control::control_loop::{Collaborators, ControlError, ControlLoop, LoopConfig};
use crate::remote::domain::command::Command;
use crate::skill::lifecycle::Skill;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("body failed to start: {0}")]
    Actuator(#[from] ActuatorError),
    #[error("camera not available")]
    CameraUnavailable,
    #[error("camera failed to start: {0}")]
    Camera(#[from] CaptureError),
}

pub type ExitHook = Box<dyn Fn() + Send + Sync>;

/// Skill that raises the robot's stance by the number of faces in view.
///
/// Remote "start"/"stop" commands drive a [`ControlLoop`]. Until a connect
/// has brought up both body and camera, "start" is refused and the robot
/// stays inert. After close the loop is shut down and "start" stays refused.
pub struct FaceStanceSkill {
    control: ControlLoop,
    frame_source: Arc<Mutex<Box<dyn FrameSource>>>,
    actuator: Arc<dyn Actuator>,
    ready: AtomicBool,
    exit_hook: ExitHook,
}

impl FaceStanceSkill {
    pub fn new(collaborators: Collaborators, config: LoopConfig) -> Self {
        Self::with_control_loop(
            collaborators.clone(),
            ControlLoop::new(collaborators, config),
        )
    }

    /// Uses a prebuilt loop, which must share `collaborators`.
    pub fn with_control_loop(collaborators: Collaborators, control: ControlLoop) -> Self {
        Self {
            control,
            frame_source: collaborators.frame_source,
            actuator: collaborators.actuator,
            ready: AtomicBool::new(false),
            exit_hook: Box::new(|| std::process::exit(0)),
        }
    }

    /// Replaces the process exit performed after the remote disconnects.
    pub fn with_exit_hook(mut self, hook: ExitHook) -> Self {
        self.exit_hook = hook;
        self
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn connect(&self) -> Result<(), ConnectError> {
        self.actuator.start()?;
        let mut source = self
            .frame_source
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !source.is_available() {
            return Err(ConnectError::CameraUnavailable);
        }
        source.start()?;
        Ok(())
    }

    fn handle_start(&self) {
        if !self.is_ready() {
            log::warn!("Ignoring start: body and camera are not ready");
            return;
        }
        match self.control.start() {
            Ok(_) => {}
            Err(ControlError::Closed) => log::warn!("Ignoring start: skill is closed"),
            Err(e) => log::error!("{e}"),
        }
    }
}

impl Skill for FaceStanceSkill {
    fn on_start(&self) {
        log::info!("Started");
    }

    fn on_connect(&self) {
        self.ready.store(false, Ordering::Release);
        match self.connect() {
            Ok(()) => {
                self.ready.store(true, Ordering::Release);
                log::info!("Body and camera ready");
            }
            Err(e) => log::error!("Connect failed: {e}"),
        }
    }

    fn on_disconnect(&self) {
        log::info!("Disconnecting from the remote");
        self.ready.store(false, Ordering::Release);
        self.control.stop();
        (self.exit_hook)();
    }

    fn on_close(&self) {
        self.ready.store(false, Ordering::Release);
        self.control.shutdown();
        self.actuator.close();
        log::info!("Closed");
    }

    fn on_recv_string(&self, data: &str) {
        log::info!("Received: {data}");
        match Command::parse(data) {
            Some(Command::Start) => self.handle_start(),
            Some(Command::Stop) => {
                self.control.stop();
            }
            None => log::warn!("Unrecognised command {data:?} ignored"),
        }
    }
}
