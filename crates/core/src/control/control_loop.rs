use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::actuation::domain::actuator::Actuator;
use crate::actuation::domain::stance::StanceMapping;
use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::control::control_signal::{ControlSignal, LoopState, StartOutcome, StopOutcome};
use crate::control::loop_logger::{LoopLogger, StatsLoopLogger};
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::remote::domain::frame_encoder::FrameEncoder;
use crate::remote::domain::transport::Transport;
use crate::shared::config::SkillConfig;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("failed to spawn control loop thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("control loop is shut down")]
    Closed,
}

/// Why an iteration was cut short. The loop logs it and carries on.
#[derive(Error, Debug)]
pub enum IterationError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("detection failed: {0}")]
    Detection(#[from] DetectionError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    pub faces: usize,
    pub height: f64,
    pub telemetry_sent: bool,
}

/// Shared handles to everything one iteration touches.
///
/// The frame source and detector need `&mut` access and sit behind mutexes so
/// the same instances survive loop restarts. A panic inside either one
/// poisons its mutex; later users recover the guard and carry on.
#[derive(Clone)]
pub struct Collaborators {
    pub frame_source: Arc<Mutex<Box<dyn FrameSource>>>,
    pub detector: Arc<Mutex<Box<dyn FaceDetector>>>,
    pub encoder: Arc<dyn FrameEncoder>,
    pub transport: Arc<dyn Transport>,
    pub actuator: Arc<dyn Actuator>,
}

impl Collaborators {
    pub fn new(
        frame_source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        encoder: Arc<dyn FrameEncoder>,
        transport: Arc<dyn Transport>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            frame_source: Arc::new(Mutex::new(frame_source)),
            detector: Arc::new(Mutex::new(detector)),
            encoder,
            transport,
            actuator,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub stance: StanceMapping,
    /// Pause after a skipped iteration so a dead camera does not spin.
    pub failure_backoff: Duration,
    pub progress_every: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from(&SkillConfig::default())
    }
}

impl From<&SkillConfig> for LoopConfig {
    fn from(config: &SkillConfig) -> Self {
        Self {
            stance: StanceMapping::new(config.stance_scale),
            failure_backoff: config.failure_backoff(),
            progress_every: config.progress_every,
        }
    }
}

pub type LoggerFactory = Box<dyn Fn(&LoopConfig) -> Box<dyn LoopLogger> + Send + Sync>;

/// Runs capture, transmit, detect and actuate on a background thread until
/// stopped.
///
/// `start` and `stop` never block and may be called from any thread in any
/// order; the [`ControlSignal`] guarantees at most one iteration thread.
/// Cancellation is observed between iterations, so an iteration in flight
/// always finishes.
pub struct ControlLoop {
    signal: Arc<ControlSignal>,
    collaborators: Collaborators,
    config: LoopConfig,
    logger_factory: LoggerFactory,
    threads: Mutex<Threads>,
}

/// Iteration threads spawned so far, and whether new ones are refused.
#[derive(Default)]
struct Threads {
    handles: Vec<JoinHandle<()>>,
    closed: bool,
}

impl ControlLoop {
    pub fn new(collaborators: Collaborators, config: LoopConfig) -> Self {
        Self {
            signal: Arc::new(ControlSignal::new()),
            collaborators,
            config,
            logger_factory: Box::new(|config: &LoopConfig| {
                Box::new(StatsLoopLogger::new(config.progress_every)) as Box<dyn LoopLogger>
            }),
            threads: Mutex::new(Threads::default()),
        }
    }

    /// Replaces the logger built for each new iteration thread.
    pub fn with_logger_factory(mut self, factory: LoggerFactory) -> Self {
        self.logger_factory = factory;
        self
    }

    pub fn state(&self) -> LoopState {
        self.signal.state()
    }

    /// Fails with [`ControlError::Closed`] once [`ControlLoop::shutdown`] has
    /// run.
    pub fn start(&self) -> Result<StartOutcome, ControlError> {
        let outcome = self.signal.try_begin();
        match outcome {
            StartOutcome::Started => {}
            StartOutcome::Resumed => {
                if self.lock_threads().closed {
                    self.signal.request_stop();
                    return Err(ControlError::Closed);
                }
                log::info!("Pending stop revoked, control loop keeps running");
                return Ok(outcome);
            }
            StartOutcome::AlreadyRunning => {
                log::info!("Control loop already running, start ignored");
                return Ok(outcome);
            }
        }

        // Spawning under the lock keeps shutdown from missing this thread.
        let mut threads = self.lock_threads();
        if threads.closed {
            self.signal.reset();
            return Err(ControlError::Closed);
        }

        let worker = Worker {
            signal: self.signal.clone(),
            collaborators: self.collaborators.clone(),
            config: self.config.clone(),
            logger: (self.logger_factory)(&self.config),
        };
        let handle = thread::Builder::new()
            .name("control-loop".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.signal.reset();
                ControlError::Spawn(e)
            })?;

        // Threads from earlier runs have released the signal; drop the ones
        // that are done so restarts do not accumulate handles.
        let (finished, live): (Vec<_>, Vec<_>) = threads
            .handles
            .drain(..)
            .partition(JoinHandle::is_finished);
        threads.handles = live;
        threads.handles.push(handle);
        drop(threads);
        finished.into_iter().for_each(reap);
        Ok(outcome)
    }

    pub fn stop(&self) -> StopOutcome {
        let outcome = self.signal.request_stop();
        match outcome {
            StopOutcome::Stopping => log::info!("Stopping control loop"),
            StopOutcome::AlreadyStopping => log::debug!("Control loop already stopping"),
            StopOutcome::NotRunning => log::info!("Control loop not running, stop ignored"),
        }
        outcome
    }

    /// Waits for every iteration thread spawned so far to exit. Blocks
    /// forever if the loop is running and nobody stops it, so call
    /// [`ControlLoop::stop`] first.
    pub fn join(&self) {
        let handles = std::mem::take(&mut self.lock_threads().handles);
        handles.into_iter().for_each(reap);
    }

    /// Stops the loop for good and waits for its thread. Every later
    /// [`ControlLoop::start`] is refused.
    pub fn shutdown(&self) {
        let handles = {
            let mut threads = self.lock_threads();
            threads.closed = true;
            std::mem::take(&mut threads.handles)
        };
        self.stop();
        handles.into_iter().for_each(reap);
    }

    fn lock_threads(&self) -> MutexGuard<'_, Threads> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reap(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        log::error!("Control loop thread panicked");
    }
}

struct Worker {
    signal: Arc<ControlSignal>,
    collaborators: Collaborators,
    config: LoopConfig,
    logger: Box<dyn LoopLogger>,
}

/// Hands the signal back if the iteration thread unwinds, so a panicking
/// collaborator cannot leave the loop reported as running with no thread.
struct ReleaseOnPanic(Arc<ControlSignal>);

impl Drop for ReleaseOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("Control loop iteration panicked, loop released");
            self.0.release();
        }
    }
}

impl Worker {
    fn run(mut self) {
        let _release = ReleaseOnPanic(self.signal.clone());
        self.logger.info("Control loop started");
        let mut completed = 0u64;
        let mut skipped = 0u64;

        while self.signal.should_continue() {
            match run_iteration(
                &self.collaborators,
                &self.config.stance,
                self.logger.as_mut(),
            ) {
                Ok(report) => {
                    completed += 1;
                    log::trace!(
                        "Iteration {completed}: {} faces, height {:.1}, telemetry {}",
                        report.faces,
                        report.height,
                        if report.telemetry_sent { "sent" } else { "dropped" }
                    );
                    self.logger.iteration(completed);
                }
                Err(e) => {
                    skipped += 1;
                    log::warn!("Iteration skipped: {e}");
                    thread::sleep(self.config.failure_backoff);
                }
            }
        }

        self.logger.summary();
        self.logger.info(&format!(
            "Control loop stopped ({completed} iterations, {skipped} skipped)"
        ));
    }
}

/// One pass of capture, transmit, detect, actuate.
///
/// Telemetry is fire-and-forget: encode and transport failures are logged and
/// the iteration goes on. A capture failure aborts before anything is sent; a
/// detection failure aborts before actuation. Actuator failures are logged
/// and do not fail the iteration.
pub fn run_iteration(
    collaborators: &Collaborators,
    stance: &StanceMapping,
    logger: &mut dyn LoopLogger,
) -> Result<IterationReport, IterationError> {
    let t = Instant::now();
    let frame = collaborators
        .frame_source
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .snapshot()?;
    logger.timing("capture", elapsed_ms(t));

    let t = Instant::now();
    let telemetry_sent = match collaborators.encoder.encode(&frame) {
        Ok(payload) => match collaborators.transport.send(payload) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Telemetry for frame {} not sent: {e}", frame.sequence());
                false
            }
        },
        Err(e) => {
            log::warn!("Telemetry encode failed for frame {}: {e}", frame.sequence());
            false
        }
    };
    logger.timing("encode", elapsed_ms(t));

    let t = Instant::now();
    let detections = collaborators
        .detector
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .detect(&frame)?;
    logger.timing("detect", elapsed_ms(t));

    let faces = detections.count();
    logger.metric("faces", faces as f64);

    let height = stance.height_for(faces);
    let t = Instant::now();
    if let Err(e) = collaborators.actuator.stand_with_height(height) {
        log::warn!("Stance command failed: {e}");
    }
    logger.timing("actuate", elapsed_ms(t));

    Ok(IterationReport {
        faces,
        height,
        telemetry_sent,
    })
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
