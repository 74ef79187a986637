//! Fake collaborators and polling helpers shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::actuation::domain::actuator::{Actuator, ActuatorError};
use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::control::control_loop::Collaborators;
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::remote::domain::frame_encoder::{EncodeError, FrameEncoder};
use crate::remote::domain::transport::{Transport, TransportError};
use crate::shared::frame::Frame;
use crate::shared::region::{DetectionResult, Region};

/// Polls `cond` until it holds, failing the test after five seconds.
pub(crate) fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        thread::sleep(Duration::from_millis(2));
    }
}

#[derive(Default)]
pub(crate) struct SourceProbe {
    started: AtomicBool,
    snapshots: AtomicUsize,
}

impl SourceProbe {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

/// 2x2 black frames with increasing sequence numbers.
pub(crate) struct FakeSource {
    probe: Arc<SourceProbe>,
    available: bool,
    fail_start: bool,
    failures_left: usize,
    sequence: u64,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(SourceProbe::default()),
            available: true,
            fail_start: false,
            failures_left: 0,
            sequence: 0,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// The first `n` snapshots fail.
    pub fn failing_snapshots(mut self, n: usize) -> Self {
        self.failures_left = n;
        self
    }

    pub fn probe(&self) -> Arc<SourceProbe> {
        self.probe.clone()
    }
}

impl FrameSource for FakeSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::Backend("device busy".to_string()));
        }
        self.probe.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Frame, CaptureError> {
        self.probe.snapshots.fetch_add(1, Ordering::SeqCst);
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(CaptureError::Backend("lens covered".to_string()));
        }
        self.sequence += 1;
        Ok(Frame::new(vec![0; 2 * 2 * 3], 2, 2, 3, self.sequence))
    }
}

/// Returns face counts from a script, cycling when it runs out.
pub(crate) struct ScriptedDetector {
    counts: Vec<usize>,
    calls: usize,
    fail: bool,
    panic_next: bool,
}

impl ScriptedDetector {
    pub fn new(counts: Vec<usize>) -> Self {
        Self {
            counts,
            calls: 0,
            fail: false,
            panic_next: false,
        }
    }

    /// The first call panics, later calls follow the script.
    pub fn panicking_once(mut self) -> Self {
        self.panic_next = true;
        self
    }

    pub fn failing() -> Self {
        Self {
            counts: vec![0],
            calls: 0,
            fail: true,
            panic_next: false,
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult, DetectionError> {
        if std::mem::take(&mut self.panic_next) {
            panic!("detector blew up");
        }
        if self.fail {
            return Err(DetectionError::Inference("session lost".to_string()));
        }
        let count = self.counts[self.calls % self.counts.len()];
        self.calls += 1;
        let regions = (0..count)
            .map(|i| Region {
                x: i as i32 * 10,
                y: 0,
                width: 8,
                height: 8,
                score: 0.9,
            })
            .collect::<Vec<_>>();
        Ok(DetectionResult::from(regions))
    }
}

/// Encodes a frame as `frame-<sequence>`.
pub(crate) struct TagEncoder;

impl FrameEncoder for TagEncoder {
    fn encode(&self, frame: &Frame) -> Result<String, EncodeError> {
        Ok(format!("frame-{}", frame.sequence()))
    }
}

pub(crate) struct FailingEncoder;

impl FrameEncoder for FailingEncoder {
    fn encode(&self, _frame: &Frame) -> Result<String, EncodeError> {
        Err(EncodeError::UnsupportedChannels(9))
    }
}

#[derive(Default)]
pub(crate) struct RecordingTransport {
    payloads: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, payload: String) -> Result<(), TransportError> {
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

/// Records commanded heights and how many commands overlapped.
#[derive(Default)]
pub(crate) struct RecordingActuator {
    heights: Mutex<Vec<f64>>,
    started: AtomicBool,
    closed: AtomicBool,
    fail_start: bool,
    fail_commands: bool,
    panic_next: AtomicBool,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    /// The first stance command panics.
    pub fn panicking_once(self) -> Self {
        self.panic_next.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn heights(&self) -> Vec<f64> {
        self.heights.lock().unwrap().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Actuator for RecordingActuator {
    fn start(&self) -> Result<(), ActuatorError> {
        if self.fail_start {
            return Err(ActuatorError::Unavailable("no body attached".to_string()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stand_with_height(&self, height: f64) -> Result<(), ActuatorError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("servo driver crashed");
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_commands {
            return Err(ActuatorError::Command("servo fault".to_string()));
        }
        self.heights.lock().unwrap().push(height);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Collaborators wired to fakes, with typed handles kept for assertions.
pub(crate) struct Fixture {
    pub collaborators: Collaborators,
    pub source: Arc<SourceProbe>,
    pub transport: Arc<RecordingTransport>,
    pub actuator: Arc<RecordingActuator>,
}

impl Fixture {
    pub fn new(
        source: FakeSource,
        detector: ScriptedDetector,
        actuator: RecordingActuator,
    ) -> Self {
        Self::build(source, detector, Arc::new(TagEncoder), actuator)
    }

    pub fn with_failing_encoder(
        source: FakeSource,
        detector: ScriptedDetector,
        actuator: RecordingActuator,
    ) -> Self {
        Self::build(source, detector, Arc::new(FailingEncoder), actuator)
    }

    fn build(
        source: FakeSource,
        detector: ScriptedDetector,
        encoder: Arc<dyn FrameEncoder>,
        actuator: RecordingActuator,
    ) -> Self {
        let probe = source.probe();
        let transport = Arc::new(RecordingTransport::default());
        let actuator = Arc::new(actuator);
        let collaborators = Collaborators::new(
            Box::new(source),
            Box::new(detector),
            encoder,
            transport.clone(),
            actuator.clone(),
        );
        Self {
            collaborators,
            source: probe,
            transport,
            actuator,
        }
    }
}
