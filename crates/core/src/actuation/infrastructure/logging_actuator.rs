use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::actuation::domain::actuator::{Actuator, ActuatorError};

/// [`Actuator`] that logs each stance command instead of driving hardware.
///
/// Remembers the last commanded height so a bench run can be inspected.
#[derive(Default)]
pub struct LoggingActuator {
    started: AtomicBool,
    last_height: Mutex<Option<f64>>,
    commands: AtomicU64,
}

impl LoggingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_height(&self) -> Option<f64> {
        self.last_height.lock().ok().and_then(|h| *h)
    }

    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl Actuator for LoggingActuator {
    fn start(&self) -> Result<(), ActuatorError> {
        self.started.store(true, Ordering::Release);
        log::info!("Body started");
        Ok(())
    }

    fn stand_with_height(&self, height: f64) -> Result<(), ActuatorError> {
        if !self.is_started() {
            return Err(ActuatorError::NotStarted);
        }
        if let Ok(mut last) = self.last_height.lock() {
            *last = Some(height);
        }
        self.commands.fetch_add(1, Ordering::Relaxed);
        log::debug!("Stand with height {height:.1}");
        Ok(())
    }

    fn close(&self) {
        if self.started.swap(false, Ordering::AcqRel) {
            log::info!("Body released");
        }
    }
}
