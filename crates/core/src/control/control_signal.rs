use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    /// Stop requested but not yet observed by the iteration thread.
    Stopping,
}

impl LoopState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            RUNNING => Self::Running,
            STOPPING => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The caller must spawn a new iteration thread.
    Started,
    /// A pending stop was revoked; the existing thread keeps iterating.
    Resumed,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopping,
    AlreadyStopping,
    NotRunning,
}

/// Lock-free run/cancel token shared by the command handler and the
/// iteration thread.
///
/// At most one iteration thread exists per signal: only the `Idle -> Running`
/// transition asks for a spawn, and only the iteration thread itself moves
/// the state back to `Idle`. Every transition is a compare-and-swap, so
/// repeated or out-of-order commands can neither block nor panic.
#[derive(Debug, Default)]
pub struct ControlSignal {
    state: AtomicU8,
}

impl ControlSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn try_begin(&self) -> StartOutcome {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self.transition(IDLE, RUNNING) {
                        return StartOutcome::Started;
                    }
                }
                STOPPING => {
                    if self.transition(STOPPING, RUNNING) {
                        return StartOutcome::Resumed;
                    }
                }
                _ => return StartOutcome::AlreadyRunning,
            }
        }
    }

    pub fn request_stop(&self) -> StopOutcome {
        loop {
            match self.state.load(Ordering::Acquire) {
                RUNNING => {
                    if self.transition(RUNNING, STOPPING) {
                        return StopOutcome::Stopping;
                    }
                }
                STOPPING => return StopOutcome::AlreadyStopping,
                _ => return StopOutcome::NotRunning,
            }
        }
    }

    /// Checked once per iteration by the iteration thread. Returning `false`
    /// means the thread has released the signal and must exit.
    pub fn should_continue(&self) -> bool {
        loop {
            match self.state.load(Ordering::Acquire) {
                RUNNING => return true,
                STOPPING => {
                    if self.transition(STOPPING, IDLE) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Forces the signal back to `Idle` after a thread failed to spawn.
    pub(crate) fn reset(&self) {
        self.state.store(IDLE, Ordering::Release);
    }

    /// Returns a `Running` or `Stopping` signal to `Idle` on behalf of an
    /// iteration thread that is unwinding and will never observe it again.
    pub(crate) fn release(&self) {
        if !self.transition(RUNNING, IDLE) {
            self.transition(STOPPING, IDLE);
        }
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_signal_is_idle() {
        let signal = ControlSignal::new();
        assert_eq!(signal.state(), LoopState::Idle);
        assert!(!signal.should_continue());
    }

    #[test]
    fn test_start_then_second_start_is_rejected() {
        let signal = ControlSignal::new();
        assert_eq!(signal.try_begin(), StartOutcome::Started);
        assert_eq!(signal.try_begin(), StartOutcome::AlreadyRunning);
        assert_eq!(signal.state(), LoopState::Running);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let signal = ControlSignal::new();
        assert_eq!(signal.request_stop(), StopOutcome::NotRunning);
        assert_eq!(signal.request_stop(), StopOutcome::NotRunning);
        assert_eq!(signal.try_begin(), StartOutcome::Started);
    }

    #[test]
    fn test_double_stop_is_absorbed() {
        let signal = ControlSignal::new();
        signal.try_begin();
        assert_eq!(signal.request_stop(), StopOutcome::Stopping);
        assert_eq!(signal.request_stop(), StopOutcome::AlreadyStopping);
        assert!(!signal.should_continue());
        assert_eq!(signal.state(), LoopState::Idle);
        assert_eq!(signal.request_stop(), StopOutcome::NotRunning);
    }

    #[test]
    fn test_start_before_stop_observed_resumes() {
        let signal = ControlSignal::new();
        signal.try_begin();
        signal.request_stop();
        assert_eq!(signal.try_begin(), StartOutcome::Resumed);
        assert!(signal.should_continue());
        assert_eq!(signal.state(), LoopState::Running);
    }

    #[test]
    fn test_stop_observed_then_start_spawns_again() {
        let signal = ControlSignal::new();
        signal.try_begin();
        signal.request_stop();
        assert!(!signal.should_continue());
        assert_eq!(signal.try_begin(), StartOutcome::Started);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let signal = ControlSignal::new();
        signal.try_begin();
        signal.reset();
        assert_eq!(signal.state(), LoopState::Idle);
    }

    #[test]
    fn test_release_frees_running_and_stopping() {
        let signal = ControlSignal::new();
        signal.try_begin();
        signal.release();
        assert_eq!(signal.state(), LoopState::Idle);

        signal.try_begin();
        signal.request_stop();
        signal.release();
        assert_eq!(signal.state(), LoopState::Idle);
        assert_eq!(signal.try_begin(), StartOutcome::Started);
    }

    #[test]
    fn test_concurrent_starts_grant_exactly_one_spawn() {
        let signal = Arc::new(ControlSignal::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.try_begin())
            })
            .collect();
        let started = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == StartOutcome::Started)
            .count();
        assert_eq!(started, 1);
    }
}
