use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("actuator unavailable: {0}")]
    Unavailable(String),
    #[error("actuator not started")]
    NotStarted,
    #[error("stance command failed: {0}")]
    Command(String),
}

/// Domain interface for the robot body.
///
/// `stand_with_height` may block until the body acknowledges or its own
/// driver times out; callers do not add a timeout on top.
pub trait Actuator: Send + Sync {
    /// Powers up the body driver. Called once per remote connection.
    fn start(&self) -> Result<(), ActuatorError>;

    /// Holds a standing pose at `height`.
    fn stand_with_height(&self, height: f64) -> Result<(), ActuatorError>;

    /// Releases the body driver.
    fn close(&self);
}
