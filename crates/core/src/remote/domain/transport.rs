use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransportError {
    #[error("outbound queue full, payload dropped")]
    Backpressure,
    #[error("no consumer for outbound payloads")]
    Disconnected,
}

/// One-way text channel to the remote peer.
///
/// `send` must not block: telemetry is best effort and the caller never waits
/// on network conditions.
pub trait Transport: Send + Sync {
    fn send(&self, payload: String) -> Result<(), TransportError>;
}
