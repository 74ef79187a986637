use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::remote::domain::transport::{Transport, TransportError};

/// Non-blocking [`Transport`] backed by a bounded queue.
///
/// The consumer end is drained by whatever owns the network connection. When
/// the queue is full the newest payload is dropped and counted.
pub struct ChannelTransport {
    tx: Sender<String>,
    dropped: AtomicU64,
}

impl ChannelTransport {
    /// Creates the transport and the receiver the connection pumps from.
    pub fn bounded(capacity: usize) -> (Self, Receiver<String>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Payloads discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, payload: String) -> Result<(), TransportError> {
        match self.tx.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::Backpressure)
            }
            Err(TrySendError::Disconnected(_)) => Err(TransportError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_arrive_in_order() {
        let (transport, rx) = ChannelTransport::bounded(4);
        transport.send("a".into()).unwrap();
        transport.send("b".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (transport, rx) = ChannelTransport::bounded(2);
        transport.send("1".into()).unwrap();
        transport.send("2".into()).unwrap();
        assert_eq!(
            transport.send("3".into()).unwrap_err(),
            TransportError::Backpressure
        );
        assert_eq!(transport.dropped(), 1);
        assert_eq!(rx.len(), 2);

        rx.try_recv().unwrap();
        transport.send("4".into()).unwrap();
        assert_eq!(transport.dropped(), 1);
    }

    #[test]
    fn test_dropped_receiver_is_disconnected() {
        let (transport, rx) = ChannelTransport::bounded(1);
        drop(rx);
        assert_eq!(
            transport.send("x".into()).unwrap_err(),
            TransportError::Disconnected
        );
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (transport, rx) = ChannelTransport::bounded(0);
        transport.send("only".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "only");
    }
}
