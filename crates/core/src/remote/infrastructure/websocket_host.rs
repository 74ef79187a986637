use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crossbeam_channel::Receiver;
use thiserror::Error;
use tungstenite::{Message, WebSocket};

use crate::skill::lifecycle::Skill;

/// How long a session blocks on the socket before pumping telemetry again.
const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Telemetry payloads written per poll before reading from the peer again.
const MAX_SEND_BURST: usize = 16;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("listener failed: {0}")]
    Listener(#[source] io::Error),
}

/// WebSocket endpoint for the remote peer.
///
/// Serves one peer at a time. Inbound text frames go to
/// [`Skill::on_recv_string`]; payloads queued on `outgoing` are written back
/// as text frames. The session owns both directions so neither the control
/// loop nor the command handler ever touches the socket.
pub struct WebSocketHost {
    listener: TcpListener,
}

impl WebSocketHost {
    pub fn bind(addr: &str) -> Result<Self, HostError> {
        let listener = TcpListener::bind(addr).map_err(|source| HostError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HostError> {
        self.listener.local_addr().map_err(HostError::Listener)
    }

    /// Accepts peers forever, one session after another.
    pub fn serve(&self, skill: &dyn Skill, outgoing: &Receiver<String>) -> Result<(), HostError> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => handle_connection(stream, skill, outgoing),
                Err(e) => log::warn!("Accept failed: {e}"),
            }
        }
        Ok(())
    }

    /// Accepts a single peer and returns when its session ends.
    pub fn serve_one(
        &self,
        skill: &dyn Skill,
        outgoing: &Receiver<String>,
    ) -> Result<(), HostError> {
        let (stream, _) = self.listener.accept().map_err(HostError::Listener)?;
        handle_connection(stream, skill, outgoing);
        Ok(())
    }
}

fn handle_connection(stream: TcpStream, skill: &dyn Skill, outgoing: &Receiver<String>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown peer".to_string());

    let mut socket = match tungstenite::accept(stream) {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };
    if let Err(e) = socket.get_ref().set_read_timeout(Some(SESSION_POLL_INTERVAL)) {
        log::warn!("Cannot configure socket for {peer}: {e}");
        return;
    }

    log::info!("Remote connected: {peer}");
    let stale = outgoing.try_iter().count();
    if stale > 0 {
        log::debug!("Discarded {stale} telemetry payloads queued before connect");
    }

    skill.on_connect();
    run_session(&mut socket, skill, outgoing);
    let _ = socket.close(None);
    let _ = socket.flush();

    log::info!("Remote disconnected: {peer}");
    skill.on_disconnect();
}

fn run_session(socket: &mut WebSocket<TcpStream>, skill: &dyn Skill, outgoing: &Receiver<String>) {
    loop {
        for payload in outgoing.try_iter().take(MAX_SEND_BURST) {
            if let Err(e) = socket.send(Message::Text(payload)) {
                log::warn!("Telemetry write failed: {e}");
                return;
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => skill.on_recv_string(&text),
            Ok(Message::Close(_)) => return,
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return
            }
            Err(e) => {
                log::warn!("Remote read failed: {e}");
                return;
            }
        }
    }
}
