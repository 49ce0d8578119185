//! Client implementation.
//!
//! The client maintains:
//! - One reliable framed connection to the server
//! - A background reader turning inbound frames into connection events
//! - The session state machine mirroring the server's world
//!
//! A protocol violation from the server ends the session: the connection is
//! shut down and the error is returned to the caller.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use sync_shared::{
    config::SyncConfig,
    error::SyncError,
    event::ConnectionEvent,
    net::{pump_events, FrameWriter, ReliableConn},
    protocol::{encode, KeyCode},
    world::ParticipantId,
};
use tokio::{net::tcp::OwnedWriteHalf, sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::session::ClientSession;

/// Inbound events buffered between the reader task and the session.
const EVENT_QUEUE: usize = 64;

/// High-level sync client.
pub struct SyncClient {
    session: ClientSession,
    writer: FrameWriter<OwnedWriteHalf>,
    events: mpsc::Receiver<ConnectionEvent>,
    reader_task: JoinHandle<()>,
    server: SocketAddr,
    closed: bool,
}

impl SyncClient {
    /// Connects to the server. The session starts out awaiting its welcome.
    pub async fn connect(cfg: &SyncConfig) -> anyhow::Result<Self> {
        let server = cfg.socket_addr()?;
        info!(%server, "Connecting to server");

        let conn = ReliableConn::connect(server, cfg.max_frame_len).await?;
        let (reader, writer) = conn.into_split();
        let (tx, events) = mpsc::channel(EVENT_QUEUE);
        let reader_task = tokio::spawn(pump_events(reader, tx));

        Ok(Self {
            session: ClientSession::new(),
            writer,
            events,
            reader_task,
            server,
            closed: false,
        })
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Waits for the next connection event. Cancel-safe, so it can sit in a
    /// `select!` next to local input.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        self.events.recv().await.unwrap_or(ConnectionEvent::Closed)
    }

    /// Applies one event to the session.
    ///
    /// Returns `Ok(true)` while the session is alive and `Ok(false)` once the
    /// server closed the connection. A protocol violation shuts the
    /// connection down and is returned as the error.
    pub async fn handle_event(&mut self, event: ConnectionEvent) -> anyhow::Result<bool> {
        if self.closed {
            return Ok(false);
        }
        match event {
            ConnectionEvent::Connected => Ok(true),
            ConnectionEvent::Message(payload) => match self.session.handle_payload(&payload) {
                Ok(()) => Ok(true),
                Err(e) => {
                    warn!(error = %e, "Server violated protocol, ending session");
                    self.terminate().await;
                    Err(anyhow::Error::new(e).context("session terminated"))
                }
            },
            ConnectionEvent::Closed => {
                info!("Server closed the connection");
                self.terminate().await;
                Ok(false)
            }
        }
    }

    /// Waits for and applies one event. See [`handle_event`](Self::handle_event).
    pub async fn recv(&mut self) -> anyhow::Result<bool> {
        let event = self.next_event().await;
        self.handle_event(event).await
    }

    /// Processes events until the welcome arrives.
    pub async fn wait_for_welcome(&mut self, timeout: Duration) -> anyhow::Result<ParticipantId> {
        tokio::time::timeout(timeout, async {
            while !self.session.is_active() {
                if !self.recv().await? {
                    anyhow::bail!("connection closed before welcome");
                }
            }
            self.session.own_id().context("active session without id")
        })
        .await
        .context("timed out waiting for welcome")?
    }

    /// Reports a local key press to the server.
    pub async fn press_key(&mut self, key: KeyCode) -> anyhow::Result<()> {
        if self.closed {
            anyhow::bail!("session closed");
        }
        let msg = self.session.press_key(key)?;
        let payload = encode(&msg)?;
        self.writer.send_frame(&payload).await?;
        debug!(code = key.as_code(), "Sent key press");
        Ok(())
    }

    /// Closes the connection from our side.
    pub async fn close(mut self) {
        self.terminate().await;
    }

    async fn terminate(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "Shutdown after close");
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// True if `err` came from a protocol violation by the server.
pub fn is_protocol_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SyncError>()
        .is_some_and(SyncError::is_fatal_for_client)
}
