//! TCP front end.
//!
//! One task per connection. The task turns its socket into a stream of
//! [`ConnectionEvent`]s and feeds them to the shared [`Hub`]; a second task
//! per connection drains the outbound queue onto the socket.
//!
//! Client misbehavior is logged and dropped here. It never closes the
//! offending connection and never reaches other sessions.

use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use bytes::Bytes;
use sync_shared::{
    config::SyncConfig,
    event::ConnectionEvent,
    net::{FrameWriter, ReliableConn, ReliableListener},
    world::ParticipantId,
};
use tokio::{
    io::AsyncWrite,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{hub::Hub, registry::Outbound};

/// Authoritative sync server.
pub struct SyncServer {
    pub cfg: SyncConfig,
    hub: Arc<Hub>,
    tcp: ReliableListener,
}

impl SyncServer {
    /// Binds the listener described by `cfg`.
    pub async fn bind(cfg: SyncConfig) -> anyhow::Result<Self> {
        let addr = cfg.socket_addr()?;
        let tcp = ReliableListener::bind(addr, cfg.max_frame_len).await?;
        Ok(Self {
            cfg,
            hub: Arc::new(Hub::new()),
            tcp,
        })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn hub(&self) -> Arc<Hub> {
        self.hub.clone()
    }

    /// Accepts exactly one connection and spawns its handler.
    pub async fn accept_one(&self) -> anyhow::Result<JoinHandle<()>> {
        let (conn, peer) = self.tcp.accept().await?;
        debug!(%peer, "Accepted connection");
        Ok(tokio::spawn(serve_connection(self.hub.clone(), conn, peer)))
    }

    /// Accepts connections until `shutdown` resolves. Failed accepts are
    /// logged and do not stop the loop.
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.accept_one() => {
                    if let Err(e) = accepted {
                        warn!(error = %e, "Accept failed");
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting");
                    return Ok(());
                }
            }
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_until(std::future::pending()).await
    }
}

/// Per-connection event handler.
///
/// Owns the connection's identity once assigned. The outbound sender is
/// handed to the registry on connect, so the registry holds the only handle.
pub struct ConnectionHandler {
    hub: Arc<Hub>,
    peer: SocketAddr,
    outbound: Option<Outbound>,
    id: Option<ParticipantId>,
}

impl ConnectionHandler {
    pub fn new(hub: Arc<Hub>, peer: SocketAddr, outbound: Outbound) -> Self {
        Self {
            hub,
            peer,
            outbound: Some(outbound),
            id: None,
        }
    }

    pub fn id(&self) -> Option<ParticipantId> {
        self.id
    }

    pub async fn handle(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                let Some(outbound) = self.outbound.take() else {
                    warn!(peer = %self.peer, "Duplicate connect event");
                    return;
                };
                match self.hub.on_connect(outbound).await {
                    Ok(id) => {
                        info!(participant = %id, peer = %self.peer, "Connection registered");
                        self.id = Some(id);
                    }
                    Err(e) => warn!(peer = %self.peer, error = %e, "Failed to register connection"),
                }
            }
            ConnectionEvent::Message(payload) => {
                let Some(id) = self.id else {
                    debug!(peer = %self.peer, "Message on unregistered connection");
                    return;
                };
                if let Err(e) = self.hub.on_message(id, &payload).await {
                    warn!(participant = %id, error = %e, "Discarding message");
                }
            }
            ConnectionEvent::Closed => {
                if let Some(id) = self.id.take() {
                    if let Err(e) = self.hub.on_close(id).await {
                        warn!(participant = %id, error = %e, "Close handling failed");
                    }
                }
            }
        }
    }
}

/// Drives one accepted connection from connect to close.
pub async fn serve_connection(hub: Arc<Hub>, conn: ReliableConn, peer: SocketAddr) {
    let (mut reader, writer) = conn.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, rx));

    let mut handler = ConnectionHandler::new(hub, peer, tx);
    handler.handle(ConnectionEvent::Connected).await;
    loop {
        let event = reader.next_event().await;
        let closed = event.is_closed();
        handler.handle(event).await;
        if closed {
            break;
        }
    }
    debug!(%peer, "Connection closed");

    if let Err(e) = writer_task.await {
        warn!(%peer, error = %e, "Writer task failed");
    }
}

/// Drains the outbound queue onto the socket. Ends when every sender is
/// gone (the participant left the registry) or the socket fails.
async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(payload) = rx.recv().await {
        if let Err(e) = writer.send_frame(&payload).await {
            debug!(error = %e, "Write failed, dropping outbound queue");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Helper for tests: bind to an ephemeral localhost port.
pub async fn bind_ephemeral() -> anyhow::Result<(SyncServer, SyncConfig)> {
    let cfg = SyncConfig {
        server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).to_string(),
        ..Default::default()
    };
    let server = SyncServer::bind(cfg).await.context("bind ephemeral")?;
    let mut cfg = server.cfg.clone();
    cfg.server_addr = server.local_addr()?.to_string();
    Ok((server, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_shared::protocol::{decode, Message};

    fn peer() -> SocketAddr {
        "127.0.0.1:1".parse().unwrap()
    }

    #[tokio::test]
    async fn handler_walks_connect_message_close() {
        let hub = Arc::new(Hub::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handler = ConnectionHandler::new(hub.clone(), peer(), tx);

        handler.handle(ConnectionEvent::Connected).await;
        let id = handler.id().unwrap();
        assert!(matches!(decode(&rx.recv().await.unwrap()).unwrap(), Message::Welcome { .. }));
        assert!(matches!(decode(&rx.recv().await.unwrap()).unwrap(), Message::Update { .. }));

        handler
            .handle(ConnectionEvent::Message(Bytes::from_static(b"garbage")))
            .await;
        handler
            .handle(ConnectionEvent::Message(Bytes::from(format!(
                r#"{{"type":"press_key","id":{},"code":"ArrowUp"}}"#,
                id.0
            ))))
            .await;
        assert_eq!(hub.snapshot().await[&id].position(), (0, 3));

        handler.handle(ConnectionEvent::Closed).await;
        assert_eq!(hub.participant_count().await, 0);
        assert!(handler.id().is_none());

        // Registry dropped the only sender.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn messages_before_connect_are_ignored() {
        let hub = Arc::new(Hub::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut handler = ConnectionHandler::new(hub.clone(), peer(), tx);
        handler
            .handle(ConnectionEvent::Message(Bytes::from_static(
                br#"{"type":"press_key","id":0,"code":"ArrowUp"}"#,
            )))
            .await;
        handler.handle(ConnectionEvent::Closed).await;
        assert_eq!(hub.participant_count().await, 0);
    }

    #[tokio::test]
    async fn bind_ephemeral_reports_real_port() -> anyhow::Result<()> {
        let (server, cfg) = bind_ephemeral().await?;
        assert_ne!(cfg.socket_addr()?.port(), 0);
        assert_eq!(cfg.socket_addr()?, server.local_addr()?);
        Ok(())
    }
}
