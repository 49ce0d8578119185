//! Networking primitives.
//!
//! A message-boundary preserving channel over TCP: every payload travels as
//! a 4-byte big-endian length followed by that many bytes. The payload is
//! opaque here; see [`crate::protocol`] for what goes inside.

use std::net::SocketAddr;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::mpsc,
};
use tracing::debug;

use crate::event::ConnectionEvent;

/// Default upper bound on a single frame payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Reads length-prefixed frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            max_frame_len,
        }
    }

    /// Reads the next frame. `Ok(None)` means the peer closed cleanly
    /// between frames.
    pub async fn recv_frame(&mut self) -> anyhow::Result<Option<Bytes>> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("tcp read len"),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        anyhow::ensure!(
            len <= self.max_frame_len,
            "frame of {len} bytes exceeds limit of {}",
            self.max_frame_len
        );
        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .context("tcp read payload")?;
        Ok(Some(Bytes::from(payload)))
    }

    /// Like [`recv_frame`](Self::recv_frame) but folds EOF and errors into
    /// [`ConnectionEvent::Closed`].
    pub async fn next_event(&mut self) -> ConnectionEvent {
        match self.recv_frame().await {
            Ok(Some(payload)) => ConnectionEvent::Message(payload),
            Ok(None) => ConnectionEvent::Closed,
            Err(e) => {
                debug!(error = %e, "Connection read failed");
                ConnectionEvent::Closed
            }
        }
    }
}

/// Writes length-prefixed frames.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send_frame(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        let len = u32::try_from(payload.len()).context("frame too large")?;
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(len);
        buf.extend_from_slice(payload);
        self.inner.write_all(&buf).await.context("tcp write")?;
        Ok(())
    }

    /// Flushes and shuts down the write side.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.inner.shutdown().await.context("tcp shutdown")
    }
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
    max_frame_len: usize,
}

impl ReliableConn {
    pub fn new(stream: TcpStream, max_frame_len: usize) -> Self {
        Self {
            stream,
            max_frame_len,
        }
    }

    pub async fn connect(addr: SocketAddr, max_frame_len: usize) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok(Self::new(stream, max_frame_len))
    }

    /// Splits into independently owned read and write halves so one task can
    /// read while another writes.
    pub fn into_split(self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        let (read, write) = self.stream.into_split();
        (
            FrameReader::new(read, self.max_frame_len),
            FrameWriter::new(write),
        )
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
    max_frame_len: usize,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr, max_frame_len: usize) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self {
            listener,
            max_frame_len,
        })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok((ReliableConn::new(stream, self.max_frame_len), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Forwards every frame from `reader` into `tx` as connection events, ending
/// with a single `Closed`. Returns once the connection closes or nobody is
/// listening any more.
pub async fn pump_events<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    tx: mpsc::Sender<ConnectionEvent>,
) {
    loop {
        let event = reader.next_event().await;
        let closed = event.is_closed();
        if tx.send(event).await.is_err() || closed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_keep_message_boundaries() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a);
        let mut reader = FrameReader::new(b, DEFAULT_MAX_FRAME_LEN);

        writer.send_frame(b"first").await.unwrap();
        writer.send_frame(b"").await.unwrap();
        writer.send_frame(b"third frame").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(reader.recv_frame().await.unwrap().unwrap(), "first");
        assert_eq!(reader.recv_frame().await.unwrap().unwrap(), "");
        assert_eq!(reader.recv_frame().await.unwrap().unwrap(), "third frame");
        assert!(reader.recv_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_closes() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a);
        let mut reader = FrameReader::new(b, 4);

        writer.send_frame(b"too long").await.unwrap();
        assert!(reader.recv_frame().await.is_err());
    }

    #[tokio::test]
    async fn pump_ends_with_closed() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a);
        let (tx, mut rx) = mpsc::channel(8);
        let pump = tokio::spawn(pump_events(FrameReader::new(b, 64), tx));

        writer.send_frame(b"hello").await.unwrap();
        drop(writer);

        assert_eq!(
            rx.recv().await,
            Some(ConnectionEvent::Message(Bytes::from_static(b"hello")))
        );
        assert_eq!(rx.recv().await, Some(ConnectionEvent::Closed));
        pump.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
