//! Helpers shared by the socket-level tests.
//!
//! [`RawPeer`] speaks the framing but not the session logic, so tests can
//! assert on exact JSON and send payloads a well-behaved client never would.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use serde_json::Value;
use sync_server::{server::bind_ephemeral, Hub};
use sync_shared::{
    config::SyncConfig,
    net::{FrameReader, FrameWriter, ReliableConn},
};
use tokio::{
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    task::JoinHandle,
};

/// How long a test waits for any single expected message.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A server running in the background on an ephemeral port.
pub struct TestServer {
    pub cfg: SyncConfig,
    pub hub: Arc<Hub>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start() -> anyhow::Result<Self> {
        init_tracing();
        let (server, cfg) = bind_ephemeral().await?;
        let hub = server.hub();
        let task = tokio::spawn(async move { server.run().await });
        Ok(Self { cfg, hub, task })
    }

    /// True while the accept loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Framing-level peer with no session logic.
pub struct RawPeer {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
}

impl RawPeer {
    pub async fn connect(cfg: &SyncConfig) -> anyhow::Result<Self> {
        let conn = ReliableConn::connect(cfg.socket_addr()?, cfg.max_frame_len).await?;
        let (reader, writer) = conn.into_split();
        Ok(Self { reader, writer })
    }

    pub async fn send_raw(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        self.writer.send_frame(payload).await
    }

    pub async fn send_json(&mut self, value: &Value) -> anyhow::Result<()> {
        self.send_raw(&serde_json::to_vec(value)?).await
    }

    pub async fn press(&mut self, id: u64, code: &str) -> anyhow::Result<()> {
        self.send_json(&serde_json::json!({"type": "press_key", "id": id, "code": code}))
            .await
    }

    /// Next frame as JSON; `None` once the server closed the connection.
    pub async fn recv_json(&mut self) -> anyhow::Result<Option<Value>> {
        let frame = tokio::time::timeout(STEP_TIMEOUT, self.reader.recv_frame())
            .await
            .context("timed out waiting for a frame")??;
        frame
            .map(|f| serde_json::from_slice(&f).context("server sent invalid JSON"))
            .transpose()
    }

    pub async fn expect_json(&mut self) -> anyhow::Result<Value> {
        self.recv_json()
            .await?
            .context("connection closed while waiting for a frame")
    }

    /// Skips frames until one satisfies `pred`.
    pub async fn expect_matching<F: Fn(&Value) -> bool>(&mut self, pred: F) -> anyhow::Result<Value> {
        loop {
            let v = self.expect_json().await?;
            if pred(&v) {
                return Ok(v);
            }
        }
    }

    /// Reads the welcome and returns the assigned id.
    pub async fn expect_welcome(&mut self) -> anyhow::Result<u64> {
        let v = self.expect_json().await?;
        anyhow::ensure!(v["type"] == "welcome", "expected welcome, got {v}");
        v["id"].as_u64().context("welcome without numeric id")
    }

    /// Skips to the first update whose `clients` has exactly `ids`.
    pub async fn expect_update_with_ids(&mut self, ids: &[u64]) -> anyhow::Result<Value> {
        let want: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.expect_matching(|v| {
            v["type"] == "update"
                && v["clients"]
                    .as_object()
                    .is_some_and(|c| c.keys().cloned().collect::<Vec<_>>() == want)
        })
        .await
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await
    }
}
