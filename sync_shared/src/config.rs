//! Configuration system.
//!
//! Loads configuration from JSON strings/files; command-line flags override
//! individual fields in the binaries.

use std::{net::SocketAddr, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::net::DEFAULT_MAX_FRAME_LEN;

/// Root configuration shared by client/server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Server listen address (server) or address to dial (client),
    /// e.g. `127.0.0.1:40000`.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    /// Largest accepted frame payload in bytes.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

fn default_server_addr() -> String {
    "127.0.0.1:40000".to_string()
}

fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl SyncConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server_addr.parse().context("parse server_addr")
    }

    /// Applies `--config`, `--addr` and `--max-frame-len` flags. Unknown
    /// arguments are ignored.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let args: Vec<String> = args.into_iter().collect();

        let mut cfg = match args.iter().position(|a| a == "--config") {
            Some(i) => {
                let path = args.get(i + 1).context("--config needs a path")?;
                Self::from_json_file(Path::new(path))?
            }
            None => Self::default(),
        };

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--addr" if i + 1 < args.len() => {
                    cfg.server_addr = args[i + 1].clone();
                    i += 2;
                }
                "--max-frame-len" if i + 1 < args.len() => {
                    cfg.max_frame_len = args[i + 1]
                        .parse()
                        .context("parse --max-frame-len")?;
                    i += 2;
                }
                _ => i += 1,
            }
        }
        Ok(cfg)
    }
}
