//! `sync_client`
//!
//! Client-side systems:
//! - Session state machine mirroring the server's world
//! - Console input mapping to key presses
//! - Framed TCP connection to the server

pub mod client;
pub mod input;
pub mod session;

pub use client::SyncClient;
pub use session::{ClientSession, SessionState};
