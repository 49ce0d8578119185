//! `sync_shared`
//!
//! Pieces used by both client and server.
//!
//! - `world`: participant ids and the position-only world snapshot.
//! - `protocol`: JSON messages and the codec.
//! - `net`: length-prefixed frame transport over TCP.
//! - `event`: per-connection event stream.
//! - `error`, `config`.
//! - No `unsafe`.

pub mod config;
pub mod error;
pub mod event;
pub mod net;
pub mod protocol;
pub mod world;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::event::*;
    pub use crate::protocol::*;
    pub use crate::world::*;
}
