//! Connection events.
//!
//! The transport reports everything that happens on one connection as a
//! sequence of these, consumed in order by that connection's handler:
//! exactly one `Connected`, any number of `Message`s, then one `Closed`.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    /// One complete, boundary-preserved payload.
    Message(Bytes),
    /// Peer went away (clean EOF, I/O error or oversized frame).
    Closed,
}

impl ConnectionEvent {
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionEvent::Closed)
    }
}
