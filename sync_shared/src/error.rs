//! Error taxonomy shared by client and server.
//!
//! Server side every variant is recoverable: the offending message is logged
//! and dropped. Client side a `Protocol` error ends the session.

use crate::world::ParticipantId;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Malformed payload, or a message that is illegal for the receiver's
    /// role or current state.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An operation referenced an id that is not in the registry.
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    /// A `press_key` code outside the known arrow set.
    #[error("unrecognized input code {0:?}")]
    UnrecognizedInput(String),

    /// Id allocation handed out an id that is already registered.
    #[error("participant {0} already registered")]
    DuplicateId(ParticipantId),

    /// The id counter reached the top of the id space.
    #[error("participant ids exhausted")]
    IdsExhausted,

    /// Input was emitted before the welcome message arrived.
    #[error("session is not active yet")]
    SessionNotActive,

    #[error("encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl SyncError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        SyncError::Protocol(msg.into())
    }

    /// True for errors that must tear down a client session.
    pub fn is_fatal_for_client(&self) -> bool {
        matches!(self, SyncError::Protocol(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
