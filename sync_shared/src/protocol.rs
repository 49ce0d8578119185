//! Wire protocol and message codec.
//!
//! Every message is a JSON object with a mandatory `type` field:
//!
//! | type        | direction          | fields            |
//! |-------------|--------------------|-------------------|
//! | `welcome`   | server -> one      | `id`, `clients`   |
//! | `update`    | server -> all      | `clients`         |
//! | `press_key` | client -> server   | `id`, `code`      |
//!
//! `clients` maps the decimal id string to `{id, x, y}`.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::{
    error::{SyncError, SyncResult},
    world::{ParticipantId, ParticipantState, World},
};

/// Distance one key press moves a participant along its axis.
pub const MOVE_STEP: i32 = 3;

/// High-level message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Sent once to a newly connected participant.
    Welcome {
        id: ParticipantId,
        #[serde(deserialize_with = "clients_by_id")]
        clients: World,
    },
    /// Full-world broadcast after every change.
    Update {
        #[serde(deserialize_with = "clients_by_id")]
        clients: World,
    },
    /// Client input. `code` stays a free-form string so unknown keys decode
    /// and can be rejected as input errors rather than protocol errors.
    PressKey { id: ParticipantId, code: String },
}

// Keys must be the canonical decimal form of their entry's `id`.
fn clients_by_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<World, D::Error> {
    BTreeMap::<String, ParticipantState>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, state)| {
            if key == state.id.to_string() {
                Ok((state.id, state))
            } else {
                Err(de::Error::custom(format!(
                    "clients key {key:?} does not match entry id {}",
                    state.id
                )))
            }
        })
        .collect()
}

impl Message {
    /// Value of the `type` field, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Welcome { .. } => "welcome",
            Message::Update { .. } => "update",
            Message::PressKey { .. } => "press_key",
        }
    }

    pub fn press_key(id: ParticipantId, key: KeyCode) -> Self {
        Message::PressKey {
            id,
            code: key.as_code().to_string(),
        }
    }
}

/// Recognized input codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl KeyCode {
    pub const ALL: [KeyCode; 4] = [
        KeyCode::ArrowUp,
        KeyCode::ArrowDown,
        KeyCode::ArrowLeft,
        KeyCode::ArrowRight,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ArrowUp" => Some(KeyCode::ArrowUp),
            "ArrowDown" => Some(KeyCode::ArrowDown),
            "ArrowLeft" => Some(KeyCode::ArrowLeft),
            "ArrowRight" => Some(KeyCode::ArrowRight),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            KeyCode::ArrowUp => "ArrowUp",
            KeyCode::ArrowDown => "ArrowDown",
            KeyCode::ArrowLeft => "ArrowLeft",
            KeyCode::ArrowRight => "ArrowRight",
        }
    }

    /// Position delta `(dx, dy)`. Up is +y.
    pub fn delta(self) -> (i32, i32) {
        match self {
            KeyCode::ArrowUp => (0, MOVE_STEP),
            KeyCode::ArrowDown => (0, -MOVE_STEP),
            KeyCode::ArrowLeft => (-MOVE_STEP, 0),
            KeyCode::ArrowRight => (MOVE_STEP, 0),
        }
    }
}

pub fn encode(msg: &Message) -> SyncResult<Bytes> {
    serde_json::to_vec(msg)
        .map(Bytes::from)
        .map_err(SyncError::Encode)
}

/// Decodes one payload. Malformed JSON, a missing or unknown `type`, and
/// missing or ill-typed fields all surface as [`SyncError::Protocol`].
pub fn decode(payload: &[u8]) -> SyncResult<Message> {
    serde_json::from_slice(payload).map_err(|e| SyncError::protocol(format!("decode: {e}")))
}
