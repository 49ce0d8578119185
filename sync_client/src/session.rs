//! Client session state machine.
//!
//! ```text
//! AwaitingWelcome --welcome--> Active --update--> Active
//!        |                       |
//!        +------ anything else --+--> Protocol error (session over)
//! ```
//!
//! The mirror is only ever written by the server: every `update` replaces the
//! world wholesale. Rendering is pull-based; compare [`ClientSession::world_version`]
//! against the last drawn value to know when to redraw.

use sync_shared::{
    error::{SyncError, SyncResult},
    protocol::{decode, KeyCode, Message},
    world::{ParticipantId, ParticipantState, World},
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, identity not known yet.
    AwaitingWelcome,
    /// Welcome received; mirroring updates.
    Active,
}

#[derive(Debug)]
pub struct ClientSession {
    state: SessionState,
    own_id: Option<ParticipantId>,
    world: World,
    world_version: u64,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingWelcome,
            own_id: None,
            world: World::new(),
            world_version: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Id from the welcome message; `None` until then.
    pub fn own_id(&self) -> Option<ParticipantId> {
        self.own_id
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Bumped on every world replacement.
    pub fn world_version(&self) -> u64 {
        self.world_version
    }

    /// This participant's own entry in the mirror.
    pub fn me(&self) -> Option<&ParticipantState> {
        self.own_id.and_then(|id| self.world.get(&id))
    }

    /// Decodes and applies one payload from the server. Any error is a
    /// protocol violation and the session should be torn down.
    pub fn handle_payload(&mut self, payload: &[u8]) -> SyncResult<()> {
        let msg = decode(payload)?;
        self.apply(msg)
    }

    pub fn apply(&mut self, msg: Message) -> SyncResult<()> {
        match (self.state, msg) {
            (SessionState::AwaitingWelcome, Message::Welcome { id, clients }) => {
                debug!(participant = %id, participants = clients.len(), "Welcome received");
                self.own_id = Some(id);
                self.replace_world(clients);
                self.state = SessionState::Active;
                Ok(())
            }
            (SessionState::Active, Message::Update { clients }) => {
                self.replace_world(clients);
                Ok(())
            }
            (state, other) => Err(SyncError::protocol(format!(
                "unexpected {} message while {state:?}",
                other.kind()
            ))),
        }
    }

    /// Builds the outbound `press_key` for a local input event.
    pub fn press_key(&self, key: KeyCode) -> SyncResult<Message> {
        match (self.state, self.own_id) {
            (SessionState::Active, Some(id)) => Ok(Message::press_key(id, key)),
            _ => Err(SyncError::SessionNotActive),
        }
    }

    fn replace_world(&mut self, world: World) {
        self.world = world;
        self.world_version += 1;
    }
}
