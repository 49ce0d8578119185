//! Participant registry.
//!
//! The authoritative map of connected participants. It owns each
//! participant's outbound handle but not the connection itself: removing a
//! participant drops the handle, which lets the connection's writer drain
//! and finish.

use std::collections::BTreeMap;

use bytes::Bytes;
use sync_shared::{
    error::{SyncError, SyncResult},
    world::{ParticipantId, ParticipantState, World},
};
use tokio::sync::mpsc;

/// Sender side of a connection's outbound queue. Unbounded, so enqueueing
/// never waits.
pub type Outbound = mpsc::UnboundedSender<Bytes>;

/// Connected participant.
#[derive(Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub x: i32,
    pub y: i32,
    pub channel: Outbound,
}

impl Participant {
    pub fn state(&self) -> ParticipantState {
        ParticipantState {
            id: self.id,
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    participants: BTreeMap<ParticipantId, Participant>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        id: ParticipantId,
        (x, y): (i32, i32),
        channel: Outbound,
    ) -> SyncResult<()> {
        if self.participants.contains_key(&id) {
            return Err(SyncError::DuplicateId(id));
        }
        self.participants.insert(id, Participant { id, x, y, channel });
        Ok(())
    }

    pub fn remove(&mut self, id: ParticipantId) -> SyncResult<Participant> {
        self.participants
            .remove(&id)
            .ok_or(SyncError::UnknownParticipant(id))
    }

    /// Moves an existing participant. Coordinates saturate at the `i32`
    /// bounds.
    pub fn apply_movement(&mut self, id: ParticipantId, dx: i32, dy: i32) -> SyncResult<()> {
        let p = self
            .participants
            .get_mut(&id)
            .ok_or(SyncError::UnknownParticipant(id))?;
        p.x = p.x.saturating_add(dx);
        p.y = p.y.saturating_add(dy);
        Ok(())
    }

    /// Current world, ordered by id.
    pub fn snapshot(&self) -> World {
        self.participants
            .iter()
            .map(|(id, p)| (*id, p.state()))
            .collect()
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }
}
