//! Connection lifecycle: identity assignment on connect, cleanup on close.

use sync_shared::{
    error::SyncResult,
    protocol::{encode, Message},
    world::ParticipantId,
};
use tracing::{debug, info, warn};

use crate::{broadcast::broadcast_world, hub::Hub, registry::Outbound};

/// Deterministic spawn cell for an id. Ids ten apart share a cell.
pub fn spawn_position(id: ParticipantId) -> (i32, i32) {
    let c = ((u64::from(id.0) * 10) % 100) as i32;
    (c, c)
}

impl Hub {
    /// Registers a new connection and returns its id.
    ///
    /// The newcomer gets a `welcome` with a snapshot that already includes
    /// itself, then everybody (newcomer included) gets the usual `update`.
    pub async fn on_connect(&self, channel: Outbound) -> SyncResult<ParticipantId> {
        let mut state = self.lock().await;
        let id = state.allocate_id()?;
        let position = spawn_position(id);
        state.registry.insert(id, position, channel.clone())?;

        let welcome = encode(&Message::Welcome {
            id,
            clients: state.registry.snapshot(),
        })?;
        if channel.send(welcome).is_err() {
            debug!(participant = %id, "Connection gone before welcome");
        }

        broadcast_world(&state.registry)?;
        info!(
            participant = %id,
            x = position.0,
            y = position.1,
            participants = state.registry.len(),
            "Participant joined"
        );
        Ok(id)
    }

    /// Drops a participant and tells the rest. Safe to call twice.
    pub async fn on_close(&self, id: ParticipantId) -> SyncResult<()> {
        let mut state = self.lock().await;
        if let Err(e) = state.registry.remove(id) {
            warn!(participant = %id, error = %e, "Close for participant not in registry");
            return Ok(());
        }
        broadcast_world(&state.registry)?;
        info!(participant = %id, participants = state.registry.len(), "Participant left");
        Ok(())
    }
}
