//! Shared server state.
//!
//! The registry and the id counter live together behind one lock. Every
//! mutate-then-broadcast sequence (connect, input, close) holds it from the
//! mutation until the broadcast is queued, so each broadcast shows exactly
//! its own event's effect.

use sync_shared::{
    error::{SyncError, SyncResult},
    world::{ParticipantId, World},
};
use tokio::sync::{Mutex, MutexGuard};

use crate::registry::Registry;

#[derive(Debug, Default)]
pub struct HubState {
    pub registry: Registry,
    /// Next id to hand out. Only ever increments.
    pub next_id: ParticipantId,
}

impl HubState {
    /// Hands out the next id. Fails, without advancing, once the counter
    /// cannot move past the id it would return.
    pub fn allocate_id(&mut self) -> SyncResult<ParticipantId> {
        let id = self.next_id;
        self.next_id = id.next().ok_or(SyncError::IdsExhausted)?;
        Ok(id)
    }
}

/// Handle shared by every connection task (wrap in `Arc`).
#[derive(Debug, Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().await
    }

    pub async fn snapshot(&self) -> World {
        self.lock().await.registry.snapshot()
    }

    pub async fn participant_count(&self) -> usize {
        self.lock().await.registry.len()
    }
}
