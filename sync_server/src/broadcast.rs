//! Full-world broadcast.
//!
//! Every change is followed by one `update` carrying the whole world. The
//! payload is encoded once and the same bytes are queued for everybody, so
//! applying it is idempotent on the client side.

use sync_shared::{
    error::SyncResult,
    protocol::{encode, Message},
};
use tracing::{debug, trace};

use crate::registry::Registry;

/// Queues the current world on every registered channel. Returns how many
/// channels accepted it; a channel whose connection is already gone is
/// skipped.
pub fn broadcast_world(registry: &Registry) -> SyncResult<usize> {
    let payload = encode(&Message::Update {
        clients: registry.snapshot(),
    })?;

    let mut delivered = 0;
    for p in registry.iter() {
        if p.channel.send(payload.clone()).is_ok() {
            delivered += 1;
        } else {
            debug!(participant = %p.id, "Outbound channel closed, skipping");
        }
    }
    trace!(participants = registry.len(), delivered, "World broadcast");
    Ok(delivered)
}
