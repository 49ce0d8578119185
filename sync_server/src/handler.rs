//! Inbound message handling.
//!
//! Nothing a client sends can take the server down: every failure here is
//! returned to the connection loop, logged there and the message dropped.

use sync_shared::{
    error::{SyncError, SyncResult},
    protocol::{decode, KeyCode, Message},
    world::ParticipantId,
};
use tracing::{debug, warn};

use crate::{broadcast::broadcast_world, hub::Hub};

impl Hub {
    /// Applies one raw payload received on `from`'s connection.
    ///
    /// State is only touched after the payload decodes and validates; a
    /// rejected message leaves the registry as it was and broadcasts nothing.
    pub async fn on_message(&self, from: ParticipantId, payload: &[u8]) -> SyncResult<()> {
        match decode(payload)? {
            Message::PressKey { id, code } => self.press_key(from, id, &code).await,
            other => Err(SyncError::protocol(format!(
                "unexpected {} message from a client",
                other.kind()
            ))),
        }
    }

    async fn press_key(&self, from: ParticipantId, id: ParticipantId, code: &str) -> SyncResult<()> {
        let mut state = self.lock().await;
        if !state.registry.contains(id) {
            return Err(SyncError::UnknownParticipant(id));
        }
        let key = KeyCode::from_code(code)
            .ok_or_else(|| SyncError::UnrecognizedInput(code.to_string()))?;
        if id != from {
            warn!(%from, claimed = %id, "press_key for another participant");
        }

        let (dx, dy) = key.delta();
        state.registry.apply_movement(id, dx, dy)?;
        broadcast_world(&state.registry)?;
        debug!(participant = %id, code, "Applied input");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use sync_shared::world::ParticipantState;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    async fn join(hub: &Hub) -> (ParticipantId, UnboundedReceiver<Bytes>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.on_connect(tx).await.unwrap();
        while rx.try_recv().is_ok() {}
        (id, rx)
    }

    fn press(id: ParticipantId, code: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({"type": "press_key", "id": id.0, "code": code}))
            .unwrap()
    }

    async fn position(hub: &Hub, id: ParticipantId) -> (i32, i32) {
        hub.snapshot().await[&id].position()
    }

    #[tokio::test]
    async fn arrows_move_by_three() {
        let hub = Hub::new();
        let (_, _) = join(&hub).await;
        let (p, _rx) = join(&hub).await;
        assert_eq!(position(&hub, p).await, (10, 10));

        let cases = [
            ("ArrowUp", (10, 13)),
            ("ArrowRight", (13, 13)),
            ("ArrowDown", (13, 10)),
            ("ArrowLeft", (10, 10)),
        ];
        for (code, expected) in cases {
            hub.on_message(p, &press(p, code)).await.unwrap();
            assert_eq!(position(&hub, p).await, expected, "after {code}");
        }
    }

    #[tokio::test]
    async fn accepted_input_is_broadcast_to_everyone() {
        let hub = Hub::new();
        let (a, mut rx_a) = join(&hub).await;
        let (b, mut rx_b) = join(&hub).await;
        while rx_a.try_recv().is_ok() {}

        hub.on_message(a, &press(a, "ArrowRight")).await.unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let clients = match decode(&rx.try_recv().unwrap()).unwrap() {
                Message::Update { clients } => clients,
                other => panic!("expected update, got {other:?}"),
            };
            assert_eq!(clients[&a], ParticipantState::new(a, (3, 0)));
            assert_eq!(clients[&b], ParticipantState::new(b, (10, 10)));
        }
    }

    #[tokio::test]
    async fn bad_messages_change_nothing() {
        let hub = Hub::new();
        let (a, mut rx_a) = join(&hub).await;
        let (b, _rx_b) = join(&hub).await;
        while rx_a.try_recv().is_ok() {}
        let before = hub.snapshot().await;

        let garbage: [&[u8]; 4] = [
            b"{{{",
            br#"{"type":"jump","id":0}"#,
            br#"{"type":"update","clients":{}}"#,
            br#"{"type":"welcome","id":0,"clients":{}}"#,
        ];
        for raw in garbage {
            let err = hub.on_message(a, raw).await.unwrap_err();
            assert!(matches!(err, SyncError::Protocol(_)), "{err:?}");
        }

        let err = hub.on_message(a, &press(ParticipantId(42), "ArrowUp")).await.unwrap_err();
        assert!(matches!(err, SyncError::UnknownParticipant(ParticipantId(42))));

        let err = hub.on_message(a, &press(a, "Space")).await.unwrap_err();
        assert!(matches!(err, SyncError::UnrecognizedInput(ref c) if c == "Space"));

        assert_eq!(hub.snapshot().await, before);
        assert!(rx_a.try_recv().is_err(), "rejected input must not broadcast");

        hub.on_message(b, &press(b, "ArrowDown")).await.unwrap();
        assert_eq!(position(&hub, b).await, (10, 7));
    }

    #[tokio::test]
    async fn quoted_id_is_rejected_without_moving_anyone() {
        let hub = Hub::new();
        let (a, mut rx_a) = join(&hub).await;
        let before = hub.snapshot().await;

        let raw = br#"{"type":"press_key","id":"0","code":"ArrowUp"}"#;
        let err = hub.on_message(a, raw).await.unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)), "{err:?}");

        assert_eq!(hub.snapshot().await, before);
        assert_eq!(position(&hub, a).await, (0, 0));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_id_does_not_create_a_participant() {
        let hub = Hub::new();
        let (a, _rx) = join(&hub).await;
        let _ = hub.on_message(a, &press(ParticipantId(5), "ArrowUp")).await;
        assert_eq!(hub.participant_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_input_loses_no_updates() {
        let hub = Arc::new(Hub::new());
        let mut ids = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..4 {
            let (id, rx) = join(&hub).await;
            ids.push(id);
            receivers.push(rx);
        }
        for rx in &mut receivers {
            while rx.try_recv().is_ok() {}
        }

        let mut tasks = Vec::new();
        for &id in &ids {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    hub.on_message(id, &press(id, "ArrowRight")).await.unwrap();
                    hub.on_message(id, &press(id, "ArrowUp")).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let world = hub.snapshot().await;
        for id in ids {
            let c = (id.0 as i32 * 10) % 100;
            assert_eq!(world[&id].position(), (c + 150, c + 150));
        }

        // Every participant saw one update per accepted input, and the last
        // one matches the final world.
        for mut rx in receivers {
            let mut count = 0;
            let mut last = None;
            while let Ok(payload) = rx.try_recv() {
                count += 1;
                last = Some(payload);
            }
            assert_eq!(count, 4 * 100);
            let Message::Update { clients } = decode(&last.unwrap()).unwrap() else {
                panic!("expected update");
            };
            assert_eq!(clients, world);
        }
    }
}
