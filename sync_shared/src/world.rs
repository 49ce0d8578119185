//! Participant identity and world snapshot types.
//!
//! The world is nothing but positions: an id-ordered map of `{id, x, y}`.
//! On the wire the map keys are the decimal string form of the id.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Server-assigned participant identity.
///
/// Ids are handed out from a counter starting at 0 and never reused within a
/// process run. On the wire an id is always a JSON integer; the string form
/// only appears as a `clients` map key (see `protocol`).
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl ParticipantId {
    /// The following id, or `None` once the id space is used up.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(ParticipantId)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replicated state of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantState {
    pub id: ParticipantId,
    pub x: i32,
    pub y: i32,
}

impl ParticipantState {
    pub fn new(id: ParticipantId, (x, y): (i32, i32)) -> Self {
        Self { id, x, y }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Full world snapshot, ordered by id.
pub type World = BTreeMap<ParticipantId, ParticipantState>;

/// Builds a world from a list of states, keyed by their own ids.
pub fn world_from<I: IntoIterator<Item = ParticipantState>>(states: I) -> World {
    states.into_iter().map(|s| (s.id, s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_keys_serialize_as_strings() {
        let world = world_from([
            ParticipantState::new(ParticipantId(0), (0, 0)),
            ParticipantState::new(ParticipantId(1), (10, 10)),
        ]);
        let json = serde_json::to_value(&world).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "0": {"id": 0, "x": 0, "y": 0},
                "1": {"id": 1, "x": 10, "y": 10},
            })
        );
    }

    #[test]
    fn id_is_a_plain_integer() {
        let id: ParticipantId = serde_json::from_str("7").unwrap();
        assert_eq!(id, ParticipantId(7));
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }

    #[test]
    fn id_rejects_strings_negatives_and_garbage() {
        assert!(serde_json::from_str::<ParticipantId>("\"7\"").is_err());
        assert!(serde_json::from_str::<ParticipantId>("-1").is_err());
        assert!(serde_json::from_str::<ParticipantId>("\"abc\"").is_err());
        assert!(serde_json::from_str::<ParticipantId>("1.5").is_err());
        assert!(serde_json::from_str::<ParticipantId>("4294967296").is_err());
    }

    #[test]
    fn next_stops_at_the_end_of_the_id_space() {
        assert_eq!(ParticipantId(0).next(), Some(ParticipantId(1)));
        assert_eq!(ParticipantId(u32::MAX - 1).next(), Some(ParticipantId(u32::MAX)));
        assert_eq!(ParticipantId(u32::MAX).next(), None);
    }

    #[test]
    fn world_iterates_in_id_order() {
        let world = world_from([
            ParticipantState::new(ParticipantId(12), (1, 1)),
            ParticipantState::new(ParticipantId(2), (2, 2)),
            ParticipantState::new(ParticipantId(7), (3, 3)),
        ]);
        let ids: Vec<u32> = world.keys().map(|id| id.0).collect();
        assert_eq!(ids, vec![2, 7, 12]);
    }
}
