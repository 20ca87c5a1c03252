//! Game events delivered to subscribers.

use crate::game::entities::GamePhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an event carries a routine update or reports a failure back to
/// its commander.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameEventType {
    Update,
    Error,
}

/// Something that happened in the game, either an automatic update or the
/// outcome of a commander's action.
///
/// Events are value-copied to every matching subscriber. A nil `id` and a
/// missing timestamp are backfilled by the subscriptions manager at dispatch
/// time, so handlers only fill in what they care about.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameEvent {
    #[serde(default)]
    pub id: Uuid,
    #[serde(rename = "createdById")]
    pub created_by_id: Uuid,
    pub phase: GamePhase,
    #[serde(rename = "event_type")]
    pub event_type: GameEventType,
    #[serde(rename = "creation_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    pub message: String,
    /// An empty recipient list means the event is broadcast to all players.
    #[serde(rename = "recipient_player_ids", default)]
    pub recipient_player_ids: Vec<Uuid>,
}

impl GameEvent {
    /// A routine update. Leave `recipients` empty to broadcast.
    pub fn update(
        created_by_id: Uuid,
        phase: GamePhase,
        message: impl Into<String>,
        recipients: Vec<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            created_by_id,
            phase,
            event_type: GameEventType::Update,
            created_at: None,
            message: message.into(),
            recipient_player_ids: recipients,
        }
    }

    /// A failure report, usually narrowed to the commander who caused it.
    pub fn error(
        created_by_id: Uuid,
        phase: GamePhase,
        message: impl Into<String>,
        recipients: Vec<Uuid>,
    ) -> Self {
        Self {
            event_type: GameEventType::Error,
            ..Self::update(created_by_id, phase, message, recipients)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let id = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let event = GameEvent {
            id,
            created_by_id: creator,
            phase: GamePhase::Calling,
            event_type: GameEventType::Update,
            created_at: Some("2024-05-01T12:00:00Z".parse().unwrap()),
            message: "new ball: 17".to_string(),
            recipient_player_ids: Vec::new(),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], serde_json::json!(id.to_string()));
        assert_eq!(json["createdById"], serde_json::json!(creator.to_string()));
        assert_eq!(json["phase"], "calling");
        assert_eq!(json["event_type"], "update");
        assert_eq!(json["creation_timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(json["recipient_player_ids"], serde_json::json!([]));
    }

    #[test]
    fn test_event_round_trips() {
        let event = GameEvent::error(
            Uuid::new_v4(),
            GamePhase::Tiebreaker,
            "not your turn",
            vec![Uuid::new_v4()],
        );
        let json = serde_json::to_string(&event).unwrap();
        let parsed: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_helpers_leave_backfill_fields_empty() {
        let event = GameEvent::update(Uuid::new_v4(), GamePhase::Calling, "hi", Vec::new());
        assert!(event.id.is_nil());
        assert!(event.created_at.is_none());
    }
}
