//! Commands that entities dispatch to a game, plus their typed payloads.

use crate::game::errors::GameError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Everything a commander can ask a game to do. A commander is either the
/// system (whichever part of the app instantiated the game), the host, or a
/// player; the prefix says which role a command expects.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameCommandType {
    /// Broadcast the current game state to the given recipients, or to
    /// everyone when the recipient list is empty.
    SystemBroadcastState,
    /// Terminate the game and tear down all of its resources. Disposed games
    /// never process another command.
    SystemDispose,
    /// Probe the host's event stream to make sure they are still connected.
    SystemCheckHostConnection,

    HostStartGame,
    HostTerminateGame,
    HostBanPlayer,
    HostSuspendPlayer,
    HostRequestBall,
    HostSyncBall,
    HostAcknowledgeBingoCall,
    HostStartTiebreakerRound,
    /// Acknowledge a successful bingo call from one or more players. Allowed
    /// during the confirming and tiebreaker phases; during a tiebreaker it
    /// settles the round without any further ball calls. A generous host may
    /// award several players at once.
    HostAwardsPlayers,
    HostTransferStatus,
    HostChangeName,

    PlayerDaub,
    PlayerUndoDaub,
    PlayerCallBingo,
    PlayerRescindBingo,
    PlayerReplaceCards,
    PlayerChangeName,
}

impl fmt::Display for GameCommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::SystemBroadcastState => "system_broadcast_state",
            Self::SystemDispose => "system_dispose",
            Self::SystemCheckHostConnection => "system_check_host_connection",
            Self::HostStartGame => "host_start_game",
            Self::HostTerminateGame => "host_terminate_game",
            Self::HostBanPlayer => "host_ban_player",
            Self::HostSuspendPlayer => "host_suspend_player",
            Self::HostRequestBall => "host_request_ball",
            Self::HostSyncBall => "host_sync_ball",
            Self::HostAcknowledgeBingoCall => "host_acknowledge_bingo_call",
            Self::HostStartTiebreakerRound => "host_start_tiebreaker_round",
            Self::HostAwardsPlayers => "host_awards_players",
            Self::HostTransferStatus => "host_transfer_status",
            Self::HostChangeName => "host_change_name",
            Self::PlayerDaub => "player_daub",
            Self::PlayerUndoDaub => "player_undo_daub",
            Self::PlayerCallBingo => "player_call_bingo",
            Self::PlayerRescindBingo => "player_rescind_bingo",
            Self::PlayerReplaceCards => "player_replace_cards",
            Self::PlayerChangeName => "player_change_name",
        };
        write!(f, "{repr}")
    }
}

/// An instruction dispatched directly and synchronously to a game.
///
/// The payload is an arbitrary JSON object; each command type that needs one
/// has an accompanying payload struct, and parsing is deferred to the
/// handler so malformed input surfaces as a validation error rather than a
/// transport failure.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameCommand {
    #[serde(rename = "type")]
    pub command_type: GameCommandType,
    #[serde(rename = "commanderId")]
    pub commander_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl GameCommand {
    pub fn new(command_type: GameCommandType, commander_id: Uuid) -> Self {
        Self {
            command_type,
            commander_id,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Parses the payload into a command-specific struct. Missing or
    /// type-mismatched payloads become input-validation errors; this never
    /// panics on malformed input.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, GameError> {
        let payload = self.payload.clone().ok_or_else(|| {
            GameError::InputValidation(format!(
                "command {} requires a payload",
                self.command_type
            ))
        })?;
        serde_json::from_value(payload).map_err(|err| {
            GameError::InputValidation(format!(
                "malformed payload for {}: {err}",
                self.command_type
            ))
        })
    }
}

/// Payload for [`GameCommandType::SystemBroadcastState`]. An empty recipient
/// list broadcasts to every subscriber.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BroadcastStatePayload {
    #[serde(default, rename = "recipientIds")]
    pub recipient_ids: Vec<Uuid>,
}

/// Payload for [`GameCommandType::PlayerDaub`] and
/// [`GameCommandType::PlayerUndoDaub`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DaubPayload {
    #[serde(rename = "cardId")]
    pub card_id: Uuid,
    pub value: i64,
}

/// Payload for [`GameCommandType::HostSyncBall`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SyncBallPayload {
    pub value: i64,
}

/// Payload for [`GameCommandType::HostAwardsPlayers`]. Must name at least
/// one player.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AwardsPlayersPayload {
    #[serde(rename = "playerIds")]
    pub player_ids: Vec<Uuid>,
}

/// Payload for the host commands that target a single player: ban, suspend,
/// and host-status transfer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TargetPlayerPayload {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
}

/// Payload for [`GameCommandType::HostChangeName`] and
/// [`GameCommandType::PlayerChangeName`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChangeNamePayload {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_shape() {
        let commander = Uuid::new_v4();
        let card = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"player_daub","commanderId":"{commander}","payload":{{"cardId":"{card}","value":17}}}}"#
        );

        let command: GameCommand = serde_json::from_str(&raw).unwrap();
        assert_eq!(command.command_type, GameCommandType::PlayerDaub);
        assert_eq!(command.commander_id, commander);

        let payload: DaubPayload = command.parse_payload().unwrap();
        assert_eq!(payload.card_id, card);
        assert_eq!(payload.value, 17);
    }

    #[test]
    fn test_payload_is_optional_on_the_wire() {
        let commander = Uuid::new_v4();
        let raw = format!(r#"{{"type":"host_start_game","commanderId":"{commander}"}}"#);
        let command: GameCommand = serde_json::from_str(&raw).unwrap();
        assert!(command.payload.is_none());

        let json = serde_json::to_string(&command).unwrap();
        assert!(!json.contains("payload"));
    }

    #[test]
    fn test_missing_payload_is_input_validation() {
        let command = GameCommand::new(GameCommandType::PlayerDaub, Uuid::new_v4());
        let err = command.parse_payload::<DaubPayload>().unwrap_err();
        assert!(matches!(err, GameError::InputValidation(_)));
    }

    #[test]
    fn test_type_mismatched_payload_is_input_validation() {
        let command = GameCommand::new(GameCommandType::PlayerDaub, Uuid::new_v4())
            .with_payload(json!({"cardId": "not-a-uuid", "value": "seventeen"}));
        let err = command.parse_payload::<DaubPayload>().unwrap_err();
        assert!(matches!(err, GameError::InputValidation(_)));
    }

    #[test]
    fn test_all_command_names_round_trip() {
        for raw in [
            "system_broadcast_state",
            "system_dispose",
            "system_check_host_connection",
            "host_start_game",
            "host_terminate_game",
            "host_ban_player",
            "host_suspend_player",
            "host_request_ball",
            "host_sync_ball",
            "host_acknowledge_bingo_call",
            "host_start_tiebreaker_round",
            "host_awards_players",
            "host_transfer_status",
            "host_change_name",
            "player_daub",
            "player_undo_daub",
            "player_call_bingo",
            "player_rescind_bingo",
            "player_replace_cards",
            "player_change_name",
        ] {
            let quoted = format!("\"{raw}\"");
            let parsed: GameCommandType = serde_json::from_str(&quoted).unwrap();
            assert_eq!(parsed.to_string(), raw);
            assert_eq!(serde_json::to_string(&parsed).unwrap(), quoted);
        }
    }

    #[test]
    fn test_broadcast_payload_defaults_to_everyone() {
        let payload: BroadcastStatePayload = serde_json::from_str("{}").unwrap();
        assert!(payload.recipient_ids.is_empty());
    }
}
