//! Game configuration.

use crate::game::constants::{DEFAULT_MAX_PLAYERS, DEFAULT_MAX_ROUNDS};
use crate::game::errors::GameError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything a game needs at construction time. The transport picks the
/// seed; the engine holds no global state.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameConfig {
    /// Identity of the system driving this game. System-only commands check
    /// their commander against this ID.
    pub system_id: Uuid,

    /// The hosting user. Hosts issue `host_*` commands and hold no cards.
    pub host_id: Uuid,

    pub host_name: String,

    /// Seed for the ball and card shufflers. The same seed reproduces the
    /// same ball order and card layouts.
    pub rng_seed: u64,

    /// Player capacity (default: 50).
    pub max_players: usize,

    /// Rounds before the game ends naturally (default: 10).
    pub max_rounds: usize,
}

impl GameConfig {
    pub fn new(system_id: Uuid, host_id: Uuid, host_name: &str, rng_seed: u64) -> Self {
        Self {
            system_id,
            host_id,
            host_name: host_name.to_string(),
            rng_seed,
            max_players: DEFAULT_MAX_PLAYERS,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.host_id == self.system_id {
            return Err(GameError::InputValidation(
                "the host ID cannot match the system ID".to_string(),
            ));
        }
        if self.host_name.trim().is_empty() {
            return Err(GameError::InputValidation(
                "the host needs a non-empty name".to_string(),
            ));
        }
        if self.max_players == 0 {
            return Err(GameError::InputValidation(
                "a game needs room for at least one player".to_string(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(GameError::InputValidation(
                "a game needs at least one round".to_string(),
            ));
        }
        Ok(())
    }
}
