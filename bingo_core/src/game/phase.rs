//! Concurrency-safe phase cell.

use super::entities::GamePhase;
use super::errors::GameError;
use std::sync::RwLock;

/// Holds the current phase of a game. The phase is read far more often than
/// it is written, hence the reader/writer lock.
///
/// The cell only guards the one rule every caller must respect: terminal
/// phases absorb all writes. Higher-level transition legality belongs to the
/// game's command handlers.
#[derive(Debug)]
pub struct PhaseCell {
    inner: RwLock<GamePhase>,
}

impl PhaseCell {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GamePhase::Initialized),
        }
    }

    pub fn value(&self) -> GamePhase {
        *self.inner.read().unwrap_or_else(|err| err.into_inner())
    }

    /// Whether the game is "generically okay": able to accept new
    /// subscriptions and commands, even if the game state itself has issues.
    pub fn ok(&self) -> bool {
        !self.value().is_terminal()
    }

    /// Writes a new phase. Refuses to transition out of a terminal phase.
    pub fn set(&self, new_value: GamePhase) -> Result<(), GameError> {
        let mut guard = self.inner.write().unwrap_or_else(|err| err.into_inner());
        match *guard {
            GamePhase::GameOver => Err(GameError::Terminated("the game is over")),
            GamePhase::InitializationFailure => {
                Err(GameError::Terminated("the game failed to initialize"))
            }
            _ => {
                *guard = new_value;
                Ok(())
            }
        }
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}
