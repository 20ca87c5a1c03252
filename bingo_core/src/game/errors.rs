//! Error types for the game engine.

use super::entities::GamePhase;
use thiserror::Error;

/// Errors produced by the game engine. Each variant is a distinct kind that
/// callers can branch on; the display strings are safe to forward to users.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum GameError {
    /// A payload was malformed, referenced an unknown entity, or carried an
    /// out-of-range value.
    #[error("{0}")]
    InputValidation(String),

    /// The commander does not match the role the command requires.
    #[error("{0}")]
    PermissionDenied(String),

    /// The command is only legal in certain phases.
    #[error("command requires phase {expected}, but the game is in {actual}")]
    InvalidPhase {
        expected: &'static str,
        actual: GamePhase,
    },

    /// A finite resource ran out: no balls left, player at their card limit,
    /// or the game is full.
    #[error("{0}")]
    ResourceExhausted(String),

    /// The game or one of its subsystems has already been torn down.
    #[error("{0}")]
    Terminated(&'static str),

    /// Some subscribers missed an event because their send timed out.
    #[error("dispatch failed for {failed}/{total} subscribers")]
    PartialDispatchFailure { failed: usize, total: usize },

    /// The command type is recognized but this implementation does not
    /// support it.
    #[error("command is not supported")]
    CommandNotSupported,

    /// Several independent failures collected from a compound operation,
    /// such as returning every card a departing player held.
    #[error("{0}")]
    Compound(String),
}

impl GameError {
    /// Folds a batch of errors into a single [`GameError::Compound`]. Panics
    /// are never an option here, so an empty batch becomes a generic
    /// compound error rather than a logic error.
    pub fn compound(errors: Vec<GameError>) -> Self {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self::Compound(joined)
    }
}
