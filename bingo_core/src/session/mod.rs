//! The game session: a running bingo game and the interface the transport
//! drives it through.
//!
//! A session pairs shared game state (behind one coarse lock) with a
//! command-loop task that processes commands strictly one at a time. Joins,
//! subscriptions, and teardown run off-loop against the same lock, so they
//! interleave safely with command handlers.

pub mod actor;
pub mod config;
mod handlers;
mod messages;

pub use actor::{BingoGame, LeaveGame};
pub use config::GameConfig;

use crate::commands::GameCommand;
use crate::game::entities::{GamePhase, Player};
use crate::game::errors::GameError;
use crate::subscriptions::{EventStream, SubscriptionGuard};
use async_trait::async_trait;
use uuid::Uuid;

/// A stateful bingo game that accepts direct commander input and lets
/// external systems subscribe to state changes.
///
/// [`BingoGame`] is the engine's implementation; alternates are free to
/// support a subset of commands and answer the rest with
/// [`GameError::CommandNotSupported`].
#[async_trait]
pub trait GameManager: Send + Sync {
    /// Dispatches a command to the game. Commands are validated against the
    /// commander's role and processed in a total order; the call returns
    /// once the command's effects, including event dispatch, are complete.
    ///
    /// This is a low-level primitive; transports should map user input onto
    /// it rather than wiring input through directly.
    async fn issue_command(&self, command: GameCommand) -> Result<(), GameError>;

    /// Adds a user to the game as a card player. The resulting player keeps
    /// the provided ID. Joining twice with the same ID returns the existing
    /// player rather than creating a second roster entry.
    async fn join_game(
        &self,
        player_id: Uuid,
        player_name: &str,
    ) -> Result<(Player, LeaveGame), GameError>;

    /// Subscribes an external system to game events, optionally narrowed to
    /// a set of phases. Subscribing to every phase is just passing an empty
    /// list.
    async fn subscribe(
        &self,
        phases: Vec<GamePhase>,
    ) -> Result<(EventStream, SubscriptionGuard), GameError>;
}
