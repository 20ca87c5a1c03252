//! # Bingo Core
//!
//! A stateful, concurrent game engine for American bingo. Many players and
//! one host interact with a single authoritative game instance at the same
//! time; the engine serializes their commands through an actor-style command
//! loop, maintains a phase-based state machine, generates and recycles unique
//! bingo cards, shuffles and dispenses balls, and fans events out to filtered
//! subscribers with bounded concurrency and backpressure.
//!
//! ## Architecture
//!
//! - [`session::BingoGame`] owns a game instance: a command-loop task reads
//!   commands one at a time from a channel, so commands are totally ordered,
//!   while `join_game`, `subscribe`, and teardown interleave safely through
//!   the game's coarse lock.
//! - [`subscriptions::SubscriptionsManager`] delivers events to subscribers
//!   filtered by phase and recipient, spawning up to 100 concurrent delivery
//!   tasks with a two second per-subscriber timeout. Slow subscribers drop
//!   events; they never block the game.
//! - [`game::CardRegistry`] keeps a surplus of unique card layouts ready for
//!   instant checkout and recycles returned cards to players who have never
//!   held them.
//! - [`game::BallRegistry`] dispenses a seeded, shuffled permutation of the
//!   75 bingo balls, one round at a time.
//!
//! The wire transport, room directory, persistence, and authentication are
//! external collaborators; they drive the engine exclusively through the
//! [`session::GameManager`] interface.

/// Command types and their typed wire payloads.
pub mod commands;
/// Game events delivered to subscribers.
pub mod events;
/// Core domain logic: entities, registries, and the phase cell.
pub mod game;
/// The game session: configuration, command loop, and handlers.
pub mod session;
/// Filtered pub/sub fan-out with bounded concurrency.
pub mod subscriptions;

pub use commands::{GameCommand, GameCommandType};
pub use events::{GameEvent, GameEventType};
pub use game::{
    balls::BallRegistry,
    cards::CardRegistry,
    constants,
    entities::{Ball, Card, Cell, GamePhase, GameSnapshot, Player, PlayerStatus},
    errors::GameError,
};
pub use session::{BingoGame, GameConfig, GameManager, LeaveGame};
pub use subscriptions::{EventStream, SubscriptionGuard, SubscriptionsManager};
