//! Game-wide constants.

use std::time::Duration;

/// The minimum number of cards a player is allowed to hold in a game.
pub const MIN_CARDS: usize = 1;

/// The maximum number of cards a player is allowed to hold in a game.
pub const MAX_CARDS: usize = 6;

/// The highest ball value that can be called in an American game of bingo.
pub const MAX_BALL_VALUE: u8 = 75;

/// How many ball values belong to each letter column (B, I, N, G, O).
pub const BALLS_PER_COLUMN: usize = 15;

/// The side length of a bingo card.
pub const CARD_SIZE: usize = 5;

/// Row and column of the free space on every card.
pub const FREE_SPACE_ROW: usize = 2;
pub const FREE_SPACE_COL: usize = 2;

/// The number of cells (value and position both matching) that two cards may
/// have in common while still counting as unique from a gameplay standpoint.
/// Two thirds of the 24 non-free cells.
pub const UNIQUENESS_THRESHOLD: usize = 16;

/// The card registry generates new entries whenever the inactive surplus
/// drops below this value.
pub const MIN_ENTRY_SURPLUS: usize = 6 * MAX_CARDS;

/// The card registry prunes inactive entries whenever the surplus grows
/// beyond this value.
pub const MAX_ENTRY_SURPLUS: usize = 20 * MAX_CARDS;

/// Upper bound on concurrent per-subscriber delivery tasks.
pub const MAX_SUBSCRIBER_TASKS: usize = 100;

/// How long a single subscriber send may take before the event is dropped.
pub const SUBSCRIBER_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// How often the card registry worker re-equalizes its entry surplus.
pub const SURPLUS_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Default player capacity of a game.
pub const DEFAULT_MAX_PLAYERS: usize = 50;

/// Default number of rounds before a game ends naturally.
pub const DEFAULT_MAX_ROUNDS: usize = 10;
