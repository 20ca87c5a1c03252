//! Domain entities: balls, cells, cards, phases, players, and snapshots.

use super::constants::{
    BALLS_PER_COLUMN, CARD_SIZE, FREE_SPACE_COL, FREE_SPACE_ROW, MAX_BALL_VALUE,
};
use super::errors::GameError;
use crate::subscriptions::EventStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single bingo ball. Values 1 through 75 (inclusive) can be called during
/// a game; the zero value denotes the free space every player gets for free.
///
/// Serializes as a bare integer.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Ball(u8);

impl Ball {
    /// The space given to every player for free. It is intentionally not
    /// daubed automatically, just so players have more to do in a round.
    pub const FREE_SPACE: Ball = Ball(0);

    /// Attempts to turn an arbitrary integer into a bingo ball. Zero parses
    /// to the free space; anything outside 0..=75 is rejected.
    pub fn parse(raw: i64) -> Result<Self, GameError> {
        if raw > i64::from(MAX_BALL_VALUE) {
            return Err(GameError::InputValidation(format!(
                "value {raw} is not allowed to exceed {MAX_BALL_VALUE}"
            )));
        }
        if raw < 0 {
            return Err(GameError::InputValidation(format!(
                "value {raw} is not allowed to fall below 0"
            )));
        }
        Ok(Ball(raw as u8))
    }

    /// Internal shortcut for values already known to be in range.
    pub(crate) const fn from_raw_unchecked(raw: u8) -> Self {
        Ball(raw)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_free_space(self) -> bool {
        self == Self::FREE_SPACE
    }

    /// The letter column this ball belongs to on a card. Column ranges are 15
    /// values wide, so column B covers 1..=15, I covers 16..=30, and so on.
    /// The free space has no column of its own.
    pub fn column_index(self) -> Option<usize> {
        if self.is_free_space() {
            return None;
        }
        Some((usize::from(self.0) - 1) / BALLS_PER_COLUMN)
    }
}

impl fmt::Display for Ball {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single stateful cell on a bingo card. The number never changes once the
/// card has been created; the daub flag is mutated by the owning player.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Cell {
    pub number: Ball,
    pub daubed: bool,
}

impl Cell {
    pub fn new(number: Ball) -> Self {
        Self {
            number,
            daubed: false,
        }
    }
}

/// A stateful bingo card held by a single player.
///
/// The grid is row-major for display: reading a row left to right crosses the
/// B, I, N, G, and O letter columns. Column `c` holds values in
/// `15c+1 ..= 15c+15`, except the center cell, which is the free space.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Card {
    pub id: Uuid,
    pub player_id: Uuid,
    pub cells: [[Cell; CARD_SIZE]; CARD_SIZE],
}

impl Card {
    /// Wraps an immutable registry layout in fresh, undaubed cells.
    pub fn from_layout(
        id: Uuid,
        player_id: Uuid,
        layout: &[[Ball; CARD_SIZE]; CARD_SIZE],
    ) -> Self {
        let mut cells = [[Cell::new(Ball::FREE_SPACE); CARD_SIZE]; CARD_SIZE];
        for (row, layout_row) in layout.iter().enumerate() {
            for (col, number) in layout_row.iter().enumerate() {
                cells[row][col] = Cell::new(*number);
            }
        }
        Self {
            id,
            player_id,
            cells,
        }
    }

    /// Locates the cell holding `ball`. The free space short-circuits to the
    /// center; every other ball belongs to exactly one letter column, which
    /// is scanned top to bottom.
    pub fn cell_mut(&mut self, ball: Ball) -> Option<&mut Cell> {
        if ball.is_free_space() {
            return Some(&mut self.cells[FREE_SPACE_ROW][FREE_SPACE_COL]);
        }
        let col = ball.column_index()?;
        self.cells
            .iter_mut()
            .map(|row| &mut row[col])
            .find(|cell| cell.number == ball)
    }
}

/// The current phase of a game. There is exactly one phase at a time; the
/// variants are listed in the order they proceed while a game is ongoing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// A new game instance exists but is not connected to anything yet.
    Initialized,
    /// The game could not be initialized and will never be usable.
    InitializationFailure,
    /// A new round has just started. This is the only phase in which
    /// waitlisted players are promoted to active participants.
    RoundStart,
    /// The host is calling balls for players to daub. Generally the longest
    /// running phase of the game.
    Calling,
    /// One or more players called bingo and the host is validating the call.
    ConfirmingBingo,
    /// More than one player called bingo; the host settles who wins, with or
    /// without further ball calls.
    Tiebreaker,
    /// The round has been settled and is waiting for the host to open the
    /// next one.
    RoundEnd,
    /// The game has ended, either naturally or by termination.
    GameOver,
}

impl GamePhase {
    /// Every phase, in lifecycle order.
    pub const ALL: [GamePhase; 8] = [
        GamePhase::Initialized,
        GamePhase::InitializationFailure,
        GamePhase::RoundStart,
        GamePhase::Calling,
        GamePhase::ConfirmingBingo,
        GamePhase::Tiebreaker,
        GamePhase::RoundEnd,
        GamePhase::GameOver,
    ];

    /// Terminal phases absorb every transition attempt.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GamePhase::GameOver | GamePhase::InitializationFailure
        )
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Initialized => "initialized",
            Self::InitializationFailure => "initialization_failure",
            Self::RoundStart => "round_start",
            Self::Calling => "calling",
            Self::ConfirmingBingo => "confirming_bingo",
            Self::Tiebreaker => "tiebreaker",
            Self::RoundEnd => "round_end",
            Self::GameOver => "game_over",
        };
        write!(f, "{repr}")
    }
}

/// The standing of a player within a game.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Host,
    Active,
    Waitlisted,
    Suspended,
    Banned,
}

/// A user participating in a game as a card player. Host players hold no
/// cards.
///
/// Serialization skips the live event stream; everything else round-trips
/// through the wire as-is.
#[derive(Clone, Debug, Serialize)]
pub struct Player {
    pub status: PlayerStatus,
    pub id: Uuid,
    pub name: String,
    pub cards: Vec<Card>,
    #[serde(skip)]
    pub events: EventStream,
}

/// How long a player is in time-out for being a pain to the rest of the
/// room. Counted in rounds; ticked during round-start upkeep.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerSuspension {
    pub player_id: Uuid,
    #[serde(rename = "duration")]
    pub round_duration: usize,
    #[serde(rename = "current_round")]
    pub rounds_passed: usize,
}

/// An immutable snapshot of the observable game state, broadcast on request.
/// Sequences always serialize as arrays, never as null.
#[derive(Clone, Debug, Serialize)]
pub struct GameSnapshot {
    pub phase: GamePhase,
    pub called: Vec<Ball>,
    pub players: Vec<Player>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cells::CellsGenerator;

    // === Ball Tests ===

    #[test]
    fn test_parse_ball_accepts_free_space() {
        let ball = Ball::parse(0).unwrap();
        assert!(ball.is_free_space());
    }

    #[test]
    fn test_parse_ball_accepts_full_range() {
        for raw in 1..=75 {
            let ball = Ball::parse(raw).unwrap();
            assert_eq!(i64::from(ball.value()), raw);
        }
    }

    #[test]
    fn test_parse_ball_rejects_out_of_range() {
        assert!(Ball::parse(76).is_err());
        assert!(Ball::parse(-1).is_err());
        assert!(Ball::parse(i64::MAX).is_err());
    }

    #[test]
    fn test_ball_column_index_spacing() {
        assert_eq!(Ball::parse(1).unwrap().column_index(), Some(0));
        assert_eq!(Ball::parse(15).unwrap().column_index(), Some(0));
        assert_eq!(Ball::parse(16).unwrap().column_index(), Some(1));
        assert_eq!(Ball::parse(45).unwrap().column_index(), Some(2));
        assert_eq!(Ball::parse(61).unwrap().column_index(), Some(4));
        assert_eq!(Ball::parse(75).unwrap().column_index(), Some(4));
        assert_eq!(Ball::FREE_SPACE.column_index(), None);
    }

    #[test]
    fn test_ball_serializes_as_bare_integer() {
        let json = serde_json::to_string(&Ball::parse(42).unwrap()).unwrap();
        assert_eq!(json, "42");
        let json = serde_json::to_string(&Ball::FREE_SPACE).unwrap();
        assert_eq!(json, "0");
    }

    // === Card Tests ===

    fn sample_card() -> Card {
        let mut generator = CellsGenerator::new(7);
        Card::from_layout(Uuid::new_v4(), Uuid::new_v4(), &generator.generate())
    }

    #[test]
    fn test_card_free_space_lookup() {
        let mut card = sample_card();
        let cell = card.cell_mut(Ball::FREE_SPACE).unwrap();
        assert!(cell.number.is_free_space());
        assert!(!cell.daubed);
    }

    #[test]
    fn test_card_cell_lookup_by_value() {
        let mut card = sample_card();
        let target = card.cells[0][3].number;
        let cell = card.cell_mut(target).unwrap();
        assert_eq!(cell.number, target);
    }

    #[test]
    fn test_card_cell_lookup_missing_value() {
        let mut card = sample_card();
        // Column B holds 5 of 15 possible values, so at least one is absent.
        let absent = (1..=15)
            .map(|raw| Ball::parse(raw).unwrap())
            .find(|ball| !card.cells.iter().any(|row| row[0].number == *ball))
            .unwrap();
        assert!(card.cell_mut(absent).is_none());
    }

    #[test]
    fn test_daub_then_undo_leaves_cell_clean() {
        let mut card = sample_card();
        let target = card.cells[4][1].number;
        card.cell_mut(target).unwrap().daubed = true;
        assert!(card.cells[4][1].daubed);
        card.cell_mut(target).unwrap().daubed = false;
        assert!(!card.cells[4][1].daubed);
    }

    // === Phase Tests ===

    #[test]
    fn test_terminal_phases() {
        assert!(GamePhase::GameOver.is_terminal());
        assert!(GamePhase::InitializationFailure.is_terminal());
        for phase in [
            GamePhase::Initialized,
            GamePhase::RoundStart,
            GamePhase::Calling,
            GamePhase::ConfirmingBingo,
            GamePhase::Tiebreaker,
            GamePhase::RoundEnd,
        ] {
            assert!(!phase.is_terminal());
        }
    }

    #[test]
    fn test_phase_wire_names() {
        let json = serde_json::to_string(&GamePhase::ConfirmingBingo).unwrap();
        assert_eq!(json, "\"confirming_bingo\"");
        let parsed: GamePhase = serde_json::from_str("\"round_start\"").unwrap();
        assert_eq!(parsed, GamePhase::RoundStart);
    }

    #[test]
    fn test_phase_display_matches_wire() {
        for phase in GamePhase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{phase}\""));
        }
    }

    // === Snapshot Tests ===

    #[test]
    fn test_snapshot_serializes_empty_sequences_as_arrays() {
        let snapshot = GameSnapshot {
            phase: GamePhase::Calling,
            called: Vec::new(),
            players: Vec::new(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"phase":"calling","called":[],"players":[]}"#);
    }

    #[test]
    fn test_player_serialization_skips_event_stream() {
        let player = Player {
            status: PlayerStatus::Active,
            id: Uuid::nil(),
            name: "Alice".to_string(),
            cards: Vec::new(),
            events: EventStream::disconnected(),
        };
        let json = serde_json::to_string(&player).unwrap();
        assert!(json.contains("\"name\":\"Alice\""));
        assert!(json.contains("\"cards\":[]"));
        assert!(!json.contains("events"));
    }
}
