//! Card layout generation.

use super::constants::{
    BALLS_PER_COLUMN, CARD_SIZE, FREE_SPACE_COL, FREE_SPACE_ROW, MAX_BALL_VALUE,
};
use super::entities::Ball;
use super::shuffler::Shuffler;

/// Produces valid 5x5 bingo card layouts.
///
/// Each letter column draws from its own 15-value range, which gets shuffled
/// whole before the first five values are taken. That over-allocates ten
/// values per column, but it guarantees no duplicates within a column without
/// any retry loops.
#[derive(Debug)]
pub struct CellsGenerator {
    shuffler: Shuffler,
}

impl CellsGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            shuffler: Shuffler::new(seed),
        }
    }

    /// Generates one card layout, row-major, with the free space in the
    /// center and rows reading B/I/N/G/O across.
    pub fn generate(&mut self) -> [[Ball; CARD_SIZE]; CARD_SIZE] {
        let mut grid = [[Ball::FREE_SPACE; CARD_SIZE]; CARD_SIZE];

        // Build the grid column-major first: grid[c] holds letter column c.
        for (col, grid_column) in grid.iter_mut().enumerate() {
            let start = (col * BALLS_PER_COLUMN + 1) as u8;
            let end = ((col + 1) * BALLS_PER_COLUMN) as u8;
            let mut range = balls_for_range(start, end);
            self.shuffler.shuffle(&mut range);
            for (row, ball) in range.into_iter().take(CARD_SIZE).enumerate() {
                grid_column[row] = ball;
            }
        }
        grid[FREE_SPACE_COL][FREE_SPACE_ROW] = Ball::FREE_SPACE;

        // Rotate so the grid is row-major for display and the frontend needs
        // no per-render transforms.
        for i in 0..CARD_SIZE {
            for j in (i + 1)..CARD_SIZE {
                let tmp = grid[i][j];
                grid[i][j] = grid[j][i];
                grid[j][i] = tmp;
            }
        }

        grid
    }
}

/// Creates the bingo balls for a contiguous, inclusive range. Invalid bounds
/// produce an empty vec instead of an error.
pub fn balls_for_range(start: u8, end: u8) -> Vec<Ball> {
    if end <= start || start == 0 || start > MAX_BALL_VALUE || end > MAX_BALL_VALUE {
        return Vec::new();
    }
    (start..=end).map(Ball::from_raw_unchecked).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Range Tests ===

    #[test]
    fn test_range_is_inclusive() {
        let range = balls_for_range(1, 15);
        assert_eq!(range.len(), 15);
        assert_eq!(range[0].value(), 1);
        assert_eq!(range[14].value(), 15);
    }

    #[test]
    fn test_invalid_ranges_are_empty() {
        assert!(balls_for_range(15, 1).is_empty());
        assert!(balls_for_range(0, 10).is_empty());
        assert!(balls_for_range(70, 80).is_empty());
        assert!(balls_for_range(5, 5).is_empty());
    }

    // === Layout Tests ===

    #[test]
    fn test_center_is_free_space() {
        let grid = CellsGenerator::new(11).generate();
        assert!(grid[2][2].is_free_space());
    }

    #[test]
    fn test_columns_stay_in_letter_ranges() {
        let grid = CellsGenerator::new(23).generate();
        for (row_idx, row) in grid.iter().enumerate() {
            for (col, ball) in row.iter().enumerate() {
                if row_idx == 2 && col == 2 {
                    continue;
                }
                let low = (col * 15 + 1) as u8;
                let high = ((col + 1) * 15) as u8;
                assert!(
                    ball.value() >= low && ball.value() <= high,
                    "cell ({row_idx},{col}) holds {ball}, outside {low}..={high}"
                );
            }
        }
    }

    #[test]
    fn test_no_duplicates_within_a_column() {
        let grid = CellsGenerator::new(37).generate();
        for col in 0..5 {
            let mut seen = std::collections::HashSet::new();
            for row in grid.iter() {
                let ball = row[col];
                if ball.is_free_space() {
                    continue;
                }
                assert!(seen.insert(ball), "duplicate {ball} in column {col}");
            }
        }
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let first = CellsGenerator::new(42).generate();
        let second = CellsGenerator::new(42).generate();
        assert_eq!(first, second);
    }

    #[test]
    fn test_successive_layouts_differ() {
        let mut generator = CellsGenerator::new(42);
        let first = generator.generate();
        let second = generator.generate();
        assert_ne!(first, second);
    }
}
