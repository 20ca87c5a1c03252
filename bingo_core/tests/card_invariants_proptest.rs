/// Property-based tests for card generation and shuffling using proptest.
///
/// These verify the structural invariants of generated cards across a wide
/// range of seeds, rather than spot-checking a few golden layouts.
use bingo_core::game::cells::CellsGenerator;
use bingo_core::game::shuffler::Shuffler;
use bingo_core::{Ball, Card};
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

fn generated_layout(seed: u64, skip: usize) -> [[Ball; 5]; 5] {
    let mut generator = CellsGenerator::new(seed);
    for _ in 0..skip {
        generator.generate();
    }
    generator.generate()
}

proptest! {
    #[test]
    fn test_layout_has_free_space_in_the_center(seed in any::<u64>(), skip in 0usize..4) {
        let layout = generated_layout(seed, skip);
        prop_assert!(layout[2][2].is_free_space());
    }

    #[test]
    fn test_layout_columns_stay_in_letter_ranges(seed in any::<u64>(), skip in 0usize..4) {
        let layout = generated_layout(seed, skip);
        for (row_idx, row) in layout.iter().enumerate() {
            for (col, ball) in row.iter().enumerate() {
                if row_idx == 2 && col == 2 {
                    continue;
                }
                let low = (col * 15 + 1) as u8;
                let high = ((col + 1) * 15) as u8;
                prop_assert!(
                    ball.value() >= low && ball.value() <= high,
                    "cell ({},{}) holds {}, outside {}..={}",
                    row_idx, col, ball, low, high
                );
            }
        }
    }

    #[test]
    fn test_layout_has_no_duplicates_within_a_column(seed in any::<u64>(), skip in 0usize..4) {
        let layout = generated_layout(seed, skip);
        for col in 0..5 {
            let mut seen = HashSet::new();
            for row in layout.iter() {
                let ball = row[col];
                if ball.is_free_space() {
                    continue;
                }
                prop_assert!(seen.insert(ball), "duplicate {} in column {}", ball, col);
            }
        }
    }

    #[test]
    fn test_layout_has_exactly_twenty_four_numbers(seed in any::<u64>()) {
        let layout = generated_layout(seed, 0);
        let numbered = layout
            .iter()
            .flatten()
            .filter(|ball| !ball.is_free_space())
            .count();
        prop_assert_eq!(numbered, 24);
    }

    #[test]
    fn test_every_ball_on_a_card_is_locatable(seed in any::<u64>()) {
        let layout = generated_layout(seed, 0);
        let mut card = Card::from_layout(Uuid::new_v4(), Uuid::new_v4(), &layout);
        for row in 0..5 {
            for col in 0..5 {
                let ball = card.cells[row][col].number;
                let found = card.cell_mut(ball);
                prop_assert!(found.is_some(), "ball {} not locatable on its own card", ball);
            }
        }
    }

    #[test]
    fn test_shuffle_permutes_without_loss(seed in any::<u64>()) {
        let original: Vec<Ball> = (1..=75i64).map(|raw| Ball::parse(raw).unwrap()).collect();
        let mut shuffled = original.clone();
        Shuffler::new(seed).shuffle(&mut shuffled);

        let mut sorted = shuffled.clone();
        sorted.sort();
        prop_assert_eq!(sorted, original);
    }

    #[test]
    fn test_ball_parse_accepts_exactly_the_wire_range(raw in -200i64..200) {
        let parsed = Ball::parse(raw);
        if (0..=75).contains(&raw) {
            prop_assert!(parsed.is_ok());
            prop_assert_eq!(i64::from(parsed.unwrap().value()), raw);
        } else {
            prop_assert!(parsed.is_err());
        }
    }
}
