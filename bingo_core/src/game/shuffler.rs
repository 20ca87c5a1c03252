//! Seeded shuffling for balls and card layouts.

use super::entities::Ball;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Shuffles sequences of bingo balls with seed-based pseudo-random logic.
/// Deterministic for a given seed. Callers serialize access; the shuffler
/// itself carries no locking.
#[derive(Debug)]
pub struct Shuffler {
    rng: ChaCha8Rng,
}

impl Shuffler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Fisher-Yates, in place: walk from the back, swapping each element with
    /// a uniformly chosen one at or before it.
    pub fn shuffle(&mut self, balls: &mut [Ball]) {
        for i in (1..balls.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            balls.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balls(range: std::ops::RangeInclusive<u8>) -> Vec<Ball> {
        range.map(|raw| Ball::parse(i64::from(raw)).unwrap()).collect()
    }

    #[test]
    fn test_shuffle_is_deterministic_per_seed() {
        let mut first = balls(1..=75);
        let mut second = balls(1..=75);
        Shuffler::new(42).shuffle(&mut first);
        Shuffler::new(42).shuffle(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut first = balls(1..=75);
        let mut second = balls(1..=75);
        Shuffler::new(1).shuffle(&mut first);
        Shuffler::new(2).shuffle(&mut second);
        assert_ne!(first, second);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut shuffled = balls(1..=75);
        Shuffler::new(9).shuffle(&mut shuffled);
        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, balls(1..=75));
    }

    #[test]
    fn test_shuffle_handles_tiny_slices() {
        let mut empty: Vec<Ball> = Vec::new();
        Shuffler::new(3).shuffle(&mut empty);
        assert!(empty.is_empty());

        let mut single = balls(5..=5);
        Shuffler::new(3).shuffle(&mut single);
        assert_eq!(single, balls(5..=5));
    }
}
