//! The ball registry for a single game.

use super::cells::balls_for_range;
use super::constants::MAX_BALL_VALUE;
use super::entities::Ball;
use super::errors::GameError;
use super::shuffler::Shuffler;
use std::sync::Mutex;

struct BallsInner {
    called: Vec<Ball>,
    uncalled: Vec<Ball>,
}

/// Manages the called and uncalled ball pools for one round of bingo. The
/// registry is reused across rounds via [`BallRegistry::reset`].
///
/// Invariant: `called` and `uncalled` are disjoint and together hold exactly
/// the balls 1..=75.
pub struct BallRegistry {
    seed: u64,
    inner: Mutex<BallsInner>,
}

impl BallRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: Mutex::new(BallsInner {
                called: Vec::new(),
                uncalled: shuffled_pool(seed),
            }),
        }
    }

    /// Produces the next ball for the round. Helpful when there is no
    /// in-person ball machine. Automatic calls pop the tail of the shuffled
    /// pool, so they come out in reverse of the post-shuffle order.
    pub fn next_automatic_call(&self) -> Result<Ball, GameError> {
        let mut inner = self.lock();
        let next = inner.uncalled.pop().ok_or_else(|| {
            GameError::ResourceExhausted("the registry has no more bingo balls".to_string())
        })?;
        inner.called.push(next);
        Ok(next)
    }

    /// Tells the registry which ball was just called from an in-person
    /// machine. The remaining uncalled balls keep their order.
    pub fn sync_manual_call(&self, ball: Ball) -> Result<(), GameError> {
        let mut inner = self.lock();
        let position = inner
            .uncalled
            .iter()
            .position(|candidate| *candidate == ball)
            .ok_or_else(|| {
                GameError::InputValidation(format!(
                    "could not find bingo ball {ball} among the uncalled balls"
                ))
            })?;
        let removed = inner.uncalled.remove(position);
        inner.called.push(removed);
        Ok(())
    }

    /// Reverts the registry to its initial state: no called balls and a full,
    /// freshly seeded shuffle of the uncalled pool. A reset registry is
    /// indistinguishable from one newly built with the same seed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.called.clear();
        inner.uncalled = shuffled_pool(self.seed);
    }

    /// Snapshot of every ball called so far this round, in call order.
    pub fn called(&self) -> Vec<Ball> {
        self.lock().called.clone()
    }

    /// How many balls are still waiting to be called.
    pub fn remaining(&self) -> usize {
        self.lock().uncalled.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BallsInner> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }
}

fn shuffled_pool(seed: u64) -> Vec<Ball> {
    let mut pool = balls_for_range(1, MAX_BALL_VALUE);
    Shuffler::new(seed).shuffle(&mut pool);
    pool
}
