//! The card registry: unique card generation, checkout, recycling, pruning.

use super::cells::CellsGenerator;
use super::constants::{
    CARD_SIZE, MAX_CARDS, MAX_ENTRY_SURPLUS, MIN_ENTRY_SURPLUS, SURPLUS_TICK_INTERVAL,
    UNIQUENESS_THRESHOLD,
};
use super::entities::{Ball, Card};
use super::errors::GameError;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc;
use tokio::time;
use uuid::Uuid;

/// Lifecycle of a card registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistryStatus {
    Idle,
    Running,
    Terminated,
}

/// One registered card layout. The cells and ID never change once the entry
/// exists; only the holder bookkeeping does.
#[derive(Clone, Debug)]
struct RegistryEntry {
    cells: [[Ball; CARD_SIZE]; CARD_SIZE],
    id: Uuid,
    /// Every player who has ever held this card, in checkout order. The last
    /// element is the current holder while the entry is active.
    prev_player_ids: Vec<Uuid>,
    active: bool,
}

impl RegistryEntry {
    /// An entry can be recycled for a player who has never held it.
    fn recyclable_for(&self, player_id: Uuid) -> bool {
        !self.active && !self.prev_player_ids.contains(&player_id)
    }

    fn held_by(&self, player_id: Uuid) -> bool {
        self.active && self.prev_player_ids.last() == Some(&player_id)
    }
}

/// Idempotent shutdown handle for the registry's background worker.
#[derive(Clone, Debug)]
pub struct RegistryShutdown {
    tx: mpsc::Sender<()>,
}

impl RegistryShutdown {
    /// Signals the worker to stop. Extra signals are dropped.
    pub fn shutdown(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Generates, checks out, recycles, and prunes unique bingo cards.
///
/// A background worker keeps a surplus of inactive entries ready so that
/// checkouts are instant, drains returned cards, and prunes the surplus when
/// it grows too large.
pub struct CardRegistry {
    status: RwLock<RegistryStatus>,
    entries: Mutex<Vec<RegistryEntry>>,
    generator: Mutex<CellsGenerator>,
    return_tx: mpsc::Sender<Uuid>,
    return_rx: Mutex<Option<mpsc::Receiver<Uuid>>>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl CardRegistry {
    pub fn new(seed: u64) -> Self {
        let (return_tx, return_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            status: RwLock::new(RegistryStatus::Idle),
            entries: Mutex::new(Vec::new()),
            generator: Mutex::new(CellsGenerator::new(seed)),
            return_tx,
            return_rx: Mutex::new(Some(return_rx)),
            shutdown_tx,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
        }
    }

    pub fn status(&self) -> RegistryStatus {
        *self.status.read().unwrap_or_else(|err| err.into_inner())
    }

    /// Transitions the registry from idle to running and launches the
    /// background worker. Starting an already-running registry just hands
    /// back another shutdown handle; starting a terminated one errors.
    pub fn start(self: &Arc<Self>) -> Result<RegistryShutdown, GameError> {
        let mut status = self.status.write().unwrap_or_else(|err| err.into_inner());
        match *status {
            RegistryStatus::Terminated => Err(GameError::Terminated(
                "the card registry has already been terminated",
            )),
            RegistryStatus::Running => Ok(RegistryShutdown {
                tx: self.shutdown_tx.clone(),
            }),
            RegistryStatus::Idle => {
                let return_rx = self
                    .return_rx
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .take();
                let shutdown_rx = self
                    .shutdown_rx
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .take();
                let (Some(return_rx), Some(shutdown_rx)) = (return_rx, shutdown_rx) else {
                    return Err(GameError::Terminated(
                        "the card registry worker channels are gone",
                    ));
                };

                *status = RegistryStatus::Running;
                self.equalize_surplus();
                tokio::spawn(Arc::clone(self).run_worker(return_rx, shutdown_rx));
                Ok(RegistryShutdown {
                    tx: self.shutdown_tx.clone(),
                })
            }
        }
    }

    /// Checks a card out for a player, preferring to recycle an inactive
    /// entry the player has never held, and generating a fresh unique entry
    /// otherwise. The returned card wraps the entry's immutable cells in
    /// fresh, undaubed state.
    pub fn check_out_card(&self, player_id: Uuid) -> Result<Card, GameError> {
        self.require_running("checking out cards")?;
        let mut entries = self.lock_entries();
        self.check_out_locked(&mut entries, player_id)
    }

    /// Exchanges a player's whole hand for a fresh one. Deactivating the old
    /// entries and checking out the new ones happen under a single lock, so
    /// the player's card limit sees the old hand as already returned.
    /// Checkout failures are collected rather than short-circuiting; the
    /// caller gets whatever hand could be assembled.
    pub fn replace_hand(
        &self,
        player_id: Uuid,
        old_cards: &[Card],
    ) -> (Vec<Card>, Vec<GameError>) {
        if let Err(err) = self.require_running("replacing a hand") {
            return (Vec::new(), vec![err]);
        }

        let mut entries = self.lock_entries();
        for card in old_cards {
            match entries.iter_mut().find(|entry| entry.id == card.id) {
                Some(entry) => entry.active = false,
                None => log::debug!("ignoring return of unknown card {}", card.id),
            }
        }

        let mut fresh = Vec::with_capacity(MAX_CARDS);
        let mut errors = Vec::new();
        for _ in 0..MAX_CARDS {
            match self.check_out_locked(&mut entries, player_id) {
                Ok(card) => fresh.push(card),
                Err(err) => errors.push(err),
            }
        }
        (fresh, errors)
    }

    fn check_out_locked(
        &self,
        entries: &mut Vec<RegistryEntry>,
        player_id: Uuid,
    ) -> Result<Card, GameError> {
        let held = entries
            .iter()
            .filter(|entry| entry.held_by(player_id))
            .count();
        if held >= MAX_CARDS {
            return Err(GameError::ResourceExhausted(format!(
                "player {player_id} cannot hold more than {MAX_CARDS} cards"
            )));
        }

        if let Some(entry) = entries
            .iter_mut()
            .find(|entry| entry.recyclable_for(player_id))
        {
            entry.active = true;
            entry.prev_player_ids.push(player_id);
            return Ok(Card::from_layout(entry.id, player_id, &entry.cells));
        }

        let cells = self.generate_unique_cells(entries);
        let entry = RegistryEntry {
            cells,
            id: Uuid::new_v4(),
            prev_player_ids: vec![player_id],
            active: true,
        };
        let card = Card::from_layout(entry.id, player_id, &entry.cells);
        entries.push(entry);
        Ok(card)
    }

    fn require_running(&self, operation: &'static str) -> Result<(), GameError> {
        match self.status() {
            RegistryStatus::Idle => Err(GameError::Terminated(
                "the card registry must be started before use",
            )),
            RegistryStatus::Terminated => {
                log::debug!("rejected {operation} on a terminated card registry");
                Err(GameError::Terminated(
                    "the card registry has been terminated",
                ))
            }
            RegistryStatus::Running => Ok(()),
        }
    }

    /// Hands a card back to the registry. The worker marks the entry
    /// inactive; unknown card IDs are silently ignored there.
    pub async fn return_card(&self, card: &Card) -> Result<(), GameError> {
        self.require_running("returning a card")?;
        self.return_tx
            .send(card.id)
            .await
            .map_err(|_| GameError::Terminated("the card registry stopped accepting returns"))
    }

    /// Count of entries available for instant checkout.
    pub fn available_entries(&self) -> usize {
        self.lock_entries()
            .iter()
            .filter(|entry| !entry.active)
            .count()
    }

    pub fn entry_count(&self) -> usize {
        self.lock_entries().len()
    }

    async fn run_worker(
        self: Arc<Self>,
        mut return_rx: mpsc::Receiver<Uuid>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut surplus_tick = time::interval(SURPLUS_TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                Some(card_id) = return_rx.recv() => self.flush_return(card_id),
                _ = surplus_tick.tick() => self.equalize_surplus(),
            }
        }

        let mut status = self.status.write().unwrap_or_else(|err| err.into_inner());
        *status = RegistryStatus::Terminated;
        log::info!("card registry worker stopped");
    }

    fn flush_return(&self, card_id: Uuid) {
        let mut entries = self.lock_entries();
        match entries.iter_mut().find(|entry| entry.id == card_id) {
            Some(entry) => entry.active = false,
            None => log::debug!("ignoring return of unknown card {card_id}"),
        }
    }

    /// Keeps the inactive surplus within its band: generate while below the
    /// minimum, prune trailing inactive entries down to the maximum when
    /// above it. Locks are taken per step so checkouts can interleave.
    fn equalize_surplus(&self) {
        loop {
            let available = self.available_entries();
            if available >= MIN_ENTRY_SURPLUS {
                break;
            }
            let mut entries = self.lock_entries();
            let cells = self.generate_unique_cells(&entries);
            entries.push(RegistryEntry {
                cells,
                id: Uuid::new_v4(),
                prev_player_ids: Vec::new(),
                active: false,
            });
        }

        let mut entries = self.lock_entries();
        let available = entries.iter().filter(|entry| !entry.active).count();
        if available <= MAX_ENTRY_SURPLUS {
            return;
        }
        // Active entries lead so the prune only ever trims the inactive tail.
        entries.sort_by_key(|entry| !entry.active);
        let active = entries.len() - available;
        entries.truncate(active + MAX_ENTRY_SURPLUS);
        log::debug!(
            "pruned card surplus from {available} to {MAX_ENTRY_SURPLUS} inactive entries"
        );
    }

    /// Generates a layout that stays under the uniqueness threshold against
    /// every existing entry. The caller holds the entries lock for the whole
    /// generate-and-append sequence; releasing it between the comparison
    /// snapshot and the append would let two concurrent generations violate
    /// each other's threshold.
    fn generate_unique_cells(
        &self,
        entries: &[RegistryEntry],
    ) -> [[Ball; CARD_SIZE]; CARD_SIZE] {
        let mut generator = self.generator.lock().unwrap_or_else(|err| err.into_inner());
        loop {
            let candidate = generator.generate();
            let unique = entries
                .iter()
                .all(|entry| cell_conflicts(&candidate, &entry.cells) <= UNIQUENESS_THRESHOLD);
            if unique {
                return candidate;
            }
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<RegistryEntry>> {
        self.entries.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// How many cells (same row, same column, same value) two layouts share,
/// excluding the free space.
fn cell_conflicts(
    candidate: &[[Ball; CARD_SIZE]; CARD_SIZE],
    existing: &[[Ball; CARD_SIZE]; CARD_SIZE],
) -> usize {
    let mut conflicts = 0;
    for row in 0..CARD_SIZE {
        for col in 0..CARD_SIZE {
            let cell = existing[row][col];
            if cell.is_free_space() {
                continue;
            }
            if cell == candidate[row][col] {
                conflicts += 1;
            }
        }
    }
    conflicts
}
