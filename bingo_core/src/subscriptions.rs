//! Filtered pub/sub fan-out for game events.
//!
//! Subscribers receive events over capacity-1 channels. Dispatch spawns one
//! delivery task per matching subscriber, bounded by a counting semaphore,
//! and abandons any send that takes longer than two seconds. A slow
//! subscriber therefore drops events; it never blocks the game.

use crate::events::{GameEvent, GameEventType};
use crate::game::constants::{MAX_SUBSCRIBER_TASKS, SUBSCRIBER_SEND_TIMEOUT};
use crate::game::entities::GamePhase;
use crate::game::errors::GameError;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time;
use uuid::Uuid;

#[derive(Debug)]
struct SubscriptionEntry {
    id: Uuid,
    sender: mpsc::Sender<GameEvent>,
    /// Empty means the subscriber matches every phase.
    filtered_phases: Vec<GamePhase>,
    /// Empty means the subscriber matches every event's recipient list.
    recipient_ids: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct ManagerState {
    subs: Vec<SubscriptionEntry>,
    disposed: bool,
}

/// Fans game events out to filtered subscribers.
///
/// One mutex guards the subscription list, the disposed flag, and the
/// routing decisions inside dispatch, so a dispose cannot interleave with a
/// subscribe between lock releases.
#[derive(Debug)]
pub struct SubscriptionsManager {
    state: Mutex<ManagerState>,
    delivery_slots: Arc<Semaphore>,
}

/// Receiving half of a subscription. The handle is cheap to clone; clones
/// share the same underlying capacity-1 channel, which is how a duplicate
/// join hands back the original player's stream.
#[derive(Clone, Debug)]
pub struct EventStream {
    inner: Arc<Mutex<mpsc::Receiver<GameEvent>>>,
}

impl EventStream {
    fn new(receiver: mpsc::Receiver<GameEvent>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(receiver)),
        }
    }

    /// A stream with no sender behind it. Receives nothing, ever. Useful for
    /// players constructed outside a live subscription.
    pub fn disconnected() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self::new(rx)
    }

    /// Waits for the next event. Returns `None` once the subscription has
    /// been unsubscribed or disposed and the buffer has drained.
    pub async fn recv(&self) -> Option<GameEvent> {
        self.inner.lock().await.recv().await
    }

    /// Non-blocking receive.
    pub async fn try_recv(&self) -> Result<GameEvent, mpsc::error::TryRecvError> {
        self.inner.lock().await.try_recv()
    }
}

/// Opaque, idempotent unsubscribe token for a single subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionGuard {
    id: Uuid,
    manager: Arc<SubscriptionsManager>,
}

impl SubscriptionGuard {
    /// Removes the subscription and closes its stream. Safe to call any
    /// number of times; the manager may also have unsubscribed this entry
    /// already during teardown.
    pub async fn unsubscribe(&self) {
        self.manager.unsubscribe(self.id).await;
    }
}

impl SubscriptionsManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ManagerState::default()),
            delivery_slots: Arc::new(Semaphore::new(MAX_SUBSCRIBER_TASKS)),
        })
    }

    /// Registers a subscriber.
    ///
    /// - An empty `phases` list subscribes to every phase.
    /// - An empty `recipient_ids` list makes the subscriber eligible for
    ///   every event, whatever its recipient list.
    ///
    /// Fails once the manager has been disposed.
    pub async fn subscribe(
        self: &Arc<Self>,
        phases: Vec<GamePhase>,
        recipient_ids: Vec<Uuid>,
    ) -> Result<(EventStream, SubscriptionGuard), GameError> {
        let mut state = self.state.lock().await;
        if state.disposed {
            return Err(GameError::Terminated("not accepting new subscriptions"));
        }

        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(1);
        state.subs.push(SubscriptionEntry {
            id,
            sender,
            filtered_phases: phases,
            recipient_ids,
        });
        log::debug!("subscription {id} registered");

        Ok((
            EventStream::new(receiver),
            SubscriptionGuard {
                id,
                manager: Arc::clone(self),
            },
        ))
    }

    async fn unsubscribe(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        let before = state.subs.len();
        state.subs.retain(|entry| entry.id != id);
        if state.subs.len() < before {
            log::debug!("subscription {id} removed");
        }
    }

    /// Notifies every matching subscriber that an event happened. Blocks
    /// until all spawned deliveries finish, successfully or by timeout, and
    /// reports a partial failure identifying how many sends were unfulfilled.
    pub async fn dispatch_event(&self, event: GameEvent) -> Result<(), GameError> {
        let state = self.state.lock().await;
        if state.disposed {
            return Err(GameError::Terminated("not accepting new event dispatches"));
        }
        self.dispatch_locked(&state.subs, event).await
    }

    /// Core dispatch. The caller holds the state lock, which keeps routing
    /// decisions and the subscription list consistent for the whole fan-out.
    async fn dispatch_locked(
        &self,
        subs: &[SubscriptionEntry],
        mut event: GameEvent,
    ) -> Result<(), GameError> {
        if event.id.is_nil() {
            event.id = Uuid::new_v4();
        }
        if event.created_at.is_none() {
            event.created_at = Some(Utc::now());
        }

        let matching: Vec<mpsc::Sender<GameEvent>> = subs
            .iter()
            .filter(|entry| is_eligible_for_dispatch(entry, &event))
            .map(|entry| entry.sender.clone())
            .collect();
        let total = matching.len();

        let mut deliveries = JoinSet::new();
        for sender in matching {
            let Ok(permit) = Arc::clone(&self.delivery_slots).acquire_owned().await else {
                break;
            };
            let event = event.clone();
            deliveries.spawn(async move {
                let _permit = permit;
                matches!(
                    time::timeout(SUBSCRIBER_SEND_TIMEOUT, sender.send(event)).await,
                    Ok(Ok(()))
                )
            });
        }

        let mut fulfilled = 0;
        while let Some(delivered) = deliveries.join_next().await {
            if delivered.unwrap_or(false) {
                fulfilled += 1;
            }
        }

        if fulfilled != total {
            return Err(GameError::PartialDispatchFailure {
                failed: total - fulfilled,
                total,
            });
        }
        Ok(())
    }

    /// Tears the manager down: broadcasts one final game-over event,
    /// unsubscribes everyone, and reclaims every delivery slot so that no
    /// in-flight send outlives disposal. Calling it again is a no-op.
    pub async fn dispose(&self, system_id: Uuid) -> Result<(), GameError> {
        let mut state = self.state.lock().await;
        if state.disposed {
            return Ok(());
        }

        let farewell = GameEvent {
            id: Uuid::new_v4(),
            created_by_id: system_id,
            phase: GamePhase::GameOver,
            event_type: GameEventType::Update,
            created_at: Some(Utc::now()),
            message: "the game has been terminated".to_string(),
            recipient_player_ids: Vec::new(),
        };
        let result = self.dispatch_locked(&state.subs, farewell).await;

        // The flag flips under the same lock that guards subscribe, so no
        // new subscriber can slip in while the list empties out.
        state.disposed = true;
        let dropped = state.subs.len();
        state.subs.clear();
        drop(state);

        if let Ok(permits) = self
            .delivery_slots
            .acquire_many(MAX_SUBSCRIBER_TASKS as u32)
            .await
        {
            drop(permits);
        }

        log::info!("subscriptions manager disposed, {dropped} subscriptions dropped");
        result
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subs.len()
    }

    /// How many delivery slots are free right now.
    pub fn available_delivery_slots(&self) -> usize {
        self.delivery_slots.available_permits()
    }
}

/// The filtering rule, applied per subscription:
///
/// - Phase match: no phase filter, or the event's phase is in the filter.
/// - Recipient match: the event is a broadcast (no recipients), or the
///   subscriber has no recipient filter, or the two lists intersect.
///
/// Deliver iff both match. Note that a broadcast reaches every
/// phase-matching subscriber, including those with narrow recipient filters.
fn is_eligible_for_dispatch(subscription: &SubscriptionEntry, event: &GameEvent) -> bool {
    let matches_phase = subscription.filtered_phases.is_empty()
        || subscription.filtered_phases.contains(&event.phase);
    if !matches_phase {
        return false;
    }

    event.recipient_player_ids.is_empty()
        || subscription.recipient_ids.is_empty()
        || event
            .recipient_player_ids
            .iter()
            .any(|id| subscription.recipient_ids.contains(id))
}
