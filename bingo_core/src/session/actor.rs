//! The running game: shared state, the command loop, and the public handle.

use super::config::GameConfig;
use super::handlers;
use super::messages::CommandSession;
use super::GameManager;
use crate::commands::{GameCommand, GameCommandType};
use crate::events::GameEvent;
use crate::game::balls::BallRegistry;
use crate::game::cards::{CardRegistry, RegistryShutdown};
use crate::game::constants::MAX_CARDS;
use crate::game::entities::{GamePhase, Player, PlayerStatus, PlayerSuspension};
use crate::game::errors::GameError;
use crate::game::phase::PhaseCell;
use crate::subscriptions::{EventStream, SubscriptionGuard, SubscriptionsManager};
use async_trait::async_trait;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

/// One card player's slot in the roster. The entry ID is unique per join, so
/// a stale leave handle from a previous stint cannot remove a rejoined
/// player.
pub(crate) struct PlayerEntry {
    pub entry_id: Uuid,
    pub player: Player,
    pub subscription: SubscriptionGuard,
}

/// Mutable game state, guarded by the session's coarse lock.
pub(crate) struct GameState {
    pub current_round: usize,
    pub host_id: Uuid,
    pub host_name: String,
    pub players: Vec<PlayerEntry>,
    /// Winners are stored whole because a player may leave the game after
    /// winning; an ID here is not guaranteed to match a roster entry. This
    /// list cannot be used to derive the round count either, since several
    /// players can win a single round.
    pub winning_players: Vec<Player>,
    pub bingo_caller_ids: Vec<Uuid>,
    pub suspensions: Vec<PlayerSuspension>,
    pub banned_player_ids: Vec<Uuid>,
    pub disposed: bool,
}

impl GameState {
    pub fn entry(&self, player_id: Uuid) -> Option<&PlayerEntry> {
        self.players.iter().find(|entry| entry.player.id == player_id)
    }

    pub fn entry_mut(&mut self, player_id: Uuid) -> Option<&mut PlayerEntry> {
        self.players
            .iter_mut()
            .find(|entry| entry.player.id == player_id)
    }
}

/// Everything a game owns, shared between the public handle, the command
/// loop, and outstanding leave handles.
pub(crate) struct GameInner {
    pub id: Uuid,
    pub config: GameConfig,
    pub phase: PhaseCell,
    pub balls: BallRegistry,
    pub cards: Arc<CardRegistry>,
    pub cards_shutdown: StdMutex<Option<RegistryShutdown>>,
    pub subscriptions: Arc<SubscriptionsManager>,
    pub state: Mutex<GameState>,
}

impl GameInner {
    /// Returns every card a player holds to the registry, collecting rather
    /// than short-circuiting; the player is already mid-teardown, so every
    /// card deserves its chance to go back.
    pub async fn return_player_cards(&self, player: &Player) -> Vec<GameError> {
        let mut errors = Vec::new();
        for card in &player.cards {
            if let Err(err) = self.cards.return_card(card).await {
                errors.push(err);
            }
        }
        errors
    }

    /// Signals the card registry worker to stop. Safe to call repeatedly.
    pub fn stop_card_registry(&self) {
        let shutdown = self
            .cards_shutdown
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take();
        if let Some(shutdown) = shutdown {
            shutdown.shutdown();
        }
    }
}

/// A live bingo game.
///
/// The handle is cheap to clone and every clone drives the same game. All
/// command processing funnels through a single loop task, so commands are
/// totally ordered and `issue_command` returns only after the command's
/// events have been dispatched.
#[derive(Clone)]
pub struct BingoGame {
    inner: Arc<GameInner>,
    command_tx: mpsc::Sender<CommandSession>,
}

impl BingoGame {
    /// Builds the game and launches its command loop. Must run inside a
    /// tokio runtime. A card-registry startup failure poisons the phase to
    /// `InitializationFailure` and surfaces the error.
    pub fn spawn(config: GameConfig) -> Result<Self, GameError> {
        config.validate()?;

        let phase = PhaseCell::new();
        let cards = Arc::new(CardRegistry::new(config.rng_seed));
        let cards_shutdown = match cards.start() {
            Ok(shutdown) => shutdown,
            Err(err) => {
                let _ = phase.set(GamePhase::InitializationFailure);
                log::error!("game initialization failed: {err}");
                return Err(err);
            }
        };

        let state = GameState {
            current_round: 0,
            host_id: config.host_id,
            host_name: config.host_name.clone(),
            players: Vec::new(),
            winning_players: Vec::new(),
            bingo_caller_ids: Vec::new(),
            suspensions: Vec::new(),
            banned_player_ids: Vec::new(),
            disposed: false,
        };
        let inner = Arc::new(GameInner {
            id: Uuid::new_v4(),
            balls: BallRegistry::new(config.rng_seed),
            cards,
            cards_shutdown: StdMutex::new(Some(cards_shutdown)),
            subscriptions: SubscriptionsManager::new(),
            state: Mutex::new(state),
            phase,
            config,
        });

        let (command_tx, command_rx) = mpsc::channel(1);
        tokio::spawn(run_command_loop(Arc::clone(&inner), command_rx));

        Ok(Self { inner, command_tx })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn phase(&self) -> GamePhase {
        self.inner.phase.value()
    }

    /// Sends one command through the loop and waits for its result. Fails
    /// fast with [`GameError::Terminated`] once the game has been disposed.
    pub async fn issue_command(&self, command: GameCommand) -> Result<(), GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(CommandSession {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| GameError::Terminated("the game is no longer accepting commands"))?;
        reply_rx
            .await
            .map_err(|_| GameError::Terminated("the game shut down before answering the command"))?
    }

    /// Adds a user as a card player.
    ///
    /// Joining is idempotent: a second call with the same ID returns the
    /// existing player and an equivalent leave handle, without creating a
    /// second subscription or dealing more cards. Players who join outside
    /// the round-start phase are waitlisted until the next round opens.
    pub async fn join_game(
        &self,
        player_id: Uuid,
        player_name: &str,
    ) -> Result<(Player, LeaveGame), GameError> {
        let inner = &self.inner;
        if !inner.phase.ok() {
            return Err(GameError::Terminated(
                "the game is no longer accepting new players",
            ));
        }
        if player_id == inner.config.system_id {
            return Err(GameError::PermissionDenied(
                "the system cannot join its own game as a player".to_string(),
            ));
        }

        let mut state = inner.state.lock().await;
        if state.disposed {
            return Err(GameError::Terminated("the game has been disposed"));
        }
        if player_id == state.host_id {
            return Err(GameError::PermissionDenied(
                "the host cannot join the game they are hosting".to_string(),
            ));
        }
        if state.banned_player_ids.contains(&player_id) {
            return Err(GameError::PermissionDenied(format!(
                "player {player_id} is banned from this game"
            )));
        }

        if let Some(entry) = state.entry(player_id) {
            return Ok((
                entry.player.clone(),
                LeaveGame::new(Arc::clone(inner), entry.entry_id, player_id),
            ));
        }

        let name = player_name.trim();
        if name.is_empty() {
            return Err(GameError::InputValidation(
                "players need a non-empty name".to_string(),
            ));
        }
        if state.players.len() >= inner.config.max_players {
            return Err(GameError::ResourceExhausted(format!(
                "the game is full ({} players)",
                inner.config.max_players
            )));
        }

        let (events, subscription) = inner
            .subscriptions
            .subscribe(Vec::new(), vec![player_id])
            .await?;

        let mut cards = Vec::with_capacity(MAX_CARDS);
        for _ in 0..MAX_CARDS {
            match inner.cards.check_out_card(player_id) {
                Ok(card) => cards.push(card),
                Err(err) => {
                    for card in &cards {
                        if let Err(return_err) = inner.cards.return_card(card).await {
                            log::warn!(
                                "game {}: could not return card during failed join: {return_err}",
                                inner.id
                            );
                        }
                    }
                    subscription.unsubscribe().await;
                    return Err(err);
                }
            }
        }

        let status = if inner.phase.value() == GamePhase::RoundStart {
            PlayerStatus::Active
        } else {
            PlayerStatus::Waitlisted
        };
        let player = Player {
            status,
            id: player_id,
            name: name.to_string(),
            cards,
            events,
        };
        let entry_id = Uuid::new_v4();
        state.players.push(PlayerEntry {
            entry_id,
            player: player.clone(),
            subscription,
        });
        log::info!(
            "player {player_id} ({name}) joined game {} as {status:?}",
            inner.id
        );

        Ok((player, LeaveGame::new(Arc::clone(inner), entry_id, player_id)))
    }

    /// Subscribes an external system to game events with no recipient
    /// narrowing.
    pub async fn subscribe(
        &self,
        phases: Vec<GamePhase>,
    ) -> Result<(EventStream, SubscriptionGuard), GameError> {
        self.inner.subscriptions.subscribe(phases, Vec::new()).await
    }

    /// Clone of the live roster entry for a player, cards and all.
    pub async fn player_snapshot(&self, player_id: Uuid) -> Option<Player> {
        let state = self.inner.state.lock().await;
        state.entry(player_id).map(|entry| entry.player.clone())
    }

    /// Everyone who has won a round so far.
    pub async fn winning_players(&self) -> Vec<Player> {
        let state = self.inner.state.lock().await;
        state.winning_players.clone()
    }
}

#[async_trait]
impl GameManager for BingoGame {
    async fn issue_command(&self, command: GameCommand) -> Result<(), GameError> {
        BingoGame::issue_command(self, command).await
    }

    async fn join_game(
        &self,
        player_id: Uuid,
        player_name: &str,
    ) -> Result<(Player, LeaveGame), GameError> {
        BingoGame::join_game(self, player_id, player_name).await
    }

    async fn subscribe(
        &self,
        phases: Vec<GamePhase>,
    ) -> Result<(EventStream, SubscriptionGuard), GameError> {
        BingoGame::subscribe(self, phases).await
    }
}

/// Removes a player from the game they joined. Single-use per roster entry:
/// once the entry is gone, further calls are no-ops, and a handle from a
/// previous stint cannot touch a rejoined player.
#[derive(Clone)]
pub struct LeaveGame {
    inner: Arc<GameInner>,
    entry_id: Uuid,
    player_id: Uuid,
}

impl std::fmt::Debug for LeaveGame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaveGame")
            .field("entry_id", &self.entry_id)
            .field("player_id", &self.player_id)
            .finish()
    }
}

impl LeaveGame {
    fn new(inner: Arc<GameInner>, entry_id: Uuid, player_id: Uuid) -> Self {
        Self {
            inner,
            entry_id,
            player_id,
        }
    }

    /// Takes the player out of the roster, returns each of their cards
    /// individually, and unsubscribes their event stream. Unsubscribing runs
    /// last so no dispatch can race a dangling entry.
    pub async fn leave(&self) -> Result<(), GameError> {
        let mut state = self.inner.state.lock().await;
        let Some(position) = state
            .players
            .iter()
            .position(|entry| entry.entry_id == self.entry_id)
        else {
            return Ok(());
        };
        let entry = state.players.remove(position);

        let errors = self.inner.return_player_cards(&entry.player).await;
        entry.subscription.unsubscribe().await;
        log::info!("player {} left game {}", self.player_id, self.inner.id);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GameError::compound(errors))
        }
    }
}

async fn run_command_loop(inner: Arc<GameInner>, mut commands: mpsc::Receiver<CommandSession>) {
    log::info!("game {} command loop started", inner.id);

    while let Some(session) = commands.recv().await {
        let command = session.command;
        log::debug!(
            "game {}: processing {} from {}",
            inner.id,
            command.command_type,
            command.commander_id
        );

        let result = handlers::handle_command(&inner, &command).await;
        if let Err(err) = &result {
            emit_command_error(&inner, &command, err).await;
        }

        let disposed =
            result.is_ok() && command.command_type == GameCommandType::SystemDispose;
        let _ = session.reply.send(result);
        if disposed {
            break;
        }
    }

    log::info!("game {} command loop stopped", inner.id);
}

/// Pairs a failed command with an error event narrowed to its commander.
/// Partial dispatch failures are excluded to avoid feedback loops, and
/// terminated subsystems have nobody left to tell.
async fn emit_command_error(inner: &GameInner, command: &GameCommand, err: &GameError) {
    if matches!(
        err,
        GameError::PartialDispatchFailure { .. } | GameError::Terminated(_)
    ) {
        return;
    }

    let event = GameEvent::error(
        command.commander_id,
        inner.phase.value(),
        err.to_string(),
        vec![command.commander_id],
    );
    if let Err(dispatch_err) = inner.subscriptions.dispatch_event(event).await {
        log::warn!(
            "game {}: could not emit error event for {}: {dispatch_err}",
            inner.id,
            command.command_type
        );
    }
}
