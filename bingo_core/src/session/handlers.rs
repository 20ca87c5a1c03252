//! Command handlers. Each handler validates the commander's role and the
//! current phase, mutates state under the game lock, and dispatches its
//! events before returning, so callers observe effects in command order.

use super::actor::{GameInner, GameState};
use crate::commands::{
    AwardsPlayersPayload, BroadcastStatePayload, ChangeNamePayload, DaubPayload, GameCommand,
    GameCommandType, SyncBallPayload, TargetPlayerPayload,
};
use crate::events::GameEvent;
use crate::game::entities::{Ball, GamePhase, GameSnapshot, Player, PlayerStatus, PlayerSuspension};
use crate::game::errors::GameError;
use uuid::Uuid;

pub(crate) async fn handle_command(
    inner: &GameInner,
    command: &GameCommand,
) -> Result<(), GameError> {
    match command.command_type {
        GameCommandType::SystemBroadcastState => system_broadcast_state(inner, command).await,
        GameCommandType::SystemDispose => system_dispose(inner, command).await,
        GameCommandType::SystemCheckHostConnection => {
            system_check_host_connection(inner, command).await
        }
        GameCommandType::HostStartGame => host_start_game(inner, command).await,
        GameCommandType::HostTerminateGame => host_terminate_game(inner, command).await,
        GameCommandType::HostBanPlayer => host_ban_player(inner, command).await,
        GameCommandType::HostSuspendPlayer => host_suspend_player(inner, command).await,
        GameCommandType::HostRequestBall => host_request_ball(inner, command).await,
        GameCommandType::HostSyncBall => host_sync_ball(inner, command).await,
        GameCommandType::HostAcknowledgeBingoCall => {
            host_acknowledge_bingo_call(inner, command).await
        }
        GameCommandType::HostStartTiebreakerRound => {
            host_start_tiebreaker_round(inner, command).await
        }
        GameCommandType::HostAwardsPlayers => host_awards_players(inner, command).await,
        GameCommandType::HostTransferStatus => host_transfer_status(inner, command).await,
        GameCommandType::HostChangeName => host_change_name(inner, command).await,
        GameCommandType::PlayerDaub => set_daub_value(inner, command, true).await,
        GameCommandType::PlayerUndoDaub => set_daub_value(inner, command, false).await,
        GameCommandType::PlayerCallBingo => player_call_bingo(inner, command).await,
        GameCommandType::PlayerRescindBingo => player_rescind_bingo(inner, command).await,
        GameCommandType::PlayerReplaceCards => player_replace_cards(inner, command).await,
        GameCommandType::PlayerChangeName => player_change_name(inner, command).await,
    }
}

// === System commands ===

async fn system_broadcast_state(
    inner: &GameInner,
    command: &GameCommand,
) -> Result<(), GameError> {
    require_system(inner, command.commander_id)?;
    let payload: BroadcastStatePayload = match &command.payload {
        Some(_) => command.parse_payload()?,
        None => BroadcastStatePayload::default(),
    };

    let state = inner.state.lock().await;
    let snapshot = GameSnapshot {
        phase: inner.phase.value(),
        called: inner.balls.called(),
        players: state
            .players
            .iter()
            .map(|entry| entry.player.clone())
            .collect(),
    };
    let message = serde_json::to_string(&snapshot).map_err(|err| {
        GameError::InputValidation(format!("unable to serialize the game snapshot: {err}"))
    })?;

    inner
        .subscriptions
        .dispatch_event(GameEvent::update(
            inner.config.system_id,
            snapshot.phase,
            message,
            payload.recipient_ids,
        ))
        .await
}

async fn system_dispose(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    require_system(inner, command.commander_id)?;

    let mut state = inner.state.lock().await;
    if state.disposed {
        return Err(GameError::Terminated("the game has already been disposed"));
    }
    state.disposed = true;

    inner.stop_card_registry();
    match inner.subscriptions.dispose(inner.config.system_id).await {
        Ok(()) | Err(GameError::Terminated(_)) => {}
        Err(err) => log::warn!("game {}: farewell dispatch incomplete: {err}", inner.id),
    }
    let _ = inner.phase.set(GamePhase::GameOver);

    log::info!("game {} disposed", inner.id);
    Ok(())
}

async fn system_check_host_connection(
    inner: &GameInner,
    command: &GameCommand,
) -> Result<(), GameError> {
    require_system(inner, command.commander_id)?;
    let state = inner.state.lock().await;
    let host_id = state.host_id;
    inner
        .subscriptions
        .dispatch_event(GameEvent::update(
            inner.config.system_id,
            inner.phase.value(),
            "checking host connection",
            vec![host_id],
        ))
        .await
}

// === Host commands ===

async fn host_start_game(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;

    let message = match inner.phase.value() {
        GamePhase::Initialized => {
            round_start_upkeep(inner, &mut state);
            inner.phase.set(GamePhase::RoundStart)?;
            "round 1 is open; waitlisted players are now active".to_string()
        }
        GamePhase::RoundStart => {
            inner.phase.set(GamePhase::Calling)?;
            "the join window has closed; calling has begun".to_string()
        }
        GamePhase::RoundEnd => {
            round_start_upkeep(inner, &mut state);
            inner.phase.set(GamePhase::RoundStart)?;
            format!("round {} is open", state.current_round)
        }
        actual => {
            return Err(GameError::InvalidPhase {
                expected: "initialized, round_start, or round_end",
                actual,
            });
        }
    };

    broadcast(inner, command.commander_id, message).await
}

async fn host_terminate_game(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;

    let actual = inner.phase.value();
    if actual.is_terminal() {
        return Err(GameError::InvalidPhase {
            expected: "any phase before game_over",
            actual,
        });
    }
    inner.phase.set(GamePhase::GameOver)?;
    inner.stop_card_registry();

    broadcast(inner, command.commander_id, "the host has terminated the game").await
}

async fn host_request_ball(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;
    require_phase(inner, &[GamePhase::Calling], "calling")?;

    let ball = inner.balls.next_automatic_call()?;
    log::debug!("game {}: called ball {ball}", inner.id);

    // Recipients stay empty so the call reaches everyone.
    broadcast(inner, command.commander_id, format!("new ball: {ball}")).await
}

async fn host_sync_ball(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;
    require_phase(inner, &[GamePhase::Calling], "calling")?;

    let payload: SyncBallPayload = command.parse_payload()?;
    let ball = Ball::parse(payload.value)?;
    if ball.is_free_space() {
        return Err(GameError::InputValidation(
            "the free space cannot be called".to_string(),
        ));
    }
    inner.balls.sync_manual_call(ball)?;

    broadcast(inner, command.commander_id, format!("new ball: {ball}")).await
}

async fn host_ban_player(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;

    let payload: TargetPlayerPayload = command.parse_payload()?;
    let target = payload.player_id;
    if target == state.host_id || target == inner.config.system_id {
        return Err(GameError::InputValidation(
            "only card players can be banned".to_string(),
        ));
    }

    if !state.banned_player_ids.contains(&target) {
        state.banned_player_ids.push(target);
    }
    state.bingo_caller_ids.retain(|id| *id != target);

    let position = state.players.iter().position(|e| e.player.id == target);
    let removed = position.map(|position| state.players.remove(position));
    if let Some(entry) = &removed {
        for err in inner.return_player_cards(&entry.player).await {
            log::warn!("game {}: card return failed during ban: {err}", inner.id);
        }
    }
    log::info!("game {}: banned player {target}", inner.id);

    // Broadcast before unsubscribing, so the banned player hears the ban as
    // the last event on their stream.
    let result = broadcast(
        inner,
        command.commander_id,
        format!("player {target} has been banned"),
    )
    .await;
    if let Some(entry) = removed {
        entry.subscription.unsubscribe().await;
    }
    result
}

async fn host_suspend_player(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;

    let payload: TargetPlayerPayload = command.parse_payload()?;
    let target = payload.player_id;
    if state.suspensions.iter().any(|s| s.player_id == target) {
        return Err(GameError::InputValidation(format!(
            "player {target} is already suspended"
        )));
    }

    let entry = state.entry_mut(target).ok_or_else(|| {
        GameError::InputValidation(format!("unable to find player with ID {target}"))
    })?;
    entry.player.status = PlayerStatus::Suspended;
    state.suspensions.push(PlayerSuspension {
        player_id: target,
        round_duration: 1,
        rounds_passed: 0,
    });
    log::info!("game {}: suspended player {target}", inner.id);

    broadcast(
        inner,
        command.commander_id,
        format!("player {target} is suspended for 1 round"),
    )
    .await
}

async fn host_acknowledge_bingo_call(
    inner: &GameInner,
    command: &GameCommand,
) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;
    require_phase(inner, &[GamePhase::ConfirmingBingo], "confirming_bingo")?;

    match state.bingo_caller_ids.len() {
        0 => Err(GameError::InputValidation(
            "no players have called bingo".to_string(),
        )),
        1 => {
            let winner = state.bingo_caller_ids[0];
            settle_round(inner, &mut state, &[winner], command.commander_id).await
        }
        _ => {
            inner.phase.set(GamePhase::Tiebreaker)?;
            let callers = state.bingo_caller_ids.len();
            broadcast(
                inner,
                command.commander_id,
                format!("{callers} players called bingo; entering a tiebreaker"),
            )
            .await
        }
    }
}

async fn host_start_tiebreaker_round(
    inner: &GameInner,
    command: &GameCommand,
) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;
    require_phase(inner, &[GamePhase::Tiebreaker], "tiebreaker")?;

    state.bingo_caller_ids.clear();
    inner.balls.reset();
    inner.phase.set(GamePhase::Calling)?;

    broadcast(
        inner,
        command.commander_id,
        "a tiebreaker round of calling has begun",
    )
    .await
}

async fn host_awards_players(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;
    require_phase(
        inner,
        &[GamePhase::ConfirmingBingo, GamePhase::Tiebreaker],
        "confirming_bingo or tiebreaker",
    )?;

    let payload: AwardsPlayersPayload = command.parse_payload()?;
    if payload.player_ids.is_empty() {
        return Err(GameError::InputValidation(
            "at least one player must be awarded".to_string(),
        ));
    }

    settle_round(inner, &mut state, &payload.player_ids, command.commander_id).await
}

async fn host_transfer_status(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;

    let payload: TargetPlayerPayload = command.parse_payload()?;
    let target = payload.player_id;
    let position = state
        .players
        .iter()
        .position(|entry| entry.player.id == target)
        .ok_or_else(|| {
            GameError::InputValidation(format!("unable to find player with ID {target}"))
        })?;

    // Hosts hold no cards, so the promoted player gives theirs back.
    let mut entry = state.players.remove(position);
    for err in inner.return_player_cards(&entry.player).await {
        log::warn!(
            "game {}: card return failed during host transfer: {err}",
            inner.id
        );
    }
    entry.player.cards.clear();
    entry.player.status = PlayerStatus::Host;

    let old_host = state.host_id;
    state.host_id = entry.player.id;
    state.host_name = entry.player.name.clone();
    state.bingo_caller_ids.retain(|id| *id != target);
    log::info!(
        "game {}: host status transferred from {old_host} to {target}",
        inner.id
    );

    broadcast(
        inner,
        command.commander_id,
        format!("{} is now the host", state.host_name),
    )
    .await
}

async fn host_change_name(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let mut state = inner.state.lock().await;
    require_host(&state, command.commander_id)?;

    let payload: ChangeNamePayload = command.parse_payload()?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(GameError::InputValidation(
            "names cannot be empty".to_string(),
        ));
    }
    state.host_name = name.to_string();

    broadcast(
        inner,
        command.commander_id,
        format!("the host is now known as {name}"),
    )
    .await
}

// === Player commands ===

async fn set_daub_value(
    inner: &GameInner,
    command: &GameCommand,
    daubed: bool,
) -> Result<(), GameError> {
    require_phase(
        inner,
        &[
            GamePhase::Calling,
            GamePhase::ConfirmingBingo,
            GamePhase::Tiebreaker,
        ],
        "calling, confirming_bingo, or tiebreaker",
    )?;
    let payload: DaubPayload = command.parse_payload()?;
    let ball = Ball::parse(payload.value)?;

    let mut state = inner.state.lock().await;
    let player = roster_player_mut(&mut state, command.commander_id)?;
    let card = player
        .cards
        .iter_mut()
        .find(|card| card.id == payload.card_id)
        .ok_or_else(|| {
            GameError::InputValidation(format!(
                "player {} does not hold card {}",
                command.commander_id, payload.card_id
            ))
        })?;
    let cell = card.cell_mut(ball).ok_or_else(|| {
        GameError::InputValidation(format!(
            "value {ball} does not exist on card {}",
            payload.card_id
        ))
    })?;
    cell.daubed = daubed;

    let message = if daubed {
        format!("daubed {ball} on card {}", payload.card_id)
    } else {
        format!("removed the daub on {ball} from card {}", payload.card_id)
    };
    inner
        .subscriptions
        .dispatch_event(GameEvent::update(
            command.commander_id,
            inner.phase.value(),
            message,
            vec![command.commander_id],
        ))
        .await
}

async fn player_call_bingo(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    require_phase(
        inner,
        &[
            GamePhase::Calling,
            GamePhase::ConfirmingBingo,
            GamePhase::Tiebreaker,
        ],
        "calling, confirming_bingo, or tiebreaker",
    )?;

    let mut state = inner.state.lock().await;
    let player = roster_player_mut(&mut state, command.commander_id)?;
    if player.status != PlayerStatus::Active {
        return Err(GameError::PermissionDenied(
            "only active players can call bingo".to_string(),
        ));
    }
    let name = player.name.clone();

    let caller = command.commander_id;
    if !state.bingo_caller_ids.contains(&caller) {
        state.bingo_caller_ids.push(caller);
    }
    if inner.phase.value() == GamePhase::Calling {
        inner.phase.set(GamePhase::ConfirmingBingo)?;
    }

    broadcast(inner, caller, format!("{name} called bingo")).await
}

async fn player_rescind_bingo(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    require_phase(
        inner,
        &[GamePhase::ConfirmingBingo, GamePhase::Tiebreaker],
        "confirming_bingo or tiebreaker",
    )?;

    let mut state = inner.state.lock().await;
    let player = roster_player_mut(&mut state, command.commander_id)?;
    let name = player.name.clone();

    let caller = command.commander_id;
    let position = state
        .bingo_caller_ids
        .iter()
        .position(|id| *id == caller)
        .ok_or_else(|| {
            GameError::InputValidation(format!("player {caller} has not called bingo"))
        })?;
    state.bingo_caller_ids.remove(position);

    // With no calls left to confirm, the round goes back to calling.
    if state.bingo_caller_ids.is_empty() && inner.phase.value() == GamePhase::ConfirmingBingo {
        inner.phase.set(GamePhase::Calling)?;
    }

    broadcast(inner, caller, format!("{name} rescinded their bingo call")).await
}

async fn player_replace_cards(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    if !inner.phase.ok() {
        return Err(GameError::Terminated("the game is over"));
    }

    let mut state = inner.state.lock().await;
    let commander = command.commander_id;

    let old_cards = {
        let player = roster_player_mut(&mut state, commander)?;
        std::mem::take(&mut player.cards)
    };

    // The player already gave up their old hand by the time anything can
    // fail, so the registry gathers every error instead of stopping at the
    // first one and hands back whatever it could assemble.
    let (new_cards, errors) = inner.cards.replace_hand(commander, &old_cards);
    if let Some(entry) = state.entry_mut(commander) {
        entry.player.cards = new_cards;
    }

    if !errors.is_empty() {
        return Err(GameError::compound(errors));
    }
    inner
        .subscriptions
        .dispatch_event(GameEvent::update(
            commander,
            inner.phase.value(),
            "hand refresh successful",
            vec![commander],
        ))
        .await
}

async fn player_change_name(inner: &GameInner, command: &GameCommand) -> Result<(), GameError> {
    let payload: ChangeNamePayload = command.parse_payload()?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(GameError::InputValidation(
            "names cannot be empty".to_string(),
        ));
    }

    let mut state = inner.state.lock().await;
    let player = roster_player_mut(&mut state, command.commander_id)?;
    let old_name = std::mem::replace(&mut player.name, name.clone());

    broadcast(
        inner,
        command.commander_id,
        format!("{old_name} is now known as {name}"),
    )
    .await
}

// === Shared helpers ===

fn require_system(inner: &GameInner, commander: Uuid) -> Result<(), GameError> {
    if commander != inner.config.system_id {
        return Err(GameError::PermissionDenied(format!(
            "cannot fulfill a system command for non-system commander {commander}"
        )));
    }
    Ok(())
}

fn require_host(state: &GameState, commander: Uuid) -> Result<(), GameError> {
    if commander != state.host_id {
        return Err(GameError::PermissionDenied(format!(
            "commander {commander} does not match the host"
        )));
    }
    Ok(())
}

fn require_phase(
    inner: &GameInner,
    allowed: &[GamePhase],
    expected: &'static str,
) -> Result<GamePhase, GameError> {
    let actual = inner.phase.value();
    if allowed.contains(&actual) {
        Ok(actual)
    } else {
        Err(GameError::InvalidPhase { expected, actual })
    }
}

/// Finds the commanding player in the roster. Suspended players get a
/// permission error rather than a silent lookup failure.
fn roster_player_mut<'a>(
    state: &'a mut GameState,
    commander: Uuid,
) -> Result<&'a mut Player, GameError> {
    let entry = state.entry_mut(commander).ok_or_else(|| {
        GameError::InputValidation(format!("unable to find player with ID {commander}"))
    })?;
    if entry.player.status == PlayerStatus::Suspended {
        return Err(GameError::PermissionDenied(format!(
            "player {commander} is suspended"
        )));
    }
    Ok(&mut entry.player)
}

async fn broadcast(
    inner: &GameInner,
    created_by: Uuid,
    message: impl Into<String>,
) -> Result<(), GameError> {
    inner
        .subscriptions
        .dispatch_event(GameEvent::update(
            created_by,
            inner.phase.value(),
            message,
            Vec::new(),
        ))
        .await
}

/// Upkeep that runs whenever a new round opens: bump the round counter,
/// reshuffle the balls, tick suspensions, and promote whoever is eligible.
fn round_start_upkeep(inner: &GameInner, state: &mut GameState) {
    state.current_round += 1;
    state.bingo_caller_ids.clear();
    inner.balls.reset();

    let mut released = Vec::new();
    for suspension in &mut state.suspensions {
        suspension.rounds_passed += 1;
        if suspension.rounds_passed >= suspension.round_duration {
            released.push(suspension.player_id);
        }
    }
    state
        .suspensions
        .retain(|suspension| suspension.rounds_passed < suspension.round_duration);

    for entry in &mut state.players {
        match entry.player.status {
            PlayerStatus::Waitlisted => entry.player.status = PlayerStatus::Active,
            PlayerStatus::Suspended if released.contains(&entry.player.id) => {
                entry.player.status = PlayerStatus::Active;
            }
            _ => {}
        }
    }
}

/// Records the winners and closes the round: the game ends after the final
/// round, otherwise play pauses at round_end until the host opens the next
/// one.
async fn settle_round(
    inner: &GameInner,
    state: &mut GameState,
    winner_ids: &[Uuid],
    commander: Uuid,
) -> Result<(), GameError> {
    let mut winners = Vec::with_capacity(winner_ids.len());
    for id in winner_ids {
        let entry = state.entry(*id).ok_or_else(|| {
            GameError::InputValidation(format!("unable to find player with ID {id}"))
        })?;
        winners.push(entry.player.clone());
    }

    let names: Vec<String> = winners.iter().map(|player| player.name.clone()).collect();
    state.winning_players.extend(winners);
    state.bingo_caller_ids.clear();

    let message = if state.current_round >= inner.config.max_rounds {
        inner.phase.set(GamePhase::GameOver)?;
        format!(
            "{} won the final round; the game is over",
            names.join(", ")
        )
    } else {
        inner.phase.set(GamePhase::RoundEnd)?;
        format!(
            "{} won round {}",
            names.join(", "),
            state.current_round
        )
    };

    broadcast(inner, commander, message).await
}
