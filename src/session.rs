use std::{sync::Arc, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use log::{debug, error, warn};
use serde::Serialize;
use serde_json::json;
use tokio::{
    sync::Mutex,
    time::{interval, timeout, Instant},
};
use uuid::Uuid;

use crate::{
    error::ServerError,
    games,
    leaderboard::{players_metrics, relative_leaderboard},
    model::{AiCache, GameState, Question, NUM_ATTEMPTS, TIME_LIMIT},
    providers::HintProvider,
    scoring,
    store::Store,
    token::GameToken,
};

/// Shared handle to the write half of a connection, so the two cooperative
/// tasks of a session can both push frames without fighting over ownership.
#[derive(Clone)]
struct Outbound(Arc<Mutex<SplitSink<WebSocket, Message>>>);

impl Outbound {
    fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }

    async fn send_text(&self, text: impl Into<String>) {
        if let Err(err) = self.0.lock().await.send(Message::Text(text.into())).await {
            warn!("failed to write to socket: {err}");
        }
    }

    async fn send_json<S: Serialize>(&self, value: &S) {
        match serde_json::to_string(value) {
            Ok(text) => self.send_text(text).await,
            Err(err) => error!("failed to encode outgoing message: {err}"),
        }
    }
}

fn now_unix() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

// --- Host session: command handler + metrics pusher (§4.1, §4.2) --------

pub async fn run_host(socket: WebSocket, code: GameToken, store: Store) {
    let Some(mutex_token) = games::acquire_host(code).await else {
        let (mut sink, _) = socket.split();
        let _ = sink.send(Message::Text("[HOST_ALREADY_CONNECTED]".into())).await;
        return;
    };

    if store.get_game(&code).await.ok().flatten().is_none() {
        games::release_host(code, mutex_token).await;
        let (mut sink, _) = socket.split();
        let _ = sink.send(Message::Text("[GAME_NOT_FOUND]".into())).await;
        return;
    }

    let (sink, stream) = socket.split();
    let outbound = Outbound::new(sink);
    outbound.send_text("[WAITING]").await;

    let commands = tokio::spawn(host_command_loop(stream, outbound.clone(), code, store.clone()));
    let metrics = tokio::spawn(host_metrics_loop(outbound, code, store));

    tokio::select! {
        _ = commands => metrics.abort(),
        _ = metrics => commands.abort(),
    }

    games::release_host(code, mutex_token).await;
    debug!("host session for {code} ended");
}

/// Pure host state transition table (§4.1). Returns the next state to
/// persist (`None` when the command makes no store mutation) and the
/// bracket-token reply to send back.
fn host_transition(state: GameState, command: &str) -> (Option<GameState>, &'static str) {
    match (state, command) {
        (GameState::Waiting, "start") => (Some(GameState::Started), "[START]"),
        (GameState::Started, "pause") => (Some(GameState::Paused), "[PAUSE]"),
        (GameState::Paused, "resume") => (Some(GameState::Started), "[RESUME]"),
        (GameState::Waiting | GameState::Started | GameState::Paused, "end") => {
            (Some(GameState::Ended), "[END]")
        }
        (GameState::Ended, "end") => (None, "[END]"),
        _ => (None, "[INVALID_COMMAND]"),
    }
}

async fn host_command_loop(
    mut stream: futures_util::stream::SplitStream<WebSocket>,
    outbound: Outbound,
    code: GameToken,
    store: Store,
) {
    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else {
            if matches!(msg, Message::Close(_)) {
                break;
            }
            continue;
        };

        let command = text.trim().to_ascii_lowercase();

        let state = match store.get_state(&code).await {
            Ok(Some(state)) => state,
            Ok(None) | Err(_) => {
                outbound.send_text("[GAME_NOT_FOUND]").await;
                break;
            }
        };

        let (next_state, reply) = host_transition(state, &command);

        if let Some(next_state) = next_state {
            if next_state == GameState::Started && state == GameState::Waiting {
                if let Ok(Some(mut game)) = store.get_game(&code).await {
                    game.start_time = Some(now_unix());
                    if let Err(err) = store.save_game(&game).await {
                        error!("failed to stamp game start time: {err}");
                    }
                }
            }

            if let Err(err) = store.save_state(&code, next_state).await {
                error!("failed to persist game state: {err}");
            }
        }

        outbound.send_text(reply).await;

        if reply == "[END]" {
            break;
        }
    }
}

async fn host_metrics_loop(outbound: Outbound, code: GameToken, store: Store) {
    let Ok(players) = store.get_players(&code).await else {
        return;
    };
    outbound
        .send_json(&json!({ "metrics": players_metrics(&players) }))
        .await;

    let mut previous_count = players.len();
    let mut ticker = interval(Duration::from_secs(1));

    loop {
        ticker.tick().await;

        let Ok(state) = store.get_state(&code).await else {
            break;
        };
        let Some(state) = state else { break };

        let Ok(players) = store.get_players(&code).await else {
            break;
        };
        let Ok(game) = store.get_game(&code).await else {
            break;
        };
        let Some(mut game) = game else { break };

        let roster_changed = players.len() != previous_count;
        previous_count = players.len();

        if state != GameState::Started && !roster_changed {
            if state == GameState::Ended {
                break;
            }
            continue;
        }

        game.questions.clear();
        outbound
            .send_json(&json!({
                "metrics": {
                    "game_data": game,
                    "player_metrics": players_metrics(&players),
                }
            }))
            .await;

        if state == GameState::Ended {
            break;
        }
    }
}

// --- Player session: interrupt poller + question loop (§4.3) ------------

pub async fn run_player(
    socket: WebSocket,
    code: GameToken,
    name: String,
    store: Store,
    hints: Arc<dyn HintProvider>,
) {
    let (sink, stream) = socket.split();
    let outbound = Outbound::new(sink);

    let mutex_token = Uuid::new_v4();
    match store.get_players(&code).await {
        Ok(mut players) => match players.get_mut(&name) {
            Some(player) if player.websocket_id.is_none() => {
                player.websocket_id = Some(mutex_token);
                if store.save_players(&code, &players).await.is_err() {
                    outbound.send_text("[GAME_NOT_FOUND]").await;
                    return;
                }
            }
            Some(_) => {
                outbound.send_text("[USER_NOT_IN_GAME]").await;
                return;
            }
            None => {
                outbound.send_text("[USER_NOT_IN_GAME]").await;
                return;
            }
        },
        Err(_) => {
            outbound.send_text("[GAME_NOT_FOUND]").await;
            return;
        }
    }

    let interrupt = tokio::spawn(interrupt_loop(outbound.clone(), code, store.clone()));
    let question = tokio::spawn(question_loop(
        stream,
        outbound,
        code,
        name.clone(),
        store.clone(),
        hints,
    ));

    tokio::select! {
        _ = interrupt => question.abort(),
        _ = question => interrupt.abort(),
    }

    if let Ok(mut players) = store.get_players(&code).await {
        if let Some(player) = players.get_mut(&name) {
            if player.websocket_id == Some(mutex_token) {
                player.websocket_id = None;
                let _ = store.save_players(&code, &players).await;
            }
        }
    }
}

async fn interrupt_loop(outbound: Outbound, code: GameToken, store: Store) {
    let mut was_paused = false;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;

        let state = match store.get_state(&code).await {
            Ok(Some(state)) => state,
            _ => return,
        };

        match state {
            GameState::Paused => {
                if !was_paused {
                    outbound.send_text("[PAUSE]").await;
                    was_paused = true;
                }
            }
            GameState::Ended => {
                outbound.send_text("[END]").await;
                return;
            }
            _ => {
                if was_paused {
                    outbound.send_text("[RESUME]").await;
                    was_paused = false;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct QuestionPayload<'a> {
    question: &'a str,
    options: &'a std::collections::HashMap<String, String>,
    start_time: f64,
    questions_remaining: usize,
    total_questions: usize,
}

enum NextAction {
    AwaitAck,
    AwaitAckAfterTimeout { answer_label: String },
    Proceed,
}

async fn question_loop(
    mut stream: futures_util::stream::SplitStream<WebSocket>,
    outbound: Outbound,
    code: GameToken,
    name: String,
    store: Store,
    hints: Arc<dyn HintProvider>,
) {
    let mut pending = NextAction::Proceed;

    loop {
        let Ok(Some(game)) = store.get_game(&code).await else {
            outbound.send_text("[GAME_NOT_FOUND]").await;
            return;
        };
        let Ok(mut players) = store.get_players(&code).await else {
            outbound.send_text("[GAME_NOT_FOUND]").await;
            return;
        };
        let Some(mut player) = players.remove(&name) else {
            outbound.send_text("[USER_NOT_IN_GAME]").await;
            return;
        };

        drain_pending(&mut stream).await;

        match std::mem::replace(&mut pending, NextAction::Proceed) {
            NextAction::Proceed => {}
            NextAction::AwaitAck => {
                let _ = await_ack(&mut stream).await;
            }
            NextAction::AwaitAckAfterTimeout { answer_label } => {
                outbound
                    .send_json(&json!({ "out_of_time": { "answer": answer_label } }))
                    .await;
                let _ = await_ack(&mut stream).await;
            }
        }

        if player.remaining_questions.is_empty() && player.is_idle() {
            outbound.send_text("[ALL_QUESTIONS_ANSWERED]").await;
            return;
        }

        if !player.is_idle() {
            let elapsed = now_unix() - player.question_start_time.unwrap_or_else(now_unix);
            if elapsed > TIME_LIMIT as f64 {
                player.incorrect_questions.push(player.current_question_index as usize);
                player.current_question_index = -1;
                player.question_start_time = None;
                player.question_attempt = 0;
                players.insert(name.clone(), player);
                let _ = store.save_players(&code, &players).await;
                continue;
            }
        }

        if player.is_idle() {
            let state = store.get_state(&code).await.ok().flatten();
            if state != Some(GameState::Started) {
                players.insert(name.clone(), player);
                let _ = store.save_players(&code, &players).await;
                tokio::time::sleep(Duration::from_millis(250)).await;
                continue;
            }

            let Some(index) = player.remaining_questions.pop() else {
                outbound.send_text("[ALL_QUESTIONS_ANSWERED]").await;
                return;
            };
            player.current_question_index = index as i64;
            player.question_start_time = Some(now_unix());
            player.question_attempt = 0;
            players.insert(name.clone(), player.clone());
            if store.save_players(&code, &players).await.is_err() {
                return;
            }
        } else {
            players.insert(name.clone(), player.clone());
        }

        let index = player.current_question_index as usize;
        let Some(question) = game.questions.get(index) else {
            outbound.send_text("[GAME_NOT_FOUND]").await;
            return;
        };
        let start_time = player.question_start_time.unwrap_or_else(now_unix);

        outbound
            .send_json(&json!({
                "question": QuestionPayload {
                    question: &question.question,
                    options: &question.options,
                    start_time,
                    questions_remaining: player.remaining_questions.len(),
                    total_questions: game.questions.len(),
                }
            }))
            .await;

        let outcome = run_attempt_loop(
            &mut stream,
            &outbound,
            &code,
            &store,
            &hints,
            question,
            index,
            &name,
            start_time,
            player.question_attempt,
        )
        .await;

        match outcome {
            AttemptOutcome::TimedOut => {
                let key = question.answer.clone();
                let text = question.options.get(&key).cloned().unwrap_or_default();
                pending = NextAction::AwaitAckAfterTimeout {
                    answer_label: format!("{key}. {text}"),
                };

                let Ok(mut players) = store.get_players(&code).await else { return };
                if let Some(p) = players.get_mut(&name) {
                    p.incorrect_questions.push(index);
                    p.current_question_index = -1;
                    p.question_start_time = None;
                    p.question_attempt = 0;
                }
                let _ = store.save_players(&code, &players).await;
            }
            AttemptOutcome::Disconnected => return,
            AttemptOutcome::Finished { points, correct } => {
                let Ok(mut players) = store.get_players(&code).await else { return };
                if let Some(p) = players.get_mut(&name) {
                    p.score += points;
                    if correct {
                        p.correct_questions.push(index);
                    } else {
                        p.incorrect_questions.push(index);
                    }
                    p.current_question_index = -1;
                    p.question_start_time = None;
                    p.question_attempt = 0;
                }
                let _ = store.save_players(&code, &players).await;

                if let Ok(players) = store.get_players(&code).await {
                    if let Some(board) = relative_leaderboard(&players, &name) {
                        outbound.send_json(&json!({ "leaderboard": board })).await;
                    }
                }

                pending = NextAction::AwaitAck;
            }
        }
    }
}

enum AttemptOutcome {
    Finished { points: i64, correct: bool },
    TimedOut,
    Disconnected,
}

#[allow(clippy::too_many_arguments)]
async fn run_attempt_loop(
    stream: &mut futures_util::stream::SplitStream<WebSocket>,
    outbound: &Outbound,
    code: &GameToken,
    store: &Store,
    hints: &Arc<dyn HintProvider>,
    question: &Question,
    question_index: usize,
    name: &str,
    start_time: f64,
    mut attempt: u32,
) -> AttemptOutcome {
    let deadline = Instant::now() + Duration::from_secs_f64((start_time + TIME_LIMIT as f64 - now_unix()).max(0.0));

    while attempt < NUM_ATTEMPTS {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return AttemptOutcome::TimedOut;
        }

        let msg = match timeout(remaining, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return AttemptOutcome::Disconnected,
            Ok(Some(Err(_))) | Ok(Some(Ok(_))) => continue,
            Err(_) => return AttemptOutcome::TimedOut,
        };

        let state = store.get_state(code).await.ok().flatten();
        if state != Some(GameState::Started) {
            continue;
        }

        let raw = msg.trim();
        if raw.is_empty() {
            outbound
                .send_json(&json!({ "attempt": { "valid": false, "final": false, "correct": false, "points": 0 } }))
                .await;
            continue;
        }

        let matched_key = question
            .options
            .keys()
            .find(|key| key.eq_ignore_ascii_case(raw));

        let Some(key) = matched_key else {
            outbound
                .send_json(&json!({ "attempt": { "valid": false, "final": false, "correct": false, "points": 0 } }))
                .await;
            continue;
        };

        if key == &question.answer {
            let elapsed = now_unix() - start_time;
            let points = scoring::score(attempt, elapsed);
            outbound
                .send_json(&json!({ "attempt": { "valid": true, "final": true, "correct": true, "points": points } }))
                .await;
            return AttemptOutcome::Finished { points, correct: true };
        }

        if attempt == 0 {
            outbound
                .send_json(&json!({ "attempt": { "valid": true, "final": false, "correct": false } }))
                .await;

            attempt += 1;
            if let Ok(mut players) = store.get_players(code).await {
                if let Some(p) = players.get_mut(name) {
                    p.question_attempt = attempt;
                }
                let _ = store.save_players(code, &players).await;
            }

            if let Ok(hint) = fetch_hint(code, store, hints, question, question_index, key).await {
                outbound.send_json(&json!({ "help": hint })).await;
            }
        } else {
            outbound
                .send_json(&json!({
                    "attempt": { "valid": true, "final": true, "correct": false, "points": 0, "answer": question.answer }
                }))
                .await;
            return AttemptOutcome::Finished { points: 0, correct: false };
        }
    }

    AttemptOutcome::TimedOut
}

/// Looks up a previously-cached hint for `(question_index, wrong_key)`,
/// keeping the pure cache-indexing logic separate from the store round trip
/// so repeated-lookup behaviour can be unit-tested without a live store.
fn lookup_cached_hint(cache: &AiCache, question_index: usize, wrong_key: &str) -> Option<String> {
    cache.get(&question_index)?.get(wrong_key).cloned()
}

async fn fetch_hint(
    code: &GameToken,
    store: &Store,
    hints: &Arc<dyn HintProvider>,
    question: &Question,
    question_index: usize,
    wrong_key: &str,
) -> Result<String, ServerError> {
    let mut cache = store.get_ai_cache(code).await.unwrap_or_default();

    if let Some(hint) = lookup_cached_hint(&cache, question_index, wrong_key) {
        return Ok(hint);
    }

    let correct_text = question
        .options
        .get(&question.answer)
        .cloned()
        .unwrap_or_default();
    let wrong_text = question.options.get(wrong_key).cloned().unwrap_or_default();

    let hint = hints.hint(&question.question, &correct_text, &wrong_text).await?;
    cache
        .entry(question_index)
        .or_default()
        .insert(wrong_key.to_string(), hint.clone());
    let _ = store.save_ai_cache(code, &cache).await;

    Ok(hint)
}

/// Drains any immediately-available inbound message with a short timeout,
/// discarding pre-start noise. Runs unconditionally on every loop iteration.
async fn drain_pending(stream: &mut futures_util::stream::SplitStream<WebSocket>) {
    while let Ok(Some(_)) = timeout(Duration::from_millis(100), stream.next()).await {}
}

/// Awaits exactly one inbound message as the paced "next" acknowledgement.
/// Only called when a prior outcome left the player waiting to advance.
async fn await_ack(stream: &mut futures_util::stream::SplitStream<WebSocket>) -> Option<()> {
    match timeout(Duration::from_secs(3600), stream.next()).await {
        Ok(Some(Ok(_))) => Some(()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_transition_waiting_start_reaches_started() {
        let (next, reply) = host_transition(GameState::Waiting, "start");
        assert_eq!(next, Some(GameState::Started));
        assert_eq!(reply, "[START]");
    }

    #[test]
    fn host_transition_started_pause_reaches_paused() {
        let (next, reply) = host_transition(GameState::Started, "pause");
        assert_eq!(next, Some(GameState::Paused));
        assert_eq!(reply, "[PAUSE]");
    }

    #[test]
    fn host_transition_paused_resume_reaches_started() {
        let (next, reply) = host_transition(GameState::Paused, "resume");
        assert_eq!(next, Some(GameState::Started));
        assert_eq!(reply, "[RESUME]");
    }

    #[test]
    fn host_transition_any_live_state_ends_on_end() {
        for state in [GameState::Waiting, GameState::Started, GameState::Paused] {
            let (next, reply) = host_transition(state, "end");
            assert_eq!(next, Some(GameState::Ended));
            assert_eq!(reply, "[END]");
        }
    }

    #[test]
    fn host_transition_unreachable_pair_is_invalid_and_makes_no_mutation() {
        let unreachable = [
            (GameState::Waiting, "pause"),
            (GameState::Waiting, "resume"),
            (GameState::Started, "start"),
            (GameState::Started, "resume"),
            (GameState::Paused, "start"),
            (GameState::Paused, "pause"),
            (GameState::Ended, "start"),
            (GameState::Ended, "pause"),
            (GameState::Ended, "resume"),
        ];
        for (state, command) in unreachable {
            let (next, reply) = host_transition(state, command);
            assert_eq!(next, None, "{state:?}/{command} should not mutate state");
            assert_eq!(reply, "[INVALID_COMMAND]");
        }
    }

    #[test]
    fn host_transition_rejects_garbage_commands() {
        let (next, reply) = host_transition(GameState::Started, "banana");
        assert_eq!(next, None);
        assert_eq!(reply, "[INVALID_COMMAND]");
    }

    #[test]
    fn cached_hint_miss_returns_none() {
        let cache = AiCache::new();
        assert_eq!(lookup_cached_hint(&cache, 0, "A"), None);
    }

    #[test]
    fn cached_hint_hit_is_byte_identical_across_repeated_lookups() {
        let mut cache = AiCache::new();
        cache
            .entry(2)
            .or_default()
            .insert("B".to_string(), "the answer predates the question".to_string());

        let first = lookup_cached_hint(&cache, 2, "B");
        let second = lookup_cached_hint(&cache, 2, "B");
        assert_eq!(first, Some("the answer predates the question".to_string()));
        assert_eq!(first, second);
    }

    #[test]
    fn cached_hint_is_keyed_by_both_question_index_and_wrong_option() {
        let mut cache = AiCache::new();
        cache.entry(0).or_default().insert("A".to_string(), "hint for 0/A".to_string());
        cache.entry(0).or_default().insert("B".to_string(), "hint for 0/B".to_string());
        cache.entry(1).or_default().insert("A".to_string(), "hint for 1/A".to_string());

        assert_eq!(lookup_cached_hint(&cache, 0, "A"), Some("hint for 0/A".to_string()));
        assert_eq!(lookup_cached_hint(&cache, 0, "B"), Some("hint for 0/B".to_string()));
        assert_eq!(lookup_cached_hint(&cache, 1, "A"), Some("hint for 1/A".to_string()));
        assert_eq!(lookup_cached_hint(&cache, 1, "B"), None);
    }
}
