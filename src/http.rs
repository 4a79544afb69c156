use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::debug;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    error::ServerError,
    model::{Game, GameState, Player},
    providers::{AvatarProvider, HintProvider, QuestionProvider},
    session,
    store::Store,
    token::GameToken,
};

/// Shared application dependencies, injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub questions: Arc<dyn QuestionProvider>,
    pub hints: Arc<dyn HintProvider>,
    pub avatars: Arc<dyn AvatarProvider>,
}

/// Configuration function for configuring all the routes
pub fn router(state: AppState, allowed_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(
            allowed_origin.parse().expect("invalid allowed origin"),
        ))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/creategame", post(create_game))
        .route("/api/joingame/:game_code", post(join_game))
        .route("/ws/game/:game_code/:name", get(player_socket))
        .route("/ws/host/:game_code", get(host_socket))
        .layer(cors)
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateGameQuery {
    user_prompt: String,
}

#[derive(Serialize)]
struct CreateGameResponse {
    game_code: GameToken,
    message: &'static str,
}

/// Endpoint for creating a new quiz game from a text prompt
async fn create_game(
    State(state): State<AppState>,
    Query(query): Query<CreateGameQuery>,
) -> Result<Response, ServerError> {
    let questions = state.questions.generate(&query.user_prompt).await?;

    let code = GameToken::unique_token(&state.store).await?;
    let game = Game {
        code,
        questions,
        start_time: None,
    };

    state.store.save_game(&game).await?;
    state.store.save_state(&code, GameState::Waiting).await?;

    debug!("created game {code}");

    Ok(Json(CreateGameResponse {
        game_code: code,
        message: "Game created",
    })
    .into_response())
}

#[derive(Deserialize)]
struct JoinGameQuery {
    player_name: String,
}

#[derive(Serialize)]
struct JoinGameResponse {
    message: &'static str,
    game_code: GameToken,
    player_name: String,
}

async fn join_game(
    State(state): State<AppState>,
    Path(game_code): Path<String>,
    Query(query): Query<JoinGameQuery>,
) -> Result<Response, ServerError> {
    let code: GameToken = game_code.parse()?;

    let game = state
        .store
        .get_game(&code)
        .await?
        .ok_or(ServerError::GameNotFound)?;

    let mut players = state.store.get_players(&code).await?;

    if let Some(existing) = players.get(&query.player_name) {
        if existing.websocket_id.is_some() {
            return Err(ServerError::PlayerAlreadyConnected);
        }
        return Ok(Json(JoinGameResponse {
            message: "Player reconnected",
            game_code: code,
            player_name: query.player_name,
        })
        .into_response());
    }

    let avatar = state.avatars.lookup(&query.player_name).await;
    let player = Player::new(game.questions.len(), avatar);
    players.insert(query.player_name.clone(), player);
    state.store.save_players(&code, &players).await?;

    debug!("{} joined game {code}", query.player_name);

    Ok(Json(JoinGameResponse {
        message: "Joined game",
        game_code: code,
        player_name: query.player_name,
    })
    .into_response())
}

async fn player_socket(
    State(state): State<AppState>,
    Path((game_code, name)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let code: GameToken = game_code.parse()?;
    let store = state.store.clone();
    let hints = state.hints.clone();

    Ok(ws.on_upgrade(move |socket| session::run_player(socket, code, name, store, hints)))
}

async fn host_socket(
    State(state): State<AppState>,
    Path(game_code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let code: GameToken = game_code.parse()?;
    let store = state.store.clone();

    Ok(ws.on_upgrade(move |socket| session::run_host(socket, code, store)))
}
