use redis::{aio::ConnectionManager, AsyncCommands};

use crate::{
    error::ServerError,
    model::{AiCache, Game, GameState, Players},
    token::GameToken,
};

/// Durable shared state adapter. Every operation is a whole-value
/// read-modify-write against Redis; there is no compare-and-swap, so callers
/// that mutate long-lived fields must re-read immediately before writing.
///
/// Grounded on the four-key scheme used by the original implementation's
/// `get_game_data`/`get_players_data`/`get_game_state`/`get_ai_response_cache`
/// helpers.
#[derive(Clone)]
pub struct Store {
    conn: ConnectionManager,
}

fn game_key(code: &GameToken) -> String {
    format!("game:{code}")
}

fn players_key(code: &GameToken) -> String {
    format!("game:{code}:players")
}

fn state_key(code: &GameToken) -> String {
    format!("game:{code}:state")
}

fn ai_cache_key(code: &GameToken) -> String {
    format!("game:{code}:ai_cache")
}

impl Store {
    pub async fn connect(redis_url: &str) -> Result<Self, ServerError> {
        let client = redis::Client::open(redis_url).map_err(ServerError::from)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    pub async fn game_exists(&self, code: &GameToken) -> Result<bool, ServerError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(game_key(code)).await?;
        Ok(exists)
    }

    pub async fn get_game(&self, code: &GameToken) -> Result<Option<Game>, ServerError> {
        self.get_json(&game_key(code)).await
    }

    pub async fn save_game(&self, game: &Game) -> Result<(), ServerError> {
        self.put_json(&game_key(&game.code), game).await
    }

    pub async fn get_players(&self, code: &GameToken) -> Result<Players, ServerError> {
        Ok(self.get_json(&players_key(code)).await?.unwrap_or_default())
    }

    pub async fn save_players(&self, code: &GameToken, players: &Players) -> Result<(), ServerError> {
        self.put_json(&players_key(code), players).await
    }

    pub async fn get_state(&self, code: &GameToken) -> Result<Option<GameState>, ServerError> {
        self.get_json(&state_key(code)).await
    }

    pub async fn save_state(&self, code: &GameToken, state: GameState) -> Result<(), ServerError> {
        self.put_json(&state_key(code), &state).await
    }

    pub async fn get_ai_cache(&self, code: &GameToken) -> Result<AiCache, ServerError> {
        Ok(self.get_json(&ai_cache_key(code)).await?.unwrap_or_default())
    }

    pub async fn save_ai_cache(&self, code: &GameToken, cache: &AiCache) -> Result<(), ServerError> {
        self.put_json(&ai_cache_key(code), cache).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ServerError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), ServerError> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(value)?;
        conn.set(key, raw).await?;
        Ok(())
    }
}
