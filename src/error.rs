use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Central error type covering every fallible operation in the engine.
///
/// Mirrors the variant-per-failure-mode shape of the teacher's `ServerError`.
/// Never serialized directly to clients: HTTP handlers render `to_string()`
/// into a JSON body, and websocket paths report failures as bracket tokens.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Game not found")]
    GameNotFound,
    #[error("player is not in this game")]
    PlayerNotInGame,
    #[error("Player already in game")]
    PlayerAlreadyConnected,
    #[error("a host is already connected to this game")]
    HostAlreadyConnected,
    #[error("malformed game token")]
    InvalidToken,
    #[error("message was malformed")]
    MalformedMessage,
    #[error("Error loading quiz file")]
    CatalogUnavailable,
    #[error("state store error: {0}")]
    Store(String),
    #[error("unexpected server error")]
    Unexpected,
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::GameNotFound => StatusCode::NOT_FOUND,
            ServerError::PlayerNotInGame => StatusCode::NOT_FOUND,
            ServerError::PlayerAlreadyConnected => StatusCode::BAD_REQUEST,
            ServerError::HostAlreadyConnected => StatusCode::BAD_REQUEST,
            ServerError::InvalidToken => StatusCode::BAD_REQUEST,
            ServerError::MalformedMessage => StatusCode::BAD_REQUEST,
            ServerError::CatalogUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        (self.status(), Json(ErrorBody { message })).into_response()
    }
}

impl From<redis::RedisError> for ServerError {
    fn from(value: redis::RedisError) -> Self {
        ServerError::Store(value.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(value: serde_json::Error) -> Self {
        ServerError::Store(value.to_string())
    }
}
