use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::event::RouterHandle;
use crate::room::repository::RoomStore;
use crate::websockets::ConnectionBinder;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub room_store: Arc<dyn RoomStore + Send + Sync>,
    pub binder: Arc<ConnectionBinder>,
    pub router: RouterHandle,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        room_store: Arc<dyn RoomStore + Send + Sync>,
        binder: Arc<ConnectionBinder>,
        router: RouterHandle,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            room_store,
            binder,
            router,
            config,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Payload that does not match any known message shape
    #[error("Malformed message: {0}")]
    Protocol(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Readiness barrier rejected a start request
    #[error("Not every player is ready")]
    PlayersNotReady,

    /// Delivery to a connection that is already gone
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No free room code could be allocated")]
    CodeSpaceExhausted,

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Protocol(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::PlayersNotReady => (StatusCode::CONFLICT, self.to_string()),
            AppError::CodeSpaceExhausted => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Transport(_) | AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "mensaje": message
        }));

        (status, body).into_response()
    }
}
