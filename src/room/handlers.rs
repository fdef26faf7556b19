use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use super::types::{
    CreateRoomResponse, HostNameResponse, MessageResponse, PlayerResponse, RoomSummary,
    SelectAvatarRequest,
};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /crear-sala
#[instrument(name = "create_room", skip(state))]
pub async fn create_room(State(state): State<AppState>) -> Result<Json<CreateRoomResponse>, AppError> {
    let codigo = state.room_store.create_room().await?;
    info!(room_code = %codigo, "Room created over HTTP");
    Ok(Json(CreateRoomResponse { codigo }))
}

/// GET /salas
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomSummary>>, AppError> {
    let rooms = state.room_store.list_rooms().await?;
    Ok(Json(rooms.iter().map(RoomSummary::from).collect()))
}

/// Roster of a room in join order
///
/// GET /sala/:codigo
#[instrument(name = "list_players", skip(state))]
pub async fn list_players(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<Vec<PlayerResponse>>, AppError> {
    let room = state.room_store.get_room(&codigo).await?;
    Ok(Json(room.players.iter().map(PlayerResponse::from).collect()))
}

/// Display name of the first player to join (id 0)
///
/// GET /sala/:codigo/host
#[instrument(name = "get_host_name", skip(state))]
pub async fn get_host_name(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<HostNameResponse>, AppError> {
    let room = state.room_store.get_room(&codigo).await?;
    let host = room
        .host()
        .ok_or_else(|| AppError::NotFound(format!("La sala {} no tiene anfitrión", room.code)))?;

    Ok(Json(HostNameResponse {
        host_name: host.display_name.clone(),
    }))
}

/// DELETE /sala/:codigo
#[instrument(name = "delete_room", skip(state))]
pub async fn delete_room(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.router.close_room(codigo).await?;
    Ok(Json(MessageResponse {
        mensaje: "Sala eliminada exitosamente".to_string(),
    }))
}

/// POST /seleccionar-avatar
#[instrument(name = "select_avatar", skip(state))]
pub async fn select_avatar(
    State(state): State<AppState>,
    Json(request): Json<SelectAvatarRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .router
        .select_avatar(request.id, request.avatar, request.sala)
        .await?;
    Ok(Json(MessageResponse {
        mensaje: "Avatar actualizado".to_string(),
    }))
}
