use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{Player, PlayerId, Room};

/// Response for room creation
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub codigo: String,
}

/// One entry of a room's roster
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayerResponse {
    pub id: PlayerId,
    pub nombre: String,
    pub ready: bool,
    pub avatar: Option<String>,
}

impl From<&Player> for PlayerResponse {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            nombre: player.display_name.clone(),
            ready: player.ready,
            avatar: player.avatar.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HostNameResponse {
    #[serde(rename = "nombreHost")]
    pub host_name: String,
}

/// Overview of a live room
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomSummary {
    pub codigo: String,
    pub jugadores: usize,
    pub activos: usize,
    pub presentador: bool,
    pub creada: DateTime<Utc>,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            codigo: room.code.clone(),
            jugadores: room.players.len(),
            activos: room.active_player_count(),
            presentador: room.presenter.is_some(),
            creada: room.created_at,
        }
    }
}

/// Request payload for choosing an avatar outside the socket
#[derive(Debug, Deserialize)]
pub struct SelectAvatarRequest {
    pub id: PlayerId,
    pub avatar: String,
    #[serde(default)]
    pub sala: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub mensaje: String,
}
