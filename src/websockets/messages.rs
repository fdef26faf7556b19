use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::room::models::PlayerId;
use crate::shared::AppError;

/// Client -> Server messages, discriminated by `tipo` (or `type`)
#[derive(Debug, Clone, PartialEq, Deserialize, IntoStaticStr)]
#[serde(tag = "tipo")]
#[strum(serialize_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename = "crear-sala", alias = "create-room")]
    CreateRoom {},

    #[serde(rename = "unir", alias = "join")]
    Join {
        #[serde(rename = "sala")]
        room: String,
        #[serde(rename = "nombre")]
        name: String,
    },

    #[serde(rename = "seleccionar-avatar")]
    SelectAvatar {
        id: PlayerId,
        avatar: String,
        #[serde(rename = "sala", default)]
        room: Option<String>,
    },

    #[serde(rename = "ready")]
    Ready {
        #[serde(rename = "sala")]
        room: String,
        id: PlayerId,
    },

    #[serde(rename = "comenzar-partida")]
    StartGame {
        #[serde(rename = "sala")]
        room: String,
    },

    #[serde(rename = "activar_pulsadores")]
    ActivateBuzzers {
        #[serde(rename = "sala")]
        room: String,
    },

    #[serde(rename = "pulsador_presionado")]
    BuzzerPress {
        #[serde(rename = "sala")]
        room: String,
        id: PlayerId,
    },

    #[serde(rename = "reiniciar_pulsadores")]
    ResetBuzzers {
        #[serde(rename = "sala")]
        room: String,
    },

    #[serde(rename = "juego", alias = "presenter-attach")]
    PresenterAttach {
        #[serde(rename = "sala")]
        room: String,
    },

    #[serde(rename = "pong")]
    Pong {},
}

impl ClientMessage {
    /// Decodes a raw frame, rejecting anything that does not match a known shape
    pub fn decode(raw: &str) -> Result<Self, AppError> {
        let mut value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| AppError::Protocol(e.to_string()))?;

        // older clients send `type` instead of `tipo`
        if let Some(object) = value.as_object_mut() {
            if !object.contains_key("tipo") {
                if let Some(kind) = object.remove("type") {
                    object.insert("tipo".to_string(), kind);
                }
            }
        }

        serde_json::from_value(value).map_err(|e| AppError::Protocol(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Server -> Client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo")]
pub enum ServerMessage {
    #[serde(rename = "sala-creada")]
    RoomCreated {
        #[serde(rename = "codigo")]
        code: String,
    },

    #[serde(rename = "confirmacion-union")]
    JoinConfirmed {
        id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar: Option<String>,
        #[serde(rename = "reconectado", default)]
        reconnected: bool,
    },

    #[serde(rename = "nuevo-jugador")]
    NewPlayer {
        id: PlayerId,
        #[serde(rename = "nombre")]
        name: String,
    },

    #[serde(rename = "avatar-seleccionado")]
    AvatarSelected { id: PlayerId, avatar: String },

    #[serde(rename = "jugador-listo")]
    PlayerReady { id: PlayerId },

    #[serde(rename = "jugador-desconectado")]
    PlayerDisconnected { id: PlayerId },

    #[serde(rename = "partida-iniciada")]
    GameStarted {},

    #[serde(rename = "error-jugadores-no-listos")]
    PlayersNotReady {
        #[serde(rename = "mensaje")]
        message: String,
    },

    #[serde(rename = "activar_pulsador")]
    BuzzerActivated {},

    #[serde(rename = "pulsador_ganador")]
    BuzzerWinner {
        id: PlayerId,
        #[serde(rename = "nombre")]
        name: String,
    },

    #[serde(rename = "desactivar_pulsador")]
    BuzzerDisabled {},

    #[serde(rename = "reiniciar_pulsadores")]
    BuzzersReset {},

    #[serde(rename = "sala-cerrada")]
    RoomClosed {
        #[serde(rename = "codigo")]
        code: String,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(rename = "mensaje")]
        message: String,
    },

    #[serde(rename = "ping")]
    Ping {},
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::Protocol(e.to_string()))
    }
}
