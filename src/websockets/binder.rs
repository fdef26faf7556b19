use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::connection_manager::{ConnectionId, ConnectionManager};
use super::messages::ServerMessage;
use crate::room::models::{PlayerId, Room};
use crate::shared::AppError;

/// Logical role a connection plays inside a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player(PlayerId),
    Presenter,
}

/// What a bound connection is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_code: String,
    pub role: Role,
}

/// Result of binding a connection as a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerBinding {
    pub id: PlayerId,
    pub reconnected: bool,
    /// Connection that used to carry this player, now unbound
    pub displaced: Option<ConnectionId>,
}

/// Effect of releasing a binding on its room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    Player(PlayerId),
    Presenter,
    /// The room had already moved on to another connection
    Stale,
}

/// Tracks every open connection and which room/role it is bound to
pub struct ConnectionBinder {
    connections: Arc<dyn ConnectionManager>,
    bindings: RwLock<HashMap<ConnectionId, Binding>>,
}

impl ConnectionBinder {
    pub fn new(connections: Arc<dyn ConnectionManager>) -> Self {
        Self {
            connections,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a freshly opened, still unbound connection
    pub async fn open(&self, sender: mpsc::UnboundedSender<String>) -> ConnectionId {
        let connection = ConnectionId::new();
        self.connections.add_connection(connection, sender).await;
        debug!(connection_id = %connection, "Connection opened");
        connection
    }

    pub async fn binding(&self, connection: ConnectionId) -> Option<Binding> {
        self.bindings.read().await.get(&connection).cloned()
    }

    /// Connections currently bound to `room_code`
    pub async fn bound_to(&self, room_code: &str) -> Vec<ConnectionId> {
        self.bindings
            .read()
            .await
            .iter()
            .filter(|(_, binding)| binding.room_code == room_code)
            .map(|(connection, _)| *connection)
            .collect()
    }

    /// Binds `connection` as the player called `name`, reusing an existing record
    /// with that display name when there is one
    pub async fn bind_player(
        &self,
        room: &mut Room,
        connection: ConnectionId,
        name: &str,
    ) -> PlayerBinding {
        let result = match room.player_by_name_mut(name) {
            Some(player) => {
                let displaced = player.connection.filter(|previous| *previous != connection);
                player.connection = Some(connection);
                player.active = true;
                PlayerBinding {
                    id: player.id,
                    reconnected: true,
                    displaced,
                }
            }
            None => PlayerBinding {
                id: room.add_player(name, connection),
                reconnected: false,
                displaced: None,
            },
        };

        let mut bindings = self.bindings.write().await;
        if let Some(displaced) = result.displaced {
            bindings.remove(&displaced);
        }
        bindings.insert(
            connection,
            Binding {
                room_code: room.code.clone(),
                role: Role::Player(result.id),
            },
        );

        info!(
            room_code = %room.code,
            connection_id = %connection,
            player_id = result.id,
            reconnected = result.reconnected,
            "Player bound"
        );
        result
    }

    /// Makes `connection` the room's presenter. The previous presenter, if any,
    /// is unbound but left open; it is returned.
    pub async fn bind_presenter(&self, room: &mut Room, connection: ConnectionId) -> Option<ConnectionId> {
        let previous = room.presenter.filter(|previous| *previous != connection);
        room.presenter = Some(connection);

        let mut bindings = self.bindings.write().await;
        if let Some(previous) = previous {
            bindings.remove(&previous);
        }
        bindings.insert(
            connection,
            Binding {
                room_code: room.code.clone(),
                role: Role::Presenter,
            },
        );

        info!(
            room_code = %room.code,
            connection_id = %connection,
            replaced = previous.is_some(),
            "Presenter bound"
        );
        previous
    }

    /// Drops the binding but keeps the connection open
    pub async fn unbind(&self, connection: ConnectionId) -> Option<Binding> {
        self.bindings.write().await.remove(&connection)
    }

    /// Forgets the connection entirely, returning what it was bound to
    pub async fn close(&self, connection: ConnectionId) -> Option<Binding> {
        self.connections.remove_connection(connection).await;
        let binding = self.unbind(connection).await;
        debug!(connection_id = %connection, bound = binding.is_some(), "Connection closed");
        binding
    }

    /// Applies the loss of `connection` to its room: the player goes inactive
    /// (its record is kept) or the presenter slot is cleared
    pub fn release(room: &mut Room, connection: ConnectionId, role: Role) -> Released {
        match role {
            Role::Player(id) => match room.player_mut(id) {
                Some(player) if player.connection == Some(connection) => {
                    player.connection = None;
                    player.active = false;
                    Released::Player(id)
                }
                _ => Released::Stale,
            },
            Role::Presenter if room.presenter == Some(connection) => {
                room.presenter = None;
                Released::Presenter
            }
            Role::Presenter => Released::Stale,
        }
    }

    pub async fn send(&self, connection: ConnectionId, message: &ServerMessage) -> Result<(), AppError> {
        let payload = message.to_json()?;
        self.connections
            .send_to(connection, &payload)
            .await
            .inspect_err(|e| warn!(connection_id = %connection, error = %e, "Delivery failed"))
    }
}
