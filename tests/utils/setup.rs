#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use partyroom::{
    room::PlayerId, ClientMessage, ConnectionBinder, ConnectionId, EventRouter, InMemoryRoomStore,
    RoomPolicy, RoomStore,
};

use super::mocks::MockConnectionManager;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// Drives the router directly, one event at a time, the way the dispatcher task does
pub struct TestSetup {
    pub store: Arc<dyn RoomStore + Send + Sync>,
    pub binder: Arc<ConnectionBinder>,
    pub router: EventRouter,
    pub mock_conn_manager: Arc<MockConnectionManager>,
}

pub struct TestSetupBuilder {
    policy: RoomPolicy,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            policy: RoomPolicy::default(),
        }
    }

    pub fn with_min_players_to_start(mut self, min_players: usize) -> Self {
        self.policy.min_players_to_start = min_players;
        self
    }

    pub fn closing_room_on_presenter_disconnect(mut self) -> Self {
        self.policy.close_room_on_presenter_disconnect = true;
        self
    }

    pub fn build(self) -> TestSetup {
        let store: Arc<dyn RoomStore + Send + Sync> = Arc::new(InMemoryRoomStore::new());
        let mock_conn_manager = Arc::new(MockConnectionManager::new());
        let binder = Arc::new(ConnectionBinder::new(mock_conn_manager.clone()));
        let router = EventRouter::new(Arc::clone(&store), Arc::clone(&binder), self.policy);

        TestSetup {
            store,
            binder,
            router,
            mock_conn_manager,
        }
    }
}

impl TestSetup {
    pub async fn create_room(&self) -> String {
        self.store.create_room().await.unwrap()
    }

    /// Opens a new, unbound connection
    pub async fn connect(&self) -> ConnectionId {
        let (sender, _receiver) = mpsc::unbounded_channel();
        self.binder.open(sender).await
    }

    /// Sends a raw frame through the same decode step the socket uses
    pub async fn send_raw(&self, connection: ConnectionId, raw: &str) {
        if let Ok(message) = ClientMessage::decode(raw) {
            self.router.handle_message(connection, message).await;
        }
    }

    pub async fn send(&self, connection: ConnectionId, message: Value) {
        self.send_raw(connection, &message.to_string()).await;
    }

    /// Connects and joins; returns the connection and the confirmed id
    pub async fn join(&self, room: &str, name: &str) -> (ConnectionId, PlayerId) {
        let connection = self.connect().await;
        let id = self.join_on(connection, room, name).await;
        (connection, id)
    }

    pub async fn join_on(&self, connection: ConnectionId, room: &str, name: &str) -> PlayerId {
        self.send(
            connection,
            serde_json::json!({"tipo": "unir", "sala": room, "nombre": name}),
        )
        .await;
        let confirmation = self
            .messages_for(connection)
            .await
            .into_iter()
            .rev()
            .find(|m| m["tipo"] == "confirmacion-union")
            .expect("join should be confirmed");
        confirmation["id"].as_u64().unwrap() as PlayerId
    }

    pub async fn attach_presenter(&self, room: &str) -> ConnectionId {
        let connection = self.connect().await;
        self.send(connection, serde_json::json!({"tipo": "juego", "sala": room}))
            .await;
        connection
    }

    pub async fn ready(&self, connection: ConnectionId, room: &str, id: PlayerId) {
        self.send(
            connection,
            serde_json::json!({"tipo": "ready", "sala": room, "id": id}),
        )
        .await;
    }

    /// Closes the connection the way the socket task does when it ends
    pub async fn close(&self, connection: ConnectionId) {
        self.router.handle_closed(connection).await;
    }

    pub async fn messages_for(&self, connection: ConnectionId) -> Vec<Value> {
        self.mock_conn_manager
            .get_messages_for(connection)
            .await
            .iter()
            .map(|m| serde_json::from_str(m).unwrap())
            .collect()
    }

    pub async fn tipos_for(&self, connection: ConnectionId) -> Vec<String> {
        self.messages_for(connection)
            .await
            .iter()
            .map(|m| m["tipo"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub async fn clear_messages(&self) {
        self.mock_conn_manager.clear_messages().await;
    }
}
