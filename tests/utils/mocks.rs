#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use partyroom::{AppError, ConnectionId, ConnectionManager};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Records every message per connection instead of writing to a socket.
/// Connections marked dead fail delivery like a closed socket would.
#[derive(Clone)]
pub struct MockConnectionManager {
    sent_messages: Arc<RwLock<HashMap<ConnectionId, VecDeque<String>>>>,
    open: Arc<RwLock<HashSet<ConnectionId>>>,
    dead: Arc<RwLock<HashSet<ConnectionId>>>,
}

impl MockConnectionManager {
    pub fn new() -> Self {
        Self {
            sent_messages: Arc::new(RwLock::new(HashMap::new())),
            open: Arc::new(RwLock::new(HashSet::new())),
            dead: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Simulates the peer vanishing without a close handshake
    pub async fn kill(&self, connection: ConnectionId) {
        self.dead.write().await.insert(connection);
    }

    pub async fn is_open(&self, connection: ConnectionId) -> bool {
        self.open.read().await.contains(&connection)
    }

    pub async fn get_messages_for(&self, connection: ConnectionId) -> Vec<String> {
        self.sent_messages
            .read()
            .await
            .get(&connection)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pops the oldest unread message for the connection
    pub async fn consume_message_for(&self, connection: ConnectionId) -> Option<String> {
        self.sent_messages
            .write()
            .await
            .get_mut(&connection)
            .and_then(|queue| queue.pop_front())
    }

    pub async fn clear_messages(&self) {
        self.sent_messages.write().await.clear();
    }
}

#[async_trait]
impl ConnectionManager for MockConnectionManager {
    async fn add_connection(&self, connection: ConnectionId, _sender: mpsc::UnboundedSender<String>) {
        self.open.write().await.insert(connection);
    }

    async fn remove_connection(&self, connection: ConnectionId) {
        self.open.write().await.remove(&connection);
    }

    async fn send_to(&self, connection: ConnectionId, message: &str) -> Result<(), AppError> {
        if self.dead.read().await.contains(&connection) || !self.is_open(connection).await {
            return Err(AppError::Transport(format!("connection {connection} is closed")));
        }
        self.sent_messages
            .write()
            .await
            .entry(connection)
            .or_default()
            .push_back(message.to_string());
        Ok(())
    }
}
