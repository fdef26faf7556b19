use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::shared::AppError;

/// Opaque handle for one open socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound delivery to open connections
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn add_connection(&self, connection: ConnectionId, sender: mpsc::UnboundedSender<String>);

    async fn remove_connection(&self, connection: ConnectionId);

    /// Fails fast if the connection is unknown or its socket task has ended
    async fn send_to(&self, connection: ConnectionId, message: &str) -> Result<(), AppError>;
}

pub struct InMemoryConnectionManager {
    // connection -> outbound sender
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>,
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(&self, connection: ConnectionId, sender: mpsc::UnboundedSender<String>) {
        let mut connections = self.connections.write().await;
        connections.insert(connection, sender);
    }

    async fn remove_connection(&self, connection: ConnectionId) {
        let mut connections = self.connections.write().await;
        connections.remove(&connection);
    }

    async fn send_to(&self, connection: ConnectionId, message: &str) -> Result<(), AppError> {
        let connections = self.connections.read().await;
        let sender = connections
            .get(&connection)
            .ok_or_else(|| AppError::Transport(format!("connection {connection} is not open")))?;
        sender
            .send(message.to_string())
            .map_err(|_| AppError::Transport(format!("connection {connection} is closed")))
    }
}
