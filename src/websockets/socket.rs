use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::connection_manager::ConnectionId;
use super::messages::ServerMessage;

/// Keep-alive probing policy
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    /// Consecutive unanswered probes after which the peer is considered dead
    pub max_missed: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_missed: 2,
        }
    }
}

/// A frame received from the client
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text(String),
    /// Protocol-level traffic with no payload for the application (pong, binary)
    Signal,
}

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Send a protocol-level ping
    async fn send_ping(&mut self) -> Result<(), SocketError>;

    /// Receive the next frame from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<Inbound>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for incoming WebSocket messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming text frame from the client
    async fn handle_message(&self, connection: ConnectionId, message: String);
}

#[derive(Debug, PartialEq)]
pub enum SocketError {
    /// Peer stopped answering keep-alive probes
    Unresponsive,
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SocketError> {
        self.send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<Inbound>, SocketError> {
        match self.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(Inbound::Text(text))),
            Some(Ok(Message::Close(_))) => Ok(None),
            Some(Ok(_)) => Ok(Some(Inbound::Signal)), // ping/pong/binary still prove liveness
            Some(Err(e)) => Err(SocketError::ReceiveFailed(e.to_string())),
            None => Ok(None), // Connection closed
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Connection represents a managed WebSocket connection
/// It is used to send and receive messages to and from the client
/// The outbound receiver is a channel fed by the ConnectionManager
pub struct Connection {
    pub id: ConnectionId,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            id,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Run the connection - handles sending, receiving and keep-alive probes until disconnect.
    /// The probe timer lives in this loop, so it stops exactly when the connection does.
    pub async fn run(mut self, heartbeat: HeartbeatConfig) -> Result<(), SocketError> {
        let mut probe = interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
        probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut missed: u32 = 0;
        let ping = ServerMessage::Ping {}.to_json().unwrap_or_default();

        loop {
            tokio::select! {
                // Handle outbound messages (from our app to client)
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => self.socket.send_message(message).await?,
                        None => break, // Channel closed, disconnect
                    }
                }

                // Handle inbound messages (from client to our app)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(frame)) => {
                            missed = 0;
                            if let Inbound::Text(message) = frame {
                                self.message_handler.handle_message(self.id, message).await;
                            }
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }

                _ = probe.tick() => {
                    if missed >= heartbeat.max_missed {
                        info!(connection_id = %self.id, missed, "Peer unresponsive, dropping connection");
                        let _ = self.socket.close().await;
                        return Err(SocketError::Unresponsive);
                    }
                    missed += 1;
                    debug!(connection_id = %self.id, missed, "Sending keep-alive probe");
                    self.socket.send_message(ping.clone()).await?;
                    self.socket.send_ping().await?;
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }
}
