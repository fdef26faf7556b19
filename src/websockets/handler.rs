use async_trait::async_trait;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::RouterHandle;
use crate::shared::AppState;

use super::connection_manager::ConnectionId;
use super::messages::ClientMessage;
use super::socket::{Connection, MessageHandler, SocketError, SocketWrapper};

/// Decodes frames at the boundary and forwards them to the dispatcher
pub struct WebsocketReceiveHandler {
    router: RouterHandle,
}

impl WebsocketReceiveHandler {
    pub fn new(router: RouterHandle) -> Self {
        Self { router }
    }
}

#[async_trait]
impl MessageHandler for WebsocketReceiveHandler {
    async fn handle_message(&self, connection: ConnectionId, message: String) {
        match ClientMessage::decode(&message) {
            Ok(ClientMessage::Pong {}) => {
                debug!(connection_id = %connection, "Keep-alive answered");
            }
            Ok(client_message) => {
                debug!(
                    connection_id = %connection,
                    kind = client_message.kind(),
                    "Received message"
                );
                self.router.dispatch(connection, client_message);
            }
            Err(e) => {
                warn!(
                    connection_id = %connection,
                    error = %e,
                    "Failed to parse WebSocket message"
                );
            }
        }
    }
}

/// WebSocket endpoint. Connections start unbound; the first `unir` or `juego`
/// event decides their room and role.
/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    info!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, app_state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(socket: axum::extract::ws::WebSocket, app_state: AppState) {
    serve_connection(Box::new(socket), app_state).await;
}

/// Runs one client connection until it ends, then its room cleanup
async fn serve_connection(socket: Box<dyn SocketWrapper>, app_state: AppState) {
    // Create the outbound channel (app -> client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
    let connection_id = app_state.binder.open(outbound_sender).await;

    info!(connection_id = %connection_id, "WebSocket connection established");

    let message_handler = Arc::new(WebsocketReceiveHandler::new(app_state.router.clone()));
    let connection = Connection::new(
        connection_id,
        socket,
        outbound_receiver,
        message_handler,
    );

    // Run the connection until disconnect
    match connection.run(app_state.config.heartbeat.clone()).await {
        Ok(()) => {
            info!(connection_id = %connection_id, "WebSocket connection closed cleanly");
        }
        Err(SocketError::Unresponsive) => {
            info!(connection_id = %connection_id, "WebSocket peer timed out");
        }
        Err(e) => {
            warn!(
                connection_id = %connection_id,
                error = ?e,
                "WebSocket connection error"
            );
        }
    }

    // Cleanup runs to completion before this task ends
    app_state.router.connection_closed(connection_id).await;

    info!(connection_id = %connection_id, "WebSocket cleanup finished");
}
