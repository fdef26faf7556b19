// Public API
pub use binder::{Binding, ConnectionBinder, PlayerBinding, Released, Role};
pub use connection_manager::{ConnectionId, ConnectionManager, InMemoryConnectionManager};
pub use handler::{websocket_handler, WebsocketReceiveHandler};
pub use messages::{ClientMessage, ServerMessage};
pub use socket::{Connection, HeartbeatConfig, Inbound, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod binder;
mod connection_manager;
mod handler;
mod messages;
mod socket;
