// Library crate for the party room server
// This file exposes the public API for integration tests

pub mod app;
pub mod config;
pub mod event;
pub mod room;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::ServerConfig;
pub use event::{EventRouter, RoomPolicy, RouterHandle};
pub use room::{InMemoryRoomStore, Room, RoomStore};
pub use shared::{AppError, AppState};
pub use websockets::{
    ClientMessage, ConnectionBinder, ConnectionId, ConnectionManager, ServerMessage,
    WebsocketReceiveHandler,
};
