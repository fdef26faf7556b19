// Public API - what other modules can use
pub use handlers::{create_room, delete_room, get_host_name, list_players, list_rooms, select_avatar};
pub use models::{BuzzerState, Player, PlayerId, Room};
pub use repository::{InMemoryRoomStore, RoomStore};

// Internal modules
pub mod cleanup_task;
pub mod code;
mod handlers;
pub mod models;
pub mod repository;
pub mod types;
