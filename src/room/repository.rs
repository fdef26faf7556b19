use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::code::{normalize_code, CodeGenerator, RandomCodeGenerator};
use super::models::Room;
use crate::shared::AppError;

/// Give up allocating after this many consecutive collisions
const MAX_CODE_ATTEMPTS: usize = 10_000;

/// Owner of every live room, keyed by room code
#[async_trait]
pub trait RoomStore {
    /// Allocates an empty room under a fresh, collision-free code
    async fn create_room(&self) -> Result<String, AppError>;

    /// Returns a snapshot of the room
    async fn get_room(&self, code: &str) -> Result<Room, AppError>;

    /// Replaces the stored room; fails if it was removed in the meantime
    async fn save_room(&self, room: Room) -> Result<(), AppError>;

    async fn remove_room(&self, code: &str) -> Result<Room, AppError>;

    /// All rooms ordered by code
    async fn list_rooms(&self) -> Result<Vec<Room>, AppError>;

    /// Atomically removes every idle room whose last activity is older than `idle_grace`
    async fn remove_idle_rooms(&self, idle_grace: Duration) -> Result<Vec<String>, AppError>;
}

/// In-memory implementation of RoomStore
pub struct InMemoryRoomStore {
    rooms: RwLock<HashMap<String, Room>>,
    generator: Arc<dyn CodeGenerator>,
}

impl Default for InMemoryRoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::with_generator(Arc::new(RandomCodeGenerator::new()))
    }

    pub fn with_generator(generator: Arc<dyn CodeGenerator>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            generator,
        }
    }
}

fn room_not_found(code: &str) -> AppError {
    AppError::NotFound(format!("La sala {code} no existe"))
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    #[instrument(skip(self))]
    async fn create_room(&self) -> Result<String, AppError> {
        let mut rooms = self.rooms.write().await;

        for attempt in 0..MAX_CODE_ATTEMPTS {
            let code = self.generator.generate();
            if rooms.contains_key(&code) {
                debug!(room_code = %code, attempt, "Room code collision, retrying");
                continue;
            }

            rooms.insert(code.clone(), Room::new(code.clone()));
            info!(room_code = %code, live_rooms = rooms.len(), "Room created");
            return Ok(code);
        }

        warn!(live_rooms = rooms.len(), "Could not allocate a free room code");
        Err(AppError::CodeSpaceExhausted)
    }

    #[instrument(skip(self))]
    async fn get_room(&self, code: &str) -> Result<Room, AppError> {
        let code = normalize_code(code);
        let rooms = self.rooms.read().await;
        rooms.get(&code).cloned().ok_or_else(|| room_not_found(&code))
    }

    #[instrument(skip(self, room), fields(room_code = %room.code))]
    async fn save_room(&self, room: Room) -> Result<(), AppError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&room.code) {
            Some(slot) => {
                *slot = room;
                Ok(())
            }
            None => {
                debug!("Room vanished before save");
                Err(room_not_found(&room.code))
            }
        }
    }

    #[instrument(skip(self))]
    async fn remove_room(&self, code: &str) -> Result<Room, AppError> {
        let code = normalize_code(code);
        let mut rooms = self.rooms.write().await;
        let room = rooms.remove(&code).ok_or_else(|| room_not_found(&code))?;
        info!(room_code = %code, "Room removed");
        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<Room>, AppError> {
        let rooms = self.rooms.read().await;
        let mut list: Vec<Room> = rooms.values().cloned().collect();
        list.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(list)
    }

    #[instrument(skip(self))]
    async fn remove_idle_rooms(&self, idle_grace: Duration) -> Result<Vec<String>, AppError> {
        let grace = chrono::Duration::from_std(idle_grace).map_err(|_| AppError::Internal)?;
        let now = Utc::now();

        let mut rooms = self.rooms.write().await;
        let idle: Vec<String> = rooms
            .values()
            .filter(|room| room.is_idle() && now - room.last_activity_at >= grace)
            .map(|room| room.code.clone())
            .collect();

        for code in &idle {
            rooms.remove(code);
        }

        Ok(idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::code::is_valid_code;
    use crate::websockets::ConnectionId;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Replays a fixed list of codes, repeating the last one
    struct ScriptedGenerator {
        codes: Mutex<Vec<&'static str>>,
    }

    impl ScriptedGenerator {
        fn new(mut codes: Vec<&'static str>) -> Self {
            codes.reverse();
            Self {
                codes: Mutex::new(codes),
            }
        }
    }

    impl CodeGenerator for ScriptedGenerator {
        fn generate(&self) -> String {
            let mut codes = self.codes.lock().unwrap();
            if codes.len() > 1 {
                codes.pop().unwrap().to_string()
            } else {
                codes[0].to_string()
            }
        }
    }

    #[tokio::test]
    async fn test_create_and_get_room() {
        let store = InMemoryRoomStore::new();

        let code = store.create_room().await.unwrap();
        assert!(is_valid_code(&code));

        let room = store.get_room(&code).await.unwrap();
        assert_eq!(room.code, code);
        assert!(room.players.is_empty());
        assert!(room.presenter.is_none());
        assert!(room.pending_events.is_empty());
    }

    #[tokio::test]
    async fn test_get_room_normalizes_code() {
        let store = InMemoryRoomStore::with_generator(Arc::new(ScriptedGenerator::new(vec![
            "WXYZ",
        ])));
        store.create_room().await.unwrap();

        assert!(store.get_room(" wxyz").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_nonexistent_room() {
        let store = InMemoryRoomStore::new();

        let result = store.get_room("NOPE").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_retries_on_collision() {
        let store = InMemoryRoomStore::with_generator(Arc::new(ScriptedGenerator::new(vec![
            "AAAA", "AAAA", "AAAA", "BBBB",
        ])));

        let first = store.create_room().await.unwrap();
        let second = store.create_room().await.unwrap();

        assert_eq!(first, "AAAA");
        assert_eq!(second, "BBBB");
    }

    #[tokio::test]
    async fn test_create_gives_up_when_every_code_collides() {
        let store =
            InMemoryRoomStore::with_generator(Arc::new(ScriptedGenerator::new(vec!["AAAA"])));
        store.create_room().await.unwrap();

        let result = store.create_room().await;
        assert_eq!(result, Err(AppError::CodeSpaceExhausted));
    }

    #[tokio::test]
    async fn test_live_codes_are_unique() {
        let store = InMemoryRoomStore::new();
        let mut codes = HashSet::new();

        for _ in 0..200 {
            let code = store.create_room().await.unwrap();
            assert!(codes.insert(code));
        }
        assert_eq!(store.list_rooms().await.unwrap().len(), 200);
    }

    #[tokio::test]
    async fn test_save_room_persists_changes() {
        let store = InMemoryRoomStore::new();
        let code = store.create_room().await.unwrap();

        let mut room = store.get_room(&code).await.unwrap();
        room.add_player("ana", ConnectionId::new());
        store.save_room(room).await.unwrap();

        let reloaded = store.get_room(&code).await.unwrap();
        assert_eq!(reloaded.players.len(), 1);
        assert_eq!(reloaded.players[0].display_name, "ana");
    }

    #[tokio::test]
    async fn test_save_removed_room_fails() {
        let store = InMemoryRoomStore::new();
        let code = store.create_room().await.unwrap();
        let room = store.get_room(&code).await.unwrap();

        store.remove_room(&code).await.unwrap();

        assert!(matches!(
            store.save_room(room).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_room() {
        let store = InMemoryRoomStore::new();
        let code = store.create_room().await.unwrap();

        store.remove_room(&code).await.unwrap();

        assert!(store.get_room(&code).await.is_err());
        assert!(matches!(
            store.remove_room(&code).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_rooms_is_ordered_by_code() {
        let store = InMemoryRoomStore::with_generator(Arc::new(ScriptedGenerator::new(vec![
            "MMMM", "CCCC", "XXXX",
        ])));
        for _ in 0..3 {
            store.create_room().await.unwrap();
        }

        let codes: Vec<String> = store
            .list_rooms()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.code)
            .collect();
        assert_eq!(codes, vec!["CCCC", "MMMM", "XXXX"]);
    }

    #[tokio::test]
    async fn test_remove_idle_rooms_keeps_occupied_rooms() {
        let store = InMemoryRoomStore::new();
        let idle = store.create_room().await.unwrap();
        let occupied = store.create_room().await.unwrap();
        let presented = store.create_room().await.unwrap();

        let mut room = store.get_room(&occupied).await.unwrap();
        room.add_player("ana", ConnectionId::new());
        store.save_room(room).await.unwrap();

        let mut room = store.get_room(&presented).await.unwrap();
        room.presenter = Some(ConnectionId::new());
        store.save_room(room).await.unwrap();

        let removed = store.remove_idle_rooms(Duration::ZERO).await.unwrap();

        assert_eq!(removed, vec![idle.clone()]);
        assert!(store.get_room(&idle).await.is_err());
        assert!(store.get_room(&occupied).await.is_ok());
        assert!(store.get_room(&presented).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_idle_rooms_respects_grace_period() {
        let store = InMemoryRoomStore::new();
        let code = store.create_room().await.unwrap();

        let removed = store
            .remove_idle_rooms(Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(removed.is_empty());
        assert!(store.get_room(&code).await.is_ok());
    }
}
