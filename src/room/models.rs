use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

use crate::websockets::{ConnectionId, ServerMessage};

/// In-room player identifier, handed out in join order and never reused
pub type PlayerId = u32;

/// A participant with a stable identity inside one room
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: Option<String>,
    pub ready: bool,
    /// Association only; the connection can go away without removing the player
    pub connection: Option<ConnectionId>,
    pub active: bool,
}

/// Buzzer round state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuzzerState {
    #[default]
    Inactive,
    Armed,
    Locked { winner: PlayerId },
}

/// Per-room session state
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    /// Join order
    pub players: Vec<Player>,
    pub presenter: Option<ConnectionId>,
    /// Only filled while `presenter` is `None`
    pub pending_events: VecDeque<ServerMessage>,
    pub buzzer: BuzzerState,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    next_player_id: PlayerId,
}

impl Room {
    pub fn new(code: String) -> Self {
        let now = Utc::now();
        Self {
            code,
            players: Vec::new(),
            presenter: None,
            pending_events: VecDeque::new(),
            buzzer: BuzzerState::Inactive,
            created_at: now,
            last_activity_at: now,
            next_player_id: 0,
        }
    }

    /// Appends a new player bound to `connection` and returns its id
    pub fn add_player(&mut self, display_name: &str, connection: ConnectionId) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        self.players.push(Player {
            id,
            display_name: display_name.to_string(),
            avatar: None,
            ready: false,
            connection: Some(connection),
            active: true,
        });
        id
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_by_name_mut(&mut self, display_name: &str) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.display_name == display_name)
    }

    /// The player with id 0, who created the session by joining first
    pub fn host(&self) -> Option<&Player> {
        self.player(0)
    }

    pub fn active_player_count(&self) -> usize {
        self.players.iter().filter(|p| p.active).count()
    }

    /// Connections of every player currently bound
    pub fn player_connections(&self) -> Vec<ConnectionId> {
        self.players.iter().filter_map(|p| p.connection).collect()
    }

    /// No active player and no presenter
    pub fn is_idle(&self) -> bool {
        self.active_player_count() == 0 && self.presenter.is_none()
    }

    /// Readiness barrier: at least `min_players` on the roster and all of them ready
    pub fn all_ready(&self, min_players: usize) -> bool {
        self.players.len() >= min_players && self.players.iter().all(|p| p.ready)
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// Sends to the presenter if one is bound, otherwise buffers for the next attach
    pub fn notify_presenter(
        &mut self,
        message: ServerMessage,
        deliveries: &mut Vec<(ConnectionId, ServerMessage)>,
    ) {
        match self.presenter {
            Some(presenter) => deliveries.push((presenter, message)),
            None => {
                self.pending_events.push_back(message);
                debug!(
                    room_code = %self.code,
                    pending = self.pending_events.len(),
                    "Buffered event for absent presenter"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_ids_are_sequential_and_not_reused() {
        let mut room = Room::new("ABCD".to_string());
        let a = room.add_player("ana", ConnectionId::new());
        let b = room.add_player("beto", ConnectionId::new());
        room.players.retain(|p| p.id != b);
        let c = room.add_player("carla", ConnectionId::new());

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(room.host().map(|p| p.display_name.as_str()), Some("ana"));
    }

    #[test]
    fn test_readiness_barrier() {
        let mut room = Room::new("ABCD".to_string());
        assert!(!room.all_ready(1));
        assert!(room.all_ready(0));

        let a = room.add_player("ana", ConnectionId::new());
        let b = room.add_player("beto", ConnectionId::new());
        room.player_mut(a).unwrap().ready = true;
        assert!(!room.all_ready(1));

        room.player_mut(b).unwrap().ready = true;
        assert!(room.all_ready(1));
        assert!(!room.all_ready(3));
    }

    #[test]
    fn test_idle_requires_no_active_player_and_no_presenter() {
        let mut room = Room::new("ABCD".to_string());
        assert!(room.is_idle());

        let a = room.add_player("ana", ConnectionId::new());
        assert!(!room.is_idle());

        room.player_mut(a).unwrap().active = false;
        assert!(room.is_idle());

        room.presenter = Some(ConnectionId::new());
        assert!(!room.is_idle());
    }

    #[test]
    fn test_notify_presenter_buffers_while_unbound() {
        let mut room = Room::new("ABCD".to_string());
        let mut deliveries = Vec::new();

        room.notify_presenter(ServerMessage::PlayerReady { id: 0 }, &mut deliveries);
        assert!(deliveries.is_empty());
        assert_eq!(room.pending_events.len(), 1);

        let presenter = ConnectionId::new();
        room.presenter = Some(presenter);
        room.notify_presenter(ServerMessage::PlayerReady { id: 1 }, &mut deliveries);
        assert_eq!(
            deliveries,
            vec![(presenter, ServerMessage::PlayerReady { id: 1 })]
        );
        assert_eq!(room.pending_events.len(), 1);
    }
}
