use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::room::models::{BuzzerState, PlayerId, Room};
use crate::room::repository::RoomStore;
use crate::shared::AppError;
use crate::websockets::{
    Binding, ClientMessage, ConnectionBinder, ConnectionId, Released, Role, ServerMessage,
};

/// Outbound messages produced while handling one event, in send order
type Deliveries = Vec<(ConnectionId, ServerMessage)>;

/// Room lifecycle policies that vary between deployments
#[derive(Debug, Clone)]
pub struct RoomPolicy {
    /// Roster size the readiness barrier requires; 0 lets an empty room start
    pub min_players_to_start: usize,
    /// Destroy the room as soon as its presenter disconnects instead of
    /// leaving it to the idle sweep
    pub close_room_on_presenter_disconnect: bool,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            min_players_to_start: 1,
            close_room_on_presenter_disconnect: false,
        }
    }
}

fn player_not_found(id: PlayerId) -> AppError {
    AppError::NotFound(format!("El jugador {id} no existe"))
}

/// Interprets inbound events, mutates room state and decides fan-out.
///
/// All calls are expected to come from one dispatcher task (see [`EventRouter::start`]),
/// which is what serialises room mutation.
pub struct EventRouter {
    store: Arc<dyn RoomStore + Send + Sync>,
    binder: Arc<ConnectionBinder>,
    policy: RoomPolicy,
}

impl EventRouter {
    pub fn new(
        store: Arc<dyn RoomStore + Send + Sync>,
        binder: Arc<ConnectionBinder>,
        policy: RoomPolicy,
    ) -> Self {
        Self {
            store,
            binder,
            policy,
        }
    }

    /// Routes one decoded message. Failures are answered to the sender only.
    #[instrument(skip(self, message), fields(connection_id = %connection, kind = message.kind()))]
    pub async fn handle_message(&self, connection: ConnectionId, message: ClientMessage) {
        let mut out = Deliveries::new();

        if let Err(e) = self.route(connection, message, &mut out).await {
            match e {
                AppError::Protocol(reason) => {
                    warn!(reason = %reason, "Dropping malformed message");
                }
                AppError::PlayersNotReady => {
                    out.push((
                        connection,
                        ServerMessage::PlayersNotReady {
                            message: "No todos los jugadores están listos".to_string(),
                        },
                    ));
                }
                AppError::NotFound(message) => {
                    debug!(error = %message, "Rejecting event");
                    out.push((connection, ServerMessage::error(message)));
                }
                other => {
                    warn!(error = %other, "Event failed");
                    out.push((connection, ServerMessage::error(other.to_string())));
                }
            }
        }

        self.deliver(out).await;
    }

    /// Cleanup for a closed connection; done once this returns
    #[instrument(skip(self))]
    pub async fn handle_closed(&self, connection: ConnectionId) {
        let mut out = Deliveries::new();
        self.close_into(connection, &mut out).await;
        self.deliver(out).await;
    }

    /// Sets a player's avatar outside any socket (HTTP)
    pub async fn select_avatar(
        &self,
        id: PlayerId,
        avatar: String,
        room: Option<String>,
    ) -> Result<(), AppError> {
        let mut out = Deliveries::new();
        self.apply_avatar(room, id, avatar, &mut out).await?;
        self.deliver(out).await;
        Ok(())
    }

    /// Removes the room and tells everyone still bound to it
    pub async fn close_room(&self, code: &str) -> Result<(), AppError> {
        let mut out = Deliveries::new();
        self.close_room_into(code, &mut out).await?;
        self.deliver(out).await;
        Ok(())
    }

    async fn route(
        &self,
        connection: ConnectionId,
        message: ClientMessage,
        out: &mut Deliveries,
    ) -> Result<(), AppError> {
        match message {
            ClientMessage::CreateRoom {} => {
                let code = self.store.create_room().await?;
                out.push((connection, ServerMessage::RoomCreated { code }));
                Ok(())
            }
            ClientMessage::Join { room, name } => self.join(connection, &room, &name, out).await,
            ClientMessage::SelectAvatar { id, avatar, room } => {
                // a bound sender never reaches into another room
                let room = match room {
                    Some(room) => Some(room),
                    None => self.binder.binding(connection).await.map(|b| b.room_code),
                };
                self.apply_avatar(room, id, avatar, out).await
            }
            ClientMessage::Ready { room, id } => self.ready(&room, id, out).await,
            ClientMessage::StartGame { room } => self.start_game(&room, out).await,
            ClientMessage::ActivateBuzzers { room } => self.activate_buzzers(&room, out).await,
            ClientMessage::BuzzerPress { room, id } => self.buzzer_press(&room, id, out).await,
            ClientMessage::ResetBuzzers { room } => self.reset_buzzers(&room, out).await,
            ClientMessage::PresenterAttach { room } => {
                self.attach_presenter(connection, &room, out).await
            }
            // liveness is tracked by the socket loop
            ClientMessage::Pong {} => Ok(()),
        }
    }

    async fn join(
        &self,
        connection: ConnectionId,
        code: &str,
        name: &str,
        out: &mut Deliveries,
    ) -> Result<(), AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Protocol("empty display name".to_string()));
        }

        let mut room = self.store.get_room(code).await?;
        let mut pending = Deliveries::new();

        if let Some(previous) = self.binder.binding(connection).await {
            let same_player = previous.room_code == room.code
                && matches!(previous.role, Role::Player(id)
                    if room.player(id).is_some_and(|p| p.display_name == name));
            if !same_player {
                self.detach(connection, previous, &mut room, &mut pending)
                    .await?;
            }
        }

        let bound = self.binder.bind_player(&mut room, connection, name).await;

        if !bound.reconnected {
            if let Some(avatar) = self.remembered_avatar(&room.code, name).await? {
                if let Some(player) = room.player_mut(bound.id) {
                    debug!(player_id = bound.id, avatar = %avatar, "Carrying avatar over from another room");
                    player.avatar = Some(avatar);
                }
            }
        }

        let avatar = room.player(bound.id).and_then(|p| p.avatar.clone());
        pending.push((
            connection,
            ServerMessage::JoinConfirmed {
                id: bound.id,
                avatar,
                reconnected: bound.reconnected,
            },
        ));
        room.notify_presenter(
            ServerMessage::NewPlayer {
                id: bound.id,
                name: name.to_string(),
            },
            &mut pending,
        );

        info!(
            room_code = %room.code,
            player_id = bound.id,
            player_name = %name,
            reconnected = bound.reconnected,
            "Player joined room"
        );

        self.commit(room, connection, pending, out).await
    }

    /// Avatar the same display name picked in another room, most recent activity first
    async fn remembered_avatar(
        &self,
        current_code: &str,
        name: &str,
    ) -> Result<Option<String>, AppError> {
        let rooms = self.store.list_rooms().await?;
        Ok(rooms
            .iter()
            .filter(|room| room.code != current_code)
            .filter_map(|room| {
                room.players
                    .iter()
                    .find(|p| p.display_name == name && p.avatar.is_some())
                    .map(|p| (room.last_activity_at, p.avatar.clone()))
            })
            .max_by_key(|(last_activity, _)| *last_activity)
            .and_then(|(_, avatar)| avatar))
    }

    async fn apply_avatar(
        &self,
        room: Option<String>,
        id: PlayerId,
        avatar: String,
        out: &mut Deliveries,
    ) -> Result<(), AppError> {
        let mut room = match room {
            Some(code) => self.store.get_room(&code).await?,
            None => self.find_room_with_player(id).await?,
        };

        let player = room.player_mut(id).ok_or_else(|| player_not_found(id))?;
        player.avatar = Some(avatar.clone());
        info!(room_code = %room.code, player_id = id, avatar = %avatar, "Avatar selected");

        let mut pending = Deliveries::new();
        room.notify_presenter(ServerMessage::AvatarSelected { id, avatar }, &mut pending);
        self.save(room, pending, out).await
    }

    /// First room, in code order, whose roster has `id`
    async fn find_room_with_player(&self, id: PlayerId) -> Result<Room, AppError> {
        self.store
            .list_rooms()
            .await?
            .into_iter()
            .find(|room| room.player(id).is_some())
            .ok_or_else(|| player_not_found(id))
    }

    async fn ready(&self, code: &str, id: PlayerId, out: &mut Deliveries) -> Result<(), AppError> {
        let mut room = self.store.get_room(code).await?;
        let player = room.player_mut(id).ok_or_else(|| player_not_found(id))?;
        player.ready = true;
        debug!(room_code = %room.code, player_id = id, "Player ready");

        let mut pending = Deliveries::new();
        room.notify_presenter(ServerMessage::PlayerReady { id }, &mut pending);
        self.save(room, pending, out).await
    }

    async fn start_game(&self, code: &str, out: &mut Deliveries) -> Result<(), AppError> {
        let mut room = self.store.get_room(code).await?;

        if !room.all_ready(self.policy.min_players_to_start) {
            debug!(
                room_code = %room.code,
                players = room.players.len(),
                ready = room.players.iter().filter(|p| p.ready).count(),
                "Readiness barrier not met"
            );
            return Err(AppError::PlayersNotReady);
        }

        let mut pending: Deliveries = room
            .player_connections()
            .into_iter()
            .map(|c| (c, ServerMessage::GameStarted {}))
            .collect();
        room.notify_presenter(ServerMessage::GameStarted {}, &mut pending);

        info!(room_code = %room.code, players = room.players.len(), "Game started");
        self.save(room, pending, out).await
    }

    async fn activate_buzzers(&self, code: &str, out: &mut Deliveries) -> Result<(), AppError> {
        let mut room = self.store.get_room(code).await?;
        room.buzzer = BuzzerState::Armed;

        let pending = room
            .player_connections()
            .into_iter()
            .map(|c| (c, ServerMessage::BuzzerActivated {}))
            .collect();

        debug!(room_code = %room.code, "Buzzers armed");
        self.save(room, pending, out).await
    }

    async fn buzzer_press(&self, code: &str, id: PlayerId, out: &mut Deliveries) -> Result<(), AppError> {
        let mut room = self.store.get_room(code).await?;
        let name = room
            .player(id)
            .map(|p| p.display_name.clone())
            .ok_or_else(|| player_not_found(id))?;

        if room.buzzer != BuzzerState::Armed {
            debug!(room_code = %room.code, player_id = id, buzzer = ?room.buzzer, "Ignoring buzzer press");
            return Ok(());
        }

        room.buzzer = BuzzerState::Locked { winner: id };

        let mut pending = Deliveries::new();
        room.notify_presenter(ServerMessage::BuzzerWinner { id, name }, &mut pending);
        pending.extend(
            room.players
                .iter()
                .filter(|p| p.id != id)
                .filter_map(|p| p.connection)
                .map(|c| (c, ServerMessage::BuzzerDisabled {})),
        );

        info!(room_code = %room.code, player_id = id, "Buzzer won");
        self.save(room, pending, out).await
    }

    async fn reset_buzzers(&self, code: &str, out: &mut Deliveries) -> Result<(), AppError> {
        let mut room = self.store.get_room(code).await?;
        room.buzzer = BuzzerState::Inactive;

        let pending = room
            .player_connections()
            .into_iter()
            .map(|c| (c, ServerMessage::BuzzersReset {}))
            .collect();

        debug!(room_code = %room.code, "Buzzers reset");
        self.save(room, pending, out).await
    }

    async fn attach_presenter(
        &self,
        connection: ConnectionId,
        code: &str,
        out: &mut Deliveries,
    ) -> Result<(), AppError> {
        let mut room = self.store.get_room(code).await?;
        let mut pending = Deliveries::new();

        if let Some(previous) = self.binder.binding(connection).await {
            if previous.room_code != room.code || previous.role != Role::Presenter {
                self.detach(connection, previous, &mut room, &mut pending)
                    .await?;
            }
        }

        if let Some(replaced) = self.binder.bind_presenter(&mut room, connection).await {
            info!(room_code = %room.code, replaced = %replaced, "Presenter replaced");
        }

        let buffered = room.pending_events.len();
        pending.extend(room.pending_events.drain(..).map(|event| (connection, event)));

        // replay the roster so a fresh presenter can rebuild its view
        for player in &room.players {
            pending.push((
                connection,
                ServerMessage::NewPlayer {
                    id: player.id,
                    name: player.display_name.clone(),
                },
            ));
            if let Some(avatar) = &player.avatar {
                pending.push((
                    connection,
                    ServerMessage::AvatarSelected {
                        id: player.id,
                        avatar: avatar.clone(),
                    },
                ));
            }
            if player.ready {
                pending.push((connection, ServerMessage::PlayerReady { id: player.id }));
            }
            if !player.active {
                pending.push((connection, ServerMessage::PlayerDisconnected { id: player.id }));
            }
        }

        info!(
            room_code = %room.code,
            connection_id = %connection,
            buffered,
            players = room.players.len(),
            "Presenter attached"
        );

        self.commit(room, connection, pending, out).await
    }

    /// Releases an existing binding of `connection` before it is bound elsewhere.
    /// Leaving another room gets the same cleanup as a close, closure policy included.
    async fn detach(
        &self,
        connection: ConnectionId,
        previous: Binding,
        current: &mut Room,
        pending: &mut Deliveries,
    ) -> Result<(), AppError> {
        self.binder.unbind(connection).await;

        if previous.room_code == current.code {
            Self::apply_release(current, connection, previous.role, pending);
            return Ok(());
        }

        match self.store.get_room(&previous.room_code).await {
            Ok(mut other) => {
                let mut other_pending = Deliveries::new();
                let released =
                    Self::apply_release(&mut other, connection, previous.role, &mut other_pending);

                if released == Released::Presenter && self.policy.close_room_on_presenter_disconnect {
                    return self.close_room_into(&other.code, pending).await;
                }

                self.store.save_room(other).await?;
                pending.extend(other_pending);
                Ok(())
            }
            Err(AppError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn apply_release(
        room: &mut Room,
        connection: ConnectionId,
        role: Role,
        pending: &mut Deliveries,
    ) -> Released {
        let released = ConnectionBinder::release(room, connection, role);
        match released {
            Released::Player(id) => {
                info!(room_code = %room.code, player_id = id, "Player disconnected");
                room.notify_presenter(ServerMessage::PlayerDisconnected { id }, pending);
            }
            Released::Presenter => {
                info!(room_code = %room.code, "Presenter disconnected");
            }
            Released::Stale => {
                debug!(room_code = %room.code, connection_id = %connection, "Stale binding released");
            }
        }
        released
    }

    async fn close_into(&self, connection: ConnectionId, out: &mut Deliveries) {
        let Some(binding) = self.binder.close(connection).await else {
            return;
        };

        let mut room = match self.store.get_room(&binding.room_code).await {
            Ok(room) => room,
            Err(e) => {
                debug!(room_code = %binding.room_code, error = %e, "Room gone before close cleanup");
                return;
            }
        };

        let mut pending = Deliveries::new();
        let released = Self::apply_release(&mut room, connection, binding.role, &mut pending);

        if released == Released::Presenter && self.policy.close_room_on_presenter_disconnect {
            if let Err(e) = self.close_room_into(&room.code, out).await {
                warn!(room_code = %room.code, error = %e, "Failed to close room after presenter left");
            }
            return;
        }

        if let Err(e) = self.store.save_room(room).await {
            debug!(error = %e, "Room gone before close cleanup was saved");
            return;
        }
        out.extend(pending);
    }

    async fn close_room_into(&self, code: &str, out: &mut Deliveries) -> Result<(), AppError> {
        let room = self.store.remove_room(code).await?;

        for connection in self.binder.bound_to(&room.code).await {
            self.binder.unbind(connection).await;
            out.push((
                connection,
                ServerMessage::RoomClosed {
                    code: room.code.clone(),
                },
            ));
        }

        info!(room_code = %room.code, "Room closed");
        Ok(())
    }

    /// Saves an updated room, then queues its deliveries
    async fn save(&self, mut room: Room, pending: Deliveries, out: &mut Deliveries) -> Result<(), AppError> {
        room.touch();
        self.store.save_room(room).await?;
        out.extend(pending);
        Ok(())
    }

    /// Like `save`, but undoes the binding of `connection` if the room vanished
    async fn commit(
        &self,
        room: Room,
        connection: ConnectionId,
        pending: Deliveries,
        out: &mut Deliveries,
    ) -> Result<(), AppError> {
        let result = self.save(room, pending, out).await;
        if result.is_err() {
            self.binder.unbind(connection).await;
        }
        result
    }

    /// Sends everything queued. A failed send counts as that connection closing,
    /// whose cleanup may queue further messages.
    async fn deliver(&self, mut out: Deliveries) {
        let mut dead: HashSet<ConnectionId> = HashSet::new();

        while !out.is_empty() {
            let mut newly_dead = Vec::new();
            for (connection, message) in out.drain(..) {
                if dead.contains(&connection) {
                    continue;
                }
                if self.binder.send(connection, &message).await.is_err() {
                    dead.insert(connection);
                    newly_dead.push(connection);
                }
            }

            for connection in newly_dead {
                self.close_into(connection, &mut out).await;
            }
        }
    }
}
