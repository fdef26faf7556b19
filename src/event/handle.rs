use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::router::EventRouter;
use crate::room::models::PlayerId;
use crate::shared::AppError;
use crate::websockets::{ClientMessage, ConnectionId};

/// Work items for the dispatcher task, processed strictly one at a time
#[derive(Debug)]
pub enum RouterCommand {
    Inbound {
        connection: ConnectionId,
        message: ClientMessage,
    },
    Closed {
        connection: ConnectionId,
        done: oneshot::Sender<()>,
    },
    SelectAvatar {
        id: PlayerId,
        avatar: String,
        room: Option<String>,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    CloseRoom {
        code: String,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
}

/// Cheap, cloneable entry point to the dispatcher task
#[derive(Clone)]
pub struct RouterHandle {
    sender: mpsc::UnboundedSender<RouterCommand>,
}

impl RouterHandle {
    /// Queues an inbound event without waiting for it to be processed
    pub fn dispatch(&self, connection: ConnectionId, message: ClientMessage) {
        if self
            .sender
            .send(RouterCommand::Inbound {
                connection,
                message,
            })
            .is_err()
        {
            warn!(connection_id = %connection, "Event router is gone, dropping message");
        }
    }

    /// Resolves once the close cleanup for `connection` has run
    pub async fn connection_closed(&self, connection: ConnectionId) {
        let (done, finished) = oneshot::channel();
        if self
            .sender
            .send(RouterCommand::Closed { connection, done })
            .is_ok()
        {
            let _ = finished.await;
        }
    }

    pub async fn select_avatar(
        &self,
        id: PlayerId,
        avatar: String,
        room: Option<String>,
    ) -> Result<(), AppError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(RouterCommand::SelectAvatar {
                id,
                avatar,
                room,
                reply,
            })
            .map_err(|_| AppError::Internal)?;
        response.await.map_err(|_| AppError::Internal)?
    }

    pub async fn close_room(&self, code: String) -> Result<(), AppError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(RouterCommand::CloseRoom { code, reply })
            .map_err(|_| AppError::Internal)?;
        response.await.map_err(|_| AppError::Internal)?
    }
}

impl EventRouter {
    /// Spawns the dispatcher task. It runs until every handle is dropped.
    pub fn start(self) -> (RouterHandle, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            info!("Event router started");

            while let Some(command) = receiver.recv().await {
                self.handle_command(command).await;
            }

            warn!("Event router stopped - no more handles");
        });

        (RouterHandle { sender }, task)
    }

    pub async fn handle_command(&self, command: RouterCommand) {
        match command {
            RouterCommand::Inbound {
                connection,
                message,
            } => self.handle_message(connection, message).await,
            RouterCommand::Closed { connection, done } => {
                self.handle_closed(connection).await;
                let _ = done.send(());
            }
            RouterCommand::SelectAvatar {
                id,
                avatar,
                room,
                reply,
            } => {
                let _ = reply.send(self.select_avatar(id, avatar, room).await);
            }
            RouterCommand::CloseRoom { code, reply } => {
                let _ = reply.send(self.close_room(&code).await);
            }
        }
    }
}
