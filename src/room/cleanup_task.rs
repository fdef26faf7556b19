use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::repository::RoomStore;
use crate::shared::AppError;

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
    /// How long a room must have been idle before deletion
    pub idle_grace: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(60 * 60), // hourly
            idle_grace: Duration::ZERO,
        }
    }
}

/// Starts the background task that periodically removes abandoned rooms
#[instrument(skip(room_store))]
pub async fn start_cleanup_task(room_store: Arc<dyn RoomStore + Send + Sync>, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        idle_grace_secs = config.idle_grace.as_secs(),
        "Starting room cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;

        match cleanup_idle_rooms(&room_store, config.idle_grace).await {
            Ok(deleted_count) => {
                info!(deleted_count = deleted_count, "Room cleanup completed");
            }
            Err(e) => {
                error!(error = %e, "Room cleanup task failed");
            }
        }
    }
}

/// Removes rooms with no active player and no presenter. Returns how many were deleted.
#[instrument(skip(room_store))]
pub async fn cleanup_idle_rooms(
    room_store: &Arc<dyn RoomStore + Send + Sync>,
    idle_grace: Duration,
) -> Result<usize, AppError> {
    let removed = room_store.remove_idle_rooms(idle_grace).await?;

    for code in &removed {
        info!(room_code = %code, "Deleted idle room");
    }

    Ok(removed.len())
}
