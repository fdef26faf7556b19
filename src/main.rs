use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partyroom::{
    app::build_router,
    room::cleanup_task::start_cleanup_task,
    websockets::InMemoryConnectionManager,
    AppState, ConnectionBinder, EventRouter, InMemoryRoomStore, RoomStore, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "partyroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;

    info!(
        port = config.port,
        heartbeat_secs = config.heartbeat.interval.as_secs(),
        heartbeat_max_missed = config.heartbeat.max_missed,
        min_players_to_start = config.room_policy.min_players_to_start,
        close_room_on_presenter_disconnect = config.room_policy.close_room_on_presenter_disconnect,
        "Starting party room server"
    );

    let room_store: Arc<dyn RoomStore + Send + Sync> = Arc::new(InMemoryRoomStore::new());
    let binder = Arc::new(ConnectionBinder::new(Arc::new(
        InMemoryConnectionManager::new(),
    )));

    // Single dispatcher for every room event
    let router = EventRouter::new(
        Arc::clone(&room_store),
        Arc::clone(&binder),
        config.room_policy.clone(),
    );
    let (router_handle, _router_task) = router.start();

    tokio::spawn(start_cleanup_task(
        Arc::clone(&room_store),
        config.cleanup.clone(),
    ));

    let port = config.port;
    let app_state = AppState::new(room_store, binder, router_handle, Arc::new(config));
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on http://localhost:{}", port);
    axum::serve(listener, app).await?;

    Ok(())
}
