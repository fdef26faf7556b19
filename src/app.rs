use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::room;
use crate::shared::AppState;
use crate::websockets::websocket_handler;

/// All HTTP and WebSocket routes
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/crear-sala", post(room::create_room))
        .route("/salas", get(room::list_rooms))
        .route(
            "/sala/:codigo",
            get(room::list_players).delete(room::delete_room),
        )
        .route("/sala/:codigo/host", get(room::get_host_name))
        .route("/seleccionar-avatar", post(room::select_avatar))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
