use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// `/healthcheck`.
pub mod health;
/// `/players/{user_id}/stats`.
pub mod players;
/// `/rooms/{room_id}`.
pub mod rooms;
/// `/ws`.
pub mod websocket;

/// Every HTTP and WebSocket route of the server, bound to the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(rooms::router())
        .merge(players::router())
        .merge(docs::router())
        .with_state(state)
}
