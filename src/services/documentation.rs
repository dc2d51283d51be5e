use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Courtroom Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::rooms::get_room,
        crate::routes::players::get_player_stats,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::room::RoomSnapshot,
            crate::dto::stats::PlayerStatsResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Live room snapshots"),
        (name = "players", description = "Player WebSocket and statistics"),
    )
)]
/// Generated document type.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/healthcheck", "/ws", "/rooms/{room_id}", "/players/{user_id}/stats"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
