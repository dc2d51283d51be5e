use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::room::{RoomPath, RoomSnapshot},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Read-only room routes, used by clients refreshing after a reconnect.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{room_id}", get(get_room))
}

/// Return the current snapshot of a live room.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(RoomPath),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSnapshot),
        (status = 400, description = "Malformed room code"),
        (status = 404, description = "No live room with this code")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<RoomPath>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = room_service::room_snapshot(&state, &path.room_id).await?;
    Ok(Json(snapshot))
}
