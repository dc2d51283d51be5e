use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::stats::{PlayerPath, PlayerStatsResponse},
    error::AppError,
    services::stats_service,
    state::SharedState,
};

/// Player statistics routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/players/{user_id}/stats", get(get_player_stats))
}

/// Return the persisted statistics of an account.
#[utoipa::path(
    get,
    path = "/players/{user_id}/stats",
    tag = "players",
    params(PlayerPath),
    responses(
        (status = 200, description = "Cumulative statistics", body = PlayerStatsResponse),
        (status = 404, description = "Player never finished a match"),
        (status = 503, description = "Statistics store unavailable")
    )
)]
pub async fn get_player_stats(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<PlayerPath>>,
) -> Result<Json<PlayerStatsResponse>, AppError> {
    let stats = stats_service::get_player_stats(&state, &path.user_id).await?;
    Ok(Json(stats))
}
