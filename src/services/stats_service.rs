//! Statistics updater: folds finished matches into persisted per-account records.

use tracing::{info, warn};

use crate::{
    dao::{models::PlayerStatsEntity, stats_store::StatsStore, storage::StorageResult},
    dto::stats::PlayerStatsResponse,
    error::ServiceError,
    state::{
        SharedState,
        stats::{PlayerOutcome, apply_outcome},
    },
};

/// Persist the outcome of a finished match.
///
/// Best effort: each player is an independent read-modify-write, guests are skipped, and
/// failures are logged without affecting the room.
pub async fn settle(state: &SharedState, outcomes: Vec<PlayerOutcome>) {
    let Some(store) = state.stats_store().await else {
        warn!("statistics store unavailable (degraded mode); match result not persisted");
        return;
    };

    for outcome in outcomes {
        let Some(user_id) = outcome.user_id.as_deref() else {
            continue;
        };
        match settle_player(store.as_ref(), user_id, &outcome).await {
            Ok(()) => info!(user_id, won = outcome.won, "player statistics updated"),
            Err(err) => warn!(user_id, error = %err, "failed to update player statistics"),
        }
    }
}

async fn settle_player(
    store: &dyn StatsStore,
    user_id: &str,
    outcome: &PlayerOutcome,
) -> StorageResult<()> {
    let mut stats = store
        .find_stats(user_id.to_string())
        .await?
        .unwrap_or_else(|| PlayerStatsEntity::new(user_id.to_string()));
    apply_outcome(&mut stats, outcome);
    store.save_stats(stats).await
}

/// Load the statistics of `user_id`.
pub async fn get_player_stats(
    state: &SharedState,
    user_id: &str,
) -> Result<PlayerStatsResponse, ServiceError> {
    let store = state.require_stats_store().await?;
    store
        .find_stats(user_id.to_string())
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("no statistics for player `{user_id}`")))
}
