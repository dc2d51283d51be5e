use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Ping the statistics store and report live room and socket counts.
///
/// A failed ping reports `degraded` right away, without waiting for the supervisor to notice.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let reachable = match state.require_stats_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "statistics store ping failed");
                false
            }
        },
        Err(_) => {
            warn!("no statistics store installed; finished matches are not persisted");
            false
        }
    };

    HealthResponse {
        status: if reachable {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        },
        rooms: state.rooms().len(),
        connections: state.connections().len(),
    }
}
