use serde::Serialize;
use utoipa::ToSchema;

/// Whether finished matches can currently be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The statistics store answered its last ping.
    Ok,
    /// No statistics store is installed, or it failed its ping. Matches keep running.
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Persistence health.
    pub status: HealthStatus,
    /// Rooms currently live.
    pub rooms: usize,
    /// Open WebSocket connections.
    pub connections: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let body = HealthResponse {
            status: HealthStatus::Degraded,
            rooms: 2,
            connections: 3,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status": "degraded", "rooms": 2, "connections": 3})
        );
    }
}
