use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Health check body.
pub mod health;
/// Client-facing phase names.
pub mod phase;
/// Room snapshots.
pub mod room;
/// Player statistics bodies.
pub mod stats;
pub mod validation;
/// WebSocket protocol.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
