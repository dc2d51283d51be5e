use serde::{Deserialize, Serialize};

use crate::dao::models::PlayerStatsEntity;

/// Prefix shared by every statistics document id.
pub const STATS_PREFIX: &str = "stats::";

/// Document id of a player's statistics record.
pub fn stats_doc_id(user_id: &str) -> String {
    format!("{STATS_PREFIX}{user_id}")
}

/// Statistics record as stored in CouchDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchStatsDocument {
    /// `stats::<userId>`.
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision to update; absent on first save.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// The record itself, flattened into the document.
    #[serde(flatten)]
    pub stats: PlayerStatsEntity,
}

impl CouchStatsDocument {
    /// Wrap `stats` for saving on top of revision `rev`.
    pub fn from_entity(stats: PlayerStatsEntity, rev: Option<String>) -> Self {
        Self {
            id: stats_doc_id(&stats.user_id),
            rev,
            stats,
        }
    }
}
