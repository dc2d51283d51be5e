use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::{
    dao::models::{PlayerStatsEntity, RoleStatsEntity},
    state::player::Role,
};

/// Statistics record as stored in the `player_stats` collection, keyed by user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatsDocument {
    #[serde(rename = "_id")]
    user_id: String,
    games_played: u32,
    games_won: u32,
    win_percentage: f64,
    average_argument_score: f64,
    best_argument_score: f64,
    worst_argument_score: f64,
    total_arguments: u32,
    rounds_played: u32,
    rounds_won: u32,
    current_streak: u32,
    longest_streak: u32,
    prosecutor: RoleStatsEntity,
    defender: RoleStatsEntity,
    #[serde(default)]
    preferred_role: Option<Role>,
    updated_at: DateTime,
}

impl From<PlayerStatsEntity> for MongoStatsDocument {
    fn from(value: PlayerStatsEntity) -> Self {
        Self {
            user_id: value.user_id,
            games_played: value.games_played,
            games_won: value.games_won,
            win_percentage: value.win_percentage,
            average_argument_score: value.average_argument_score,
            best_argument_score: value.best_argument_score,
            worst_argument_score: value.worst_argument_score,
            total_arguments: value.total_arguments,
            rounds_played: value.rounds_played,
            rounds_won: value.rounds_won,
            current_streak: value.current_streak,
            longest_streak: value.longest_streak,
            prosecutor: value.prosecutor,
            defender: value.defender,
            preferred_role: value.preferred_role,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoStatsDocument> for PlayerStatsEntity {
    fn from(value: MongoStatsDocument) -> Self {
        Self {
            user_id: value.user_id,
            games_played: value.games_played,
            games_won: value.games_won,
            win_percentage: value.win_percentage,
            average_argument_score: value.average_argument_score,
            best_argument_score: value.best_argument_score,
            worst_argument_score: value.worst_argument_score,
            total_arguments: value.total_arguments,
            rounds_played: value.rounds_played,
            rounds_won: value.rounds_won,
            current_streak: value.current_streak,
            longest_streak: value.longest_streak,
            prosecutor: value.prosecutor,
            defender: value.defender,
            preferred_role: value.preferred_role,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Filter selecting a player's document.
pub fn doc_id(user_id: &str) -> Document {
    doc! {"_id": user_id}
}
