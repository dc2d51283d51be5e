use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::state::player::Role;

/// Cumulative statistics stored per player identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStatsEntity {
    /// Stable account identifier.
    pub user_id: String,
    /// Finished matches.
    pub games_played: u32,
    /// Matches won (two round points).
    pub games_won: u32,
    /// `games_won / games_played` in percent.
    pub win_percentage: f64,
    /// Mean score over every graded argument.
    pub average_argument_score: f64,
    /// Highest score a single argument received.
    pub best_argument_score: f64,
    /// Lowest score a single argument received.
    pub worst_argument_score: f64,
    /// Graded arguments.
    pub total_arguments: u32,
    /// Resolved rounds taken part in.
    pub rounds_played: u32,
    /// Rounds won.
    pub rounds_won: u32,
    /// Consecutive match wins up to now.
    pub current_streak: u32,
    /// Best value `current_streak` ever reached.
    pub longest_streak: u32,
    /// Rounds played as prosecutor.
    pub prosecutor: RoleStatsEntity,
    /// Rounds played as defender.
    pub defender: RoleStatsEntity,
    /// Role with the higher average score, if any.
    pub preferred_role: Option<Role>,
    /// Last time the record was updated.
    pub updated_at: SystemTime,
}

impl PlayerStatsEntity {
    /// Empty record for a player that never finished a match.
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            games_played: 0,
            games_won: 0,
            win_percentage: 0.0,
            average_argument_score: 0.0,
            best_argument_score: 0.0,
            worst_argument_score: 0.0,
            total_arguments: 0,
            rounds_played: 0,
            rounds_won: 0,
            current_streak: 0,
            longest_streak: 0,
            prosecutor: RoleStatsEntity::default(),
            defender: RoleStatsEntity::default(),
            preferred_role: None,
            updated_at: SystemTime::now(),
        }
    }
}

/// Per-role breakdown of a player's rounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleStatsEntity {
    /// Rounds played in this role.
    pub rounds: u32,
    /// Rounds won in this role.
    pub wins: u32,
    /// Mean argument score in this role.
    pub average_score: f64,
    /// Arguments made in this role.
    pub arguments: u32,
}
