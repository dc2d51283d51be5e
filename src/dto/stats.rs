use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{PlayerStatsEntity, RoleStatsEntity},
    dto::format_system_time,
    state::player::Role,
};

/// Path parameters of `/players/{user_id}/stats`.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Path)]
pub struct PlayerPath {
    /// Account identifier supplied by clients when joining rooms.
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

/// Cumulative statistics of one account.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatsResponse {
    /// Account id.
    pub user_id: String,
    /// Finished matches.
    pub games_played: u32,
    /// Matches won.
    pub games_won: u32,
    /// `games_won / games_played` as a percentage.
    pub win_percentage: f64,
    /// Running mean over every graded argument.
    pub average_argument_score: f64,
    /// Highest single argument score.
    pub best_argument_score: f64,
    /// Lowest single argument score.
    pub worst_argument_score: f64,
    /// Graded arguments.
    pub total_arguments: u32,
    /// Resolved rounds, tiebreaks included.
    pub rounds_played: u32,
    /// Rounds won.
    pub rounds_won: u32,
    /// Consecutive match wins up to the latest game.
    pub current_streak: u32,
    /// Best streak so far.
    pub longest_streak: u32,
    /// Rounds argued as prosecutor.
    pub prosecutor: RoleStatsResponse,
    /// Rounds argued as defender.
    pub defender: RoleStatsResponse,
    /// Role with the strictly higher average, if any.
    pub preferred_role: Option<Role>,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

/// Breakdown for one courtroom role.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleStatsResponse {
    /// Rounds played in this role.
    pub rounds: u32,
    /// Rounds won in this role.
    pub wins: u32,
    /// Mean argument score in this role.
    pub average_score: f64,
    /// Arguments made in this role.
    pub arguments: u32,
}

impl From<RoleStatsEntity> for RoleStatsResponse {
    fn from(value: RoleStatsEntity) -> Self {
        Self {
            rounds: value.rounds,
            wins: value.wins,
            average_score: value.average_score,
            arguments: value.arguments,
        }
    }
}

impl From<PlayerStatsEntity> for PlayerStatsResponse {
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
            prosecutor: value.prosecutor.into(),
            defender: value.defender.into(),
            preferred_role: value.preferred_role,
            updated_at: format_system_time(value.updated_at),
        }
    }
}
