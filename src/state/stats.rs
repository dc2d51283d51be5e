//! Folding finished matches into cumulative player statistics.

use std::time::SystemTime;

use crate::{
    dao::models::{PlayerStatsEntity, RoleStatsEntity},
    state::player::Role,
};

/// What one round meant for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Role held in the round.
    pub role: Role,
    /// Whether the player took the round's point.
    pub won: bool,
    /// Scores of the player's arguments in this round.
    pub argument_scores: Vec<f64>,
}

/// What a finished match meant for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOutcome {
    /// Stable identity; guests (`None`) are not persisted.
    pub user_id: Option<String>,
    /// Whether the player won the match.
    pub won: bool,
    /// Resolved rounds in play order.
    pub rounds: Vec<RoundOutcome>,
}

/// Running mean after adding `count` samples summing to `sum` to `old_count` samples.
fn incremental_average(old_average: f64, old_count: u32, sum: f64, count: u32) -> f64 {
    let total = old_count + count;
    if total == 0 {
        return 0.0;
    }
    (old_average * f64::from(old_count) + sum) / f64::from(total)
}

fn fold_role(stats: &mut RoleStatsEntity, round: &RoundOutcome) {
    let sum: f64 = round.argument_scores.iter().sum();
    let count = round.argument_scores.len() as u32;
    stats.average_score = incremental_average(stats.average_score, stats.arguments, sum, count);
    stats.arguments += count;
    stats.rounds += 1;
    if round.won {
        stats.wins += 1;
    }
}

/// Fold `outcome` into `stats`.
///
/// Averages are updated incrementally (`new = (old * old_count + sum) / new_count`) so the
/// stored record never needs the raw history.
pub fn apply_outcome(stats: &mut PlayerStatsEntity, outcome: &PlayerOutcome) {
    stats.games_played += 1;
    if outcome.won {
        stats.games_won += 1;
        stats.current_streak += 1;
        stats.longest_streak = stats.longest_streak.max(stats.current_streak);
    } else {
        stats.current_streak = 0;
    }
    stats.win_percentage = f64::from(stats.games_won) * 100.0 / f64::from(stats.games_played);

    let scores: Vec<f64> = outcome
        .rounds
        .iter()
        .flat_map(|round| round.argument_scores.iter().copied())
        .collect();
    if !scores.is_empty() {
        let sum: f64 = scores.iter().sum();
        let count = scores.len() as u32;
        let best = scores.iter().copied().fold(f64::MIN, f64::max);
        let worst = scores.iter().copied().fold(f64::MAX, f64::min);
        if stats.total_arguments == 0 {
            stats.best_argument_score = best;
            stats.worst_argument_score = worst;
        } else {
            stats.best_argument_score = stats.best_argument_score.max(best);
            stats.worst_argument_score = stats.worst_argument_score.min(worst);
        }
        stats.average_argument_score =
            incremental_average(stats.average_argument_score, stats.total_arguments, sum, count);
        stats.total_arguments += count;
    }

    for round in &outcome.rounds {
        stats.rounds_played += 1;
        if round.won {
            stats.rounds_won += 1;
        }
        match round.role {
            Role::Prosecutor => fold_role(&mut stats.prosecutor, round),
            Role::Defender => fold_role(&mut stats.defender, round),
        }
    }

    stats.preferred_role = preferred_role(&stats.prosecutor, &stats.defender);
    stats.updated_at = SystemTime::now();
}

/// Role with the strictly higher average; `None` without data or on equality.
fn preferred_role(prosecutor: &RoleStatsEntity, defender: &RoleStatsEntity) -> Option<Role> {
    match (prosecutor.rounds, defender.rounds) {
        (0, 0) => None,
        (_, 0) => Some(Role::Prosecutor),
        (0, _) => Some(Role::Defender),
        _ if prosecutor.average_score > defender.average_score => Some(Role::Prosecutor),
        _ if defender.average_score > prosecutor.average_score => Some(Role::Defender),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(role: Role, won: bool, scores: [f64; 3]) -> RoundOutcome {
        RoundOutcome {
            role,
            won,
            argument_scores: scores.to_vec(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn first_game_initialises_every_counter() {
        let mut stats = PlayerStatsEntity::new("u-1".into());
        apply_outcome(
            &mut stats,
            &PlayerOutcome {
                user_id: Some("u-1".into()),
                won: true,
                rounds: vec![
                    round(Role::Prosecutor, true, [8.0, 7.0, 9.0]),
                    round(Role::Defender, true, [6.0, 5.0, 4.0]),
                ],
            },
        );

        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.games_won, 1);
        assert_close(stats.win_percentage, 100.0);
        assert_eq!(stats.total_arguments, 6);
        assert_close(stats.average_argument_score, 39.0 / 6.0);
        assert_close(stats.best_argument_score, 9.0);
        assert_close(stats.worst_argument_score, 4.0);
        assert_eq!(stats.rounds_played, 2);
        assert_eq!(stats.rounds_won, 2);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 1);
        assert_close(stats.prosecutor.average_score, 8.0);
        assert_close(stats.defender.average_score, 5.0);
        assert_eq!(stats.preferred_role, Some(Role::Prosecutor));
    }

    #[test]
    fn averages_fold_incrementally_across_games() {
        let mut stats = PlayerStatsEntity::new("u-1".into());
        let win = PlayerOutcome {
            user_id: Some("u-1".into()),
            won: true,
            rounds: vec![
                round(Role::Defender, true, [2.0, 2.0, 2.0]),
                round(Role::Prosecutor, true, [4.0, 4.0, 4.0]),
            ],
        };
        let loss = PlayerOutcome {
            user_id: Some("u-1".into()),
            won: false,
            rounds: vec![
                round(Role::Defender, false, [10.0, 10.0, 10.0]),
                round(Role::Prosecutor, false, [1.0, 0.0, 2.0]),
            ],
        };

        apply_outcome(&mut stats, &win);
        apply_outcome(&mut stats, &win);
        apply_outcome(&mut stats, &loss);

        assert_eq!(stats.games_played, 3);
        assert_eq!(stats.games_won, 2);
        assert_close(stats.win_percentage, 200.0 / 3.0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.total_arguments, 18);
        assert_close(stats.average_argument_score, (18.0 + 18.0 + 33.0) / 18.0);
        assert_close(stats.best_argument_score, 10.0);
        assert_close(stats.worst_argument_score, 0.0);
        assert_eq!(stats.defender.rounds, 3);
        assert_eq!(stats.defender.wins, 2);
        assert_close(stats.defender.average_score, (2.0 * 6.0 + 30.0) / 9.0);
        assert_close(stats.prosecutor.average_score, (4.0 * 6.0 + 3.0) / 9.0);
        assert_eq!(stats.preferred_role, Some(Role::Defender));
    }

    #[test]
    fn preferred_role_needs_a_strict_winner() {
        let mut prosecutor = RoleStatsEntity::default();
        let mut defender = RoleStatsEntity::default();
        assert_eq!(preferred_role(&prosecutor, &defender), None);

        prosecutor.rounds = 1;
        prosecutor.average_score = 5.0;
        assert_eq!(preferred_role(&prosecutor, &defender), Some(Role::Prosecutor));

        defender.rounds = 1;
        defender.average_score = 5.0;
        assert_eq!(preferred_role(&prosecutor, &defender), None);
    }
}
