use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{phase::VisibleRoomPhase, validation::validate_room_code},
    oracle::CaseFile,
    state::{
        player::{Player, Role, Seat},
        room::{
            Argument, OracleFailure, OracleStage, POINTS_TO_WIN, Room, RoomPhase, RoundKind,
            RoundSummary,
        },
        timer::TimerState,
    },
};

/// Path parameters of `/rooms/{room_id}`.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Path)]
pub struct RoomPath {
    /// Six-character room code (case-insensitive).
    #[validate(custom(function = "validate_room_code"))]
    pub room_id: String,
}

/// Full room state pushed to clients after every mutation.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Six-character room code.
    pub room_id: String,
    /// Current phase.
    pub phase: VisibleRoomPhase,
    /// True while the tiebreak round is being argued.
    pub tiebreak: bool,
    /// Language the case and verdicts are written in.
    pub language: String,
    /// Players in seat order (left first).
    pub players: Vec<PlayerSnapshot>,
    /// Generated case, once the judge wrote it.
    pub case: Option<CaseFile>,
    /// Player allowed to submit the next argument.
    pub turn: Option<Uuid>,
    /// Round counter (1-based).
    pub round: u8,
    /// Exchange within the current round (1..=3).
    pub exchange: u8,
    /// Room-wide argument log in submission order.
    pub arguments: Vec<ArgumentSnapshot>,
    /// One summary per resolved round.
    pub history: Vec<RoundSummarySnapshot>,
    /// The room's countdown.
    pub timer: TimerState,
    /// Player picking a side for the tiebreak.
    pub tiebreak_chooser: Option<Uuid>,
    /// Set while the judge is writing the case or grading a round.
    pub oracle_pending: bool,
    /// Last judge failure, cleared by a successful retry.
    pub oracle_failure: Option<OracleFailureSnapshot>,
    /// Match winner once the room reached `game-over`.
    pub winner: Option<Uuid>,
    /// Monotonic mutation counter.
    pub version: u64,
}

/// Public view of a seated player, including their own argument log.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Stable player id within the room.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Avatar reference chosen by the client.
    pub avatar: Option<String>,
    /// Account id; absent for guests.
    pub user_id: Option<String>,
    /// Left or right, fixed at join.
    pub seat: Seat,
    /// Role in the current round.
    pub role: Option<Role>,
    /// Role held in the previous round.
    pub previous_role: Option<Role>,
    /// Rounds won.
    pub points: u8,
    /// Sum of every argument score.
    pub score: f64,
    /// Ready flag for the current phase.
    pub ready: bool,
    /// False while the player's socket is gone.
    pub connected: bool,
    /// This player's arguments only.
    pub arguments: Vec<ArgumentSnapshot>,
}

/// One entry of the argument log.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentSnapshot {
    /// Player who submitted it.
    pub speaker: Uuid,
    /// Argument text, possibly empty after a forced submission.
    pub text: String,
    /// Round it belongs to.
    pub round: u8,
    /// Exchange within that round.
    pub exchange: u8,
    /// Role the speaker argued for.
    pub role: Role,
    /// Judge score, `0` until the round is graded.
    pub score: f64,
}

/// Resolved round as shown on the verdict screen.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummarySnapshot {
    /// Round number.
    pub round: u8,
    /// Who prosecuted.
    pub prosecutor: Uuid,
    /// Who defended.
    pub defender: Uuid,
    /// Side with the higher total; ties go to the defence.
    pub winning_role: Role,
    /// Player holding `winning_role`.
    pub winner: Uuid,
    /// Total of the prosecution's three scores.
    pub prosecution_score: f64,
    /// Total of the defence's three scores.
    pub defense_score: f64,
    /// Judge's written verdict.
    pub analysis: String,
}

/// Judge call that failed.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OracleStageDto {
    /// Writing the case.
    CaseGeneration,
    /// Grading a round.
    RoundScoring,
}

/// Distinct failure signal shown to both players until someone retries.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OracleFailureSnapshot {
    /// Which call failed.
    pub stage: OracleStageDto,
    /// Reason, for display.
    pub message: String,
}

impl From<&Argument> for ArgumentSnapshot {
    fn from(argument: &Argument) -> Self {
        Self {
            speaker: argument.speaker,
            text: argument.text.clone(),
            round: argument.round,
            exchange: argument.exchange,
            role: argument.role,
            score: argument.score,
        }
    }
}

impl From<&RoundSummary> for RoundSummarySnapshot {
    fn from(summary: &RoundSummary) -> Self {
        Self {
            round: summary.round,
            prosecutor: summary.prosecutor,
            defender: summary.defender,
            winning_role: summary.winning_role,
            winner: summary.winner(),
            prosecution_score: summary.prosecution_score,
            defense_score: summary.defense_score,
            analysis: summary.analysis.clone(),
        }
    }
}

impl From<&OracleFailure> for OracleFailureSnapshot {
    fn from(failure: &OracleFailure) -> Self {
        let stage = match failure.stage {
            OracleStage::CaseGeneration => OracleStageDto::CaseGeneration,
            OracleStage::RoundScoring => OracleStageDto::RoundScoring,
        };
        Self {
            stage,
            message: failure.message.clone(),
        }
    }
}

impl PlayerSnapshot {
    fn from_player(player: &Player, room: &Room) -> Self {
        Self {
            id: player.id,
            name: player.profile.name.clone(),
            avatar: player.profile.avatar.clone(),
            user_id: player.profile.user_id.clone(),
            seat: player.seat,
            role: player.role,
            previous_role: player.previous_role,
            points: player.points,
            score: player.score,
            ready: player.ready,
            connected: player.connected,
            arguments: room.arguments_of(player.id).map(Into::into).collect(),
        }
    }
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        let mut players: Vec<&Player> = room.players().collect();
        players.sort_by_key(|player| match player.seat {
            Seat::Left => 0,
            Seat::Right => 1,
        });

        let winner = (room.phase() == RoomPhase::GameOver)
            .then(|| {
                players
                    .iter()
                    .find(|player| player.points >= POINTS_TO_WIN)
                    .map(|player| player.id)
            })
            .flatten();

        Self {
            room_id: room.id().to_string(),
            phase: room.phase().into(),
            tiebreak: room.phase() == RoomPhase::RoundActive(RoundKind::Tiebreak),
            language: room.language().to_string(),
            players: players
                .iter()
                .map(|player| PlayerSnapshot::from_player(player, room))
                .collect(),
            case: room.case().cloned(),
            turn: room.turn(),
            round: room.round(),
            exchange: room.exchange(),
            arguments: room.arguments().iter().map(Into::into).collect(),
            history: room.history().iter().map(Into::into).collect(),
            timer: room.timer(),
            tiebreak_chooser: room.tiebreak_chooser(),
            oracle_pending: room.pending().is_some(),
            oracle_failure: room.oracle_failure().map(Into::into),
            winner,
            version: room.version(),
        }
    }
}
