use serde::Serialize;
use utoipa::ToSchema;

use crate::state::room::RoomPhase;

/// Room phase as shown to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum VisibleRoomPhase {
    /// Waiting for a second player.
    Waiting,
    /// The case is being written.
    Starting,
    /// Roles were drawn.
    Ready,
    /// Players read the case.
    CaseReading,
    /// Arguments are exchanged (see `tiebreak` for the third round).
    RoundActive,
    /// The judge is scoring.
    RoundOver,
    /// Players read the verdict.
    RoundReading,
    /// The chooser picks a side for the tiebreaker.
    TiebreakerChoice,
    /// Match decided.
    GameOver,
}

impl From<RoomPhase> for VisibleRoomPhase {
    fn from(value: RoomPhase) -> Self {
        match value {
            RoomPhase::Waiting => VisibleRoomPhase::Waiting,
            RoomPhase::Starting => VisibleRoomPhase::Starting,
            RoomPhase::Ready => VisibleRoomPhase::Ready,
            RoomPhase::CaseReading => VisibleRoomPhase::CaseReading,
            RoomPhase::RoundActive(_) => VisibleRoomPhase::RoundActive,
            RoomPhase::RoundOver => VisibleRoomPhase::RoundOver,
            RoomPhase::RoundReading => VisibleRoomPhase::RoundReading,
            RoomPhase::TiebreakerChoice => VisibleRoomPhase::TiebreakerChoice,
            RoomPhase::GameOver => VisibleRoomPhase::GameOver,
        }
    }
}
