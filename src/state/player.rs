use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Identifier of a seated player, stable for the whole match even across reconnections.
pub type PlayerId = Uuid;

/// Side of the table a player sits on. Assigned at join time and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    /// First player to enter the room (the creator).
    Left,
    /// Second player to enter the room.
    Right,
}

/// Courtroom role held during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Argues in favour of the accusation. Always speaks first in an exchange.
    Prosecutor,
    /// Answers the prosecution.
    Defender,
}

impl Role {
    /// The complementary role.
    pub fn opposite(self) -> Self {
        match self {
            Role::Prosecutor => Role::Defender,
            Role::Defender => Role::Prosecutor,
        }
    }
}

/// Identity details supplied by a client when creating or joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    /// Stable account identifier, `None` for guests.
    pub user_id: Option<String>,
    /// Display name, unique within a room (case-insensitive).
    pub name: String,
    /// Avatar reference picked by the client.
    pub avatar: Option<String>,
}

/// Participant state tracked by a room for the duration of a match.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Seat owner id.
    pub id: PlayerId,
    /// Socket connection currently attached to this seat.
    pub connection: Uuid,
    /// Identity supplied at join time.
    pub profile: PlayerProfile,
    /// Fixed seat.
    pub seat: Seat,
    /// Role for the round in progress (or about to start).
    pub role: Option<Role>,
    /// Role held in the round that was resolved last.
    pub previous_role: Option<Role>,
    /// Rounds won so far.
    pub points: u8,
    /// Sum of every score awarded to this player's arguments.
    pub score: f64,
    /// Readiness for the current gated phase.
    pub ready: bool,
    /// False once the socket went away.
    pub connected: bool,
}

impl Player {
    /// Seat a fresh player with no role, score, or readiness.
    pub fn new(id: PlayerId, connection: Uuid, profile: PlayerProfile, seat: Seat) -> Self {
        Self {
            id,
            connection,
            profile,
            seat,
            role: None,
            previous_role: None,
            points: 0,
            score: 0.0,
            ready: false,
            connected: true,
        }
    }

    /// Case-insensitive comparison against another display name.
    pub fn has_name(&self, name: &str) -> bool {
        self.profile.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_involutions() {
        assert_eq!(Role::Prosecutor.opposite(), Role::Defender);
        assert_eq!(Role::Defender.opposite().opposite(), Role::Defender);
    }

    #[test]
    fn names_compare_without_case_or_padding() {
        let player = Player::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PlayerProfile {
                user_id: None,
                name: "Ada".into(),
                avatar: None,
            },
            Seat::Left,
        );
        assert!(player.has_name(" ada "));
        assert!(!player.has_name("adam"));
    }
}
