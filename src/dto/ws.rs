use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        room::RoomSnapshot,
        validation::{validate_player_name, validate_room_code},
    },
    state::{player::Role, timer::TimerState},
};

/// Reasons an inbound frame is rejected before reaching a room.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Not JSON, or not shaped like any known message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Shaped correctly but carrying invalid values.
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationErrors),
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Open a room.
    CreateRoom(CreateRoomPayload),
    /// Take a seat in a room.
    JoinRoom(JoinRoomPayload),
    /// Toggle readiness.
    SetReady(SetReadyPayload),
    /// Argue for the current role.
    SubmitArgument(SubmitArgumentPayload),
    /// Pick the tiebreak side.
    ChooseSide(ChooseSidePayload),
    /// Ask for a fresh snapshot.
    GetRoomInfo(RoomRef),
    /// Re-issue the failed judge call.
    RetryOracle(RoomRef),
    /// Give up the seat.
    LeaveRoom(RoomRef),
    /// Any other `type`; ignored.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame and validate its payload.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let message: Self = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }

    /// Room targeted by the message, if it names one.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::JoinRoom(payload) => Some(&payload.room_id),
            Self::SetReady(payload) => Some(&payload.room_id),
            Self::SubmitArgument(payload) => Some(&payload.room_id),
            Self::ChooseSide(payload) => Some(&payload.room_id),
            Self::GetRoomInfo(payload) | Self::RetryOracle(payload) | Self::LeaveRoom(payload) => {
                Some(&payload.room_id)
            }
            Self::CreateRoom(_) | Self::Unknown => None,
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::CreateRoom(payload) => payload.validate(),
            Self::JoinRoom(payload) => payload.validate(),
            Self::SetReady(payload) => payload.validate(),
            Self::SubmitArgument(payload) => payload.validate(),
            Self::ChooseSide(payload) => payload.validate(),
            Self::GetRoomInfo(payload) | Self::RetryOracle(payload) | Self::LeaveRoom(payload) => {
                payload.validate()
            }
            Self::Unknown => Ok(()),
        }
    }
}

/// Open a new room and take its left seat.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomPayload {
    /// Display name, unique within the room.
    #[validate(length(min = 1, max = 32), custom(function = "validate_player_name"))]
    pub player_name: String,
    /// Avatar reference, echoed back in snapshots.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Language the case and verdicts are written in.
    #[serde(default)]
    pub language: Option<String>,
    /// Stable account id; guests omit it and get no statistics.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Take the free seat of an existing room, or re-attach to a seat held by `user_id`.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    /// Room to join.
    #[validate(custom(function = "validate_room_code"))]
    pub room_id: String,
    /// Display name, unique within the room.
    #[validate(length(min = 1, max = 32), custom(function = "validate_player_name"))]
    pub player_name: String,
    /// Avatar reference.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Ignored: the room keeps the creator's language.
    #[serde(default)]
    pub language: Option<String>,
    /// Stable account id used for statistics and re-attaching.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Toggle readiness for the current phase.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetReadyPayload {
    /// Target room.
    #[validate(custom(function = "validate_room_code"))]
    pub room_id: String,
    /// New flag value.
    pub ready: bool,
}

/// Argument text; the length limit is configured per deployment and checked by the room.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitArgumentPayload {
    /// Target room.
    #[validate(custom(function = "validate_room_code"))]
    pub room_id: String,
    /// Argument body; blank is allowed and scores zero.
    #[serde(default)]
    pub text: String,
}

/// Tiebreak side picked by the chooser.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChooseSidePayload {
    /// Target room.
    #[validate(custom(function = "validate_room_code"))]
    pub room_id: String,
    /// Role the chooser takes; the opponent gets the other one.
    pub role: Role,
}

/// Payload of messages that only name a room.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    /// Target room.
    #[validate(custom(function = "validate_room_code"))]
    pub room_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to player WebSocket clients.
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// First frame on every socket.
    Connected {
        /// Id of this socket.
        connection_id: Uuid,
    },
    /// Answer to `createRoom`.
    RoomCreated {
        /// Code to share with the opponent.
        room_id: String,
        /// The creator's seat.
        player_id: Uuid,
    },
    /// Answer to `joinRoom`.
    RoomJoined {
        /// Joined room.
        room_id: String,
        /// The joiner's seat.
        player_id: Uuid,
        /// State right after joining.
        room: Box<RoomSnapshot>,
    },
    /// Answer to `getRoomInfo`.
    RoomInfo {
        /// Current state.
        room: Box<RoomSnapshot>,
    },
    /// Broadcast after every room mutation.
    GameStateUpdate {
        /// New state.
        room: Box<RoomSnapshot>,
    },
    /// Broadcast once per countdown second.
    TimerUpdate(TimerState),
    /// Sent to the turn-holder when their countdown ran out.
    ForceSubmitArgument {
        /// Room whose turn expired.
        room_id: String,
    },
    /// Rejection sent to the offending client only.
    Error {
        /// Stable machine-readable code such as `NOT_YOUR_TURN`.
        code: String,
        /// Human-readable reason.
        message: String,
    },
}

impl ServerMessage {
    /// Build an `error` frame.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}
