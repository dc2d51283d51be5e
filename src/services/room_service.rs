//! Room runtime: applies client intents to rooms and executes the effects they request.
//!
//! Every mutation happens with the room mutex held, and the resulting effects are executed
//! before it is released, so broadcasts always carry the state that produced them. Work
//! that outlives the lock (countdowns, delays, oracle calls) is spawned and re-enters the
//! room through [`resume`] with only a weak handle, so a removed room is never revived.

use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        room::RoomSnapshot,
        ws::{ChooseSidePayload, CreateRoomPayload, JoinRoomPayload, ServerMessage},
    },
    error::ServiceError,
    services::stats_service,
    state::{
        Membership, SharedState,
        player::{PlayerId, PlayerProfile, Role},
        registry::{LiveRoom, RoomHandle, normalize_code},
        room::{ConnectionId, Effect, Room, RoomError, RoomPhase},
    },
};

const DEFAULT_LANGUAGE: &str = "en";

/// Open a room and seat `connection` on its left side.
pub async fn create_room(
    state: &SharedState,
    connection: ConnectionId,
    payload: CreateRoomPayload,
) -> Result<(), ServiceError> {
    ensure_unseated(state, connection).await?;

    let language = language_or_default(payload.language.as_deref());
    let (room_id, handle) = state
        .rooms()
        .create(language, state.config().room_settings());
    let mut live = handle.lock().await;

    let profile = PlayerProfile {
        user_id: payload.user_id,
        name: payload.player_name.trim().to_string(),
        avatar: payload.avatar,
    };
    let joined = match live.room.join(connection, profile) {
        Ok(joined) => joined,
        Err(err) => {
            retire(state, &handle, &mut live);
            return Err(err.into());
        }
    };

    state.set_membership(
        connection,
        Some(Membership {
            room_id: room_id.clone(),
            player_id: joined.player,
        }),
    );
    info!(room_id = %room_id, player_id = %joined.player, "room created");
    state.send_to(
        connection,
        &ServerMessage::RoomCreated {
            room_id,
            player_id: joined.player,
        },
    );
    execute(state, &handle, &mut live, joined.effects);
    Ok(())
}

/// Seat `connection` in an existing room, or re-attach it to a seat held by the same account.
pub async fn join_room(
    state: &SharedState,
    connection: ConnectionId,
    payload: JoinRoomPayload,
) -> Result<(), ServiceError> {
    ensure_unseated(state, connection).await?;

    let handle = state
        .rooms()
        .get(&payload.room_id)
        .ok_or(RoomError::RoomNotFound)?;
    let mut live = handle.lock().await;
    // Abandoned rooms are on their way out of the registry.
    if live.room.is_abandoned() {
        return Err(RoomError::RoomNotFound.into());
    }

    let profile = PlayerProfile {
        user_id: payload.user_id,
        name: payload.player_name.trim().to_string(),
        avatar: payload.avatar,
    };
    let joined = live.room.join(connection, profile)?;
    let room_id = live.room.id().to_string();

    state.set_membership(
        connection,
        Some(Membership {
            room_id: room_id.clone(),
            player_id: joined.player,
        }),
    );
    info!(
        room_id = %room_id,
        player_id = %joined.player,
        reattached = joined.reattached,
        "player joined room"
    );
    state.send_to(
        connection,
        &ServerMessage::RoomJoined {
            room_id,
            player_id: joined.player,
            room: Box::new(RoomSnapshot::from(&live.room)),
        },
    );
    execute(state, &handle, &mut live, joined.effects);
    Ok(())
}

/// Toggle the readiness of the sender.
pub async fn set_ready(
    state: &SharedState,
    connection: ConnectionId,
    room_id: &str,
    ready: bool,
) -> Result<(), ServiceError> {
    apply(state, connection, room_id, |room, player| {
        room.set_ready(player, ready)
    })
    .await
}

/// Submit an argument on behalf of the sender.
pub async fn submit_argument(
    state: &SharedState,
    connection: ConnectionId,
    room_id: &str,
    text: String,
) -> Result<(), ServiceError> {
    apply(state, connection, room_id, |room, player| {
        room.submit_argument(player, text)
    })
    .await
}

/// Pick the tiebreak side.
pub async fn choose_side(
    state: &SharedState,
    connection: ConnectionId,
    payload: ChooseSidePayload,
) -> Result<(), ServiceError> {
    let role: Role = payload.role;
    apply(state, connection, &payload.room_id, |room, player| {
        room.choose_side(player, role)
    })
    .await
}

/// Re-issue the oracle request that failed last.
pub async fn retry_oracle(
    state: &SharedState,
    connection: ConnectionId,
    room_id: &str,
) -> Result<(), ServiceError> {
    apply(state, connection, room_id, |room, player| {
        room.retry_oracle(player)
    })
    .await
}

/// Leave a room explicitly. Treated like a dropped connection.
pub async fn leave_room(
    state: &SharedState,
    connection: ConnectionId,
    room_id: &str,
) -> Result<(), ServiceError> {
    apply(state, connection, room_id, |room, player| {
        room.disconnect(player)
    })
    .await?;
    state.set_membership(connection, None);
    Ok(())
}

/// Release whatever seat `connection` held. Called once its socket closed.
pub async fn disconnect(state: &SharedState, connection: ConnectionId) {
    let Some(membership) = state.membership(connection) else {
        return;
    };
    let Some(handle) = state.rooms().get(&membership.room_id) else {
        return;
    };
    let mut live = handle.lock().await;
    // The seat may already belong to a newer connection of the same account.
    let still_attached = live
        .room
        .player(membership.player_id)
        .is_some_and(|player| player.connection == connection && player.connected);
    if !still_attached {
        return;
    }
    match live.room.disconnect(membership.player_id) {
        Ok(effects) => {
            info!(
                room_id = %membership.room_id,
                player_id = %membership.player_id,
                phase = ?live.room.phase(),
                "player disconnected"
            );
            execute(state, &handle, &mut live, effects);
            if live.room.is_abandoned() {
                retire(state, &handle, &mut live);
            }
        }
        Err(err) => debug!(error = %err, "disconnect ignored"),
    }
}

/// Current snapshot of a room.
pub async fn room_snapshot(
    state: &SharedState,
    room_id: &str,
) -> Result<RoomSnapshot, ServiceError> {
    let handle = state
        .rooms()
        .get(room_id)
        .ok_or(RoomError::RoomNotFound)?;
    let live = handle.lock().await;
    Ok(RoomSnapshot::from(&live.room))
}

/// Answer `getRoomInfo` on the requesting socket.
pub async fn send_room_info(
    state: &SharedState,
    connection: ConnectionId,
    room_id: &str,
) -> Result<(), ServiceError> {
    let snapshot = room_snapshot(state, room_id).await?;
    state.send_to(
        connection,
        &ServerMessage::RoomInfo {
            room: Box::new(snapshot),
        },
    );
    Ok(())
}

/// Run `operation` as the sender's player and execute its effects.
async fn apply<F>(
    state: &SharedState,
    connection: ConnectionId,
    room_id: &str,
    operation: F,
) -> Result<(), ServiceError>
where
    F: FnOnce(&mut Room, PlayerId) -> Result<Vec<Effect>, RoomError>,
{
    let handle = state
        .rooms()
        .get(room_id)
        .ok_or(RoomError::RoomNotFound)?;
    let room_id = normalize_code(room_id);
    let membership = state
        .membership(connection)
        .filter(|membership| membership.room_id == room_id)
        .ok_or(RoomError::NotInRoom)?;

    let mut live = handle.lock().await;
    let effects = operation(&mut live.room, membership.player_id)?;
    execute(state, &handle, &mut live, effects);
    if live.room.is_abandoned() {
        retire(state, &handle, &mut live);
    }
    Ok(())
}

/// Reject a second seat, unless the current one is in a finished or vanished room.
async fn ensure_unseated(
    state: &SharedState,
    connection: ConnectionId,
) -> Result<(), ServiceError> {
    let Some(membership) = state.membership(connection) else {
        return Ok(());
    };
    let finished = match state.rooms().get(&membership.room_id) {
        Some(handle) => handle.lock().await.room.phase() == RoomPhase::GameOver,
        None => true,
    };
    if !finished {
        return Err(RoomError::AlreadyInRoom(membership.room_id).into());
    }
    disconnect(state, connection).await;
    state.set_membership(connection, None);
    Ok(())
}

fn language_or_default(language: Option<&str>) -> String {
    language
        .map(str::trim)
        .filter(|language| !language.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

/// Execute effects in order while the room lock is held.
fn execute(state: &SharedState, handle: &RoomHandle, live: &mut LiveRoom, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Broadcast => {
                let message = ServerMessage::GameStateUpdate {
                    room: Box::new(RoomSnapshot::from(&live.room)),
                };
                broadcast(state, &live.room, &message);
            }
            Effect::BroadcastTimer => {
                broadcast(state, &live.room, &ServerMessage::TimerUpdate(live.room.timer()));
            }
            Effect::StartTimer {
                generation,
                seconds,
            } => {
                let tick_state = state.clone();
                let tick_room = Arc::downgrade(handle);
                let expire_state = state.clone();
                let expire_room = Arc::downgrade(handle);
                live.timer.start(
                    seconds,
                    move |remaining| {
                        let state = tick_state.clone();
                        let room = tick_room.clone();
                        tokio::spawn(async move {
                            resume(&state, &room, |room| room.timer_ticked(generation, remaining))
                                .await;
                        });
                    },
                    move || {
                        tokio::spawn(async move {
                            resume(&expire_state, &expire_room, |room| {
                                room.timer_expired(generation)
                            })
                            .await;
                        });
                    },
                );
            }
            Effect::StopTimer => live.timer.stop(),
            Effect::ForceSubmit { connection } => {
                debug!(room_id = %live.room.id(), connection = %connection, "forcing submission");
                state.send_to(
                    connection,
                    &ServerMessage::ForceSubmitArgument {
                        room_id: live.room.id().to_string(),
                    },
                );
            }
            Effect::AdvanceAfter { delay } => {
                let state = state.clone();
                let room = Arc::downgrade(handle);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    resume(&state, &room, Room::begin_case_reading).await;
                });
            }
            Effect::RequestCase { pending, language } => {
                let state = state.clone();
                let room = Arc::downgrade(handle);
                let room_id = live.room.id().to_string();
                tokio::spawn(async move {
                    let result = state.oracle().generate_case(&language).await;
                    if let Err(err) = &result {
                        warn!(room_id = %room_id, error = %err, "case generation failed");
                    }
                    resume_result(&state, &room, |room| room.case_generated(pending, result)).await;
                });
            }
            Effect::RequestScores { pending, request } => {
                let state = state.clone();
                let room = Arc::downgrade(handle);
                let room_id = live.room.id().to_string();
                tokio::spawn(async move {
                    let result = state.oracle().score_round(&request).await;
                    if let Err(err) = &result {
                        warn!(
                            room_id = %room_id,
                            round = request.round,
                            error = %err,
                            "round scoring failed"
                        );
                    }
                    resume_result(&state, &room, |room| room.round_scored(pending, result)).await;
                });
            }
            Effect::GameFinished { outcomes } => {
                info!(room_id = %live.room.id(), "game over");
                let stats_state = state.clone();
                tokio::spawn(async move {
                    stats_service::settle(&stats_state, outcomes).await;
                });

                let state = state.clone();
                let room = Arc::downgrade(handle);
                let retention = state.config().game_over_retention;
                tokio::spawn(async move {
                    tokio::time::sleep(retention).await;
                    if let Some(handle) = room.upgrade() {
                        let mut live = handle.lock().await;
                        retire(&state, &handle, &mut live);
                    }
                });
            }
        }
    }
}

fn broadcast(state: &SharedState, room: &Room, message: &ServerMessage) {
    for connection in room.connections() {
        state.send_to(connection, message);
    }
}

/// Re-enter a room from a spawned task.
async fn resume<F>(state: &SharedState, room: &Weak<Mutex<LiveRoom>>, operation: F)
where
    F: FnOnce(&mut Room) -> Vec<Effect>,
{
    let Some(handle) = room.upgrade() else {
        return;
    };
    let mut live = handle.lock().await;
    let effects = operation(&mut live.room);
    execute(state, &handle, &mut live, effects);
}

/// Like [`resume`] for oracle continuations, which may find the room has moved on.
async fn resume_result<F>(state: &SharedState, room: &Weak<Mutex<LiveRoom>>, operation: F)
where
    F: FnOnce(&mut Room) -> Result<Vec<Effect>, RoomError>,
{
    let Some(handle) = room.upgrade() else {
        return;
    };
    let mut live = handle.lock().await;
    match operation(&mut live.room) {
        Ok(effects) => execute(state, &handle, &mut live, effects),
        Err(RoomError::StaleResult) => {
            debug!(room_id = %live.room.id(), "discarding stale oracle result");
        }
        Err(err) => warn!(room_id = %live.room.id(), error = %err, "oracle result rejected"),
    }
}

/// Stop the countdown and drop the room from the registry.
fn retire(state: &SharedState, handle: &RoomHandle, live: &mut LiveRoom) {
    live.timer.stop();
    if state.rooms().remove_handle(live.room.id(), handle) {
        info!(room_id = %live.room.id(), "room removed");
    }
}
