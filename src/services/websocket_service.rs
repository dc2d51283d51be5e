use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::room_service,
    state::{ClientConnection, SharedState, room::ConnectionId},
};

/// Failure to queue an outbound frame.
#[derive(Debug, Error)]
pub enum SendError {
    /// Writer channel closed - the socket is going away.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection: ConnectionId = Uuid::new_v4();
    state.connections().insert(
        connection,
        ClientConnection {
            tx: outbound_tx.clone(),
            membership: None,
        },
    );
    info!(connection = %connection, "player socket connected");

    let hello = ServerMessage::Connected {
        connection_id: connection,
    };
    if send_message_to_websocket(&outbound_tx, &hello).is_err() {
        state.connections().remove(&connection);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection = %connection, payload = %text, "received player message");

                let (room_id, result) = match ClientMessage::from_json_str(&text) {
                    Ok(message) => {
                        let room_id = message.room_id().map(str::to_owned);
                        (room_id, dispatch(&state, connection, message).await)
                    }
                    Err(err) => (None, Err(ServiceError::InvalidInput(err.to_string()))),
                };
                if let Err(err) = result {
                    debug!(
                        connection = %connection,
                        room_id = room_id.as_deref().unwrap_or("-"),
                        code = err.code(),
                        error = %err,
                        "rejected player message"
                    );
                    let reply = ServerMessage::error(err.code(), err.to_string());
                    if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %connection, "player socket closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::disconnect(&state, connection).await;
    state.connections().remove(&connection);
    info!(connection = %connection, "player socket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route a parsed client message to the room runtime.
async fn dispatch(
    state: &SharedState,
    connection: ConnectionId,
    message: ClientMessage,
) -> Result<(), ServiceError> {
    match message {
        ClientMessage::CreateRoom(payload) => {
            room_service::create_room(state, connection, payload).await
        }
        ClientMessage::JoinRoom(payload) => room_service::join_room(state, connection, payload).await,
        ClientMessage::SetReady(payload) => {
            room_service::set_ready(state, connection, &payload.room_id, payload.ready).await
        }
        ClientMessage::SubmitArgument(payload) => {
            room_service::submit_argument(state, connection, &payload.room_id, payload.text).await
        }
        ClientMessage::ChooseSide(payload) => {
            room_service::choose_side(state, connection, payload).await
        }
        ClientMessage::GetRoomInfo(payload) => {
            room_service::send_room_info(state, connection, &payload.room_id).await
        }
        ClientMessage::RetryOracle(payload) => {
            room_service::retry_oracle(state, connection, &payload.room_id).await
        }
        ClientMessage::LeaveRoom(payload) => {
            room_service::leave_room(state, connection, &payload.room_id).await
        }
        ClientMessage::Unknown => {
            warn!(connection = %connection, "ignoring message with unknown type");
            Ok(())
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are a bug, not a transport problem: they are logged and reported
/// as success so callers do not tear the connection down.
pub fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), SendError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SendError::ConnectionClosed)
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_frames_are_json_text() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_message_to_websocket(&tx, &ServerMessage::error("ROOM_FULL", "room is full"))
            .unwrap();

        let Some(Message::Text(text)) = rx.try_recv().ok() else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "ROOM_FULL");
    }

    #[test]
    fn closed_writer_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        drop(rx);
        assert!(matches!(
            send_message_to_websocket(&tx, &ServerMessage::error("X", "y")),
            Err(SendError::ConnectionClosed)
        ));
    }
}
