use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::extract::ws::Message;
use courtroom_back::{
    config::AppConfig,
    dao::stats_store::memory::MemoryStatsStore,
    dto::{
        phase::VisibleRoomPhase,
        room::RoomSnapshot,
        ws::{ChooseSidePayload, CreateRoomPayload, JoinRoomPayload},
    },
    error::ServiceError,
    oracle::{OracleError, Prompt, ScoringOracle, TextGenerator},
    services::room_service,
    state::{
        AppState, ClientConnection, SharedState,
        player::Role,
        room::{ConnectionId, RoomError},
    },
};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

const CASE_JSON: &str = r#"```json
{"title": "The Missing Cake", "description": "A cake vanished from the office fridge.",
 "sideALabel": "The Office", "sideBLabel": "Gary"}
```"#;

/// Prosecutor wins every round by a wide margin.
const SCORES_JSON: &str =
    r#"{"scores": [9, 1, 9, 1, 9, 1], "analysis": "The prosecution was far more convincing."}"#;

/// Scripted judge. The first `failing_cases` case requests fail.
struct ScriptedGenerator {
    failing_cases: usize,
    case_calls: AtomicUsize,
    score_calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(failing_cases: usize) -> Arc<Self> {
        Arc::new(Self {
            failing_cases,
            case_calls: AtomicUsize::new(0),
            score_calls: AtomicUsize::new(0),
        })
    }
}

impl TextGenerator for ScriptedGenerator {
    fn complete(&self, prompt: Prompt) -> BoxFuture<'static, Result<String, OracleError>> {
        let answer = if prompt.system.contains("judge") {
            self.score_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SCORES_JSON.to_string())
        } else if self.case_calls.fetch_add(1, Ordering::SeqCst) < self.failing_cases {
            Ok("I would rather not write a case today.".to_string())
        } else {
            Ok(CASE_JSON.to_string())
        };
        Box::pin(async move { answer })
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        case_reading: Duration::from_secs(30),
        round_reading: Duration::from_secs(20),
        turn: Duration::from_secs(15),
        ready_delay: Duration::from_millis(50),
        game_over_retention: Duration::from_secs(60),
        ..AppConfig::default()
    }
}

async fn app(generator: Arc<ScriptedGenerator>) -> SharedState {
    let state = AppState::new(test_config(), ScoringOracle::new(generator));
    state
        .install_stats_store(Arc::new(MemoryStatsStore::new()))
        .await;
    state
}

/// Register a fake socket and return its id with the outbound frame receiver.
fn connect(state: &SharedState) -> (ConnectionId, UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = Uuid::new_v4();
    state.connections().insert(
        connection,
        ClientConnection {
            tx,
            membership: None,
        },
    );
    (connection, rx)
}

fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    frames
}

fn frames_of<'a>(frames: &'a [Value], kind: &str) -> Vec<&'a Value> {
    frames.iter().filter(|frame| frame["type"] == kind).collect()
}

fn create_payload(name: &str, user_id: Option<&str>) -> CreateRoomPayload {
    CreateRoomPayload {
        player_name: name.into(),
        avatar: None,
        language: Some("en".into()),
        user_id: user_id.map(Into::into),
    }
}

fn join_payload(room_id: &str, name: &str, user_id: Option<&str>) -> JoinRoomPayload {
    JoinRoomPayload {
        room_id: room_id.into(),
        player_name: name.into(),
        avatar: None,
        language: None,
        user_id: user_id.map(Into::into),
    }
}

async fn snapshot(state: &SharedState, room_id: &str) -> RoomSnapshot {
    room_service::room_snapshot(state, room_id).await.unwrap()
}

async fn wait_for_phase(state: &SharedState, room_id: &str, phase: VisibleRoomPhase) -> RoomSnapshot {
    for _ in 0..1_000 {
        let current = snapshot(state, room_id).await;
        if current.phase == phase {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room {room_id} never reached {phase:?}");
}

/// Open a room with two players and return its code plus both sockets.
async fn seated_room(
    state: &SharedState,
) -> (
    String,
    (ConnectionId, UnboundedReceiver<Message>),
    (ConnectionId, UnboundedReceiver<Message>),
) {
    let (ada, mut ada_rx) = connect(state);
    let (bob, bob_rx) = connect(state);

    room_service::create_room(state, ada, create_payload("Ada", Some("ada")))
        .await
        .unwrap();
    let frames = drain(&mut ada_rx);
    let created = frames_of(&frames, "roomCreated");
    let room_id = created[0]["roomId"].as_str().unwrap().to_string();

    room_service::join_room(state, bob, join_payload(&room_id.to_lowercase(), "Bob", Some("bob")))
        .await
        .unwrap();

    (room_id, (ada, ada_rx), (bob, bob_rx))
}

fn holder_of(state: &SharedState, snapshot: &RoomSnapshot, sockets: &[ConnectionId]) -> ConnectionId {
    let turn = snapshot.turn.expect("a turn-holder during an active round");
    sockets
        .iter()
        .copied()
        .find(|socket| state.membership(*socket).map(|m| m.player_id) == Some(turn))
        .expect("turn-holder is one of the sockets")
}

/// Submit the six arguments of the current round in turn order.
async fn argue_round(state: &SharedState, room_id: &str, sockets: &[ConnectionId]) {
    for index in 0..6 {
        let current = snapshot(state, room_id).await;
        let holder = holder_of(state, &current, sockets);
        room_service::submit_argument(state, holder, room_id, format!("argument {index}"))
            .await
            .unwrap();
    }
}

async fn both_ready(state: &SharedState, room_id: &str, sockets: &[ConnectionId]) {
    for socket in sockets {
        room_service::set_ready(state, *socket, room_id, true)
            .await
            .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn full_match_through_tiebreak_updates_statistics() {
    let generator = ScriptedGenerator::new(0);
    let state = app(generator.clone()).await;
    let (room_id, (ada, mut ada_rx), (bob, mut bob_rx)) = seated_room(&state).await;
    let sockets = [ada, bob];

    let bob_frames = drain(&mut bob_rx);
    assert_eq!(frames_of(&bob_frames, "roomJoined").len(), 1);

    let ready = wait_for_phase(&state, &room_id, VisibleRoomPhase::CaseReading).await;
    assert_eq!(ready.case.as_ref().unwrap().title, "The Missing Cake");
    assert!(ready.timer.running);
    let roles: Vec<Option<Role>> = ready.players.iter().map(|player| player.role).collect();
    assert!(roles.contains(&Some(Role::Prosecutor)) && roles.contains(&Some(Role::Defender)));

    // Let the reading countdown tick once before anyone is ready.
    drain(&mut ada_rx);
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let reading_frames = drain(&mut ada_rx);
    let ticks = frames_of(&reading_frames, "timerUpdate");
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0]["duration"], 30);
    assert_eq!(ticks[0]["remaining"], 29);
    assert_eq!(ticks[0]["running"], true);
    assert_eq!(snapshot(&state, &room_id).await.timer.remaining, 29);

    both_ready(&state, &room_id, &sockets).await;
    let first = wait_for_phase(&state, &room_id, VisibleRoomPhase::RoundActive).await;
    assert_eq!(first.round, 1);
    let first_prosecutor = holder_of(&state, &first, &sockets);

    argue_round(&state, &room_id, &sockets).await;
    let verdict = wait_for_phase(&state, &room_id, VisibleRoomPhase::RoundReading).await;
    assert_eq!(verdict.history.len(), 1);
    assert_eq!(verdict.history[0].winning_role, Role::Prosecutor);
    assert_eq!(verdict.round, 2);

    both_ready(&state, &room_id, &sockets).await;
    let second = wait_for_phase(&state, &room_id, VisibleRoomPhase::RoundActive).await;
    assert_ne!(holder_of(&state, &second, &sockets), first_prosecutor);

    argue_round(&state, &room_id, &sockets).await;
    let choice = wait_for_phase(&state, &room_id, VisibleRoomPhase::TiebreakerChoice).await;
    let chooser = choice.tiebreak_chooser.expect("a tiebreak chooser");
    let chooser_socket = sockets
        .iter()
        .copied()
        .find(|socket| state.membership(*socket).map(|m| m.player_id) == Some(chooser))
        .unwrap();
    let other_socket = sockets.into_iter().find(|s| *s != chooser_socket).unwrap();

    let refused = room_service::choose_side(
        &state,
        other_socket,
        ChooseSidePayload {
            room_id: room_id.clone(),
            role: Role::Defender,
        },
    )
    .await;
    assert!(matches!(refused, Err(ServiceError::Room(RoomError::NotChooser))));

    room_service::choose_side(
        &state,
        chooser_socket,
        ChooseSidePayload {
            room_id: room_id.clone(),
            role: Role::Prosecutor,
        },
    )
    .await
    .unwrap();
    let tiebreak = wait_for_phase(&state, &room_id, VisibleRoomPhase::RoundActive).await;
    assert!(tiebreak.tiebreak);
    assert_eq!(holder_of(&state, &tiebreak, &sockets), chooser_socket);

    argue_round(&state, &room_id, &sockets).await;
    let finished = wait_for_phase(&state, &room_id, VisibleRoomPhase::GameOver).await;
    assert_eq!(finished.winner, Some(chooser));
    assert!(!finished.timer.running);
    assert_eq!(generator.score_calls.load(Ordering::SeqCst), 3);

    let winner_id = if state.membership(chooser_socket).map(|m| m.player_id)
        == state.membership(ada).map(|m| m.player_id)
    {
        "ada"
    } else {
        "bob"
    };
    let store = state.stats_store().await.unwrap();
    let mut stats = None;
    for _ in 0..100 {
        stats = store.find_stats(winner_id.to_string()).await.unwrap();
        if stats.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stats = stats.expect("winner statistics persisted");
    assert_eq!(stats.games_played, 1);
    assert_eq!(stats.games_won, 1);
    assert_eq!(stats.rounds_played, 3);
    assert_eq!(stats.total_arguments, 9);

    let ada_frames = drain(&mut ada_rx);
    assert!(!frames_of(&ada_frames, "gameStateUpdate").is_empty());

    // The finished room is dropped after the retention period.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(state.rooms().get(&room_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn out_of_turn_submission_is_rejected_without_mutation() {
    let state = app(ScriptedGenerator::new(0)).await;
    let (room_id, (ada, _ada_rx), (bob, _bob_rx)) = seated_room(&state).await;
    let sockets = [ada, bob];

    wait_for_phase(&state, &room_id, VisibleRoomPhase::CaseReading).await;
    both_ready(&state, &room_id, &sockets).await;
    let active = wait_for_phase(&state, &room_id, VisibleRoomPhase::RoundActive).await;
    let holder = holder_of(&state, &active, &sockets);
    let waiting = sockets.into_iter().find(|s| *s != holder).unwrap();

    let result =
        room_service::submit_argument(&state, waiting, &room_id, "objection!".into()).await;
    assert!(matches!(result, Err(ServiceError::Room(RoomError::NotYourTurn))));

    let after = snapshot(&state, &room_id).await;
    assert_eq!(after.version, active.version);
    assert!(after.arguments.is_empty());
}

#[tokio::test(start_paused = true)]
async fn turn_expiry_asks_the_holder_to_submit() {
    let state = app(ScriptedGenerator::new(0)).await;
    let (room_id, (ada, mut ada_rx), (bob, mut bob_rx)) = seated_room(&state).await;
    let sockets = [ada, bob];

    wait_for_phase(&state, &room_id, VisibleRoomPhase::CaseReading).await;
    both_ready(&state, &room_id, &sockets).await;
    let active = wait_for_phase(&state, &room_id, VisibleRoomPhase::RoundActive).await;
    let holder = holder_of(&state, &active, &sockets);
    drain(&mut ada_rx);
    drain(&mut bob_rx);

    tokio::time::sleep(Duration::from_secs(16)).await;

    let (holder_frames, other_frames) = if holder == ada {
        (drain(&mut ada_rx), drain(&mut bob_rx))
    } else {
        (drain(&mut bob_rx), drain(&mut ada_rx))
    };
    let forced = frames_of(&holder_frames, "forceSubmitArgument");
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0]["roomId"], room_id.as_str());
    assert!(frames_of(&other_frames, "forceSubmitArgument").is_empty());
    let last_tick = frames_of(&other_frames, "timerUpdate").pop().unwrap();
    assert_eq!(last_tick["remaining"], 0);

    // The forced submission is an ordinary (possibly blank) argument.
    room_service::submit_argument(&state, holder, &room_id, String::new())
        .await
        .unwrap();
    let after = snapshot(&state, &room_id).await;
    assert_eq!(after.arguments.len(), 1);
    assert_ne!(after.turn, active.turn);
}

#[tokio::test(start_paused = true)]
async fn failed_case_generation_waits_for_retry() {
    let generator = ScriptedGenerator::new(1);
    let state = app(generator.clone()).await;
    let (room_id, (ada, _ada_rx), _bob) = seated_room(&state).await;

    let mut stuck = snapshot(&state, &room_id).await;
    for _ in 0..100 {
        if stuck.oracle_failure.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        stuck = snapshot(&state, &room_id).await;
    }
    assert_eq!(stuck.phase, VisibleRoomPhase::Starting);
    let failure = serde_json::to_value(stuck.oracle_failure.as_ref().unwrap()).unwrap();
    assert_eq!(failure["stage"], "case-generation");
    assert!(!stuck.oracle_pending);

    // Nothing advances on its own.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(snapshot(&state, &room_id).await.phase, VisibleRoomPhase::Starting);

    room_service::retry_oracle(&state, ada, &room_id).await.unwrap();
    let ready = wait_for_phase(&state, &room_id, VisibleRoomPhase::CaseReading).await;
    assert!(ready.oracle_failure.is_none());
    assert_eq!(generator.case_calls.load(Ordering::SeqCst), 2);

    let again = room_service::retry_oracle(&state, ada, &room_id).await;
    assert!(matches!(again, Err(ServiceError::Room(RoomError::NothingToRetry))));
}

#[tokio::test]
async fn join_errors_and_lobby_departures() {
    let state = app(ScriptedGenerator::new(0)).await;

    let (stray, _stray_rx) = connect(&state);
    let missing = room_service::join_room(&state, stray, join_payload("ZZZZZZ", "Eve", None)).await;
    assert!(matches!(missing, Err(ServiceError::Room(RoomError::RoomNotFound))));

    let (ada, _ada_rx) = connect(&state);
    room_service::create_room(&state, ada, create_payload("Ada", None))
        .await
        .unwrap();
    let room_id = state.membership(ada).unwrap().room_id;

    let twice = room_service::create_room(&state, ada, create_payload("Ada", None)).await;
    assert!(matches!(twice, Err(ServiceError::Room(RoomError::AlreadyInRoom(_)))));

    let (copycat, _copycat_rx) = connect(&state);
    let taken = room_service::join_room(&state, copycat, join_payload(&room_id, " ADA ", None)).await;
    assert!(matches!(taken, Err(ServiceError::Room(RoomError::UsernameTaken(_)))));

    // The creator walking away from the lobby removes the room.
    room_service::disconnect(&state, ada).await;
    assert!(state.rooms().get(&room_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn third_player_cannot_join_and_disconnected_player_reattaches() {
    let state = app(ScriptedGenerator::new(0)).await;
    let (room_id, (ada, _ada_rx), (_bob, _bob_rx)) = seated_room(&state).await;
    wait_for_phase(&state, &room_id, VisibleRoomPhase::CaseReading).await;

    let (eve, _eve_rx) = connect(&state);
    let late = room_service::join_room(&state, eve, join_payload(&room_id, "Eve", None)).await;
    assert!(matches!(late, Err(ServiceError::Room(RoomError::GameInProgress))));

    let seat = state.membership(ada).unwrap().player_id;
    room_service::disconnect(&state, ada).await;
    let paused = snapshot(&state, &room_id).await;
    let ada_view = paused.players.iter().find(|p| p.id == seat).unwrap();
    assert!(!ada_view.connected);
    assert!(state.rooms().get(&room_id).is_some());

    let (ada_again, mut ada_again_rx) = connect(&state);
    room_service::join_room(&state, ada_again, join_payload(&room_id, "Ada", Some("ada")))
        .await
        .unwrap();
    assert_eq!(state.membership(ada_again).unwrap().player_id, seat);
    let frames = drain(&mut ada_again_rx);
    let joined = frames_of(&frames, "roomJoined");
    assert_eq!(joined[0]["playerId"], seat.to_string());
    assert_eq!(joined[0]["room"]["phase"], "case-reading");
}
