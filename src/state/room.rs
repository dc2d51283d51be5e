//! Authoritative per-room game state machine.
//!
//! A [`Room`] never performs I/O. Each operation validates the request against the current
//! phase, mutates state, and returns the [`Effect`]s the runtime must carry out (broadcasts,
//! timer control, oracle calls) in order.

use std::time::Duration;

use indexmap::IndexMap;
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    oracle::{ARGUMENTS_PER_ROUND, ArgumentInput, CaseFile, OracleError, RoundScores, ScoreRequest},
    state::{
        player::{Player, PlayerId, PlayerProfile, Role, Seat},
        stats::{PlayerOutcome, RoundOutcome},
        timer::TimerState,
    },
};

/// Short code identifying a live room.
pub type RoomId = String;
/// Identifier of an outstanding oracle request.
pub type PendingId = Uuid;
/// Identifier of the socket connection a player is reachable on.
pub type ConnectionId = Uuid;

/// Rounds a player must win to take the match.
pub const POINTS_TO_WIN: u8 = 2;
/// Round number of the tiebreaker.
pub const TIEBREAK_ROUND: u8 = 3;

/// Regular round or tiebreaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    /// Rounds 1 and 2.
    Regular,
    /// Round 3, played at one point each.
    Tiebreak,
}

/// Position of the room in the match protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Waiting for a second player.
    Waiting,
    /// Case generation in flight.
    Starting,
    /// Case ready and roles drawn; case reading starts shortly.
    Ready,
    /// Players read the case.
    CaseReading,
    /// Arguments are being exchanged.
    RoundActive(RoundKind),
    /// Six arguments are in; the judge is scoring.
    RoundOver,
    /// Players read the verdict of the previous round.
    RoundReading,
    /// One point each: the better-scoring player picks a side.
    TiebreakerChoice,
    /// Match decided.
    GameOver,
}

/// Which oracle call a suspended room is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// `Starting` waits for the case.
    AwaitingCase,
    /// `RoundOver` waits for the grades.
    AwaitingRoundScore,
}

/// Outstanding oracle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    /// Ticket the result must present.
    pub id: PendingId,
    /// What is being awaited.
    pub kind: PendingKind,
}

/// Oracle stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleStage {
    /// Writing the case.
    CaseGeneration,
    /// Grading a round.
    RoundScoring,
}

/// Failure surfaced to both clients until a retry succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleFailure {
    /// Failed stage.
    pub stage: OracleStage,
    /// Human readable reason.
    pub message: String,
}

/// One submitted argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// Author.
    pub speaker: PlayerId,
    /// Text as submitted (possibly empty on a forced submission).
    pub text: String,
    /// Round it was made in.
    pub round: u8,
    /// Exchange within the round (1..=3).
    pub exchange: u8,
    /// Role of the author when speaking.
    pub role: Role,
    /// Grade, zero until the round is scored.
    pub score: f64,
}

/// Summary of a resolved round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    /// Round number.
    pub round: u8,
    /// Player who prosecuted.
    pub prosecutor: PlayerId,
    /// Player who defended.
    pub defender: PlayerId,
    /// Role that took the point.
    pub winning_role: Role,
    /// Sum of the prosecutor's three grades.
    pub prosecution_score: f64,
    /// Sum of the defender's three grades.
    pub defense_score: f64,
    /// Judge's explanation.
    pub analysis: String,
}

impl RoundSummary {
    /// Player that won the round.
    pub fn winner(&self) -> PlayerId {
        match self.winning_role {
            Role::Prosecutor => self.prosecutor,
            Role::Defender => self.defender,
        }
    }

    /// Role `player` held in this round, if they took part.
    pub fn role_of(&self, player: PlayerId) -> Option<Role> {
        if player == self.prosecutor {
            Some(Role::Prosecutor)
        } else if player == self.defender {
            Some(Role::Defender)
        } else {
            None
        }
    }
}

/// Timings and rules applied to every room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    /// Case reading countdown.
    pub case_reading_secs: u32,
    /// Verdict reading countdown between rounds.
    pub round_reading_secs: u32,
    /// Countdown for each argument.
    pub turn_secs: u32,
    /// Pause between `Ready` and `CaseReading`.
    pub ready_delay: Duration,
    /// Longest accepted argument, in characters.
    pub max_argument_chars: usize,
    /// Require both players to be ready in the lobby before starting.
    pub lobby_ready_gate: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            case_reading_secs: 120,
            round_reading_secs: 60,
            turn_secs: 90,
            ready_delay: Duration::from_secs(1),
            max_argument_chars: 2_000,
            lobby_ready_gate: false,
        }
    }
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Push the full room snapshot to every connected player.
    Broadcast,
    /// Push the timer values to every connected player.
    BroadcastTimer,
    /// Arm the room countdown, replacing any running one.
    StartTimer {
        /// Generation ticks and expiry must quote back.
        generation: u64,
        /// Countdown length.
        seconds: u32,
    },
    /// Cancel the room countdown.
    StopTimer,
    /// Ask the turn-holder's client to submit whatever is typed.
    ForceSubmit {
        /// Connection of the turn-holder.
        connection: ConnectionId,
    },
    /// Call [`Room::begin_case_reading`] after `delay`.
    AdvanceAfter {
        /// Delay before advancing.
        delay: Duration,
    },
    /// Generate the case, then call [`Room::case_generated`].
    RequestCase {
        /// Ticket for the result.
        pending: PendingId,
        /// Language hint.
        language: String,
    },
    /// Grade the round, then call [`Room::round_scored`].
    RequestScores {
        /// Ticket for the result.
        pending: PendingId,
        /// Round content.
        request: ScoreRequest,
    },
    /// Match over: fold outcomes into persisted statistics (emitted once per room).
    GameFinished {
        /// One entry per seated player.
        outcomes: Vec<PlayerOutcome>,
    },
}

/// Client protocol errors. They leave the room untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// No room with this code.
    #[error("room not found")]
    RoomNotFound,
    /// Both seats are taken.
    #[error("room is full")]
    RoomFull,
    /// The match already started.
    #[error("game already in progress")]
    GameInProgress,
    /// Another player in the room uses this name.
    #[error("username `{0}` is already taken in this room")]
    UsernameTaken(String),
    /// The sender does not hold the turn.
    #[error("it is not your turn")]
    NotYourTurn,
    /// The action is not legal in the current phase.
    #[error("`{action}` is not allowed while the room is {phase:?}")]
    InvalidPhase {
        /// Current phase.
        phase: RoomPhase,
        /// Attempted action.
        action: &'static str,
    },
    /// Only the designated tiebreak chooser may pick a side.
    #[error("only the tiebreak chooser may pick a side")]
    NotChooser,
    /// Sender is not seated in this room.
    #[error("you are not in this room")]
    NotInRoom,
    /// The connection already sits in another room.
    #[error("you are already in room `{0}`")]
    AlreadyInRoom(RoomId),
    /// Argument exceeds the configured length.
    #[error("argument exceeds {max} characters")]
    ArgumentTooLong {
        /// Configured limit.
        max: usize,
    },
    /// No oracle failure is recorded.
    #[error("nothing to retry")]
    NothingToRetry,
    /// An oracle result arrived for a request the room no longer waits on.
    #[error("oracle result no longer expected")]
    StaleResult,
}

impl RoomError {
    /// Stable code sent to clients in `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::RoomNotFound => "ROOM_NOT_FOUND",
            RoomError::RoomFull => "ROOM_FULL",
            RoomError::GameInProgress => "GAME_IN_PROGRESS",
            RoomError::UsernameTaken(_) => "USERNAME_TAKEN",
            RoomError::NotYourTurn => "NOT_YOUR_TURN",
            RoomError::InvalidPhase { .. } => "INVALID_PHASE",
            RoomError::NotChooser => "NOT_CHOOSER",
            RoomError::NotInRoom => "NOT_IN_ROOM",
            RoomError::AlreadyInRoom(_) => "ALREADY_IN_ROOM",
            RoomError::ArgumentTooLong { .. } => "INVALID_INPUT",
            RoomError::NothingToRetry => "NOTHING_TO_RETRY",
            RoomError::StaleResult => "STALE_RESULT",
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    /// Seat owner id.
    pub player: PlayerId,
    /// True when an existing disconnected seat was re-attached.
    pub reattached: bool,
    /// Effects to run.
    pub effects: Vec<Effect>,
}

/// One match between two players.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    language: String,
    settings: RoomSettings,
    phase: RoomPhase,
    players: IndexMap<PlayerId, Player>,
    case: Option<CaseFile>,
    turn: Option<PlayerId>,
    round: u8,
    exchange: u8,
    arguments_in_round: usize,
    arguments: Vec<Argument>,
    history: Vec<RoundSummary>,
    timer: TimerState,
    timer_generation: u64,
    tiebreak_chooser: Option<PlayerId>,
    pending: Option<Pending>,
    oracle_failure: Option<OracleFailure>,
    stats_settled: bool,
    version: u64,
    rng: StdRng,
}

impl Room {
    /// Create an empty room in the waiting phase.
    pub fn new(id: RoomId, language: String, settings: RoomSettings) -> Self {
        Self::with_rng(id, language, settings, StdRng::from_os_rng())
    }

    /// Create an empty room with a deterministic random source.
    pub fn with_seed(id: RoomId, language: String, settings: RoomSettings, seed: u64) -> Self {
        Self::with_rng(id, language, settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: RoomId, language: String, settings: RoomSettings, rng: StdRng) -> Self {
        Self {
            id,
            language,
            settings,
            phase: RoomPhase::Waiting,
            players: IndexMap::new(),
            case: None,
            turn: None,
            round: 1,
            exchange: 1,
            arguments_in_round: 0,
            arguments: Vec::new(),
            history: Vec::new(),
            timer: TimerState::default(),
            timer_generation: 0,
            tiebreak_chooser: None,
            pending: None,
            oracle_failure: None,
            stats_settled: false,
            version: 0,
            rng,
        }
    }

    /// Room code.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Language hint given by the creator.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Seated players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Look a player up by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Player sitting on `seat`.
    pub fn player_by_seat(&self, seat: Seat) -> Option<&Player> {
        self.players.values().find(|player| player.seat == seat)
    }

    /// Player holding `role` this round.
    pub fn player_with_role(&self, role: Role) -> Option<&Player> {
        self.players
            .values()
            .find(|player| player.role == Some(role))
    }

    /// Connections of every connected player.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.players
            .values()
            .filter(|player| player.connected)
            .map(|player| player.connection)
            .collect()
    }

    /// Generated case, once available.
    pub fn case(&self) -> Option<&CaseFile> {
        self.case.as_ref()
    }

    /// Player allowed to submit next.
    pub fn turn(&self) -> Option<PlayerId> {
        self.turn
    }

    /// Round counter (1-based). Bumped as soon as a round resolves, so during a verdict it
    /// already names the round to come, and after game over it is one past the last round.
    pub fn round(&self) -> u8 {
        self.round
    }

    /// Current exchange within the round (1..=3).
    pub fn exchange(&self) -> u8 {
        self.exchange
    }

    /// Every argument of the match, in submission order.
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Arguments authored by `player`, in submission order.
    pub fn arguments_of(&self, player: PlayerId) -> impl Iterator<Item = &Argument> {
        self.arguments
            .iter()
            .filter(move |argument| argument.speaker == player)
    }

    /// Resolved rounds.
    pub fn history(&self) -> &[RoundSummary] {
        &self.history
    }

    /// Countdown values.
    pub fn timer(&self) -> TimerState {
        self.timer
    }

    /// Generation of the countdown currently armed.
    pub fn timer_generation(&self) -> u64 {
        self.timer_generation
    }

    /// Player who picks a side for the tiebreaker.
    pub fn tiebreak_chooser(&self) -> Option<PlayerId> {
        self.tiebreak_chooser
    }

    /// Oracle request in flight.
    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    /// Recorded oracle failure.
    pub fn oracle_failure(&self) -> Option<&OracleFailure> {
        self.oracle_failure.as_ref()
    }

    /// Whether statistics were already handed out for settlement.
    pub fn stats_settled(&self) -> bool {
        self.stats_settled
    }

    /// Mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True once no seated player is connected.
    pub fn is_abandoned(&self) -> bool {
        self.players.values().all(|player| !player.connected)
    }

    /// Seat a player, or re-attach a disconnected player presenting the same account id.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        profile: PlayerProfile,
    ) -> Result<Joined, RoomError> {
        if let Some(player) = self.reattachable(&profile) {
            let id = player.id;
            if let Some(player) = self.players.get_mut(&id) {
                player.connection = connection;
                player.connected = true;
            }
            self.touch();
            return Ok(Joined {
                player: id,
                reattached: true,
                effects: vec![Effect::Broadcast],
            });
        }

        if self.phase != RoomPhase::Waiting {
            return Err(RoomError::GameInProgress);
        }
        if self.players.len() >= 2 {
            return Err(RoomError::RoomFull);
        }
        if self.players.values().any(|player| player.has_name(&profile.name)) {
            return Err(RoomError::UsernameTaken(profile.name));
        }

        let seat = if self.player_by_seat(Seat::Left).is_none() {
            Seat::Left
        } else {
            Seat::Right
        };
        let id = Uuid::new_v4();
        self.players
            .insert(id, Player::new(id, connection, profile, seat));
        self.touch();

        let mut effects = vec![Effect::Broadcast];
        if self.players.len() == 2 && !self.settings.lobby_ready_gate {
            effects.extend(self.start_game());
        }
        Ok(Joined {
            player: id,
            reattached: false,
            effects,
        })
    }

    fn reattachable(&self, profile: &PlayerProfile) -> Option<&Player> {
        let user_id = profile.user_id.as_deref()?;
        self.players.values().find(|player| {
            !player.connected && player.profile.user_id.as_deref() == Some(user_id)
        })
    }

    /// Toggle readiness. Both players ready advances gated phases.
    pub fn set_ready(&mut self, player: PlayerId, ready: bool) -> Result<Vec<Effect>, RoomError> {
        if !self.players.contains_key(&player) {
            return Err(RoomError::NotInRoom);
        }
        if !matches!(
            self.phase,
            RoomPhase::Waiting | RoomPhase::CaseReading | RoomPhase::RoundReading
        ) {
            return Err(RoomError::InvalidPhase {
                phase: self.phase,
                action: "setReady",
            });
        }

        if let Some(entry) = self.players.get_mut(&player) {
            entry.ready = ready;
        }
        self.touch();

        if !self.both_ready() {
            return Ok(vec![Effect::Broadcast]);
        }
        let effects = match self.phase {
            RoomPhase::Waiting if self.settings.lobby_ready_gate => self.start_game(),
            RoomPhase::CaseReading | RoomPhase::RoundReading => self.start_round(),
            _ => vec![Effect::Broadcast],
        };
        Ok(effects)
    }

    /// Accept an argument from the turn-holder.
    pub fn submit_argument(
        &mut self,
        player: PlayerId,
        text: String,
    ) -> Result<Vec<Effect>, RoomError> {
        let speaker = self.players.get(&player).ok_or(RoomError::NotInRoom)?;
        if !matches!(self.phase, RoomPhase::RoundActive(_)) {
            return Err(RoomError::InvalidPhase {
                phase: self.phase,
                action: "submitArgument",
            });
        }
        if self.turn != Some(player) {
            return Err(RoomError::NotYourTurn);
        }
        let max = self.settings.max_argument_chars;
        if text.chars().count() > max {
            return Err(RoomError::ArgumentTooLong { max });
        }
        let role = speaker.role.ok_or(RoomError::InvalidPhase {
            phase: self.phase,
            action: "submitArgument",
        })?;

        self.arguments.push(Argument {
            speaker: player,
            text,
            round: self.round,
            exchange: self.exchange,
            role,
            score: 0.0,
        });
        self.arguments_in_round += 1;
        self.turn = self.opponent_of(player);
        self.touch();

        if self.arguments_in_round >= ARGUMENTS_PER_ROUND {
            return self.close_round();
        }
        if self.arguments_in_round % 2 == 0 {
            self.exchange += 1;
        }
        let seconds = self.settings.turn_secs;
        Ok(vec![self.arm_timer(seconds), Effect::Broadcast])
    }

    /// Tiebreak chooser picks a role; the opponent takes the other one.
    pub fn choose_side(&mut self, player: PlayerId, role: Role) -> Result<Vec<Effect>, RoomError> {
        if !self.players.contains_key(&player) {
            return Err(RoomError::NotInRoom);
        }
        if self.phase != RoomPhase::TiebreakerChoice {
            return Err(RoomError::InvalidPhase {
                phase: self.phase,
                action: "chooseSide",
            });
        }
        if self.tiebreak_chooser != Some(player) {
            return Err(RoomError::NotChooser);
        }

        for entry in self.players.values_mut() {
            entry.role = Some(if entry.id == player {
                role
            } else {
                role.opposite()
            });
        }
        self.tiebreak_chooser = None;
        self.touch();
        Ok(self.start_round())
    }

    /// Re-issue the oracle request that failed.
    pub fn retry_oracle(&mut self, player: PlayerId) -> Result<Vec<Effect>, RoomError> {
        if !self.players.contains_key(&player) {
            return Err(RoomError::NotInRoom);
        }
        let stage = self
            .oracle_failure
            .as_ref()
            .map(|failure| failure.stage)
            .ok_or(RoomError::NothingToRetry)?;

        match (stage, self.phase) {
            (OracleStage::CaseGeneration, RoomPhase::Starting) => {
                self.oracle_failure = None;
                let pending = self.suspend(PendingKind::AwaitingCase);
                self.touch();
                Ok(vec![
                    Effect::Broadcast,
                    Effect::RequestCase {
                        pending,
                        language: self.language.clone(),
                    },
                ])
            }
            (OracleStage::RoundScoring, RoomPhase::RoundOver) => {
                let request = self.score_request()?;
                self.oracle_failure = None;
                let pending = self.suspend(PendingKind::AwaitingRoundScore);
                self.touch();
                Ok(vec![
                    Effect::Broadcast,
                    Effect::RequestScores { pending, request },
                ])
            }
            _ => Err(RoomError::NothingToRetry),
        }
    }

    /// Handle a socket going away.
    ///
    /// Before the match starts the seat is freed; afterwards the player is kept and marked
    /// disconnected so the match can resume if they come back.
    pub fn disconnect(&mut self, player: PlayerId) -> Result<Vec<Effect>, RoomError> {
        if !self.players.contains_key(&player) {
            return Err(RoomError::NotInRoom);
        }
        if self.phase == RoomPhase::Waiting {
            self.players.shift_remove(&player);
            for entry in self.players.values_mut() {
                entry.ready = false;
            }
        } else if let Some(entry) = self.players.get_mut(&player) {
            entry.connected = false;
        }
        self.touch();
        Ok(vec![Effect::Broadcast])
    }

    /// A countdown second elapsed.
    pub fn timer_ticked(&mut self, generation: u64, remaining: u32) -> Vec<Effect> {
        if generation != self.timer_generation || !self.timer.running {
            return Vec::new();
        }
        self.timer.remaining = remaining;
        vec![Effect::BroadcastTimer]
    }

    /// A countdown reached zero. Stale generations and phases that moved on are ignored.
    pub fn timer_expired(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.timer_generation || !self.timer.running {
            return Vec::new();
        }
        self.timer = TimerState {
            remaining: 0,
            ..self.timer.stopped()
        };
        self.touch();

        match self.phase {
            RoomPhase::CaseReading | RoomPhase::RoundReading => self.start_round(),
            RoomPhase::RoundActive(_) => {
                let mut effects = vec![Effect::BroadcastTimer];
                if let Some(holder) = self.turn.and_then(|id| self.players.get(&id))
                    && holder.connected
                {
                    effects.push(Effect::ForceSubmit {
                        connection: holder.connection,
                    });
                }
                effects
            }
            _ => vec![Effect::BroadcastTimer],
        }
    }

    /// Leave `Ready` for `CaseReading`. No-op if the room is elsewhere.
    pub fn begin_case_reading(&mut self) -> Vec<Effect> {
        if self.phase != RoomPhase::Ready {
            return Vec::new();
        }
        self.phase = RoomPhase::CaseReading;
        self.clear_ready();
        self.touch();
        let seconds = self.settings.case_reading_secs;
        vec![self.arm_timer(seconds), Effect::Broadcast]
    }

    /// Resume from the `AwaitingCase` suspension point.
    pub fn case_generated(
        &mut self,
        pending: PendingId,
        result: Result<CaseFile, OracleError>,
    ) -> Result<Vec<Effect>, RoomError> {
        self.resume(pending, PendingKind::AwaitingCase, RoomPhase::Starting)?;

        let case = match result {
            Ok(case) => case,
            Err(err) => return Ok(self.record_failure(OracleStage::CaseGeneration, err)),
        };

        self.case = Some(case);
        let prosecutor_seat = if self.rng.random_bool(0.5) {
            Seat::Left
        } else {
            Seat::Right
        };
        for player in self.players.values_mut() {
            player.role = Some(if player.seat == prosecutor_seat {
                Role::Prosecutor
            } else {
                Role::Defender
            });
        }
        self.round = 1;
        self.exchange = 1;
        self.phase = RoomPhase::Ready;
        self.clear_ready();
        self.touch();

        Ok(vec![
            Effect::Broadcast,
            Effect::AdvanceAfter {
                delay: self.settings.ready_delay,
            },
        ])
    }

    /// Resume from the `AwaitingRoundScore` suspension point and branch.
    pub fn round_scored(
        &mut self,
        pending: PendingId,
        result: Result<RoundScores, OracleError>,
    ) -> Result<Vec<Effect>, RoomError> {
        self.resume(
            pending,
            PendingKind::AwaitingRoundScore,
            RoomPhase::RoundOver,
        )?;

        let scores = match result {
            Ok(scores) => scores,
            Err(err) => return Ok(self.record_failure(OracleStage::RoundScoring, err)),
        };

        let round = self.round;
        let slots: Vec<usize> = self
            .arguments
            .iter()
            .enumerate()
            .filter(|(_, argument)| argument.round == round)
            .map(|(index, _)| index)
            .collect();
        if slots.len() != scores.scores.len() {
            let err = OracleError::ScoringFailed(format!(
                "{} scores for {} arguments",
                scores.scores.len(),
                slots.len()
            ));
            return Ok(self.record_failure(OracleStage::RoundScoring, err));
        }
        let (Some(prosecutor), Some(defender)) = (
            self.player_with_role(Role::Prosecutor).map(|p| p.id),
            self.player_with_role(Role::Defender).map(|p| p.id),
        ) else {
            let err = OracleError::ScoringFailed("round has no complete cast".into());
            return Ok(self.record_failure(OracleStage::RoundScoring, err));
        };

        let mut prosecution_score = 0.0;
        let mut defense_score = 0.0;
        for (&slot, &score) in slots.iter().zip(&scores.scores) {
            let argument = &mut self.arguments[slot];
            argument.score = score;
            match argument.role {
                Role::Prosecutor => prosecution_score += score,
                Role::Defender => defense_score += score,
            }
            let speaker = argument.speaker;
            if let Some(player) = self.players.get_mut(&speaker) {
                player.score += score;
            }
        }

        // Ties favour the defence.
        let winning_role = if prosecution_score > defense_score {
            Role::Prosecutor
        } else {
            Role::Defender
        };
        let summary = RoundSummary {
            round,
            prosecutor,
            defender,
            winning_role,
            prosecution_score,
            defense_score,
            analysis: scores.analysis,
        };
        if let Some(winner) = self.players.get_mut(&summary.winner()) {
            winner.points += 1;
        }
        self.history.push(summary);
        self.round = self.round.saturating_add(1);
        for player in self.players.values_mut() {
            player.previous_role = player.role;
        }
        self.oracle_failure = None;
        self.touch();

        if self
            .players
            .values()
            .any(|player| player.points >= POINTS_TO_WIN)
        {
            return Ok(self.finish_game());
        }

        if round == 2 && self.players.values().all(|player| player.points == 1) {
            return Ok(self.enter_tiebreaker_choice());
        }

        if round == 1 {
            for player in self.players.values_mut() {
                player.role = player.role.map(Role::opposite);
            }
        }
        self.exchange = 1;
        self.phase = RoomPhase::RoundReading;
        self.clear_ready();
        let seconds = self.settings.round_reading_secs;
        Ok(vec![self.arm_timer(seconds), Effect::Broadcast])
    }

    /// Per-player outcomes of the match, used for statistics.
    pub fn outcomes(&self) -> Vec<PlayerOutcome> {
        self.players
            .values()
            .map(|player| PlayerOutcome {
                user_id: player.profile.user_id.clone(),
                won: player.points >= POINTS_TO_WIN,
                rounds: self
                    .history
                    .iter()
                    .filter_map(|summary| {
                        let role = summary.role_of(player.id)?;
                        Some(RoundOutcome {
                            role,
                            won: summary.winner() == player.id,
                            argument_scores: self
                                .arguments_of(player.id)
                                .filter(|argument| argument.round == summary.round)
                                .map(|argument| argument.score)
                                .collect(),
                        })
                    })
                    .collect(),
            })
            .collect()
    }

    fn start_game(&mut self) -> Vec<Effect> {
        self.phase = RoomPhase::Starting;
        self.clear_ready();
        self.oracle_failure = None;
        let pending = self.suspend(PendingKind::AwaitingCase);
        self.touch();
        vec![
            Effect::Broadcast,
            Effect::RequestCase {
                pending,
                language: self.language.clone(),
            },
        ]
    }

    fn start_round(&mut self) -> Vec<Effect> {
        let kind = if self.round >= TIEBREAK_ROUND {
            RoundKind::Tiebreak
        } else {
            RoundKind::Regular
        };
        self.phase = RoomPhase::RoundActive(kind);
        self.clear_ready();
        self.exchange = 1;
        self.arguments_in_round = 0;
        self.turn = self.player_with_role(Role::Prosecutor).map(|player| player.id);
        self.touch();
        let seconds = self.settings.turn_secs;
        vec![self.arm_timer(seconds), Effect::Broadcast]
    }

    fn close_round(&mut self) -> Result<Vec<Effect>, RoomError> {
        self.phase = RoomPhase::RoundOver;
        self.turn = None;
        let stop = self.disarm_timer();
        let request = self.score_request()?;
        let pending = self.suspend(PendingKind::AwaitingRoundScore);
        self.touch();
        Ok(vec![
            stop,
            Effect::Broadcast,
            Effect::RequestScores { pending, request },
        ])
    }

    fn enter_tiebreaker_choice(&mut self) -> Vec<Effect> {
        let contenders: Vec<(PlayerId, f64)> = self
            .players
            .values()
            .map(|player| (player.id, player.score))
            .collect();
        let chooser = match contenders[..] {
            [(a, a_score), (b, b_score)] => {
                if a_score > b_score {
                    a
                } else if b_score > a_score {
                    b
                } else if self.rng.random_bool(0.5) {
                    // Exactly equal cumulative scores: fair coin.
                    a
                } else {
                    b
                }
            }
            [(only, _)] => only,
            _ => return self.finish_game(),
        };

        self.tiebreak_chooser = Some(chooser);
        self.exchange = 1;
        self.phase = RoomPhase::TiebreakerChoice;
        for player in self.players.values_mut() {
            player.role = None;
        }
        self.clear_ready();
        self.touch();
        vec![Effect::Broadcast]
    }

    fn finish_game(&mut self) -> Vec<Effect> {
        self.phase = RoomPhase::GameOver;
        self.turn = None;
        self.tiebreak_chooser = None;
        self.pending = None;
        let stop = self.disarm_timer();
        self.touch();

        let mut effects = vec![stop, Effect::Broadcast];
        if !self.stats_settled {
            self.stats_settled = true;
            effects.push(Effect::GameFinished {
                outcomes: self.outcomes(),
            });
        }
        effects
    }

    fn record_failure(&mut self, stage: OracleStage, err: OracleError) -> Vec<Effect> {
        self.oracle_failure = Some(OracleFailure {
            stage,
            message: err.to_string(),
        });
        self.touch();
        vec![Effect::Broadcast]
    }

    fn score_request(&self) -> Result<ScoreRequest, RoomError> {
        let case = self.case.clone().ok_or(RoomError::InvalidPhase {
            phase: self.phase,
            action: "scoreRound",
        })?;
        Ok(ScoreRequest {
            case,
            round: self.round,
            arguments: self
                .arguments
                .iter()
                .filter(|argument| argument.round == self.round)
                .map(|argument| ArgumentInput {
                    role: argument.role,
                    text: argument.text.clone(),
                })
                .collect(),
            language: self.language.clone(),
        })
    }

    fn suspend(&mut self, kind: PendingKind) -> PendingId {
        let id = Uuid::new_v4();
        self.pending = Some(Pending { id, kind });
        id
    }

    fn resume(
        &mut self,
        pending: PendingId,
        kind: PendingKind,
        phase: RoomPhase,
    ) -> Result<(), RoomError> {
        match self.pending {
            Some(current) if current.id == pending && current.kind == kind && self.phase == phase => {
                self.pending = None;
                Ok(())
            }
            _ => Err(RoomError::StaleResult),
        }
    }

    fn arm_timer(&mut self, seconds: u32) -> Effect {
        self.timer_generation += 1;
        self.timer = TimerState::started(seconds);
        Effect::StartTimer {
            generation: self.timer_generation,
            seconds,
        }
    }

    fn disarm_timer(&mut self) -> Effect {
        self.timer_generation += 1;
        self.timer = self.timer.stopped();
        Effect::StopTimer
    }

    fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.players
            .keys()
            .copied()
            .find(|candidate| *candidate != player)
    }

    fn both_ready(&self) -> bool {
        self.players.len() == 2 && self.players.values().all(|player| player.ready)
    }

    fn clear_ready(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}
