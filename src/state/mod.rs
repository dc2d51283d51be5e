/// Seated players and their roles.
pub mod player;
pub mod registry;
pub mod room;
pub mod stats;
pub mod timer;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};

use crate::{
    config::AppConfig,
    dao::stats_store::StatsStore,
    dto::ws::ServerMessage,
    error::ServiceError,
    oracle::ScoringOracle,
    services::websocket_service::send_message_to_websocket,
    state::{
        player::PlayerId,
        registry::RoomRegistry,
        room::{ConnectionId, RoomId},
    },
};

/// State handle shared by every route and background task.
pub type SharedState = Arc<AppState>;

/// Seat a connection currently occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Code of the room.
    pub room_id: RoomId,
    /// Seat owner inside that room.
    pub player_id: PlayerId,
}

#[derive(Clone)]
/// Handle used to push messages to a connected player socket.
pub struct ClientConnection {
    /// Writer task queue.
    pub tx: mpsc::UnboundedSender<Message>,
    /// `None` until the socket creates or joins a room.
    pub membership: Option<Membership>,
}

/// Central application state: live rooms, open sockets, the judge and the statistics store.
pub struct AppState {
    config: AppConfig,
    rooms: RoomRegistry,
    connections: DashMap<ConnectionId, ClientConnection>,
    oracle: ScoringOracle,
    stats_store: RwLock<Option<Arc<dyn StatsStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a statistics store is installed.
    pub fn new(config: AppConfig, oracle: ScoringOracle) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            rooms: RoomRegistry::new(),
            connections: DashMap::new(),
            oracle,
            stats_store: RwLock::new(None),
            degraded: degraded_tx,
        })
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live rooms keyed by code.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Open player sockets keyed by connection id.
    pub fn connections(&self) -> &DashMap<ConnectionId, ClientConnection> {
        &self.connections
    }

    /// Case writer and round judge.
    pub fn oracle(&self) -> &ScoringOracle {
        &self.oracle
    }

    /// Obtain a handle to the current statistics store, if one is installed.
    pub async fn stats_store(&self) -> Option<Arc<dyn StatsStore>> {
        let guard = self.stats_store.read().await;
        guard.as_ref().cloned()
    }

    /// Statistics store or [`ServiceError::Degraded`].
    pub async fn require_stats_store(&self) -> Result<Arc<dyn StatsStore>, ServiceError> {
        self.stats_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new statistics store implementation and leave degraded mode.
    pub async fn install_stats_store(&self, store: Arc<dyn StatsStore>) {
        {
            let mut guard = self.stats_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current statistics store and enter degraded mode.
    pub async fn clear_stats_store(&self) {
        {
            let mut guard = self.stats_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Whether finished matches are currently going unpersisted.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Seat currently held by `connection`.
    pub fn membership(&self, connection: ConnectionId) -> Option<Membership> {
        self.connections
            .get(&connection)
            .and_then(|entry| entry.membership.clone())
    }

    /// Record (or clear) the seat held by `connection`.
    pub fn set_membership(&self, connection: ConnectionId, membership: Option<Membership>) {
        if let Some(mut entry) = self.connections.get_mut(&connection) {
            entry.membership = membership;
        }
    }

    /// Queue `message` on the socket of `connection`. Returns `false` when the socket is gone.
    pub fn send_to(&self, connection: ConnectionId, message: &ServerMessage) -> bool {
        let Some(tx) = self
            .connections
            .get(&connection)
            .map(|entry| entry.tx.clone())
        else {
            return false;
        };
        send_message_to_websocket(&tx, message).is_ok()
    }
}
