//! Concurrent map from room codes to live rooms.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use tokio::sync::Mutex;

use crate::state::{
    room::{Room, RoomId, RoomSettings},
    timer::RoomTimer,
};

/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A room together with its countdown. Every mutation goes through the mutex, so operations on
/// one room never interleave.
#[derive(Debug)]
pub struct LiveRoom {
    /// Match state.
    pub room: Room,
    /// The room's single countdown.
    pub timer: RoomTimer,
}

/// Handle to a live room.
pub type RoomHandle = Arc<Mutex<LiveRoom>>;

/// Registry of every live room, keyed by code.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, RoomHandle>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room under a fresh unique code and return its handle.
    pub fn create(&self, language: String, settings: RoomSettings) -> (RoomId, RoomHandle) {
        loop {
            let code = generate_room_code();
            if let Entry::Vacant(slot) = self.rooms.entry(code.clone()) {
                let handle = Arc::new(Mutex::new(LiveRoom {
                    room: Room::new(code.clone(), language, settings),
                    timer: RoomTimer::new(),
                }));
                slot.insert(handle.clone());
                return (code, handle);
            }
        }
    }

    /// Look a room up by code (case-insensitive).
    pub fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms
            .get(&normalize_code(code))
            .map(|entry| entry.value().clone())
    }

    /// Remove `code` only if it still maps to `handle`.
    pub fn remove_handle(&self, code: &str, handle: &RoomHandle) -> bool {
        self.rooms
            .remove_if(&normalize_code(code), |_, current| Arc::ptr_eq(current, handle))
            .is_some()
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is live.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Stop every countdown and drop every room.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.rooms.clear();
        for handle in handles {
            handle.lock().await.timer.stop();
        }
    }
}

/// Room codes are stored upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}
