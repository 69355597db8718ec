//! The `Room` type and its invariants.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use duoraid_protocol::{
    LootBox, MonsterState, PlayerId, PlayerState, PublicRoomInfo, RoomCode,
};
use rand::Rng;

/// Fixed membership cap: one host, one guest.
pub const MAX_PLAYERS: usize = 2;

/// A live combat session.
///
/// Invariants, enforced by the registry:
/// - `players.len() <= max_players` always.
/// - `host_id` is set at creation and never reassigned.
/// - A room with zero players is deleted immediately, never stored.
pub struct Room {
    pub code: RoomCode,
    pub host_id: PlayerId,
    /// Capability token proving host authority. Only ever sent to the
    /// creator, inside `room_created`.
    pub(crate) host_token: String,
    pub map_name: String,
    pub is_public: bool,
    pub players: HashMap<PlayerId, PlayerState>,
    pub monsters: Vec<MonsterState>,
    pub loot_boxes: Vec<LootBox>,
    pub max_players: usize,
    pub created_at: u64,
    pub last_update: u64,
}

impl Room {
    pub(crate) fn new(
        code: RoomCode,
        host_id: PlayerId,
        map_name: String,
        is_public: bool,
    ) -> Self {
        let now = unix_millis();
        Self {
            code,
            host_id,
            host_token: generate_host_token(),
            map_name,
            is_public,
            players: HashMap::new(),
            monsters: Vec::new(),
            loot_boxes: Vec::new(),
            max_players: MAX_PLAYERS,
            created_at: now,
            last_update: now,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Listing projection — no internal state leaks.
    pub fn public_info(&self) -> PublicRoomInfo {
        PublicRoomInfo {
            code: self.code.clone(),
            host_id: self.host_id.clone(),
            map_name: self.map_name.clone(),
            player_count: self.players.len(),
            max_players: self.max_players,
            created_at: self.created_at,
        }
    }
}

/// Everything a joiner needs to render the room, returned by
/// [`RoomRegistry::join_room`](crate::RoomRegistry::join_room).
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub players: Vec<PlayerState>,
    pub monsters: Vec<MonsterState>,
    pub loot_boxes: Vec<LootBox>,
}

/// Result of a successful `create_room`. The creator is not a member yet —
/// it must still `join_room`.
#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub code: RoomCode,
    pub host_token: String,
    pub map_name: String,
    pub is_public: bool,
}

/// What happened on a leave, so the router knows who to notify.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    /// `true` when the leaver was the last member and the room is gone.
    pub room_deleted: bool,
}

/// Alphabet for room codes: uppercase alphanumerics.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random 8-character uppercase alphanumeric room code.
pub(crate) fn generate_code() -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..RoomCode::LEN)
        .map(|_| {
            CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char
        })
        .collect();
    RoomCode::new(code)
}

/// Generates a random 32-character hex host token (128 bits of entropy).
fn generate_host_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Milliseconds since the Unix epoch, for wire timestamps.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
