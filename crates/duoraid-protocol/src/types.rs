//! Core data model shared between the relay, the host simulation, and clients.
//!
//! Everything here travels on the wire inside [`ClientMessage`] or
//! [`ServerMessage`](crate::ServerMessage) payloads, so the serde shapes are
//! part of the protocol contract.
//!
//! [`ClientMessage`]: crate::ClientMessage

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identity string, supplied by the external identity layer.
///
/// Opaque to this crate — the relay never parses it, only compares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An 8-character uppercase alphanumeric room code.
///
/// Lookup is case-insensitive: client input is normalized through
/// [`RoomCode::normalize`] before matching. Codes produced by the registry
/// are already uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Number of characters in a generated room code.
    pub const LEN: usize = 8;

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Uppercases the code so lookups are case-insensitive.
    pub fn normalize(&self) -> RoomCode {
        RoomCode(self.0.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// World primitives
// ---------------------------------------------------------------------------

/// A 2D world position in map units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// Distance comparisons in the simulation use the squared form to avoid
    /// the sqrt; only callers that need real units take the root.
    pub fn distance_sq(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Facing direction of a player sprite.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

/// Character class. Determines attack semantics: `Warrior` is the melee
/// class and splashes secondary targets; the others hit a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassId {
    Warrior,
    Archer,
    Mage,
}

impl ClassId {
    /// `true` for classes whose attacks splash onto nearby monsters.
    pub fn is_melee(&self) -> bool {
        matches!(self, Self::Warrior)
    }
}

// ---------------------------------------------------------------------------
// Player state
// ---------------------------------------------------------------------------

/// Character summary handed over by the (out-of-scope) character layer
/// when creating or joining a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
    pub class_id: ClassId,
    pub attack: i32,
    pub hp: i32,
}

/// A room member's replicated state. Owned exclusively by the Session
/// Registry; mutated only through router-validated messages from the
/// connection whose player id matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub class_id: ClassId,
    pub position: Position,
    pub direction: Direction,
    pub is_moving: bool,
    pub hp: i32,
    /// Unix millis at join time.
    pub joined_at: u64,
}

impl PlayerState {
    /// Seeds a fresh member from a profile: origin position, facing down,
    /// standing still.
    pub fn from_profile(
        id: PlayerId,
        profile: PlayerProfile,
        joined_at: u64,
    ) -> Self {
        Self {
            id,
            name: profile.name,
            class_id: profile.class_id,
            position: Position::default(),
            direction: Direction::Down,
            is_moving: false,
            hp: profile.hp,
            joined_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Monster state
// ---------------------------------------------------------------------------

/// Host-simulated monster state, replicated read-only to the guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterState {
    pub id: u32,
    /// Monster archetype name (sprite/stat lookup key).
    pub kind: String,
    pub position: Position,
    pub hp: i32,
    pub max_hp: i32,
    /// Visual-only flag — guests render the attack animation from this
    /// without re-deriving combat outcomes.
    pub is_attacking: bool,
    /// Latches `true` the first time the monster aggroes.
    pub is_activated: bool,
    /// Spawn anchor the monster returns to when it loses its target.
    pub home_position: Position,
}

impl MonsterState {
    pub fn new(id: u32, kind: impl Into<String>, home: Position, max_hp: i32) -> Self {
        Self {
            id,
            kind: kind.into(),
            position: home,
            hp: max_hp,
            max_hp,
            is_attacking: false,
            is_activated: false,
            home_position: home,
        }
    }
}

// ---------------------------------------------------------------------------
// Loot
// ---------------------------------------------------------------------------

/// A world loot box.
///
/// `owner_id` grants first-pickup rights when set. Once `picked_by` is set
/// it is never unset — the box is removed from the room in the same
/// operation, so a picked box never lingers in the room's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootBox {
    pub id: String,
    pub owner_id: Option<PlayerId>,
    pub owner_name: String,
    pub picked_by: Option<PlayerId>,
    /// Unix millis at pickup, set together with `picked_by`.
    pub picked_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// Room projections
// ---------------------------------------------------------------------------

/// Public listing entry. A projection — no internal room state leaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicRoomInfo {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub map_name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub created_at: u64,
}

/// Partial overwrite of the shared game state. Only supplied fields are
/// replaced; `None` leaves the room's copy untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monsters: Option<Vec<MonsterState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loot_boxes: Option<Vec<LootBox>>,
}

// =========================================================================
// Tests
// =========================================================================
