//! The closed message set spoken between clients and the relay.
//!
//! Every inbound frame decodes to exactly one [`ClientMessage`] variant and
//! every outbound frame is one [`ServerMessage`] variant. Both enums are
//! internally tagged (`{"type": "player_move", ...}`) with snake_case kind
//! names, decoded once at the connection boundary. Anything that doesn't
//! match a known tag fails decode — the relay logs and drops it without
//! closing the connection.

use serde::{Deserialize, Serialize};

use crate::types::{
    ClassId, Direction, GameStatePatch, LootBox, MonsterState, PlayerId,
    PlayerProfile, PlayerState, Position, PublicRoomInfo, RoomCode,
};

// ---------------------------------------------------------------------------
// Client → relay
// ---------------------------------------------------------------------------

/// Messages a client may send to the relay.
///
/// Host-gated kinds (`monster_update`, `game_state_sync`) carry the per-room
/// capability token issued in [`ServerMessage::RoomCreated`]; the relay
/// rejects them with an `error` unicast when the token doesn't match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        player_id: PlayerId,
        player_data: PlayerProfile,
        map_name: String,
        is_public: bool,
    },
    JoinRoom {
        room_code: RoomCode,
        player_id: PlayerId,
        player_data: PlayerProfile,
    },
    LeaveRoom,
    GetPublicRooms,
    PlayerMove {
        position: Position,
        direction: Direction,
        is_moving: bool,
    },
    /// Attack intent. Power and class ride in the message and are trusted
    /// at face value; the host simulation applies them.
    PlayerAttack {
        position: Position,
        direction: Direction,
        class_id: ClassId,
        power: i32,
    },
    /// Host-only: full monster roster snapshot.
    MonsterUpdate {
        host_token: String,
        monsters: Vec<MonsterState>,
    },
    PlayerHpUpdate {
        hp: i32,
    },
    /// Host-only: partial shared-state overwrite.
    GameStateSync {
        host_token: String,
        game_state: GameStatePatch,
    },
    RequestGameState,
    LootboxPickup {
        loot_box_id: String,
    },
    MonsterDamage {
        monster_id: u32,
        damage: i32,
        attacker_id: PlayerId,
    },
    MonsterDeath {
        monster_id: u32,
        killer_id: PlayerId,
        killer_name: String,
        position: Position,
    },
}

// ---------------------------------------------------------------------------
// Relay → client
// ---------------------------------------------------------------------------

/// Messages the relay sends to clients, unicast or fanned out room-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Unicast to the creator. The host token is never sent to anyone else.
    RoomCreated {
        room_code: RoomCode,
        is_public: bool,
        map_name: String,
        host_token: String,
    },
    /// Unicast to the joiner: the full room picture.
    RoomJoined {
        room_code: RoomCode,
        players: Vec<PlayerState>,
        monsters: Vec<MonsterState>,
        loot_boxes: Vec<LootBox>,
        is_host: bool,
        host_id: PlayerId,
    },
    /// Broadcast to the rest of the room when someone joins.
    PlayerJoined {
        player: PlayerState,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    /// Same cleanup as `PlayerLeft`, but the departure was a socket close.
    PlayerDisconnected {
        player_id: PlayerId,
    },
    PublicRooms {
        rooms: Vec<PublicRoomInfo>,
    },
    PlayerMoved {
        player_id: PlayerId,
        position: Position,
        direction: Direction,
        is_moving: bool,
    },
    PlayerAttacked {
        player_id: PlayerId,
        position: Position,
        direction: Direction,
        class_id: ClassId,
        power: i32,
    },
    MonstersUpdated {
        monsters: Vec<MonsterState>,
    },
    PlayerHpUpdated {
        player_id: PlayerId,
        hp: i32,
    },
    GameStateSynced {
        game_state: GameStatePatch,
    },
    /// Unicast reply to `request_game_state`. The patch carries both
    /// fields, mirroring the `game_state_synced` shape.
    GameStateResponse {
        game_state: GameStatePatch,
    },
    LootboxPicked {
        loot_box: LootBox,
        player_id: PlayerId,
    },
    /// Unicast to the requester only.
    LootboxPickupFailed {
        message: String,
    },
    MonsterDamaged {
        monster_id: u32,
        damage: i32,
        attacker_id: PlayerId,
    },
    MonsterDied {
        monster_id: u32,
        killer_id: PlayerId,
        killer_name: String,
        position: Position,
        /// Loot spawned by the registry for this kill, owned by the killer.
        loot_box: Option<LootBox>,
    },
    /// Unicast failure report. The connection stays open.
    Error {
        message: String,
    },
}

// =========================================================================
// Tests
// =========================================================================
