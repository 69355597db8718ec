//! The room registry: the authoritative owner of all shared session state.
//!
//! Every mutation of a room's players, monsters, or loot flows through here,
//! serialized by the relay's single registry lock. Check-then-act operations
//! (`pickup_loot_box` in particular) complete atomically within one call —
//! no intermediate state is externally observable.

use std::collections::HashMap;

use duoraid_protocol::{
    Direction, GameStatePatch, LootBox, MonsterState, PlayerId,
    PlayerProfile, PlayerState, Position, PublicRoomInfo, RoomCode,
};

use crate::room::{
    CreatedRoom, LeaveOutcome, Room, RoomSnapshot, generate_code,
    unix_millis,
};
use crate::RoomError;

/// Attempts at generating a collision-free room code before giving up.
const MAX_CODE_ATTEMPTS: usize = 16;

/// Owns every active room and the player-to-room index.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    /// A player is in at most one room at a time.
    player_rooms: HashMap<PlayerId, RoomCode>,
    next_loot_id: u64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            next_loot_id: 1,
        }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Creates a room with a fresh unique code. The creator becomes host
    /// but is NOT a member yet — it must also `join_room`.
    pub fn create_room(
        &mut self,
        host_id: PlayerId,
        map_name: String,
        is_public: bool,
    ) -> Result<CreatedRoom, RoomError> {
        let code = self.unique_code()?;
        let room =
            Room::new(code.clone(), host_id.clone(), map_name, is_public);
        let created = CreatedRoom {
            code: code.clone(),
            host_token: room.host_token.clone(),
            map_name: room.map_name.clone(),
            is_public,
        };
        self.rooms.insert(code.clone(), room);
        tracing::info!(%code, %host_id, "room created");
        Ok(created)
    }

    /// Adds a player to a room. Code lookup is case-insensitive.
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        player_id: PlayerId,
        profile: PlayerProfile,
    ) -> Result<RoomSnapshot, RoomError> {
        let code = code.normalize();
        let room = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        if room.is_full() {
            return Err(RoomError::RoomFull(code));
        }

        let state = PlayerState::from_profile(
            player_id.clone(),
            profile,
            unix_millis(),
        );
        room.players.insert(player_id.clone(), state);
        self.player_rooms.insert(player_id.clone(), code.clone());
        tracing::info!(
            %code,
            %player_id,
            players = room.players.len(),
            "player joined"
        );

        Ok(RoomSnapshot {
            code: room.code.clone(),
            host_id: room.host_id.clone(),
            players: room.players.values().cloned().collect(),
            monsters: room.monsters.clone(),
            loot_boxes: room.loot_boxes.clone(),
        })
    }

    /// Removes a player from their room. Idempotent: unknown players are a
    /// no-op. Deletes the room when the last member leaves.
    pub fn leave_room(
        &mut self,
        player_id: &PlayerId,
    ) -> Option<LeaveOutcome> {
        let code = self.player_rooms.remove(player_id)?;
        let room = self.rooms.get_mut(&code)?;
        room.players.remove(player_id);

        let room_deleted = room.players.is_empty();
        if room_deleted {
            self.rooms.remove(&code);
            tracing::info!(%code, "room emptied, deleted");
        } else {
            tracing::info!(%code, %player_id, "player left");
        }

        Some(LeaveOutcome {
            room_code: code,
            player_id: player_id.clone(),
            room_deleted,
        })
    }

    // -----------------------------------------------------------------
    // Player state
    // -----------------------------------------------------------------

    /// Updates a player's position. No-op if the player or room is gone —
    /// a move can race a just-processed leave.
    pub fn update_player_position(
        &mut self,
        player_id: &PlayerId,
        position: Position,
        direction: Direction,
        is_moving: bool,
    ) {
        if let Some(player) = self.player_state_mut(player_id) {
            player.position = position;
            player.direction = direction;
            player.is_moving = is_moving;
        }
    }

    /// Updates a player's HP. Same no-op-on-race semantics as position.
    pub fn update_player_hp(&mut self, player_id: &PlayerId, hp: i32) {
        if let Some(player) = self.player_state_mut(player_id) {
            player.hp = hp;
        }
    }

    fn player_state_mut(
        &mut self,
        player_id: &PlayerId,
    ) -> Option<&mut PlayerState> {
        let code = self.player_rooms.get(player_id)?;
        self.rooms.get_mut(code)?.players.get_mut(player_id)
    }

    // -----------------------------------------------------------------
    // Shared game state (host-fed)
    // -----------------------------------------------------------------

    /// Replaces the monster roster. The host capability token is checked
    /// here so the check and the write happen under one registry borrow.
    pub fn update_monsters(
        &mut self,
        code: &RoomCode,
        host_token: &str,
        monsters: Vec<MonsterState>,
    ) -> Result<(), RoomError> {
        let room = self.host_room_mut(code, host_token)?;
        room.monsters = monsters;
        room.last_update = unix_millis();
        Ok(())
    }

    /// Overwrites only the fields present in the patch. Token-gated like
    /// `update_monsters`.
    pub fn sync_game_state(
        &mut self,
        code: &RoomCode,
        host_token: &str,
        patch: GameStatePatch,
    ) -> Result<(), RoomError> {
        let room = self.host_room_mut(code, host_token)?;
        if let Some(monsters) = patch.monsters {
            room.monsters = monsters;
        }
        if let Some(loot_boxes) = patch.loot_boxes {
            room.loot_boxes = loot_boxes;
        }
        room.last_update = unix_millis();
        Ok(())
    }

    fn host_room_mut(
        &mut self,
        code: &RoomCode,
        host_token: &str,
    ) -> Result<&mut Room, RoomError> {
        let code = code.normalize();
        let room = self
            .rooms
            .get_mut(&code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        if room.host_token != host_token {
            return Err(RoomError::UnauthorizedHostAction(code));
        }
        Ok(room)
    }

    /// Current shared state for `request_game_state`.
    pub fn game_state(
        &self,
        code: &RoomCode,
    ) -> Result<(Vec<MonsterState>, Vec<LootBox>), RoomError> {
        let code = code.normalize();
        let room = self
            .rooms
            .get(&code)
            .ok_or(RoomError::RoomNotFound(code))?;
        Ok((room.monsters.clone(), room.loot_boxes.clone()))
    }

    // -----------------------------------------------------------------
    // Loot arbitration
    // -----------------------------------------------------------------

    /// Spawns a loot box attributed to the killer, who holds first-pickup
    /// rights on it.
    pub fn spawn_loot_box(
        &mut self,
        code: &RoomCode,
        owner_id: PlayerId,
        owner_name: String,
    ) -> Result<LootBox, RoomError> {
        let code = code.normalize();
        let loot_id = format!("loot-{}", self.next_loot_id);
        self.next_loot_id += 1;

        let room = self
            .rooms
            .get_mut(&code)
            .ok_or(RoomError::RoomNotFound(code))?;
        let loot = LootBox {
            id: loot_id,
            owner_id: Some(owner_id),
            owner_name,
            picked_by: None,
            picked_at: None,
        };
        room.loot_boxes.push(loot.clone());
        Ok(loot)
    }

    /// Atomic first-come-first-served pickup.
    ///
    /// The losing side of a race observes `AlreadyClaimed`; a box owned by
    /// someone else yields `OwnershipConflict`. On success the box is marked
    /// picked and removed from the room in the same call.
    pub fn pickup_loot_box(
        &mut self,
        code: &RoomCode,
        loot_box_id: &str,
        player_id: &PlayerId,
    ) -> Result<LootBox, RoomError> {
        let code = code.normalize();
        let room = self
            .rooms
            .get_mut(&code)
            .ok_or(RoomError::RoomNotFound(code))?;

        let idx = room
            .loot_boxes
            .iter()
            .position(|lb| lb.id == loot_box_id)
            .ok_or_else(|| {
                RoomError::LootBoxNotFound(loot_box_id.to_string())
            })?;

        let lb = &room.loot_boxes[idx];
        if let Some(owner) = &lb.owner_id {
            if owner != player_id {
                return Err(RoomError::OwnershipConflict {
                    owner_name: lb.owner_name.clone(),
                });
            }
        }
        if lb.picked_by.is_some() {
            return Err(RoomError::AlreadyClaimed);
        }

        let mut picked = room.loot_boxes.remove(idx);
        picked.picked_by = Some(player_id.clone());
        picked.picked_at = Some(unix_millis());
        tracing::info!(
            loot = %picked.id,
            %player_id,
            "loot box picked up"
        );
        Ok(picked)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// `true` if `player_id` created the room.
    pub fn is_host(&self, code: &RoomCode, player_id: &PlayerId) -> bool {
        self.rooms
            .get(&code.normalize())
            .is_some_and(|r| r.host_id == *player_id)
    }

    /// Checks a host capability token against the room's.
    pub fn verify_host_token(&self, code: &RoomCode, token: &str) -> bool {
        self.rooms
            .get(&code.normalize())
            .is_some_and(|r| r.host_token == token)
    }

    /// Projections of all public rooms.
    pub fn public_rooms(&self) -> Vec<PublicRoomInfo> {
        self.rooms
            .values()
            .filter(|r| r.is_public)
            .map(Room::public_info)
            .collect()
    }

    pub fn get_room(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(&code.normalize())
    }

    pub fn player_room(&self, player_id: &PlayerId) -> Option<&RoomCode> {
        self.player_rooms.get(player_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn unique_code(&self) -> Result<RoomCode, RoomError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code();
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(RoomError::CodeSpaceExhausted)
    }
}
