//! Integration tests for the room registry.

use duoraid_protocol::{
    ClassId, Direction, GameStatePatch, LootBox, MonsterState, PlayerId,
    PlayerProfile, Position, RoomCode,
};
use duoraid_room::{MAX_PLAYERS, RoomError, RoomRegistry};

fn pid(s: &str) -> PlayerId {
    PlayerId::new(s)
}

fn profile(name: &str) -> PlayerProfile {
    PlayerProfile {
        name: name.into(),
        class_id: ClassId::Warrior,
        attack: 10,
        hp: 100,
    }
}

fn create(reg: &mut RoomRegistry, host: &str) -> RoomCode {
    reg.create_room(pid(host), "crypt".into(), true)
        .unwrap()
        .code
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn test_create_room_generates_unique_uppercase_codes() {
    let mut reg = RoomRegistry::new();
    let a = create(&mut reg, "h1");
    let b = create(&mut reg, "h2");
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 8);
    assert_eq!(a.as_str(), a.normalize().as_str());
}

#[test]
fn test_creator_is_not_a_member_until_join() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    assert_eq!(reg.get_room(&code).unwrap().players.len(), 0);
    assert!(reg.player_room(&pid("h1")).is_none());
}

#[test]
fn test_join_room_is_case_insensitive() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    let lower = RoomCode::new(code.as_str().to_ascii_lowercase());

    let snapshot = reg.join_room(&lower, pid("h1"), profile("Ari")).unwrap();
    assert_eq!(snapshot.code, code);
}

#[test]
fn test_join_unknown_room_fails() {
    let mut reg = RoomRegistry::new();
    let result =
        reg.join_room(&RoomCode::new("NOPE0000"), pid("p1"), profile("Ari"));
    assert!(matches!(result, Err(RoomError::RoomNotFound(_))));
}

#[test]
fn test_join_seeds_defaults() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();

    let room = reg.get_room(&code).unwrap();
    let p = &room.players[&pid("h1")];
    assert_eq!(p.position, Position::default());
    assert_eq!(p.direction, Direction::Down);
    assert!(!p.is_moving);
    assert_eq!(p.hp, 100);
}

#[test]
fn test_room_never_exceeds_max_players() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();

    let result = reg.join_room(&code, pid("p3"), profile("Cass"));
    assert!(matches!(result, Err(RoomError::RoomFull(_))));

    // The failed join must not mutate membership.
    let room = reg.get_room(&code).unwrap();
    assert_eq!(room.players.len(), MAX_PLAYERS);
    assert!(!room.players.contains_key(&pid("p3")));
}

#[test]
fn test_leave_is_idempotent() {
    let mut reg = RoomRegistry::new();
    assert!(reg.leave_room(&pid("ghost")).is_none());

    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    assert!(reg.leave_room(&pid("h1")).is_some());
    assert!(reg.leave_room(&pid("h1")).is_none());
}

#[test]
fn test_last_leave_deletes_room() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();

    let out = reg.leave_room(&pid("p2")).unwrap();
    assert!(!out.room_deleted);

    let out = reg.leave_room(&pid("h1")).unwrap();
    assert!(out.room_deleted);

    assert!(reg.get_room(&code).is_none());
    assert!(reg.public_rooms().is_empty());
    assert_eq!(reg.room_count(), 0);
}

#[test]
fn test_host_is_never_reassigned_when_host_leaves() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();

    reg.leave_room(&pid("h1")).unwrap();
    let room = reg.get_room(&code).unwrap();
    assert_eq!(room.host_id, pid("h1"), "no host migration");
    assert!(!reg.is_host(&code, &pid("p2")));
}

// =========================================================================
// Player state updates
// =========================================================================

#[test]
fn test_update_position_after_leave_is_a_noop() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();
    reg.leave_room(&pid("p2")).unwrap();

    // Must not panic or resurrect the player.
    reg.update_player_position(
        &pid("p2"),
        Position::new(5.0, 5.0),
        Direction::Up,
        true,
    );
    assert!(!reg.get_room(&code).unwrap().players.contains_key(&pid("p2")));
}

#[test]
fn test_update_hp_mutates_only_the_sender() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();

    reg.update_player_hp(&pid("p2"), 40);
    let room = reg.get_room(&code).unwrap();
    assert_eq!(room.players[&pid("p2")].hp, 40);
    assert_eq!(room.players[&pid("h1")].hp, 100);
}

// =========================================================================
// Shared game state
// =========================================================================

#[test]
fn test_sync_game_state_overwrites_only_supplied_fields() {
    let mut reg = RoomRegistry::new();
    let created = reg
        .create_room(pid("h1"), "crypt".into(), true)
        .unwrap();
    let code = created.code.clone();
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();

    let home = Position::new(10.0, 10.0);
    reg.update_monsters(
        &code,
        &created.host_token,
        vec![MonsterState::new(1, "slime", home, 50)],
    )
    .unwrap();
    reg.spawn_loot_box(&code, pid("h1"), "Ari".into()).unwrap();

    // Patch only loot_boxes — monsters stay.
    reg.sync_game_state(
        &code,
        &created.host_token,
        GameStatePatch {
            monsters: None,
            loot_boxes: Some(vec![]),
        },
    )
    .unwrap();

    let (monsters, loot) = reg.game_state(&code).unwrap();
    assert_eq!(monsters.len(), 1);
    assert!(loot.is_empty());
}

#[test]
fn test_state_mutations_reject_a_bad_token() {
    let mut reg = RoomRegistry::new();
    let created = reg
        .create_room(pid("h1"), "crypt".into(), true)
        .unwrap();
    let code = created.code.clone();
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();

    let home = Position::new(10.0, 10.0);
    let result = reg.update_monsters(
        &code,
        "forged",
        vec![MonsterState::new(1, "slime", home, 50)],
    );
    assert!(matches!(
        result,
        Err(RoomError::UnauthorizedHostAction(_))
    ));

    let result = reg.sync_game_state(
        &code,
        "forged",
        GameStatePatch {
            monsters: None,
            loot_boxes: Some(vec![]),
        },
    );
    assert!(matches!(
        result,
        Err(RoomError::UnauthorizedHostAction(_))
    ));

    // Nothing was written.
    let (monsters, loot) = reg.game_state(&code).unwrap();
    assert!(monsters.is_empty());
    assert!(loot.is_empty());
}

#[test]
fn test_host_token_verification() {
    let mut reg = RoomRegistry::new();
    let created = reg
        .create_room(pid("h1"), "crypt".into(), false)
        .unwrap();

    assert!(reg.verify_host_token(&created.code, &created.host_token));
    assert!(!reg.verify_host_token(&created.code, "forged"));
    assert!(!reg.verify_host_token(&RoomCode::new("NOPE0000"), &created.host_token));
}

// =========================================================================
// Loot arbitration
// =========================================================================

#[test]
fn test_pickup_race_yields_one_winner() {
    let mut reg = RoomRegistry::new();
    let created = reg
        .create_room(pid("h1"), "crypt".into(), true)
        .unwrap();
    let code = created.code.clone();
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();

    // Unowned box: either player may take it.
    let loot = reg.spawn_loot_box(&code, pid("h1"), "Ari".into()).unwrap();
    let mut boxed = reg.get_room(&code).unwrap().loot_boxes.clone();
    boxed[0].owner_id = None;
    reg.sync_game_state(
        &code,
        &created.host_token,
        GameStatePatch {
            monsters: None,
            loot_boxes: Some(boxed),
        },
    )
    .unwrap();

    let first = reg.pickup_loot_box(&code, &loot.id, &pid("p2"));
    let second = reg.pickup_loot_box(&code, &loot.id, &pid("h1"));

    assert!(first.is_ok());
    // The loser of the race sees "not found" since picked boxes are
    // removed, never kept in a picked state.
    assert!(matches!(second, Err(RoomError::LootBoxNotFound(_))));
}

#[test]
fn test_owned_loot_rejects_other_players() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();

    let loot = reg.spawn_loot_box(&code, pid("h1"), "Ari".into()).unwrap();

    let result = reg.pickup_loot_box(&code, &loot.id, &pid("p2"));
    match result {
        Err(RoomError::OwnershipConflict { owner_name }) => {
            assert_eq!(owner_name, "Ari");
        }
        other => panic!("expected OwnershipConflict, got {other:?}"),
    }

    // The rightful owner still can.
    let picked = reg.pickup_loot_box(&code, &loot.id, &pid("h1")).unwrap();
    assert_eq!(picked.picked_by, Some(pid("h1")));
    assert!(picked.picked_at.is_some());
}

#[test]
fn test_picked_boxes_are_removed_not_flagged() {
    let mut reg = RoomRegistry::new();
    let code = create(&mut reg, "h1");
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();

    let loot = reg.spawn_loot_box(&code, pid("h1"), "Ari".into()).unwrap();
    reg.pickup_loot_box(&code, &loot.id, &pid("h1")).unwrap();

    let room = reg.get_room(&code).unwrap();
    assert!(room.loot_boxes.is_empty());
    assert!(
        room.loot_boxes.iter().all(|lb| lb.picked_by.is_none()),
        "no box in the room is ever flagged picked"
    );
}

#[test]
fn test_host_synced_picked_box_rejects_pickup() {
    let mut reg = RoomRegistry::new();
    let created = reg
        .create_room(pid("h1"), "crypt".into(), true)
        .unwrap();
    let code = created.code.clone();
    reg.join_room(&code, pid("h1"), profile("Ari")).unwrap();
    reg.join_room(&code, pid("p2"), profile("Bren")).unwrap();

    // The host can sync in a box that is already flagged picked (its own
    // pickups never look like this — picked boxes are removed). The flag
    // is still honored on the way in.
    reg.sync_game_state(
        &code,
        &created.host_token,
        GameStatePatch {
            monsters: None,
            loot_boxes: Some(vec![LootBox {
                id: "loot-stale".into(),
                owner_id: None,
                owner_name: String::new(),
                picked_by: Some(pid("h1")),
                picked_at: Some(1),
            }]),
        },
    )
    .unwrap();

    let result = reg.pickup_loot_box(&code, "loot-stale", &pid("p2"));
    match result {
        Err(RoomError::AlreadyClaimed) => {}
        other => panic!("expected AlreadyClaimed, got {other:?}"),
    }
}

#[test]
fn test_already_claimed_message() {
    assert_eq!(RoomError::AlreadyClaimed.to_string(), "already picked up");
}

// =========================================================================
// Listing
// =========================================================================

#[test]
fn test_public_rooms_excludes_private() {
    let mut reg = RoomRegistry::new();
    let public = create(&mut reg, "h1");
    reg.create_room(pid("h2"), "cave".into(), false).unwrap();
    reg.join_room(&public, pid("h1"), profile("Ari")).unwrap();

    let rooms = reg.public_rooms();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].code, public);
    assert_eq!(rooms[0].player_count, 1);
    assert_eq!(rooms[0].max_players, MAX_PLAYERS);
}
