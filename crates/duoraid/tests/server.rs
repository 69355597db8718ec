//! Integration tests for the relay: room flow, fan-out scoping, host
//! gating, loot arbitration, and disconnect cleanup.

use std::time::Duration;

use duoraid::RelayServer;
use duoraid_client::{ProxyError, SessionEvent, SessionProxy};
use duoraid_protocol::{
    ClassId, Direction, GameStatePatch, LootBox, PlayerId, PlayerProfile,
    Position, RoomCode, ServerMessage,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

fn profile(name: &str) -> PlayerProfile {
    PlayerProfile {
        name: name.into(),
        class_id: ClassId::Warrior,
        attack: 10,
        hp: 100,
    }
}

/// Starts a relay on a random port and returns its ws:// url.
async fn start_relay() -> String {
    let server = RelayServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("relay should build");
    let addr = server.local_addr().expect("should have local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    format!("ws://{addr}")
}

/// Receives the next decoded message, panicking on timeout or disconnect.
async fn next_msg(
    rx: &mut broadcast::Receiver<SessionEvent>,
) -> ServerMessage {
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("event channel closed");
    match event {
        SessionEvent::Message(msg) => msg,
        SessionEvent::Disconnected => panic!("unexpected disconnect"),
    }
}

/// Creates a room, joins the creator, and returns (host, host_rx, code).
async fn host_in_room(
    url: &str,
) -> (SessionProxy, broadcast::Receiver<SessionEvent>, RoomCode) {
    let host = SessionProxy::connect(url).await.unwrap();
    let mut rx = host.subscribe();

    host.create_room(PlayerId::new("host"), profile("Ari"), "crypt", true)
        .await
        .unwrap();
    let code = match next_msg(&mut rx).await {
        ServerMessage::RoomCreated { room_code, .. } => room_code,
        other => panic!("expected room_created, got {other:?}"),
    };

    host.join_room(code.clone(), PlayerId::new("host"), profile("Ari"))
        .await
        .unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::RoomJoined { is_host, .. } => assert!(is_host),
        other => panic!("expected room_joined, got {other:?}"),
    }
    (host, rx, code)
}

/// Joins an existing room as "guest" and returns (guest, guest_rx).
async fn guest_in_room(
    url: &str,
    code: &RoomCode,
) -> (SessionProxy, broadcast::Receiver<SessionEvent>) {
    let guest = SessionProxy::connect(url).await.unwrap();
    let mut rx = guest.subscribe();
    guest
        .join_room(code.clone(), PlayerId::new("guest"), profile("Bren"))
        .await
        .unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::RoomJoined {
            is_host, players, ..
        } => {
            assert!(!is_host);
            assert_eq!(players.len(), 2);
        }
        other => panic!("expected room_joined, got {other:?}"),
    }
    (guest, rx)
}

// =========================================================================
// Room flow
// =========================================================================

#[tokio::test]
async fn test_two_player_join_flow() {
    let url = start_relay().await;
    let (_host, mut host_rx, code) = host_in_room(&url).await;
    let (guest, _guest_rx) = guest_in_room(&url, &code).await;

    // The host hears about the guest, with the guest's profile attached.
    match next_msg(&mut host_rx).await {
        ServerMessage::PlayerJoined { player } => {
            assert_eq!(player.id, PlayerId::new("guest"));
            assert_eq!(player.name, "Bren");
        }
        other => panic!("expected player_joined, got {other:?}"),
    }
    assert!(!guest.is_host());
    assert_eq!(guest.room_code(), Some(code));
}

#[tokio::test]
async fn test_third_join_is_rejected() {
    let url = start_relay().await;
    let (_host, _host_rx, code) = host_in_room(&url).await;
    let (_guest, _guest_rx) = guest_in_room(&url, &code).await;

    let third = SessionProxy::connect(url.as_str()).await.unwrap();
    let mut rx = third.subscribe();
    third
        .join_room(code, PlayerId::new("third"), profile("Cass"))
        .await
        .unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::Error { message } => {
            assert!(message.contains("full"), "got: {message}");
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_room_codes_are_case_insensitive() {
    let url = start_relay().await;
    let (_host, _host_rx, code) = host_in_room(&url).await;

    let lower = RoomCode::new(code.as_str().to_ascii_lowercase());
    let guest = SessionProxy::connect(url.as_str()).await.unwrap();
    let mut rx = guest.subscribe();
    guest
        .join_room(lower, PlayerId::new("guest"), profile("Bren"))
        .await
        .unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::RoomJoined { room_code, .. } => {
            assert_eq!(room_code, code);
        }
        other => panic!("expected room_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_public_room_listing() {
    let url = start_relay().await;
    let (_host, _host_rx, code) = host_in_room(&url).await;

    let observer = SessionProxy::connect(url.as_str()).await.unwrap();
    let mut rx = observer.subscribe();
    observer.get_public_rooms().await.unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::PublicRooms { rooms } => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].code, code);
            assert_eq!(rooms[0].player_count, 1);
        }
        other => panic!("expected public_rooms, got {other:?}"),
    }
}

// =========================================================================
// Fan-out scoping
// =========================================================================

#[tokio::test]
async fn test_moves_are_not_echoed_to_the_sender() {
    let url = start_relay().await;
    let (host, mut host_rx, code) = host_in_room(&url).await;
    let (guest, mut guest_rx) = guest_in_room(&url, &code).await;
    let _ = next_msg(&mut host_rx).await; // player_joined

    guest
        .send_move(Position::new(3.0, 4.0), Direction::Left, true)
        .await
        .unwrap();
    match next_msg(&mut host_rx).await {
        ServerMessage::PlayerMoved {
            player_id,
            position,
            ..
        } => {
            assert_eq!(player_id, PlayerId::new("guest"));
            assert_eq!(position, Position::new(3.0, 4.0));
        }
        other => panic!("expected player_moved, got {other:?}"),
    }

    // Attacks go to everyone, the attacker included. If the guest's own
    // move had been echoed back, it would arrive before this.
    host.send_attack(Position::default(), Direction::Up, ClassId::Warrior, 25)
        .await
        .unwrap();
    match next_msg(&mut guest_rx).await {
        ServerMessage::PlayerAttacked {
            player_id, power, ..
        } => {
            assert_eq!(player_id, PlayerId::new("host"));
            assert_eq!(power, 25);
        }
        other => panic!("expected player_attacked first, got {other:?}"),
    }
}

#[tokio::test]
async fn test_messages_before_joining_get_an_error() {
    let url = start_relay().await;
    let loner = SessionProxy::connect(url.as_str()).await.unwrap();
    let mut rx = loner.subscribe();

    loner
        .send_move(Position::default(), Direction::Down, false)
        .await
        .unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::Error { message } => {
            assert!(message.contains("not in a room"));
        }
        other => panic!("expected error, got {other:?}"),
    }
}

// =========================================================================
// Host gating
// =========================================================================

#[tokio::test]
async fn test_forged_host_token_is_rejected_without_side_effects() {
    let url = start_relay().await;
    let (host, mut host_rx, code) = host_in_room(&url).await;

    // A raw socket takes the guest seat and hand-builds a monster_update
    // with a forged token.
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let join = serde_json::json!({
        "type": "join_room",
        "room_code": code.as_str(),
        "player_id": "raw",
        "player_data": {
            "name": "Raw", "class_id": "warrior", "attack": 1, "hp": 1
        },
    });
    ws.send(Message::Text(join.to_string().into())).await.unwrap();
    let reply = ws.next().await.unwrap().unwrap();
    let reply: serde_json::Value =
        serde_json::from_str(reply.to_text().unwrap()).unwrap();
    assert_eq!(reply["type"], "room_joined");
    assert_eq!(reply["is_host"], false);
    let _ = next_msg(&mut host_rx).await; // player_joined

    let forged = serde_json::json!({
        "type": "monster_update",
        "host_token": "deadbeef",
        "monsters": [],
    });
    ws.send(Message::Text(forged.to_string().into())).await.unwrap();
    let reply = ws.next().await.unwrap().unwrap();
    let reply: serde_json::Value =
        serde_json::from_str(reply.to_text().unwrap()).unwrap();
    assert_eq!(reply["type"], "error");

    // The host saw no monsters_updated; its next reply is the unchanged
    // (empty) game state.
    host.request_game_state().await.unwrap();
    match next_msg(&mut host_rx).await {
        ServerMessage::GameStateResponse { game_state } => {
            assert_eq!(game_state.monsters, Some(vec![]));
        }
        other => panic!("expected game_state_response, got {other:?}"),
    }
}

#[tokio::test]
async fn test_guest_proxy_refuses_host_calls_locally() {
    let url = start_relay().await;
    let (_host, _host_rx, code) = host_in_room(&url).await;
    let (guest, _guest_rx) = guest_in_room(&url, &code).await;

    let err = guest.send_monster_update(vec![]).await.unwrap_err();
    assert!(err.to_string().contains("not the room host"));
}

#[tokio::test]
async fn test_host_state_sync_reaches_the_guest() {
    let url = start_relay().await;
    let (host, mut host_rx, code) = host_in_room(&url).await;
    let (_guest, mut guest_rx) = guest_in_room(&url, &code).await;
    let _ = next_msg(&mut host_rx).await; // player_joined

    host.sync_game_state(GameStatePatch {
        monsters: Some(vec![]),
        loot_boxes: Some(vec![LootBox {
            id: "chest-1".into(),
            owner_id: None,
            owner_name: String::new(),
            picked_by: None,
            picked_at: None,
        }]),
    })
    .await
    .unwrap();

    match next_msg(&mut guest_rx).await {
        ServerMessage::GameStateSynced { game_state } => {
            let boxes = game_state.loot_boxes.unwrap();
            assert_eq!(boxes[0].id, "chest-1");
        }
        other => panic!("expected game_state_synced, got {other:?}"),
    }
}

// =========================================================================
// Loot arbitration
// =========================================================================

#[tokio::test]
async fn test_loot_race_has_one_winner() {
    let url = start_relay().await;
    let (host, mut host_rx, code) = host_in_room(&url).await;
    let (guest, mut guest_rx) = guest_in_room(&url, &code).await;
    let _ = next_msg(&mut host_rx).await; // player_joined

    // A kill spawns loot owned by the killer.
    host.report_monster_death(
        7,
        PlayerId::new("host"),
        "Ari",
        Position::new(50.0, 50.0),
    )
    .await
    .unwrap();
    let loot_id = match next_msg(&mut guest_rx).await {
        ServerMessage::MonsterDied {
            monster_id,
            loot_box,
            ..
        } => {
            assert_eq!(monster_id, 7);
            loot_box.expect("kill spawns loot").id
        }
        other => panic!("expected monster_died, got {other:?}"),
    };

    // The guest tries to grab the host's loot: ownership conflict.
    guest.pickup_loot_box(loot_id.as_str()).await.unwrap();
    match next_msg(&mut guest_rx).await {
        ServerMessage::LootboxPickupFailed { message } => {
            assert!(message.contains("belongs to Ari"), "got: {message}");
        }
        other => panic!("expected pickup failure, got {other:?}"),
    }

    // The owner takes it; everyone sees exactly one successful pickup.
    let _ = next_msg(&mut host_rx).await; // monster_died
    host.pickup_loot_box(loot_id.as_str()).await.unwrap();
    match next_msg(&mut guest_rx).await {
        ServerMessage::LootboxPicked {
            loot_box,
            player_id,
        } => {
            assert_eq!(player_id, PlayerId::new("host"));
            assert_eq!(loot_box.picked_by, Some(PlayerId::new("host")));
        }
        other => panic!("expected lootbox_picked, got {other:?}"),
    }

    // A second grab finds nothing: picked boxes leave the room atomically.
    guest.pickup_loot_box(loot_id.as_str()).await.unwrap();
    match next_msg(&mut guest_rx).await {
        ServerMessage::LootboxPickupFailed { message } => {
            assert!(message.contains("not found"), "got: {message}");
        }
        other => panic!("expected pickup failure, got {other:?}"),
    }
}

// =========================================================================
// Departure cleanup
// =========================================================================

#[tokio::test]
async fn test_disconnect_runs_the_leave_path() {
    let url = start_relay().await;
    let (_host, mut host_rx, code) = host_in_room(&url).await;
    let (guest, _guest_rx) = guest_in_room(&url, &code).await;
    let _ = next_msg(&mut host_rx).await; // player_joined

    guest.close().await.unwrap();
    match next_msg(&mut host_rx).await {
        ServerMessage::PlayerDisconnected { player_id } => {
            assert_eq!(player_id, PlayerId::new("guest"));
        }
        other => panic!("expected player_disconnected, got {other:?}"),
    }

    // The seat is free again.
    let (_guest2, _rx2) = guest_in_room(&url, &code).await;
}

#[tokio::test]
async fn test_explicit_leave_notifies_the_room() {
    let url = start_relay().await;
    let (_host, mut host_rx, code) = host_in_room(&url).await;
    let (guest, _guest_rx) = guest_in_room(&url, &code).await;
    let _ = next_msg(&mut host_rx).await; // player_joined

    guest.leave_room().await.unwrap();
    match next_msg(&mut host_rx).await {
        ServerMessage::PlayerLeft { player_id } => {
            assert_eq!(player_id, PlayerId::new("guest"));
        }
        other => panic!("expected player_left, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_room_disappears_from_listing() {
    let url = start_relay().await;
    let (host, _host_rx, _code) = host_in_room(&url).await;

    host.leave_room().await.unwrap();
    // Let the relay process the leave before the listing query races it.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let observer = SessionProxy::connect(url.as_str()).await.unwrap();
    let mut rx = observer.subscribe();
    observer.get_public_rooms().await.unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::PublicRooms { rooms } => {
            assert!(rooms.is_empty(), "room should be gone: {rooms:?}");
        }
        other => panic!("expected public_rooms, got {other:?}"),
    }
}

// =========================================================================
// Reconnection
// =========================================================================

/// Waits for the proxy's own `Disconnected` event.
async fn expect_disconnect(rx: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        let event =
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for disconnect")
                .expect("event channel closed");
        if matches!(event, SessionEvent::Disconnected) {
            return;
        }
    }
}

#[tokio::test]
async fn test_reconnect_starts_a_fresh_session() {
    let url = start_relay().await;
    let (_host, mut host_rx, code) = host_in_room(&url).await;
    let (guest, mut guest_rx) = guest_in_room(&url, &code).await;
    let _ = next_msg(&mut host_rx).await; // player_joined

    guest.close().await.unwrap();
    expect_disconnect(&mut guest_rx).await;

    // No socket, no sends.
    let err = guest.get_public_rooms().await.unwrap_err();
    assert!(matches!(err, ProxyError::NotConnected));

    // Make sure the relay has freed the seat before rejoining.
    match next_msg(&mut host_rx).await {
        ServerMessage::PlayerDisconnected { player_id } => {
            assert_eq!(player_id, PlayerId::new("guest"));
        }
        other => panic!("expected player_disconnected, got {other:?}"),
    }

    guest.reconnect(3).await.unwrap();
    // Nothing is recovered: no room, no host status.
    assert!(guest.room_code().is_none());
    assert!(!guest.is_host());

    let mut rx = guest.subscribe();
    guest
        .join_room(code.clone(), PlayerId::new("guest"), profile("Bren"))
        .await
        .unwrap();
    match next_msg(&mut rx).await {
        ServerMessage::RoomJoined { is_host, .. } => assert!(!is_host),
        other => panic!("expected room_joined, got {other:?}"),
    }
    assert_eq!(guest.room_code(), Some(code));
}

#[tokio::test]
async fn test_reconnect_gives_up_when_the_relay_is_gone() {
    let server = RelayServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("relay should build");
    let addr = server.local_addr().expect("should have local addr");
    let relay = tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let url = format!("ws://{addr}");

    let proxy = SessionProxy::connect(url.as_str()).await.unwrap();
    let mut rx = proxy.subscribe();

    // Take the listener down, then drop our own socket.
    relay.abort();
    proxy.close().await.unwrap();
    expect_disconnect(&mut rx).await;

    let err = proxy.reconnect(2).await.unwrap_err();
    assert!(matches!(err, ProxyError::ReconnectFailed { attempts: 2 }));
}
