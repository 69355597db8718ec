//! Per-connection handler: decode, route, fan out.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's outbound queue. The
//! reader loop decodes one [`ClientMessage`] per frame and dispatches it.
//! Undecodable frames get a unicast `error` and the connection stays open.
//!
//! A socket close runs the exact same leave path as an explicit
//! `leave_room` — the only difference is which message the rest of the
//! room sees (`player_disconnected` vs `player_left`).

use std::sync::Arc;

use duoraid_protocol::{
    ClientMessage, Codec, GameStatePatch, MonsterState, PlayerId,
    Position, ServerMessage,
};
use duoraid_session::Binding;
use duoraid_transport::{Connection, ConnectionId, ServerConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::RelayError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: ServerConnection,
    state: Arc<ServerState>,
) -> Result<(), RelayError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // Outbound queue: dispatch pushes ServerMessages, the writer task
    // encodes and sends them. Registered before the first recv so a
    // broadcast can never miss this connection.
    let (tx, rx) = mpsc::unbounded_channel();
    state.connections.lock().await.register(conn_id, tx);
    let writer = spawn_writer(conn.clone(), rx);

    loop {
        let text = match conn.recv().await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "undecodable frame");
                unicast(
                    &state,
                    conn_id,
                    ServerMessage::Error {
                        message: format!("invalid message: {e}"),
                    },
                )
                .await;
                continue;
            }
        };

        dispatch(conn_id, msg, &state).await;
    }

    // Socket gone: tear down membership and tell the room.
    let binding = state.connections.lock().await.remove(conn_id);
    if let Some(binding) = binding {
        let outcome = state
            .rooms
            .lock()
            .await
            .leave_room(&binding.player_id);
        if let Some(outcome) = outcome {
            tracing::info!(
                %conn_id,
                player_id = %outcome.player_id,
                room = %outcome.room_code,
                "player disconnected"
            );
            state.connections.lock().await.broadcast_room(
                &outcome.room_code,
                &ServerMessage::PlayerDisconnected {
                    player_id: outcome.player_id,
                },
            );
        }
    }

    // The registry dropped the sender, so the writer drains and exits.
    let _ = writer.await;
    Ok(())
}

/// Drains the outbound queue onto the socket. Exits when the queue closes
/// (connection removed from the registry) or the socket rejects a send.
fn spawn_writer(
    conn: ServerConnection,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match duoraid_protocol::JsonCodec.encode(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if let Err(e) = conn.send(&text).await {
                tracing::debug!(error = %e, "send failed, stopping writer");
                break;
            }
        }
    })
}

/// Routes one decoded message. Every arm locks at most one registry at a
/// time and never holds a lock across a socket operation.
async fn dispatch(
    conn_id: ConnectionId,
    msg: ClientMessage,
    state: &Arc<ServerState>,
) {
    match msg {
        ClientMessage::CreateRoom {
            player_id,
            player_data: _,
            map_name,
            is_public,
        } => handle_create_room(conn_id, player_id, map_name, is_public, state).await,

        ClientMessage::JoinRoom {
            room_code,
            player_id,
            player_data,
        } => {
            handle_join_room(conn_id, room_code, player_id, player_data, state)
                .await
        }

        ClientMessage::LeaveRoom => handle_leave_room(conn_id, state).await,

        ClientMessage::GetPublicRooms => {
            let rooms = state.rooms.lock().await.public_rooms();
            unicast(state, conn_id, ServerMessage::PublicRooms { rooms })
                .await;
        }

        ClientMessage::PlayerMove {
            position,
            direction,
            is_moving,
        } => {
            let Some(binding) = require_binding(conn_id, state).await else {
                return;
            };
            state.rooms.lock().await.update_player_position(
                &binding.player_id,
                position,
                direction,
                is_moving,
            );
            broadcast_except(
                state,
                &binding,
                conn_id,
                ServerMessage::PlayerMoved {
                    player_id: binding.player_id.clone(),
                    position,
                    direction,
                    is_moving,
                },
            )
            .await;
        }

        ClientMessage::PlayerAttack {
            position,
            direction,
            class_id,
            power,
        } => {
            let Some(binding) = require_binding(conn_id, state).await else {
                return;
            };
            // Everyone renders the swing, the attacker included.
            broadcast_all(
                state,
                &binding,
                ServerMessage::PlayerAttacked {
                    player_id: binding.player_id.clone(),
                    position,
                    direction,
                    class_id,
                    power,
                },
            )
            .await;
        }

        ClientMessage::MonsterUpdate {
            host_token,
            monsters,
        } => {
            handle_monster_update(conn_id, host_token, monsters, state)
                .await
        }

        ClientMessage::PlayerHpUpdate { hp } => {
            let Some(binding) = require_binding(conn_id, state).await else {
                return;
            };
            state
                .rooms
                .lock()
                .await
                .update_player_hp(&binding.player_id, hp);
            broadcast_except(
                state,
                &binding,
                conn_id,
                ServerMessage::PlayerHpUpdated {
                    player_id: binding.player_id.clone(),
                    hp,
                },
            )
            .await;
        }

        ClientMessage::GameStateSync {
            host_token,
            game_state,
        } => {
            handle_game_state_sync(conn_id, host_token, game_state, state)
                .await
        }

        ClientMessage::RequestGameState => {
            let Some(binding) = require_binding(conn_id, state).await else {
                return;
            };
            let result =
                state.rooms.lock().await.game_state(&binding.room_code);
            match result {
                Ok((monsters, loot_boxes)) => {
                    unicast(
                        state,
                        conn_id,
                        ServerMessage::GameStateResponse {
                            game_state: GameStatePatch {
                                monsters: Some(monsters),
                                loot_boxes: Some(loot_boxes),
                            },
                        },
                    )
                    .await;
                }
                Err(e) => {
                    unicast(
                        state,
                        conn_id,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }

        ClientMessage::LootboxPickup { loot_box_id } => {
            handle_lootbox_pickup(conn_id, loot_box_id, state).await
        }

        ClientMessage::MonsterDamage {
            monster_id,
            damage,
            attacker_id,
        } => {
            let Some(binding) = require_binding(conn_id, state).await else {
                return;
            };
            // Pure relay: the host's simulation is the one applying the
            // damage; authoritative hp arrives in the next monster_update.
            broadcast_except(
                state,
                &binding,
                conn_id,
                ServerMessage::MonsterDamaged {
                    monster_id,
                    damage,
                    attacker_id,
                },
            )
            .await;
        }

        ClientMessage::MonsterDeath {
            monster_id,
            killer_id,
            killer_name,
            position,
        } => {
            handle_monster_death(
                conn_id, monster_id, killer_id, killer_name, position, state,
            )
            .await
        }
    }
}

// ---------------------------------------------------------------------------
// Room lifecycle
// ---------------------------------------------------------------------------

async fn handle_create_room(
    conn_id: ConnectionId,
    player_id: PlayerId,
    map_name: String,
    is_public: bool,
    state: &Arc<ServerState>,
) {
    let result = state.rooms.lock().await.create_room(
        player_id,
        map_name,
        is_public,
    );
    let reply = match result {
        Ok(created) => ServerMessage::RoomCreated {
            room_code: created.code,
            is_public: created.is_public,
            map_name: created.map_name,
            host_token: created.host_token,
        },
        Err(e) => ServerMessage::Error {
            message: e.to_string(),
        },
    };
    unicast(state, conn_id, reply).await;
}

async fn handle_join_room(
    conn_id: ConnectionId,
    room_code: duoraid_protocol::RoomCode,
    player_id: PlayerId,
    player_data: duoraid_protocol::PlayerProfile,
    state: &Arc<ServerState>,
) {
    if state.connections.lock().await.binding(conn_id).is_some() {
        unicast(
            state,
            conn_id,
            ServerMessage::Error {
                message: "already in a room".into(),
            },
        )
        .await;
        return;
    }

    let result = state.rooms.lock().await.join_room(
        &room_code,
        player_id.clone(),
        player_data,
    );
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            unicast(
                state,
                conn_id,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let joined_player = snapshot
        .players
        .iter()
        .find(|p| p.id == player_id)
        .cloned();

    {
        let mut connections = state.connections.lock().await;
        if let Err(e) = connections.bind(
            conn_id,
            player_id.clone(),
            snapshot.code.clone(),
        ) {
            tracing::debug!(%conn_id, error = %e, "bind failed");
        }
        connections.send_to(
            conn_id,
            ServerMessage::RoomJoined {
                room_code: snapshot.code.clone(),
                players: snapshot.players,
                monsters: snapshot.monsters,
                loot_boxes: snapshot.loot_boxes,
                is_host: snapshot.host_id == player_id,
                host_id: snapshot.host_id,
            },
        );
        if let Some(player) = joined_player {
            connections.broadcast_room_except(
                &snapshot.code,
                conn_id,
                &ServerMessage::PlayerJoined { player },
            );
        }
    }
}

/// Explicit leave. The leaver gets no acknowledgement; it is unbound
/// before the broadcast so only the remaining member hears `player_left`.
async fn handle_leave_room(conn_id: ConnectionId, state: &Arc<ServerState>) {
    let binding = state.connections.lock().await.unbind(conn_id);
    let Some(binding) = binding else {
        return;
    };
    let outcome = state
        .rooms
        .lock()
        .await
        .leave_room(&binding.player_id);
    if let Some(outcome) = outcome {
        state.connections.lock().await.broadcast_room(
            &outcome.room_code,
            &ServerMessage::PlayerLeft {
                player_id: outcome.player_id,
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Host-gated state
// ---------------------------------------------------------------------------

async fn handle_monster_update(
    conn_id: ConnectionId,
    host_token: String,
    monsters: Vec<MonsterState>,
    state: &Arc<ServerState>,
) {
    let Some(binding) = require_binding(conn_id, state).await else {
        return;
    };
    let result = state.rooms.lock().await.update_monsters(
        &binding.room_code,
        &host_token,
        monsters.clone(),
    );
    if result.is_err() {
        reject_host_action(conn_id, &binding, "monster_update", state).await;
        return;
    }
    broadcast_except(
        state,
        &binding,
        conn_id,
        ServerMessage::MonstersUpdated { monsters },
    )
    .await;
}

async fn handle_game_state_sync(
    conn_id: ConnectionId,
    host_token: String,
    game_state: GameStatePatch,
    state: &Arc<ServerState>,
) {
    let Some(binding) = require_binding(conn_id, state).await else {
        return;
    };
    let result = state.rooms.lock().await.sync_game_state(
        &binding.room_code,
        &host_token,
        game_state.clone(),
    );
    if result.is_err() {
        reject_host_action(conn_id, &binding, "game_state_sync", state)
            .await;
        return;
    }
    broadcast_except(
        state,
        &binding,
        conn_id,
        ServerMessage::GameStateSynced { game_state },
    )
    .await;
}

/// Token mismatch: no mutation happened, nothing is broadcast, and only
/// the sender hears about it.
async fn reject_host_action(
    conn_id: ConnectionId,
    binding: &Binding,
    kind: &str,
    state: &Arc<ServerState>,
) {
    tracing::warn!(
        %conn_id,
        player_id = %binding.player_id,
        room = %binding.room_code,
        kind,
        "rejected host-only message with bad token"
    );
    unicast(
        state,
        conn_id,
        ServerMessage::Error {
            message: format!("unauthorized: {kind} requires the host token"),
        },
    )
    .await;
}

// ---------------------------------------------------------------------------
// Loot
// ---------------------------------------------------------------------------

async fn handle_lootbox_pickup(
    conn_id: ConnectionId,
    loot_box_id: String,
    state: &Arc<ServerState>,
) {
    let Some(binding) = require_binding(conn_id, state).await else {
        return;
    };
    // The registry lock is the arbitration point: first caller in wins,
    // everyone after gets an error.
    let result = state.rooms.lock().await.pickup_loot_box(
        &binding.room_code,
        &loot_box_id,
        &binding.player_id,
    );
    match result {
        Ok(loot_box) => {
            broadcast_all(
                state,
                &binding,
                ServerMessage::LootboxPicked {
                    loot_box,
                    player_id: binding.player_id.clone(),
                },
            )
            .await;
        }
        Err(e) => {
            unicast(
                state,
                conn_id,
                ServerMessage::LootboxPickupFailed {
                    message: e.to_string(),
                },
            )
            .await;
        }
    }
}

async fn handle_monster_death(
    conn_id: ConnectionId,
    monster_id: u32,
    killer_id: PlayerId,
    killer_name: String,
    position: Position,
    state: &Arc<ServerState>,
) {
    let Some(binding) = require_binding(conn_id, state).await else {
        return;
    };
    let loot_box = state
        .rooms
        .lock()
        .await
        .spawn_loot_box(
            &binding.room_code,
            killer_id.clone(),
            killer_name.clone(),
        )
        .ok();
    broadcast_all(
        state,
        &binding,
        ServerMessage::MonsterDied {
            monster_id,
            killer_id,
            killer_name,
            position,
            loot_box,
        },
    )
    .await;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The binding for a room-scoped message. Replies with a unicast `error`
/// when the connection never joined a room.
async fn require_binding(
    conn_id: ConnectionId,
    state: &Arc<ServerState>,
) -> Option<Binding> {
    let connections = state.connections.lock().await;
    match connections.binding(conn_id) {
        Some(binding) => Some(binding.clone()),
        None => {
            connections.send_to(
                conn_id,
                ServerMessage::Error {
                    message: "not in a room".into(),
                },
            );
            None
        }
    }
}

async fn unicast(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    msg: ServerMessage,
) {
    state.connections.lock().await.send_to(conn_id, msg);
}

async fn broadcast_all(
    state: &Arc<ServerState>,
    binding: &Binding,
    msg: ServerMessage,
) {
    state
        .connections
        .lock()
        .await
        .broadcast_room(&binding.room_code, &msg);
}

async fn broadcast_except(
    state: &Arc<ServerState>,
    binding: &Binding,
    sender: ConnectionId,
    msg: ServerMessage,
) {
    state
        .connections
        .lock()
        .await
        .broadcast_room_except(&binding.room_code, sender, &msg);
}
