//! The connection registry: who is on which connection, in which room.

use std::collections::HashMap;

use duoraid_protocol::{PlayerId, RoomCode, ServerMessage};
use duoraid_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::SessionError;

/// A connection's room membership: set on join, cleared on leave or close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub player_id: PlayerId,
    pub room_code: RoomCode,
}

/// One registered connection: its outbound channel plus an optional binding.
struct PeerEntry {
    sender: mpsc::UnboundedSender<ServerMessage>,
    binding: Option<Binding>,
}

/// Tracks every open connection and fans messages out to room members.
///
/// Fan-out only ever addresses connections bound to the named room; an
/// unbound connection can receive unicasts but never broadcasts.
#[derive(Default)]
pub struct ConnectionRegistry {
    peers: HashMap<ConnectionId, PeerEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    /// Registers a freshly accepted connection with its outbound channel.
    pub fn register(
        &mut self,
        conn_id: ConnectionId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.peers.insert(
            conn_id,
            PeerEntry {
                sender,
                binding: None,
            },
        );
        tracing::debug!(%conn_id, "connection registered");
    }

    /// Binds a connection to `(player, room)` after a successful join.
    pub fn bind(
        &mut self,
        conn_id: ConnectionId,
        player_id: PlayerId,
        room_code: RoomCode,
    ) -> Result<(), SessionError> {
        let entry = self
            .peers
            .get_mut(&conn_id)
            .ok_or(SessionError::NotRegistered(conn_id))?;
        if entry.binding.is_some() {
            return Err(SessionError::AlreadyBound(conn_id));
        }
        tracing::debug!(%conn_id, %player_id, %room_code, "connection bound");
        entry.binding = Some(Binding {
            player_id,
            room_code,
        });
        Ok(())
    }

    /// Returns the binding for a connection, if any.
    pub fn binding(&self, conn_id: ConnectionId) -> Option<&Binding> {
        self.peers.get(&conn_id).and_then(|e| e.binding.as_ref())
    }

    /// Clears a connection's binding (explicit leave), returning it.
    /// The connection stays registered and can join another room.
    pub fn unbind(&mut self, conn_id: ConnectionId) -> Option<Binding> {
        self.peers
            .get_mut(&conn_id)
            .and_then(|e| e.binding.take())
    }

    /// Removes a connection entirely (socket closed), returning its binding
    /// so the caller can run the shared leave path.
    pub fn remove(&mut self, conn_id: ConnectionId) -> Option<Binding> {
        let entry = self.peers.remove(&conn_id)?;
        tracing::debug!(%conn_id, "connection removed");
        entry.binding
    }

    /// Unicast to one connection. Silently drops if the receiver is gone —
    /// a closing connection's channel may outlive its usefulness briefly.
    pub fn send_to(&self, conn_id: ConnectionId, msg: ServerMessage) {
        if let Some(entry) = self.peers.get(&conn_id) {
            let _ = entry.sender.send(msg);
        }
    }

    /// Broadcast to every connection bound to `room`.
    pub fn broadcast_room(&self, room: &RoomCode, msg: &ServerMessage) {
        for entry in self.peers.values() {
            if let Some(binding) = &entry.binding {
                if binding.room_code == *room {
                    let _ = entry.sender.send(msg.clone());
                }
            }
        }
    }

    /// Broadcast to every connection bound to `room` except `sender`.
    pub fn broadcast_room_except(
        &self,
        room: &RoomCode,
        sender: ConnectionId,
        msg: &ServerMessage,
    ) {
        for (conn_id, entry) in &self.peers {
            if *conn_id == sender {
                continue;
            }
            if let Some(binding) = &entry.binding {
                if binding.room_code == *room {
                    let _ = entry.sender.send(msg.clone());
                }
            }
        }
    }

    /// Number of registered connections (any binding state).
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// The connection a player is bound through, if any.
    pub fn connection_for_player(
        &self,
        player_id: &PlayerId,
    ) -> Option<ConnectionId> {
        self.peers.iter().find_map(|(conn_id, entry)| {
            entry
                .binding
                .as_ref()
                .filter(|b| b.player_id == *player_id)
                .map(|_| *conn_id)
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
