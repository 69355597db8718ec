//! The session proxy: a game client's handle on the relay.
//!
//! [`SessionProxy`] owns the websocket, runs a background reader that
//! fans incoming [`ServerMessage`]s out over a broadcast channel, and
//! exposes one typed method per client message kind. It also keeps the
//! little bookkeeping the typed API needs: the current room code, whether
//! this peer is the host, and the host capability token (which only ever
//! arrives in `room_created`).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use duoraid_protocol::{
    ClassId, ClientMessage, Codec, Direction, GameStatePatch, JsonCodec,
    MonsterState, PlayerId, PlayerProfile, Position, RoomCode,
    ServerMessage,
};
use duoraid_transport::{ClientConnection, Connection};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::ProxyError;

/// Buffered events per subscriber. Slow subscribers lag, they don't
/// block the reader.
const EVENT_CAPACITY: usize = 256;

/// What subscribers see.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A decoded message from the relay.
    Message(ServerMessage),
    /// The connection dropped. The proxy does not auto-reconnect.
    Disconnected,
}

/// Session bookkeeping, maintained by the reader task.
#[derive(Debug, Clone, Default)]
struct SessionInfo {
    room_code: Option<RoomCode>,
    is_host: bool,
    host_token: Option<String>,
}

impl SessionInfo {
    fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::RoomCreated {
                room_code,
                host_token,
                ..
            } => {
                self.room_code = Some(room_code.clone());
                self.is_host = true;
                self.host_token = Some(host_token.clone());
            }
            ServerMessage::RoomJoined {
                room_code, is_host, ..
            } => {
                self.room_code = Some(room_code.clone());
                self.is_host = *is_host;
            }
            _ => {}
        }
    }
}

struct Inner {
    url: String,
    codec: JsonCodec,
    conn: Mutex<Option<ClientConnection>>,
    events: broadcast::Sender<SessionEvent>,
    session: Mutex<SessionInfo>,
}

/// Cheaply cloneable handle; clones share the connection and session.
#[derive(Clone)]
pub struct SessionProxy {
    inner: Arc<Inner>,
}

impl SessionProxy {
    /// Dials the relay and starts the background reader.
    pub async fn connect(url: impl Into<String>) -> Result<Self, ProxyError> {
        let url = url.into();
        let conn = ClientConnection::connect(&url).await?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let proxy = Self {
            inner: Arc::new(Inner {
                url,
                codec: JsonCodec,
                conn: Mutex::new(Some(conn.clone())),
                events,
                session: Mutex::new(SessionInfo::default()),
            }),
        };
        proxy.spawn_reader(conn);
        Ok(proxy)
    }

    /// Subscribes to relay events. Each subscriber gets every event from
    /// the point of subscription on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// The room this proxy last created or joined.
    pub fn room_code(&self) -> Option<RoomCode> {
        self.inner.session.lock().unwrap().room_code.clone()
    }

    /// `true` once a `room_created` or a `room_joined` with `is_host` has
    /// been seen.
    pub fn is_host(&self) -> bool {
        self.inner.session.lock().unwrap().is_host
    }

    // -----------------------------------------------------------------
    // Room lifecycle
    // -----------------------------------------------------------------

    pub async fn create_room(
        &self,
        player_id: PlayerId,
        player_data: PlayerProfile,
        map_name: impl Into<String>,
        is_public: bool,
    ) -> Result<(), ProxyError> {
        self.send(&ClientMessage::CreateRoom {
            player_id,
            player_data,
            map_name: map_name.into(),
            is_public,
        })
        .await
    }

    pub async fn join_room(
        &self,
        room_code: RoomCode,
        player_id: PlayerId,
        player_data: PlayerProfile,
    ) -> Result<(), ProxyError> {
        self.send(&ClientMessage::JoinRoom {
            room_code,
            player_id,
            player_data,
        })
        .await
    }

    /// Leaves the current room and forgets the local session state. The
    /// relay sends no acknowledgement to the leaver.
    pub async fn leave_room(&self) -> Result<(), ProxyError> {
        self.send(&ClientMessage::LeaveRoom).await?;
        *self.inner.session.lock().unwrap() = SessionInfo::default();
        Ok(())
    }

    pub async fn get_public_rooms(&self) -> Result<(), ProxyError> {
        self.send(&ClientMessage::GetPublicRooms).await
    }

    // -----------------------------------------------------------------
    // Gameplay
    // -----------------------------------------------------------------

    pub async fn send_move(
        &self,
        position: Position,
        direction: Direction,
        is_moving: bool,
    ) -> Result<(), ProxyError> {
        self.send(&ClientMessage::PlayerMove {
            position,
            direction,
            is_moving,
        })
        .await
    }

    pub async fn send_attack(
        &self,
        position: Position,
        direction: Direction,
        class_id: ClassId,
        power: i32,
    ) -> Result<(), ProxyError> {
        self.send(&ClientMessage::PlayerAttack {
            position,
            direction,
            class_id,
            power,
        })
        .await
    }

    pub async fn send_hp_update(&self, hp: i32) -> Result<(), ProxyError> {
        self.send(&ClientMessage::PlayerHpUpdate { hp }).await
    }

    pub async fn pickup_loot_box(
        &self,
        loot_box_id: impl Into<String>,
    ) -> Result<(), ProxyError> {
        self.send(&ClientMessage::LootboxPickup {
            loot_box_id: loot_box_id.into(),
        })
        .await
    }

    pub async fn report_monster_damage(
        &self,
        monster_id: u32,
        damage: i32,
        attacker_id: PlayerId,
    ) -> Result<(), ProxyError> {
        self.send(&ClientMessage::MonsterDamage {
            monster_id,
            damage,
            attacker_id,
        })
        .await
    }

    pub async fn report_monster_death(
        &self,
        monster_id: u32,
        killer_id: PlayerId,
        killer_name: impl Into<String>,
        position: Position,
    ) -> Result<(), ProxyError> {
        self.send(&ClientMessage::MonsterDeath {
            monster_id,
            killer_id,
            killer_name: killer_name.into(),
            position,
        })
        .await
    }

    // -----------------------------------------------------------------
    // Host-only messages
    // -----------------------------------------------------------------

    /// Pushes the host's monster roster. Fails with [`ProxyError::NotHost`]
    /// when this peer holds no capability token.
    pub async fn send_monster_update(
        &self,
        monsters: Vec<MonsterState>,
    ) -> Result<(), ProxyError> {
        let host_token = self.host_token()?;
        self.send(&ClientMessage::MonsterUpdate {
            host_token,
            monsters,
        })
        .await
    }

    /// Pushes a partial shared-state overwrite. Host only.
    pub async fn sync_game_state(
        &self,
        game_state: GameStatePatch,
    ) -> Result<(), ProxyError> {
        let host_token = self.host_token()?;
        self.send(&ClientMessage::GameStateSync {
            host_token,
            game_state,
        })
        .await
    }

    pub async fn request_game_state(&self) -> Result<(), ProxyError> {
        self.send(&ClientMessage::RequestGameState).await
    }

    // -----------------------------------------------------------------
    // Connection management
    // -----------------------------------------------------------------

    /// Dials the relay again after a disconnect, with linear backoff.
    ///
    /// Session state is NOT recovered: the relay already tore down the
    /// room membership when the old socket dropped, so the caller must
    /// create or join a room again.
    pub async fn reconnect(&self, max_attempts: u32) -> Result<(), ProxyError> {
        *self.inner.session.lock().unwrap() = SessionInfo::default();

        for attempt in 1..=max_attempts {
            match ClientConnection::connect(&self.inner.url).await {
                Ok(conn) => {
                    debug!(attempt, "reconnected to relay");
                    *self.inner.conn.lock().unwrap() = Some(conn.clone());
                    self.spawn_reader(conn);
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "reconnect attempt failed");
                    tokio::time::sleep(Duration::from_millis(
                        200 * attempt as u64,
                    ))
                    .await;
                }
            }
        }
        Err(ProxyError::ReconnectFailed {
            attempts: max_attempts,
        })
    }

    /// Closes the socket. The reader task observes the close and emits
    /// [`SessionEvent::Disconnected`].
    pub async fn close(&self) -> Result<(), ProxyError> {
        let conn = self.inner.conn.lock().unwrap().take();
        if let Some(conn) = conn {
            conn.close().await?;
        }
        Ok(())
    }

    fn host_token(&self) -> Result<String, ProxyError> {
        self.inner
            .session
            .lock()
            .unwrap()
            .host_token
            .clone()
            .ok_or(ProxyError::NotHost)
    }

    async fn send(&self, msg: &ClientMessage) -> Result<(), ProxyError> {
        let conn = self
            .inner
            .conn
            .lock()
            .unwrap()
            .clone()
            .ok_or(ProxyError::NotConnected)?;
        let text = self.inner.codec.encode(msg)?;
        conn.send(&text).await?;
        Ok(())
    }

    fn spawn_reader(&self, conn: ClientConnection) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                match conn.recv().await {
                    Ok(Some(text)) => {
                        let msg: ServerMessage =
                            match inner.codec.decode(&text) {
                                Ok(msg) => msg,
                                Err(e) => {
                                    warn!(error = %e, "undecodable relay message");
                                    continue;
                                }
                            };
                        inner.session.lock().unwrap().apply(&msg);
                        let _ = inner.events.send(SessionEvent::Message(msg));
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "connection error");
                        break;
                    }
                }
            }
            inner.conn.lock().unwrap().take();
            let _ = inner.events.send(SessionEvent::Disconnected);
            debug!("reader task finished");
        });
    }
}
