//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a Duoraid relay. It ties together
//! all the layers: transport → protocol → session → room.

use std::sync::Arc;

use duoraid_protocol::JsonCodec;
use duoraid_room::RoomRegistry;
use duoraid_session::ConnectionRegistry;
use duoraid_transport::WebSocketListener;
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::RelayError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The two
/// registries sit behind their own mutexes; handlers take at most one at
/// a time and never hold one across network I/O.
pub(crate) struct ServerState {
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) connections: Mutex<ConnectionRegistry>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,ignore
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }

    /// Sets the address to bind the relay to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<RelayServer, RelayError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomRegistry::new()),
            connections: Mutex::new(ConnectionRegistry::new()),
            codec: JsonCodec,
        });

        Ok(RelayServer { listener, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer {
    listener: WebSocketListener,
    state: Arc<ServerState>,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the relay is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop. Each connection gets its own handler task.
    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), RelayError> {
        tracing::info!("Duoraid relay running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
