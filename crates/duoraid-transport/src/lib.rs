//! WebSocket transport for Duoraid.
//!
//! The relay listens with [`WebSocketListener`]; clients dial with
//! [`WebSocketConnection::connect`]. Frames are text (the protocol is JSON).
//! The [`Connection`] trait is the seam the router and client proxy code
//! against, so an in-memory transport can replace the socket in tests.

#![allow(async_fn_in_trait)]

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{
    ClientConnection, ServerConnection, WebSocketConnection,
    WebSocketListener,
};

use std::fmt;

/// Opaque identifier for a connection, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single connection carrying text frames.
///
/// Send and receive lock independent halves of the socket, so one task can
/// sit in `recv` while another writes.
pub trait Connection: Send + Sync + 'static {
    /// Sends one text frame to the peer.
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Receives the next text frame. `Ok(None)` means a clean close.
    async fn recv(&self) -> Result<Option<String>, TransportError>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
