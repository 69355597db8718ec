//! Error types for the client proxy.

use duoraid_protocol::ProtocolError;
use duoraid_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The proxy has no live connection. Call `reconnect` first.
    #[error("not connected")]
    NotConnected,

    /// A host-only message was attempted without a host token, i.e. this
    /// peer never received a `room_created`.
    #[error("this peer is not the room host")]
    NotHost,

    /// All reconnect attempts failed.
    #[error("reconnect failed after {attempts} attempts")]
    ReconnectFailed { attempts: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
