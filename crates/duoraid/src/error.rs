//! Unified error type for the relay.

use duoraid_protocol::ProtocolError;
use duoraid_room::RoomError;
use duoraid_session::SessionError;
use duoraid_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (binding bookkeeping).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, loot conflicts).
    #[error(transparent)]
    Room(#[from] RoomError),
}
