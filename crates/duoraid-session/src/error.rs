//! Error types for the connection registry.

use duoraid_transport::ConnectionId;

/// Errors that can occur while managing connection bindings.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection was never registered (or already removed).
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),

    /// The connection already has a `(player, room)` binding.
    /// A connection maps to at most one pair at a time.
    #[error("connection {0} is already bound to a room")]
    AlreadyBound(ConnectionId),
}
