//! Error types for the room layer.

use duoraid_protocol::{PlayerId, RoomCode};

/// Errors that can occur during room operations.
///
/// The user-visible variants (`RoomNotFound`, `RoomFull`,
/// `OwnershipConflict`, `AlreadyClaimed`) surface as unicast `error` or
/// `lootbox_pickup_failed` messages; none of them ever closes a connection.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The room already holds `max_players` members.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The loot box has an owner and the requester isn't it.
    #[error("loot box belongs to {owner_name}")]
    OwnershipConflict { owner_name: String },

    /// The loot box was already picked up.
    #[error("already picked up")]
    AlreadyClaimed,

    /// A host-only mutation arrived without a valid capability token.
    #[error("unauthorized host action in room {0}")]
    UnauthorizedHostAction(RoomCode),

    /// The loot box id doesn't exist in this room.
    #[error("loot box {0} not found")]
    LootBoxNotFound(String),

    /// The player isn't a member of any room.
    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    /// Room-code generation exhausted its retries. With an 8-character
    /// alphanumeric space this is practically unreachable.
    #[error("could not allocate a unique room code")]
    CodeSpaceExhausted,
}
