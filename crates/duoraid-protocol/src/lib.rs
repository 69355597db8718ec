//! Wire protocol for Duoraid.
//!
//! Defines the contract every other component speaks:
//!
//! - **Types** ([`PlayerState`], [`MonsterState`], [`LootBox`], identity
//!   newtypes) — the shared data model.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]) — the closed,
//!   internally tagged message set.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — conversion to/from text frames.
//!
//! The protocol layer sits between transport (frames) and the session/room
//! layers (identity and state). It knows nothing about connections or rooms.

mod codec;
mod error;
mod message;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{ClientMessage, ServerMessage};
pub use types::{
    ClassId, Direction, GameStatePatch, LootBox, MonsterState, PlayerId,
    PlayerProfile, PlayerState, Position, PublicRoomInfo, RoomCode,
};
