//! Room lifecycle and shared-state ownership for Duoraid.
//!
//! The [`RoomRegistry`] is the single authoritative owner of every room's
//! players, monster roster, and loot boxes. The relay holds it behind one
//! mutex and funnels all mutations through it, which serializes every
//! check-then-act operation (loot pickup above all).
//!
//! # Key types
//!
//! - [`RoomRegistry`] — create/join/leave, state updates, loot arbitration
//! - [`Room`] — one live session and its invariants
//! - [`RoomError`] — the failure taxonomy surfaced to clients

mod error;
mod registry;
mod room;

pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{CreatedRoom, LeaveOutcome, MAX_PLAYERS, Room, RoomSnapshot};
