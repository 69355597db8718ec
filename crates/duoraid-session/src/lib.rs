//! Connection registry for the Duoraid relay.
//!
//! Maps each open connection to its outbound message channel and, once the
//! player has joined a room, to a `(playerId, roomCode)` binding. This is the
//! addressing table the router fans broadcasts out through.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is not thread-safe by itself — it is a plain map,
//! owned behind a single `tokio::sync::Mutex` in the relay's shared state.
//! Keeping it simple here avoids hidden locking.

mod error;
mod registry;

pub use error::SessionError;
pub use registry::{Binding, ConnectionRegistry};
