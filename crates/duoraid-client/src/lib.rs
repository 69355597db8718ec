//! Client-side session proxy for Duoraid.
//!
//! Game clients embed a [`SessionProxy`] instead of speaking the wire
//! protocol by hand: one typed method per outgoing message, a broadcast
//! stream of decoded [`SessionEvent`]s coming back, and automatic
//! bookkeeping of the room code and host capability token.

mod error;
mod proxy;

pub use error::ProxyError;
pub use proxy::{SessionEvent, SessionProxy};
