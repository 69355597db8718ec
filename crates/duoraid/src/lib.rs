//! # Duoraid
//!
//! Message relay for two-player co-op combat sessions.
//!
//! The relay owns room lifecycle, membership, and first-come-first-served
//! loot arbitration; monster behavior runs on the room host (see
//! `duoraid-sim`) and the relay redistributes its snapshots. Host-only
//! messages are gated by a capability token issued at room creation.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use duoraid::RelayServer;
//!
//! # async fn run() -> Result<(), duoraid::RelayError> {
//! let server = RelayServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::RelayError;
pub use server::{RelayServer, RelayServerBuilder};
