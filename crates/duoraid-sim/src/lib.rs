//! Host-side monster combat simulation for Duoraid.
//!
//! The relay never simulates: monster behavior runs on the room host, and
//! this crate is the piece the host game loop embeds. Guests embed the
//! same type in replica mode and mirror the host's snapshots.
//!
//! # Integration
//!
//! ```ignore
//! let mut sim = CombatSim::new(SimMode::Authority, SimTuning::default());
//! sim.spawn("slime", Position::new(120.0, 80.0), 50);
//!
//! loop {
//!     let events = sim.tick(dt, &players);
//!     // relay sim.monsters() via a monster_update message,
//!     // translate events into monster_damage / monster_death
//! }
//! ```

mod monster;
mod sim;
mod tuning;

pub use sim::{CombatSim, PlayerView, SimEvent, SimMode};
pub use tuning::SimTuning;
