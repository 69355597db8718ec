//! Combat tuning knobs.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// All distances are in world units, all times in seconds.
///
/// Defaults match the shipped maps; callers tweak individual fields with
/// struct-update syntax and the sim calls [`validated`](Self::validated)
/// before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTuning {
    /// A dormant monster wakes when a player comes this close.
    pub detection_radius: f32,
    /// Within this range a chasing monster starts swinging.
    pub attack_radius: f32,
    /// Straying this far from home aborts the chase.
    pub leash_radius: f32,
    /// Movement speed while chasing, units/s.
    pub chase_speed: f32,
    /// Movement speed while walking home, units/s.
    pub return_speed: f32,
    /// Seconds between monster melee swings.
    pub attack_interval: f32,
    /// Damage per monster swing.
    pub attack_damage: i32,
    /// Seconds a returned monster stays calm at home before it can
    /// re-aggro.
    pub return_grace: f32,
    /// Seconds a dead monster stays in the roster so clients can play
    /// the death animation.
    pub death_linger: f32,
    /// Melee splash reaches monsters this close to the primary target.
    pub splash_radius: f32,
    /// Fraction of the primary hit dealt to splashed monsters.
    pub splash_fraction: f32,
}

impl Default for SimTuning {
    fn default() -> Self {
        Self {
            detection_radius: 160.0,
            attack_radius: 40.0,
            leash_radius: 320.0,
            chase_speed: 60.0,
            return_speed: 90.0,
            attack_interval: 1.2,
            attack_damage: 8,
            return_grace: 1.5,
            death_linger: 0.8,
            splash_radius: 48.0,
            splash_fraction: 0.30,
        }
    }
}

impl SimTuning {
    /// Clamp and fix any out-of-range values so the tuning is safe to use.
    ///
    /// Called automatically by [`CombatSim::new`](crate::CombatSim::new).
    /// Rules:
    /// - Radii and speeds are forced non-negative.
    /// - `attack_radius` forced ≤ `detection_radius` ≤ `leash_radius`.
    /// - `splash_fraction` clamped to `0.0..=1.0`.
    /// - `attack_interval` floored at 0.1 s.
    pub fn validated(mut self) -> Self {
        self.detection_radius = self.detection_radius.max(0.0);
        self.attack_radius = self.attack_radius.max(0.0);
        self.leash_radius = self.leash_radius.max(0.0);
        self.chase_speed = self.chase_speed.max(0.0);
        self.return_speed = self.return_speed.max(0.0);
        self.return_grace = self.return_grace.max(0.0);
        self.death_linger = self.death_linger.max(0.0);
        self.splash_radius = self.splash_radius.max(0.0);

        if self.attack_radius > self.detection_radius {
            warn!(
                attack = self.attack_radius,
                detection = self.detection_radius,
                "attack_radius exceeds detection_radius — clamping"
            );
            self.attack_radius = self.detection_radius;
        }
        if self.detection_radius > self.leash_radius {
            warn!(
                detection = self.detection_radius,
                leash = self.leash_radius,
                "detection_radius exceeds leash_radius — clamping"
            );
            self.detection_radius = self.leash_radius;
        }
        self.splash_fraction = self.splash_fraction.clamp(0.0, 1.0);
        if self.attack_interval < 0.1 {
            self.attack_interval = 0.1;
        }
        self
    }
}
