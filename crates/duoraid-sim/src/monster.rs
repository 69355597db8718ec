//! Per-monster behavior state machine.
//!
//! Each monster is a small FSM driven by the host's frame loop:
//!
//! ```text
//! Dormant -> Chasing -> Attacking
//!    ^          |           |
//!    |          v           v
//!    +----- Returning <-----+        (leash break or lost target)
//!
//! any state -> Dying -> removed      (hp reaches zero)
//! ```
//!
//! A returning monster walks straight home and ignores players until it
//! arrives and its grace period runs out. `is_activated` is a latch: it
//! stays set once the monster has aggroed, even after it calms down.

use duoraid_protocol::{MonsterState, PlayerId, Position};
use tracing::debug;

use crate::sim::{PlayerView, SimEvent};
use crate::SimTuning;

/// Where a monster is in its behavior cycle.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Phase {
    Dormant,
    Chasing { target: PlayerId },
    Attacking { target: PlayerId, cooldown: f32 },
    Returning { grace: f32 },
    Dying { linger: f32 },
}

pub(crate) struct Monster {
    pub state: MonsterState,
    pub phase: Phase,
}

impl Monster {
    pub fn new(state: MonsterState) -> Self {
        Self {
            state,
            phase: Phase::Dormant,
        }
    }

    /// Alive and not mid-death-animation. Only targetable monsters soak
    /// player damage or splash.
    pub fn is_targetable(&self) -> bool {
        self.state.hp > 0 && !matches!(self.phase, Phase::Dying { .. })
    }

    /// Advances this monster by `dt` seconds, pushing any hits it lands
    /// into `events`.
    pub fn tick(
        &mut self,
        dt: f32,
        players: &[PlayerView],
        tuning: &SimTuning,
        events: &mut Vec<SimEvent>,
    ) {
        match self.phase.clone() {
            Phase::Dormant => self.tick_dormant(players, tuning),
            Phase::Chasing { .. } => self.tick_chasing(dt, players, tuning),
            Phase::Attacking { target, cooldown } => {
                self.tick_attacking(dt, target, cooldown, players, tuning, events)
            }
            Phase::Returning { grace } => self.tick_returning(dt, grace, tuning),
            Phase::Dying { linger } => {
                self.phase = Phase::Dying { linger: linger - dt };
            }
        }
        self.state.is_attacking =
            matches!(self.phase, Phase::Attacking { .. });
    }

    /// `true` once the death animation has played out and the monster can
    /// be dropped from the roster.
    pub fn is_expired(&self) -> bool {
        matches!(self.phase, Phase::Dying { linger } if linger <= 0.0)
    }

    /// Applies a hit. Returns `true` when this hit was lethal.
    pub fn apply_damage(&mut self, damage: i32, tuning: &SimTuning) -> bool {
        if !self.is_targetable() {
            return false;
        }
        self.state.hp = (self.state.hp - damage).max(0);
        if self.state.hp == 0 {
            self.phase = Phase::Dying {
                linger: tuning.death_linger,
            };
            self.state.is_attacking = false;
            debug!(monster = self.state.id, "monster dying");
            true
        } else {
            false
        }
    }

    fn tick_dormant(&mut self, players: &[PlayerView], tuning: &SimTuning) {
        let Some(player) = nearest_player(&self.state.position, players)
        else {
            return;
        };
        if self.state.position.distance_sq(&player.position)
            <= tuning.detection_radius * tuning.detection_radius
        {
            self.state.is_activated = true;
            debug!(
                monster = self.state.id,
                target = %player.id,
                "monster aggroed"
            );
            self.phase = Phase::Chasing {
                target: player.id.clone(),
            };
        }
    }

    /// Chasing retargets every tick, so a closer player steals aggro.
    fn tick_chasing(
        &mut self,
        dt: f32,
        players: &[PlayerView],
        tuning: &SimTuning,
    ) {
        if self.leash_broken(tuning) {
            self.start_returning(tuning);
            return;
        }
        let Some(player) = self.resolve_target(players, tuning) else {
            self.start_returning(tuning);
            return;
        };
        let target = player.id.clone();
        let target_pos = player.position;

        if self.state.position.distance_sq(&target_pos)
            <= tuning.attack_radius * tuning.attack_radius
        {
            // First swing lands after a full interval.
            self.phase = Phase::Attacking {
                target,
                cooldown: tuning.attack_interval,
            };
            return;
        }

        self.state.position = step_toward(
            self.state.position,
            target_pos,
            tuning.chase_speed * dt,
        );
        self.phase = Phase::Chasing { target };
    }

    fn tick_attacking(
        &mut self,
        dt: f32,
        target: PlayerId,
        cooldown: f32,
        players: &[PlayerView],
        tuning: &SimTuning,
        events: &mut Vec<SimEvent>,
    ) {
        let Some(player) = self.resolve_target(players, tuning) else {
            self.start_returning(tuning);
            return;
        };
        if player.id != target {
            // Closer player took over: chase it instead.
            self.phase = Phase::Chasing {
                target: player.id.clone(),
            };
            return;
        }
        if self.state.position.distance_sq(&player.position)
            > tuning.attack_radius * tuning.attack_radius
        {
            self.phase = Phase::Chasing { target };
            return;
        }

        let cooldown = cooldown - dt;
        if cooldown <= 0.0 {
            events.push(SimEvent::PlayerHit {
                monster_id: self.state.id,
                player_id: target.clone(),
                damage: tuning.attack_damage,
            });
            self.phase = Phase::Attacking {
                target,
                cooldown: tuning.attack_interval,
            };
        } else {
            self.phase = Phase::Attacking { target, cooldown };
        }
    }

    fn tick_returning(&mut self, dt: f32, grace: f32, tuning: &SimTuning) {
        let home = self.state.home_position;
        if self.state.position != home {
            self.state.position = step_toward(
                self.state.position,
                home,
                tuning.return_speed * dt,
            );
            self.phase = Phase::Returning { grace };
            return;
        }
        let grace = grace - dt;
        if grace <= 0.0 {
            self.phase = Phase::Dormant;
        } else {
            self.phase = Phase::Returning { grace };
        }
    }

    fn leash_broken(&self, tuning: &SimTuning) -> bool {
        self.state.position.distance_sq(&self.state.home_position)
            > tuning.leash_radius * tuning.leash_radius
    }

    /// The player this monster should be fighting: the nearest living one
    /// within detection range. `None` sends the monster home.
    fn resolve_target<'p>(
        &self,
        players: &'p [PlayerView],
        tuning: &SimTuning,
    ) -> Option<&'p PlayerView> {
        let nearest = nearest_player(&self.state.position, players)?;
        let in_range = self.state.position.distance_sq(&nearest.position)
            <= tuning.detection_radius * tuning.detection_radius;
        in_range.then_some(nearest)
    }

    fn start_returning(&mut self, tuning: &SimTuning) {
        debug!(monster = self.state.id, "monster returning home");
        self.phase = Phase::Returning {
            grace: tuning.return_grace,
        };
    }
}

/// Nearest living player by squared distance. Ties go to the earliest
/// entry in the slice, so iteration order is the tie-break and results
/// are stable across hosts.
fn nearest_player<'p>(
    from: &Position,
    players: &'p [PlayerView],
) -> Option<&'p PlayerView> {
    players
        .iter()
        .filter(|p| p.hp > 0)
        .fold(None, |best: Option<(&PlayerView, f32)>, p| {
            let d = from.distance_sq(&p.position);
            match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((p, d)),
            }
        })
        .map(|(p, _)| p)
}

/// Moves `from` toward `to` by at most `max_step`, arriving exactly when
/// the remaining distance is within reach.
fn step_toward(from: Position, to: Position, max_step: f32) -> Position {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist <= max_step || dist == 0.0 {
        return to;
    }
    let scale = max_step / dist;
    Position::new(from.x + dx * scale, from.y + dy * scale)
}
