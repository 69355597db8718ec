//! The combat simulation driver.
//!
//! The host runs a [`CombatSim`] in [`SimMode::Authority`]: it owns the
//! monster roster, advances the behavior FSMs every frame, and resolves
//! player attacks including melee splash. After each frame the host
//! serializes [`CombatSim::monsters`] into a `monster_update` message.
//!
//! Guests run [`SimMode::Replica`]: their sim never advances behavior on
//! its own and only mirrors the snapshots the host broadcasts.

use duoraid_protocol::{ClassId, MonsterState, PlayerId, Position};
use tracing::debug;

use crate::monster::Monster;
use crate::SimTuning;

/// Whether this peer decides monster behavior or mirrors the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    /// Runs the FSMs and resolves damage. One per room, on the host.
    Authority,
    /// Applies host snapshots verbatim, never simulates.
    Replica,
}

/// What the sim needs to know about a player to target and hit it.
#[derive(Debug, Clone)]
pub struct PlayerView {
    pub id: PlayerId,
    pub position: Position,
    pub hp: i32,
}

/// Outcomes of a frame or an attack, for the host to relay.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// A monster landed a swing on a player.
    PlayerHit {
        monster_id: u32,
        player_id: PlayerId,
        damage: i32,
    },
    /// A monster took damage and survived.
    MonsterDamaged {
        monster_id: u32,
        damage: i32,
        attacker_id: PlayerId,
    },
    /// A monster's hp reached zero. It lingers in the roster for the
    /// death animation before [`MonsterRemoved`](Self::MonsterRemoved).
    MonsterKilled {
        monster_id: u32,
        killer_id: PlayerId,
        position: Position,
    },
    /// The death animation finished and the monster left the roster.
    MonsterRemoved { monster_id: u32 },
}

pub struct CombatSim {
    mode: SimMode,
    tuning: SimTuning,
    monsters: Vec<Monster>,
    next_id: u32,
}

impl CombatSim {
    pub fn new(mode: SimMode, tuning: SimTuning) -> Self {
        Self {
            mode,
            tuning: tuning.validated(),
            monsters: Vec::new(),
            next_id: 1,
        }
    }

    pub fn mode(&self) -> SimMode {
        self.mode
    }

    pub fn tuning(&self) -> &SimTuning {
        &self.tuning
    }

    /// Spawns a dormant monster at `home`. Authority mode only; replicas
    /// receive their roster via [`apply_snapshot`](Self::apply_snapshot).
    pub fn spawn(
        &mut self,
        kind: impl Into<String>,
        home: Position,
        max_hp: i32,
    ) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.monsters
            .push(Monster::new(MonsterState::new(id, kind, home, max_hp)));
        id
    }

    /// The current roster, in wire form.
    pub fn monsters(&self) -> Vec<MonsterState> {
        self.monsters.iter().map(|m| m.state.clone()).collect()
    }

    /// Advances every monster by `dt` seconds and prunes expired corpses.
    ///
    /// A replica's tick is a no-op: behavior only ever comes from the
    /// host's snapshots.
    pub fn tick(&mut self, dt: f32, players: &[PlayerView]) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if self.mode == SimMode::Replica {
            return events;
        }

        for monster in &mut self.monsters {
            monster.tick(dt, players, &self.tuning, &mut events);
        }
        self.monsters.retain(|m| {
            if m.is_expired() {
                events.push(SimEvent::MonsterRemoved {
                    monster_id: m.state.id,
                });
                false
            } else {
                true
            }
        });
        events
    }

    /// Resolves a player swing at `position`.
    ///
    /// The primary target is the nearest targetable monster within attack
    /// reach; it takes the full `power`. Melee classes additionally splash
    /// every other targetable monster within `splash_radius` of the
    /// primary for `round(power * splash_fraction)`.
    pub fn apply_player_attack(
        &mut self,
        attacker_id: &PlayerId,
        class: ClassId,
        power: i32,
        position: Position,
    ) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if self.mode == SimMode::Replica {
            return events;
        }

        let reach_sq = self.tuning.attack_radius * self.tuning.attack_radius;
        let Some(primary_idx) = self
            .monsters
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_targetable())
            .filter(|(_, m)| {
                position.distance_sq(&m.state.position) <= reach_sq
            })
            .min_by(|(_, a), (_, b)| {
                position
                    .distance_sq(&a.state.position)
                    .total_cmp(&position.distance_sq(&b.state.position))
            })
            .map(|(i, _)| i)
        else {
            return events;
        };

        let primary_pos = self.monsters[primary_idx].state.position;
        self.damage_monster(primary_idx, power, attacker_id, &mut events);

        if class.is_melee() {
            let splash =
                (power as f32 * self.tuning.splash_fraction).round() as i32;
            let splash_sq =
                self.tuning.splash_radius * self.tuning.splash_radius;
            for idx in 0..self.monsters.len() {
                if idx == primary_idx {
                    continue;
                }
                let m = &self.monsters[idx];
                if m.is_targetable()
                    && primary_pos.distance_sq(&m.state.position)
                        <= splash_sq
                {
                    self.damage_monster(idx, splash, attacker_id, &mut events);
                }
            }
        }
        events
    }

    /// Applies a direct hit to one monster, e.g. a relayed ranged shot.
    pub fn apply_damage(
        &mut self,
        monster_id: u32,
        damage: i32,
        attacker_id: &PlayerId,
    ) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if self.mode == SimMode::Replica {
            return events;
        }
        if let Some(idx) =
            self.monsters.iter().position(|m| m.state.id == monster_id)
        {
            self.damage_monster(idx, damage, attacker_id, &mut events);
        }
        events
    }

    /// Replaces the roster with a host snapshot. This is how replicas see
    /// monsters move; harmless on the authority (it overwrites its own
    /// output).
    pub fn apply_snapshot(&mut self, monsters: Vec<MonsterState>) {
        debug!(count = monsters.len(), "applying monster snapshot");
        self.monsters = monsters.into_iter().map(Monster::new).collect();
        self.next_id = self
            .monsters
            .iter()
            .map(|m| m.state.id + 1)
            .max()
            .unwrap_or(1);
    }

    fn damage_monster(
        &mut self,
        idx: usize,
        damage: i32,
        attacker_id: &PlayerId,
        events: &mut Vec<SimEvent>,
    ) {
        let monster = &mut self.monsters[idx];
        let id = monster.state.id;
        if monster.apply_damage(damage, &self.tuning) {
            events.push(SimEvent::MonsterKilled {
                monster_id: id,
                killer_id: attacker_id.clone(),
                position: monster.state.position,
            });
        } else {
            events.push(SimEvent::MonsterDamaged {
                monster_id: id,
                damage,
                attacker_id: attacker_id.clone(),
            });
        }
    }
}
