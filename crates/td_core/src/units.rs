//! Mobile units: roster, spawning, lane walking and the per-tick unit pass.
//!
//! Units walk a fixed polyline toward the enemy base and stop to fight
//! whenever something is in range. Dead units stay in the roster, inert,
//! until the simulation reaps them after the pass.

use serde::{Deserialize, Serialize};

use crate::combat::{acquire_target, attack_cycle, Base, Target};
use crate::events::{EffectKind, GameEvent, SoundCue, TickEvents};
use crate::map::{GridPos, GridWorld};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::rules::UnitStats;
use crate::side::{PerSide, Side};

/// Distance under which a walking unit snaps onto its waypoint.
const ARRIVAL_THRESHOLD: Fixed = Fixed::from_bits(0x1999_9999); // ~0.1 tile

/// Walk animation frame period.
const ANIM_PERIOD_MS: u32 = 1000;

/// Type of a mobile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Cheap close-range infantry.
    Melee,
    /// Fragile long-range caster.
    Ranged,
    /// Slow, durable, low damage.
    Tank,
}

impl UnitKind {
    /// All types.
    pub const ALL: [UnitKind; 3] = [UnitKind::Melee, UnitKind::Ranged, UnitKind::Tank];

    /// Order in which a directive's unit requests are processed.
    pub const ORDER_PRIORITY: [UnitKind; 3] = [UnitKind::Tank, UnitKind::Melee, UnitKind::Ranged];

    const fn attack_cue(self) -> SoundCue {
        match self {
            Self::Melee => SoundCue::AttackMelee,
            Self::Ranged => SoundCue::AttackRanged,
            Self::Tank => SoundCue::AttackTank,
        }
    }
}

/// Unique handle of a unit within one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Two-frame pose shared by walking and attacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnimFrame {
    /// Wind-up / first step.
    #[default]
    One,
    /// Strike / second step.
    Two,
}

impl AnimFrame {
    /// The other frame.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

/// A unit on the field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Handle.
    pub id: UnitId,
    /// Owner.
    pub side: Side,
    /// Type.
    pub kind: UnitKind,
    /// Continuous position in tile units.
    pub pos: Vec2Fixed,
    /// Position rounded to the nearest tile.
    pub tile: GridPos,
    /// Waypoints toward the enemy base.
    pub path: Vec<GridPos>,
    /// Next waypoint.
    pub path_index: usize,
    /// Hit points left.
    pub hp: i32,
    /// Hit points when undamaged.
    pub max_hp: i32,
    /// Damage per strike.
    pub attack_power: i32,
    /// Attack cycle length.
    pub attack_period_ms: u32,
    /// Time to walk one tile.
    pub ms_per_tile: u32,
    /// Reach in tiles.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Population returned on death.
    pub population_cost: i32,
    /// Sprite faces the other way.
    pub flip_x: bool,
    /// Time into the current attack cycle.
    pub attack_timer_ms: u32,
    /// Time since the last walk frame change.
    pub anim_timer_ms: u32,
    /// Current pose.
    pub frame: AnimFrame,
    /// The path is exhausted.
    pub at_goal: bool,
}

impl Unit {
    /// Create a unit standing on `spawn_point`, heading along its side's lane.
    ///
    /// The unit's next waypoint is the one after the spawn point. A spawn
    /// point off the lane counts as the lane's first waypoint.
    #[must_use]
    pub fn spawn(
        id: UnitId,
        side: Side,
        kind: UnitKind,
        stats: &UnitStats,
        spawn_point: GridPos,
        world: &GridWorld,
    ) -> Self {
        let path = world.path_for(side);
        let spawn_index = path.iter().position(|&p| p == spawn_point).unwrap_or(0);
        // Opponent units always start flipped; player units face by the
        // flip points already behind them.
        let flip_x = match side {
            Side::Player => {
                let flips = path
                    .iter()
                    .take(spawn_index + 1)
                    .filter(|&&p| world.is_flip_point(p))
                    .count();
                flips % 2 == 1
            }
            Side::Ai => true,
        };
        let path_index = spawn_index + 1;

        Self {
            id,
            side,
            kind,
            pos: Vec2Fixed::from(spawn_point),
            tile: spawn_point,
            at_goal: path_index >= path.len(),
            path,
            path_index,
            hp: stats.hp,
            max_hp: stats.hp,
            attack_power: stats.attack_power,
            attack_period_ms: stats.attack_period_ms(),
            ms_per_tile: stats.ms_per_tile(),
            range: stats.range,
            population_cost: stats.population_cost,
            flip_x,
            attack_timer_ms: 0,
            anim_timer_ms: 0,
            frame: AnimFrame::One,
        }
    }

    /// Check if the unit is still fighting.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Take one step along the lane.
    fn walk(&mut self, dt_ms: u32, world: &GridWorld, events: &mut TickEvents) {
        let Some(&waypoint) = self.path.get(self.path_index) else {
            self.at_goal = true;
            return;
        };

        let target = Vec2Fixed::from(waypoint);
        let distance = self.pos.distance(target);

        if distance < ARRIVAL_THRESHOLD {
            self.pos = target;
            self.tile = waypoint;
            if world.is_flip_point(waypoint) {
                self.flip_x = !self.flip_x;
            }
            self.path_index += 1;
            if self.path_index >= self.path.len() {
                self.at_goal = true;
            }
            return;
        }

        let step = Fixed::from_num(dt_ms) / Fixed::from_num(self.ms_per_tile);
        self.pos = self.pos.step_toward(target, step);
        let (gx, gy) = self.pos.rounded();
        self.tile = GridPos::new(gx, gy);

        if self.anim_timer_ms >= ANIM_PERIOD_MS {
            self.frame = self.frame.toggled();
            let cue = match self.frame {
                AnimFrame::One => SoundCue::UnitMove1,
                AnimFrame::Two => SoundCue::UnitMove2,
            };
            events.push(GameEvent::Sound { cue });
            self.anim_timer_ms = 0;
        }
    }
}

/// All units on the field, in spawn order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UnitRoster {
    units: Vec<Unit>,
    next_id: u32,
}

impl UnitRoster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a unit at the end of the roster.
    pub fn spawn(
        &mut self,
        side: Side,
        kind: UnitKind,
        stats: &UnitStats,
        spawn_point: GridPos,
        world: &GridWorld,
    ) -> &Unit {
        self.next_id += 1;
        let unit = Unit::spawn(UnitId(self.next_id), side, kind, stats, spawn_point, world);
        self.units.push(unit);
        &self.units[self.units.len() - 1]
    }

    /// Units in roster order.
    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Units in roster order, mutably.
    pub fn units_mut(&mut self) -> &mut [Unit] {
        &mut self.units
    }

    /// Look up a unit by handle.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Number of units, dead ones included until reaped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Living units of a side and type.
    #[must_use]
    pub fn count(&self, side: Side, kind: UnitKind) -> usize {
        self.units
            .iter()
            .filter(|u| u.side == side && u.kind == kind && u.is_alive())
            .count()
    }

    /// Remove dead units, returning them in roster order.
    pub fn reap_dead(&mut self) -> Vec<Unit> {
        let (alive, dead): (Vec<Unit>, Vec<Unit>) = std::mem::take(&mut self.units)
            .into_iter()
            .partition(Unit::is_alive);
        self.units = alive;
        dead
    }

    /// Remove every unit.
    pub fn drain_all(&mut self) -> Vec<Unit> {
        std::mem::take(&mut self.units)
    }
}

/// Advance every living unit by one tick: fight if something is in range,
/// otherwise walk.
///
/// Damage is applied immediately, so a unit killed earlier in the pass
/// neither acts nor is targeted afterwards. Returns the winner if a base
/// falls, which ends the pass at once.
pub fn run_unit_system(
    roster: &mut UnitRoster,
    bases: &mut PerSide<Base>,
    world: &GridWorld,
    dt_ms: u32,
    events: &mut TickEvents,
) -> Option<Side> {
    for i in 0..roster.units.len() {
        if !roster.units[i].is_alive() {
            continue;
        }
        {
            let unit = &mut roster.units[i];
            unit.attack_timer_ms = unit.attack_timer_ms.saturating_add(dt_ms);
            unit.anim_timer_ms = unit.anim_timer_ms.saturating_add(dt_ms);
        }

        let Some(target) = acquire_target(&roster.units, i, bases) else {
            roster.units[i].walk(dt_ms, world, events);
            continue;
        };

        let attacker = &mut roster.units[i];
        attacker.at_goal = false;
        if !attack_cycle(attacker) {
            continue;
        }
        let (side, kind, power, from) = (
            attacker.side,
            attacker.kind,
            attacker.attack_power,
            attacker.pos,
        );

        let to = match target {
            Target::Unit(j) => roster.units[j].pos,
            Target::Base(enemy) => Vec2Fixed::from(bases[enemy].pos),
        };
        if kind == UnitKind::Ranged {
            events.push(GameEvent::AttackEffect {
                side,
                kind: EffectKind::Projectile,
                from,
                to,
                duration_ms: EffectKind::Projectile.duration_ms(),
            });
        }
        events.push(GameEvent::Sound {
            cue: kind.attack_cue(),
        });

        match target {
            Target::Unit(j) => roster.units[j].hp -= power,
            Target::Base(enemy) => {
                let base = &mut bases[enemy];
                base.hp -= power;
                if base.is_destroyed() {
                    base.hp = 0;
                    events.push(GameEvent::BaseDamaged { side: enemy, hp: 0 });
                    events.push(GameEvent::BaseDestroyed { side: enemy });
                    return Some(side);
                }
                events.push(GameEvent::BaseDamaged {
                    side: enemy,
                    hp: base.hp,
                });
            }
        }
    }
    None
}
