//! Turret fire control.
//!
//! Turrets only shoot at enemy units standing on a road tile. Among those in
//! range, the one furthest along its lane is hit first.

use crate::combat::in_range;
use crate::events::{EffectKind, GameEvent, SoundCue, TickEvents};
use crate::map::GridWorld;
use crate::math::Vec2Fixed;
use crate::rules::TurretStats;
use crate::side::Side;
use crate::structures::StructureRegistry;
use crate::units::{Unit, UnitRoster};

/// Roster index of the unit a turret owned by `side` at `origin` would shoot.
fn select_target(
    units: &[Unit],
    side: Side,
    origin: Vec2Fixed,
    stats: &TurretStats,
    world: &GridWorld,
) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, unit) in units.iter().enumerate() {
        if unit.side == side || !unit.is_alive() || !world.is_road(unit.tile) {
            continue;
        }
        if !in_range(origin, unit.pos, stats.range) {
            continue;
        }
        // Strictly greater keeps the earliest unit on ties.
        if best.map_or(true, |(_, furthest)| unit.path_index > furthest) {
            best = Some((index, unit.path_index));
        }
    }
    best.map(|(index, _)| index)
}

/// Advance every turret by `dt_ms` and resolve shots.
///
/// A turret's clock starts on the first tick it sees any unit on the field
/// and resets only when it fires, so shots are never closer together than
/// the cooldown regardless of tick length.
pub fn run_turret_system(
    structures: &mut StructureRegistry,
    roster: &mut UnitRoster,
    world: &GridWorld,
    stats: &TurretStats,
    dt_ms: u32,
    events: &mut TickEvents,
) {
    let cooldown = stats.cooldown_ms();
    let field_occupied = !roster.is_empty();

    for turret in structures.turrets_mut() {
        let (side, pos) = (turret.side, turret.pos);
        let Some(state) = turret.turret.as_mut() else {
            continue;
        };

        let elapsed = match state.since_last_shot_ms {
            Some(elapsed) => elapsed.saturating_add(dt_ms),
            None if field_occupied => 0,
            None => continue,
        };
        state.since_last_shot_ms = Some(elapsed);
        if elapsed < cooldown {
            continue;
        }

        let origin = Vec2Fixed::from(pos);
        let Some(index) = select_target(roster.units(), side, origin, stats, world) else {
            continue;
        };
        let Some(target) = roster.units_mut().get_mut(index) else {
            continue;
        };

        target.hp -= stats.attack_power;
        events.push(GameEvent::AttackEffect {
            side,
            kind: EffectKind::Laser,
            from: origin,
            to: target.pos,
            duration_ms: EffectKind::Laser.duration_ms(),
        });
        events.push(GameEvent::Sound {
            cue: SoundCue::AttackTurret,
        });
        state.since_last_shot_ms = Some(0);
    }
}
