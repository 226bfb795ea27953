//! Target acquisition and the two-phase attack cycle.
//!
//! A unit attacks the first living enemy unit in range, in roster order,
//! and only looks at the enemy base when no unit qualifies. Distance plays
//! no part in the choice beyond the range check.
//!
//! An attack period is split in two halves. The first half is the wind-up
//! pose; damage lands once, on the first tick of the second half; the timer
//! resets once the full period has elapsed.

use serde::{Deserialize, Serialize};

use crate::map::GridPos;
use crate::math::{Fixed, Vec2Fixed};
use crate::side::{PerSide, Side};
use crate::units::{AnimFrame, Unit};

/// A side's base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Base {
    /// Owner.
    pub side: Side,
    /// Tile.
    pub pos: GridPos,
    /// Hit points left.
    pub hp: i32,
    /// Hit points when undamaged.
    pub max_hp: i32,
}

impl Base {
    /// A base at full health.
    #[must_use]
    pub const fn new(side: Side, pos: GridPos, max_hp: i32) -> Self {
        Self {
            side,
            pos,
            hp: max_hp,
            max_hp,
        }
    }

    /// Check if the base has been destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.hp <= 0
    }
}

/// What a unit is attacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Roster index of an enemy unit.
    Unit(usize),
    /// The enemy base.
    Base(Side),
}

/// Whether `point` lies within `range` of `origin`, edge inclusive.
#[must_use]
pub fn in_range(origin: Vec2Fixed, point: Vec2Fixed, range: Fixed) -> bool {
    origin.distance_squared(point) <= range * range
}

/// Pick a target for the unit at `attacker`.
///
/// Returns the first living enemy unit within range, otherwise the enemy
/// base if it is within range.
#[must_use]
pub fn acquire_target(units: &[Unit], attacker: usize, bases: &PerSide<Base>) -> Option<Target> {
    let me = units.get(attacker)?;
    let enemy = me.side.opponent();

    let unit_target = units.iter().enumerate().position(|(i, other)| {
        i != attacker && other.side == enemy && other.is_alive() && in_range(me.pos, other.pos, me.range)
    });
    if let Some(index) = unit_target {
        return Some(Target::Unit(index));
    }

    let base = &bases[enemy];
    in_range(me.pos, Vec2Fixed::from(base.pos), me.range).then_some(Target::Base(enemy))
}

/// Advance a unit's attack cycle. Returns `true` on the tick damage lands.
///
/// The cycle reads the timer the caller has already advanced.
pub fn attack_cycle(unit: &mut Unit) -> bool {
    let period = unit.attack_period_ms;
    let half = period / 2;
    let elapsed = unit.attack_timer_ms;

    if elapsed < half {
        unit.frame = AnimFrame::One;
        false
    } else if elapsed < period {
        if unit.frame == AnimFrame::One {
            unit.frame = AnimFrame::Two;
            true
        } else {
            false
        }
    } else {
        unit.attack_timer_ms = 0;
        unit.frame = AnimFrame::One;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GridWorld;
    use crate::rules::UnitTable;
    use crate::units::{UnitId, UnitKind};

    fn unit_at(id: u32, side: Side, kind: UnitKind, gx: i32, gy: i32) -> Unit {
        let world = GridWorld::standard();
        let stats = *UnitTable::default().get(kind);
        let mut unit = Unit::spawn(UnitId(id), side, kind, &stats, GridPos::new(gx, gy), &world);
        unit.pos = Vec2Fixed::from(GridPos::new(gx, gy));
        unit
    }

    fn bases() -> PerSide<Base> {
        PerSide::new(
            Base::new(Side::Player, GridPos::new(1, 7), 100),
            Base::new(Side::Ai, GridPos::new(13, 2), 100),
        )
    }

    #[test]
    fn test_first_enemy_in_roster_order_wins() {
        let units = vec![
            unit_at(1, Side::Player, UnitKind::Ranged, 7, 2),
            unit_at(2, Side::Ai, UnitKind::Melee, 7, 4),
            unit_at(3, Side::Ai, UnitKind::Melee, 7, 3),
        ];
        // Unit 3 is nearer, but unit 2 comes first and is still in range.
        assert_eq!(acquire_target(&units, 0, &bases()), Some(Target::Unit(1)));
    }

    #[test]
    fn test_ignores_allies_and_dead_units() {
        let mut units = vec![
            unit_at(1, Side::Player, UnitKind::Melee, 7, 2),
            unit_at(2, Side::Player, UnitKind::Melee, 7, 3),
            unit_at(3, Side::Ai, UnitKind::Melee, 6, 2),
        ];
        units[2].hp = 0;
        assert_eq!(acquire_target(&units, 0, &bases()), None);
    }

    #[test]
    fn test_base_when_no_unit_in_range() {
        let units = vec![unit_at(1, Side::Player, UnitKind::Melee, 12, 2)];
        assert_eq!(acquire_target(&units, 0, &bases()), Some(Target::Base(Side::Ai)));

        let far = vec![unit_at(1, Side::Player, UnitKind::Melee, 11, 2)];
        assert_eq!(acquire_target(&far, 0, &bases()), None);
    }

    #[test]
    fn test_range_edge_is_inclusive() {
        let origin = Vec2Fixed::from(GridPos::new(0, 0));
        let edge = Vec2Fixed::from(GridPos::new(3, 0));
        assert!(in_range(origin, edge, Fixed::from_num(3)));
        assert!(!in_range(origin, edge, Fixed::from_num(2.9)));
    }

    #[test]
    fn test_attack_cycle_strikes_once_per_period() {
        let mut unit = unit_at(1, Side::Player, UnitKind::Melee, 7, 2);
        unit.attack_timer_ms = 0;
        unit.frame = AnimFrame::One;

        let mut strikes = 0;
        for _ in 0..110 {
            unit.attack_timer_ms += 10;
            if attack_cycle(&mut unit) {
                strikes += 1;
            }
        }
        // 1100 ms of 10 ms ticks: wind-up, one strike, then the reset tick.
        assert_eq!(strikes, 1);
        assert_eq!(unit.attack_timer_ms, 0);
        assert_eq!(unit.frame, AnimFrame::One);
    }

    #[test]
    fn test_attack_cycle_does_not_strike_mid_swing() {
        let mut unit = unit_at(1, Side::Player, UnitKind::Melee, 7, 2);
        unit.attack_timer_ms = 600;
        unit.frame = AnimFrame::Two;
        assert!(!attack_cycle(&mut unit));
        unit.attack_timer_ms = 1100;
        assert!(!attack_cycle(&mut unit));
        assert_eq!(unit.attack_timer_ms, 0);
    }
}
