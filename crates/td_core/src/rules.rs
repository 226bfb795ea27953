//! Data-driven game rules.
//!
//! Every tunable number lives here so a whole balance pass can be loaded
//! from a single RON file. [`GameRules::default`] is the standard game.
//!
//! # Example RON
//!
//! ```ron
//! GameRules(
//!     max_structures: 10,
//!     base_round_reward: 50,
//!     units: (
//!         melee: (cost: 5, population_cost: 1, hp: 20, attack_power: 4,
//!                 attack_speed: 1.1, move_speed: 0.7, range: 1.0,
//!                 production_time_ms: 2000),
//!         // ...
//!     ),
//!     // ...
//! )
//! ```
//!
//! Fields left out of a file keep their standard values.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, Fixed};
use crate::structures::StructureKind;
use crate::units::UnitKind;

/// Cost and passive effects of a structure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureStats {
    /// Resource cost to build.
    pub cost: i32,
    /// Added to the owner's population cap while standing.
    #[serde(default)]
    pub max_population_bonus: i32,
    /// Added to the owner's round reward while standing.
    #[serde(default)]
    pub resource_per_round: i32,
}

impl StructureStats {
    const fn priced(cost: i32) -> Self {
        Self {
            cost,
            max_population_bonus: 0,
            resource_per_round: 0,
        }
    }
}

/// Stats for each structure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureTable {
    /// Population structure.
    pub population: StructureStats,
    /// Barracks.
    pub barracks: StructureStats,
    /// Turret.
    pub turret: StructureStats,
    /// Resource structure.
    pub resource: StructureStats,
}

impl StructureTable {
    /// Stats for a structure type.
    #[must_use]
    pub const fn get(&self, kind: StructureKind) -> &StructureStats {
        match kind {
            StructureKind::Population => &self.population,
            StructureKind::Barracks => &self.barracks,
            StructureKind::Turret => &self.turret,
            StructureKind::Resource => &self.resource,
        }
    }
}

impl Default for StructureTable {
    fn default() -> Self {
        Self {
            population: StructureStats {
                max_population_bonus: 3,
                ..StructureStats::priced(20)
            },
            barracks: StructureStats::priced(20),
            turret: StructureStats::priced(20),
            resource: StructureStats {
                resource_per_round: 20,
                ..StructureStats::priced(30)
            },
        }
    }
}

/// Turret weapon stats, shared by every turret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurretStats {
    /// Shots per second.
    #[serde(with = "decimal_serde")]
    pub attack_speed: Fixed,
    /// Damage per shot.
    pub attack_power: i32,
    /// Reach in tiles.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
}

impl TurretStats {
    /// Milliseconds between shots, rounded up so the rate is never exceeded.
    #[must_use]
    pub fn cooldown_ms(&self) -> u32 {
        if self.attack_speed <= Fixed::ZERO {
            return u32::MAX;
        }
        (Fixed::from_num(1000) / self.attack_speed)
            .ceil()
            .saturating_to_num::<u32>()
    }
}

impl Default for TurretStats {
    fn default() -> Self {
        Self {
            attack_speed: Fixed::from_num(1.5),
            attack_power: 3,
            range: Fixed::from_num(3),
        }
    }
}

/// Stats of a mobile unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Resource cost to order.
    pub cost: i32,
    /// Population consumed while alive.
    pub population_cost: i32,
    /// Starting and maximum hit points.
    pub hp: i32,
    /// Damage per strike.
    pub attack_power: i32,
    /// Seconds per attack cycle.
    #[serde(with = "decimal_serde")]
    pub attack_speed: Fixed,
    /// Seconds to cross one tile.
    #[serde(with = "decimal_serde")]
    pub move_speed: Fixed,
    /// Reach in tiles.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
    /// Time a barracks needs to finish one unit.
    pub production_time_ms: u32,
}

impl UnitStats {
    /// Attack cycle length in milliseconds.
    #[must_use]
    pub fn attack_period_ms(&self) -> u32 {
        seconds_to_ms(self.attack_speed)
    }

    /// Milliseconds needed to walk one tile.
    #[must_use]
    pub fn ms_per_tile(&self) -> u32 {
        seconds_to_ms(self.move_speed).max(1)
    }
}

fn seconds_to_ms(seconds: Fixed) -> u32 {
    if seconds <= Fixed::ZERO {
        return 0;
    }
    (seconds * Fixed::from_num(1000))
        .round()
        .saturating_to_num::<u32>()
}

/// Stats for each unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTable {
    /// Melee infantry.
    pub melee: UnitStats,
    /// Ranged caster.
    pub ranged: UnitStats,
    /// Tank.
    pub tank: UnitStats,
}

impl UnitTable {
    /// Stats for a unit type.
    #[must_use]
    pub const fn get(&self, kind: UnitKind) -> &UnitStats {
        match kind {
            UnitKind::Melee => &self.melee,
            UnitKind::Ranged => &self.ranged,
            UnitKind::Tank => &self.tank,
        }
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self {
            melee: UnitStats {
                cost: 5,
                population_cost: 1,
                hp: 20,
                attack_power: 4,
                attack_speed: Fixed::from_num(1.1),
                move_speed: Fixed::from_num(0.7),
                range: Fixed::from_num(1),
                production_time_ms: 2000,
            },
            ranged: UnitStats {
                cost: 5,
                population_cost: 1,
                hp: 13,
                attack_power: 6,
                attack_speed: Fixed::from_num(0.8),
                move_speed: Fixed::from_num(1.1),
                range: Fixed::from_num(2.3),
                production_time_ms: 3000,
            },
            tank: UnitStats {
                cost: 10,
                population_cost: 1,
                hp: 60,
                attack_power: 2,
                attack_speed: Fixed::from_num(1),
                move_speed: Fixed::from_num(0.8),
                range: Fixed::from_num(1),
                production_time_ms: 4000,
            },
        }
    }
}

/// Values each side starts a fresh game with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingEconomy {
    /// Starting resource.
    pub resource: i32,
    /// Starting population cap.
    pub max_population: i32,
    /// Base hit points.
    pub base_hp: i32,
}

impl Default for StartingEconomy {
    fn default() -> Self {
        Self {
            resource: 50,
            max_population: 3,
            base_hp: 100,
        }
    }
}

/// Complete rule set for a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Most structures a side may own.
    pub max_structures: u32,
    /// Flat resource reward for both sides at round end.
    pub base_round_reward: i32,
    /// Resource given instead of a periodic grant that cannot be placed.
    pub grant_compensation: i32,
    /// Structure types granted to the opponent, cycled on odd rounds.
    pub grant_schedule: Vec<StructureKind>,
    /// Percentage of nominal cost refunded on sale or demolition.
    pub refund_percent: i32,
    /// Queue slots on a player barracks, excluding the unit in production.
    pub player_queue_limit: usize,
    /// Largest time step a single tick may advance, in milliseconds.
    pub max_tick_ms: u32,
    /// Rounds of production history kept for advisory snapshots.
    pub unit_record_rounds: u32,
    /// Starting economy for both sides.
    pub starting: StartingEconomy,
    /// Structure stats.
    pub structures: StructureTable,
    /// Turret weapon.
    pub turret: TurretStats,
    /// Unit stats.
    pub units: UnitTable,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_structures: 10,
            base_round_reward: 50,
            grant_compensation: 30,
            grant_schedule: vec![StructureKind::Resource, StructureKind::Population],
            refund_percent: 50,
            player_queue_limit: 2,
            max_tick_ms: 100,
            unit_record_rounds: 5,
            starting: StartingEconomy::default(),
            structures: StructureTable::default(),
            turret: TurretStats::default(),
            units: UnitTable::default(),
        }
    }
}

impl GameRules {
    /// Parse rules from RON text. `origin` names the source in errors.
    pub fn from_ron_str(text: &str, origin: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Render the rules as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize rules: {e}")))
    }

    /// Refund for removing a structure, rounded down.
    #[must_use]
    pub fn refund_for(&self, kind: StructureKind) -> i32 {
        (self.structures.get(kind).cost * self.refund_percent).div_euclid(100)
    }
}
