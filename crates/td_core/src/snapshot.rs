//! Read-only views handed to an external strategy advisor.
//!
//! The advisor sees the game from the opponent's seat: `own` is the opponent
//! side, `enemy` is the player. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::combat::Base;
use crate::economy::SideEconomy;
use crate::rules::{GameRules, StructureTable, UnitTable};
use crate::rounds::UnitRecord;
use crate::side::Side;
use crate::strategy::{StructureCounts, UnitCounts};
use crate::structures::{StructureKind, StructureRegistry};
use crate::units::{UnitKind, UnitRoster};

/// Description of the reply an advisor must produce.
pub const RESPONSE_FORMAT: &str = r#"Reply with one JSON object and nothing else:
{
  "strategy_reason": "<optional short explanation>",
  "structures": {
    "build":    {"turret": 0, "barracks": 0, "resource": 0, "population": 0},
    "demolish": {"turret": 0, "barracks": 0, "resource": 0, "population": 0}
  },
  "units": {"melee": 0, "ranged": 0, "tank": 0}
}
Counts are non-negative integers. Missing keys count as 0."#;

/// One side as the advisor sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideSnapshot {
    /// Spendable resource.
    pub resource: i32,
    /// Base hit points.
    pub base_hp: i32,
    /// Population cap.
    pub max_population: i32,
    /// Structures owned.
    pub structure_count: u32,
    /// Structures owned, per type.
    pub structures_by_type: StructureCounts,
    /// Living units on the field, per type.
    pub units_on_field: UnitCounts,
    /// Units produced during the previous round, per type.
    pub units_produced_last_round: UnitCounts,
}

impl SideSnapshot {
    /// Capture one side.
    #[must_use]
    pub fn capture(
        side: Side,
        round: u32,
        economy: &SideEconomy,
        base: &Base,
        structures: &StructureRegistry,
        roster: &UnitRoster,
        records: &[UnitRecord],
    ) -> Self {
        let owned = |kind| u32::try_from(structures.of(side, kind).len()).unwrap_or(u32::MAX);
        let alive = |kind| u32::try_from(roster.count(side, kind)).unwrap_or(u32::MAX);
        let last_round = round.saturating_sub(1);
        let produced = |kind: UnitKind| {
            let n = records
                .iter()
                .filter(|r| r.side == side && r.kind == kind && r.round == last_round)
                .count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };

        Self {
            resource: economy.resource,
            base_hp: base.hp,
            max_population: economy.max_population,
            structure_count: economy.structure_count,
            structures_by_type: StructureCounts {
                population: owned(StructureKind::Population),
                barracks: owned(StructureKind::Barracks),
                turret: owned(StructureKind::Turret),
                resource: owned(StructureKind::Resource),
            },
            units_on_field: UnitCounts {
                melee: alive(UnitKind::Melee),
                ranged: alive(UnitKind::Ranged),
                tank: alive(UnitKind::Tank),
            },
            units_produced_last_round: UnitCounts {
                melee: produced(UnitKind::Melee),
                ranged: produced(UnitKind::Ranged),
                tank: produced(UnitKind::Tank),
            },
        }
    }
}

/// The game as the advisor sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    /// Current round.
    pub round: u32,
    /// The advised side.
    pub own: SideSnapshot,
    /// The other side.
    pub enemy: SideSnapshot,
}

/// Game-wide numbers of the rules document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRules {
    /// Structure cap per side.
    pub max_structures: u32,
    /// Flat reward at the end of each round.
    pub base_round_reward: i32,
    /// Extra reward per resource structure.
    pub resource_reward_per_structure: i32,
}

/// Rules the advisor plans against.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesDocument {
    /// Game-wide numbers.
    pub system: SystemRules,
    /// Structure stats.
    pub structures: StructureTable,
    /// Unit stats.
    pub units: UnitTable,
}

impl RulesDocument {
    /// Extract the advisor-facing part of the rules.
    #[must_use]
    pub fn from_rules(rules: &GameRules) -> Self {
        Self {
            system: SystemRules {
                max_structures: rules.max_structures,
                base_round_reward: rules.base_round_reward,
                resource_reward_per_structure: rules.structures.resource.resource_per_round,
            },
            structures: rules.structures,
            units: rules.units,
        }
    }
}

/// Everything sent to the advisor for one round.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryRequest {
    /// Game state from the opponent's seat.
    pub state: GameStateSnapshot,
    /// Rules in force.
    pub rules: RulesDocument,
    /// Expected reply shape.
    pub response_format: String,
}

impl AdvisoryRequest {
    /// Bundle a state and rules with the standard reply description.
    #[must_use]
    pub fn new(state: GameStateSnapshot, rules: RulesDocument) -> Self {
        Self {
            state,
            rules,
            response_format: RESPONSE_FORMAT.to_string(),
        }
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
