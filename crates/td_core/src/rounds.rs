//! Round lifecycle: end detection, rewards and the opponent's periodic grant.
//!
//! A round ends only once both sides are broke and the field has gone quiet:
//! no units alive and no barracks with work in hand. Ending a round pays
//! both sides, advances the counter and, on odd rounds from 3 on, grants the
//! opponent a free structure from its position pools.

use serde::{Deserialize, Serialize};

use crate::economy::SideEconomy;
use crate::events::{GameEvent, TickEvents};
use crate::map::GridWorld;
use crate::rules::GameRules;
use crate::side::{PerSide, Side};
use crate::structures::{Structure, StructureKind, StructureRegistry};
use crate::units::{UnitKind, UnitRoster};

/// Whether a round is being fought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Between rounds. Production is paused.
    #[default]
    Idle,
    /// Fighting.
    Active,
}

/// Round counter and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundState {
    /// Current round, starting at 1.
    pub round: u32,
    /// Phase of the current round.
    pub phase: RoundPhase,
    /// Set once a base falls.
    pub winner: Option<Side>,
}

impl Default for RoundState {
    fn default() -> Self {
        Self {
            round: 1,
            phase: RoundPhase::Idle,
            winner: None,
        }
    }
}

impl RoundState {
    /// Check if a round is being fought.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Active
    }

    /// Check if the game has been decided.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.winner.is_some()
    }
}

/// A unit leaving a barracks, kept for the advisory statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Owner.
    pub side: Side,
    /// Type.
    pub kind: UnitKind,
    /// Round it was produced in.
    pub round: u32,
}

/// Check the round-end condition.
#[must_use]
pub fn round_should_end(
    economies: &PerSide<SideEconomy>,
    roster: &UnitRoster,
    structures: &StructureRegistry,
) -> bool {
    economies.player.resource <= 0
        && economies.ai.resource <= 0
        && roster.is_empty()
        && !structures.any_production()
}

/// Resource a side earns at the end of a round.
#[must_use]
pub fn round_reward(rules: &GameRules, structures: &StructureRegistry, side: Side) -> i32 {
    let per_structure = rules.structures.resource.resource_per_round;
    let owned = structures.of(side, StructureKind::Resource).len();
    let owned = i32::try_from(owned).unwrap_or(i32::MAX);
    rules.base_round_reward + per_structure.saturating_mul(owned)
}

/// Structure type the opponent is granted on reaching `round`, if any.
///
/// Grants fall on odd rounds from 3 on and cycle through the schedule.
#[must_use]
pub fn grant_for_round(rules: &GameRules, round: u32) -> Option<StructureKind> {
    if round < 3 || round % 2 == 0 || rules.grant_schedule.is_empty() {
        return None;
    }
    let index = (round / 2 - 1) as usize % rules.grant_schedule.len();
    rules.grant_schedule.get(index).copied()
}

/// Give the opponent a free structure of `kind` on its lowest free pool slot.
///
/// With no free slot or the structure cap reached, the opponent is paid the
/// grant compensation instead.
pub fn grant_structure(
    world: &GridWorld,
    rules: &GameRules,
    structures: &mut StructureRegistry,
    economy: &mut SideEconomy,
    kind: StructureKind,
    events: &mut TickEvents,
) {
    let slot = if economy.structure_count < rules.max_structures {
        structures.first_free_slot(world.ai_pools.get(kind)).copied()
    } else {
        None
    };

    let Some(slot) = slot else {
        economy.deposit(rules.grant_compensation);
        tracing::debug!(?kind, amount = rules.grant_compensation, "Grant paid out as resource");
        events.push(GameEvent::GrantCompensated {
            kind,
            amount: rules.grant_compensation,
        });
        return;
    };

    structures.insert(
        Structure::new(Side::Ai, kind, slot.pos, slot.spawn, rules.player_queue_limit)
            .with_pool_id(Some(slot.id)),
    );
    economy.structure_added(rules.structures.get(kind).max_population_bonus);
    tracing::debug!(?kind, pos = %slot.pos, pool_id = slot.id, "Granted opponent structure");
    events.push(GameEvent::StructurePlaced {
        side: Side::Ai,
        kind,
        pos: slot.pos,
    });
}

/// Drop records that fell out of the retention window.
pub fn prune_records(records: &mut Vec<UnitRecord>, current_round: u32, keep_rounds: u32) {
    records.retain(|record| current_round.saturating_sub(record.round) <= keep_rounds);
}

/// Close the active round.
///
/// Pays rewards, advances the counter, runs the periodic grant and prunes
/// old unit records, then asks for a checkpoint.
pub fn end_round(
    state: &mut RoundState,
    world: &GridWorld,
    rules: &GameRules,
    economies: &mut PerSide<SideEconomy>,
    structures: &mut StructureRegistry,
    records: &mut Vec<UnitRecord>,
    events: &mut TickEvents,
) {
    let finished = state.round;
    let rewards = PerSide::from_fn(|side| round_reward(rules, structures, side));
    for side in Side::ALL {
        economies[side].deposit(rewards[side]);
    }

    state.round += 1;
    state.phase = RoundPhase::Idle;

    if let Some(kind) = grant_for_round(rules, state.round) {
        grant_structure(world, rules, structures, &mut economies.ai, kind, events);
    }
    prune_records(records, state.round, rules.unit_record_rounds);

    tracing::info!(
        round = finished,
        player_reward = rewards.player,
        ai_reward = rewards.ai,
        "Round ended"
    );
    events.push(GameEvent::RoundEnded {
        round: finished,
        rewards,
    });
    events.push(GameEvent::Checkpoint);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GridPos;

    fn fresh() -> (GridWorld, GameRules, StructureRegistry, PerSide<SideEconomy>) {
        let world = GridWorld::standard();
        let rules = GameRules::default();
        let structures = StructureRegistry::with_starting(&world, &rules);
        let economies = PerSide::from_fn(|side| {
            let mut economy = SideEconomy::starting(&rules);
            economy.structure_count = structures.count(side) as u32;
            economy
        });
        (world, rules, structures, economies)
    }

    #[test]
    fn test_end_condition_needs_all_three() {
        let (world, rules, mut structures, mut economies) = fresh();
        let mut roster = UnitRoster::new();
        assert!(!round_should_end(&economies, &roster, &structures));

        economies.player.resource = 0;
        assert!(!round_should_end(&economies, &roster, &structures));
        economies.ai.resource = -5;
        assert!(round_should_end(&economies, &roster, &structures));

        roster.spawn(Side::Ai, UnitKind::Melee, &rules.units.melee, GridPos::new(12, 2), &world);
        assert!(!round_should_end(&economies, &roster, &structures));
        roster.drain_all();

        let melee = crate::production::PendingUnit::free(UnitKind::Melee, &rules.units.melee);
        if let Some(b) = structures.barracks_mut().next().and_then(|s| s.barracks.as_mut()) {
            b.production.push_unbounded(melee);
        }
        assert!(!round_should_end(&economies, &roster, &structures));
    }

    #[test]
    fn test_reward_counts_resource_structures() {
        let (_, rules, mut structures, _) = fresh();
        assert_eq!(round_reward(&rules, &structures, Side::Player), 50);

        for gx in [4, 5] {
            structures.insert(Structure::new(
                Side::Player,
                StructureKind::Resource,
                GridPos::new(gx, 9),
                None,
                2,
            ));
        }
        assert_eq!(round_reward(&rules, &structures, Side::Player), 90);
        assert_eq!(round_reward(&rules, &structures, Side::Ai), 50);
    }

    #[test]
    fn test_grant_schedule() {
        let rules = GameRules::default();
        let grants: Vec<_> = (1..=9).map(|r| grant_for_round(&rules, r)).collect();
        assert_eq!(
            grants,
            vec![
                None,
                None,
                Some(StructureKind::Resource),
                None,
                Some(StructureKind::Population),
                None,
                Some(StructureKind::Resource),
                None,
                Some(StructureKind::Population),
            ]
        );
    }

    #[test]
    fn test_grant_uses_lowest_free_slot() {
        let (world, rules, mut structures, mut economies) = fresh();
        let mut events = TickEvents::default();

        // Population slot 1 holds the starting structure.
        grant_structure(
            &world,
            &rules,
            &mut structures,
            &mut economies.ai,
            StructureKind::Population,
            &mut events,
        );
        let granted = &structures.of(Side::Ai, StructureKind::Population)[1];
        assert_eq!(granted.pool_id, Some(2));
        assert_eq!(granted.pos, GridPos::new(13, 0));
        assert_eq!(economies.ai.max_population, 6);
        assert_eq!(economies.ai.structure_count, 3);
    }

    #[test]
    fn test_grant_compensated_at_cap() {
        let (world, rules, mut structures, mut economies) = fresh();
        economies.ai.structure_count = rules.max_structures;
        let mut events = TickEvents::default();

        grant_structure(
            &world,
            &rules,
            &mut structures,
            &mut economies.ai,
            StructureKind::Resource,
            &mut events,
        );
        assert_eq!(economies.ai.resource, 80);
        assert!(structures.of(Side::Ai, StructureKind::Resource).is_empty());
        assert_eq!(
            events.events,
            vec![GameEvent::GrantCompensated {
                kind: StructureKind::Resource,
                amount: 30
            }]
        );
    }

    #[test]
    fn test_end_round_order() {
        let (world, rules, mut structures, mut economies) = fresh();
        let mut state = RoundState {
            round: 2,
            phase: RoundPhase::Active,
            winner: None,
        };
        economies.player.resource = 0;
        economies.ai.resource = 0;
        let mut records = vec![
            UnitRecord {
                side: Side::Ai,
                kind: UnitKind::Melee,
                round: 1,
            },
            UnitRecord {
                side: Side::Ai,
                kind: UnitKind::Tank,
                round: 2,
            },
        ];
        let mut events = TickEvents::default();

        end_round(
            &mut state,
            &world,
            &rules,
            &mut economies,
            &mut structures,
            &mut records,
            &mut events,
        );

        assert_eq!(state.round, 3);
        assert_eq!(state.phase, RoundPhase::Idle);
        assert_eq!(economies.player.resource, 50);
        // Round 3 grants a resource structure; it does not pay out this round.
        assert_eq!(economies.ai.resource, 50);
        assert_eq!(structures.of(Side::Ai, StructureKind::Resource).len(), 1);
        assert_eq!(records.len(), 2);
        assert!(events.round_ended());
        assert!(events.wants_checkpoint());
    }

    #[test]
    fn test_prune_records() {
        let mut records: Vec<UnitRecord> = (1..=8)
            .map(|round| UnitRecord {
                side: Side::Player,
                kind: UnitKind::Melee,
                round,
            })
            .collect();
        prune_records(&mut records, 9, 5);
        let rounds: Vec<u32> = records.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![4, 5, 6, 7, 8]);
    }
}
