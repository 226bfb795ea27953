//! Opponent strategy: directives, advisors and their application.
//!
//! A [`StrategyDirective`] says how many structures of each type the
//! opponent should demolish and build, and how many units of each type it
//! should order. Directives come from a [`StrategyProvider`]; when none is
//! available the round falls back to [`queue_fallback_wave`] followed by the
//! inert directive.
//!
//! Application is deterministic given the context RNG:
//!
//! 1. **Demolish** - highest pool id first, refunding the sale value.
//! 2. **Build** - types in [`StructureKind::BUILD_PRIORITY`], each on the
//!    lowest free pool slot, until money, slots or the cap run out.
//! 3. **Units** - types in [`UnitKind::ORDER_PRIORITY`], each into a random
//!    opponent barracks, without the player queue limit.
//! 4. **Leftover** - melee into random barracks until melee is unaffordable.

use std::cmp::Reverse;
use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::economy::SideEconomy;
use crate::error::{AdvisorError, StrategyParseError};
use crate::events::{GameEvent, TickEvents};
use crate::map::GridWorld;
use crate::production::PendingUnit;
use crate::rules::GameRules;
use crate::side::Side;
use crate::snapshot::AdvisoryRequest;
use crate::structures::{Structure, StructureKind, StructureRegistry};
use crate::units::UnitKind;

/// Per-type structure counts. Missing keys read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureCounts {
    /// Population structures.
    pub population: u32,
    /// Barracks.
    pub barracks: u32,
    /// Turrets.
    pub turret: u32,
    /// Resource structures.
    pub resource: u32,
}

impl StructureCounts {
    /// Count for one type.
    #[must_use]
    pub const fn get(&self, kind: StructureKind) -> u32 {
        match kind {
            StructureKind::Population => self.population,
            StructureKind::Barracks => self.barracks,
            StructureKind::Turret => self.turret,
            StructureKind::Resource => self.resource,
        }
    }
}

/// Per-type unit counts. Missing keys read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitCounts {
    /// Melee units.
    pub melee: u32,
    /// Ranged units.
    pub ranged: u32,
    /// Tanks.
    pub tank: u32,
}

impl UnitCounts {
    /// Count for one type.
    #[must_use]
    pub const fn get(&self, kind: UnitKind) -> u32 {
        match kind {
            UnitKind::Melee => self.melee,
            UnitKind::Ranged => self.ranged,
            UnitKind::Tank => self.tank,
        }
    }
}

/// Build and demolish requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureOrders {
    /// Structures to build.
    pub build: StructureCounts,
    /// Structures to demolish.
    pub demolish: StructureCounts,
}

/// What the opponent should do this round.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyDirective {
    /// Free-form explanation from the advisor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_reason: Option<String>,
    /// Structure requests.
    pub structures: StructureOrders,
    /// Unit requests.
    pub units: UnitCounts,
}

impl StrategyDirective {
    /// A directive that asks for nothing. Leftover melee still runs.
    #[must_use]
    pub fn inert() -> Self {
        Self::default()
    }

    /// Parse an advisor's reply.
    ///
    /// Accepts bare JSON or JSON wrapped in a markdown code fence.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyParseError::Empty`] for a blank reply and
    /// [`StrategyParseError::Json`] for anything that is not a directive,
    /// negative counts included.
    pub fn from_response(text: &str) -> Result<Self, StrategyParseError> {
        let body = strip_code_fence(text.trim());
        if body.is_empty() {
            return Err(StrategyParseError::Empty);
        }
        Ok(serde_json::from_str(body)?)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Source of opponent directives.
pub trait StrategyProvider {
    /// Produce a directive for the coming round.
    ///
    /// # Errors
    ///
    /// Any error makes the round fall back to the local wave.
    fn advise(&mut self, request: &AdvisoryRequest) -> Result<StrategyDirective, AdvisorError>;
}

impl<P: StrategyProvider + ?Sized> StrategyProvider for Box<P> {
    fn advise(&mut self, request: &AdvisoryRequest) -> Result<StrategyDirective, AdvisorError> {
        (**self).advise(request)
    }
}

/// Provider used when no advisor is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvisor;

impl StrategyProvider for NoAdvisor {
    fn advise(&mut self, _request: &AdvisoryRequest) -> Result<StrategyDirective, AdvisorError> {
        Err(AdvisorError::Unavailable)
    }
}

/// Provider replaying canned replies, one per round.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdvisor {
    replies: VecDeque<String>,
}

impl ScriptedAdvisor {
    /// Create a provider from raw replies.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
        }
    }

    /// Replies not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl StrategyProvider for ScriptedAdvisor {
    fn advise(&mut self, _request: &AdvisoryRequest) -> Result<StrategyDirective, AdvisorError> {
        let reply = self.replies.pop_front().ok_or(AdvisorError::Unavailable)?;
        Ok(StrategyDirective::from_response(&reply)?)
    }
}

/// What applying a directive actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrategyOutcome {
    /// Structures removed.
    pub demolished: u32,
    /// Structures placed.
    pub built: u32,
    /// Units queued, leftover melee included.
    pub queued: u32,
}

/// Apply a directive to the opponent side.
pub fn apply_directive<R: Rng + ?Sized>(
    directive: &StrategyDirective,
    world: &GridWorld,
    rules: &GameRules,
    economy: &mut SideEconomy,
    structures: &mut StructureRegistry,
    rng: &mut R,
    events: &mut TickEvents,
) -> StrategyOutcome {
    if let Some(reason) = &directive.strategy_reason {
        tracing::debug!(reason = %reason, "Applying opponent strategy");
    }

    let demolished = demolish_phase(&directive.structures.demolish, rules, economy, structures, events);
    let built = build_phase(&directive.structures.build, world, rules, economy, structures, events);
    let mut queued = 0;
    if !structures.of(Side::Ai, StructureKind::Barracks).is_empty() {
        queued += unit_phase(&directive.units, rules, economy, structures, rng);
        queued += leftover_phase(rules, economy, structures, rng);
    }

    let outcome = StrategyOutcome {
        demolished,
        built,
        queued,
    };
    tracing::debug!(?outcome, resource = economy.resource, "Opponent strategy applied");
    outcome
}

fn demolish_phase(
    requests: &StructureCounts,
    rules: &GameRules,
    economy: &mut SideEconomy,
    structures: &mut StructureRegistry,
    events: &mut TickEvents,
) -> u32 {
    let mut removed = 0;
    for kind in StructureKind::ALL {
        let wanted = requests.get(kind) as usize;
        if wanted == 0 {
            continue;
        }
        let mut victims: Vec<_> = structures
            .of(Side::Ai, kind)
            .iter()
            .map(|s| (s.pool_id.unwrap_or(0), s.pos))
            .collect();
        victims.sort_by_key(|&(id, _)| Reverse(id));

        for (_, pos) in victims.into_iter().take(wanted) {
            if structures.remove_at(Side::Ai, pos).is_none() {
                continue;
            }
            let refund = rules.refund_for(kind);
            economy.deposit(refund);
            economy.structure_removed(rules.structures.get(kind).max_population_bonus);
            events.push(GameEvent::StructureRemoved {
                side: Side::Ai,
                kind,
                pos,
                refund,
            });
            removed += 1;
        }
    }
    removed
}

fn build_phase(
    requests: &StructureCounts,
    world: &GridWorld,
    rules: &GameRules,
    economy: &mut SideEconomy,
    structures: &mut StructureRegistry,
    events: &mut TickEvents,
) -> u32 {
    let mut built = 0;
    for kind in StructureKind::BUILD_PRIORITY {
        let stats = rules.structures.get(kind);
        for _ in 0..requests.get(kind) {
            if economy.structure_count >= rules.max_structures || !economy.can_afford(stats.cost) {
                break;
            }
            let Some(slot) = structures.first_free_slot(world.ai_pools.get(kind)).copied() else {
                tracing::debug!(?kind, "Position pool exhausted");
                break;
            };

            structures.insert(
                Structure::new(Side::Ai, kind, slot.pos, slot.spawn, rules.player_queue_limit)
                    .with_pool_id(Some(slot.id)),
            );
            economy.spend(stats.cost);
            economy.structure_added(stats.max_population_bonus);
            events.push(GameEvent::StructurePlaced {
                side: Side::Ai,
                kind,
                pos: slot.pos,
            });
            built += 1;
        }
    }
    built
}

/// Put a paid unit into a random opponent barracks.
fn order_unit<R: Rng + ?Sized>(
    kind: UnitKind,
    rules: &GameRules,
    economy: &mut SideEconomy,
    structures: &mut StructureRegistry,
    rng: &mut R,
) -> bool {
    let stats = rules.units.get(kind);
    let barracks = structures.of_mut(Side::Ai, StructureKind::Barracks);
    if barracks.is_empty() || !economy.can_afford(stats.cost) {
        return false;
    }
    let index = rng.gen_range(0..barracks.len());
    let Some(state) = barracks.get_mut(index).and_then(|s| s.barracks.as_mut()) else {
        return false;
    };
    state.production.push_unbounded(PendingUnit::priced(kind, stats));
    economy.spend(stats.cost);
    true
}

fn unit_phase<R: Rng + ?Sized>(
    requests: &UnitCounts,
    rules: &GameRules,
    economy: &mut SideEconomy,
    structures: &mut StructureRegistry,
    rng: &mut R,
) -> u32 {
    let mut queued = 0;
    for kind in UnitKind::ORDER_PRIORITY {
        for _ in 0..requests.get(kind) {
            if !order_unit(kind, rules, economy, structures, rng) {
                break;
            }
            queued += 1;
        }
    }
    queued
}

fn leftover_phase<R: Rng + ?Sized>(
    rules: &GameRules,
    economy: &mut SideEconomy,
    structures: &mut StructureRegistry,
    rng: &mut R,
) -> u32 {
    // Free melee would never exhaust the budget.
    if rules.units.melee.cost <= 0 {
        return 0;
    }
    let mut queued = 0;
    while order_unit(UnitKind::Melee, rules, economy, structures, rng) {
        queued += 1;
    }
    queued
}

/// Unit counts of the local fallback wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FallbackWave {
    /// Round-derived scaling factor.
    pub stage: u32,
    /// Melee units.
    pub melee: u32,
    /// Ranged units.
    pub ranged: u32,
    /// Tanks.
    pub tank: u32,
}

/// Size of the fallback wave for a round.
#[must_use]
pub const fn fallback_wave(round: u32) -> FallbackWave {
    let stage = round.div_ceil(2);
    FallbackWave {
        stage,
        melee: 2 * stage,
        ranged: if stage >= 2 { stage } else { 0 },
        tank: if stage >= 3 { stage / 2 } else { 0 },
    }
}

/// Queue the fallback wave for free.
///
/// Tanks then melee go into the first opponent barracks, ranged into the
/// last. Without barracks nothing is queued.
pub fn queue_fallback_wave(round: u32, rules: &GameRules, structures: &mut StructureRegistry) -> FallbackWave {
    let wave = fallback_wave(round);
    let barracks = structures.of_mut(Side::Ai, StructureKind::Barracks);
    let units = &rules.units;

    if let Some(first) = barracks.first_mut().and_then(|s| s.barracks.as_mut()) {
        for _ in 0..wave.tank {
            first.production.push_unbounded(PendingUnit::free(UnitKind::Tank, &units.tank));
        }
        for _ in 0..wave.melee {
            first.production.push_unbounded(PendingUnit::free(UnitKind::Melee, &units.melee));
        }
    } else {
        tracing::debug!(round, "No opponent barracks for the fallback wave");
        return FallbackWave::default();
    }
    if let Some(last) = barracks.last_mut().and_then(|s| s.barracks.as_mut()) {
        for _ in 0..wave.ranged {
            last.production.push_unbounded(PendingUnit::free(UnitKind::Ranged, &units.ranged));
        }
    }
    tracing::debug!(round, ?wave, "Queued fallback wave");
    wave
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::GridPos;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Fixture {
        world: GridWorld,
        rules: GameRules,
        economy: SideEconomy,
        structures: StructureRegistry,
        rng: ChaCha8Rng,
        events: TickEvents,
    }

    impl Fixture {
        fn new() -> Self {
            let world = GridWorld::standard();
            let rules = GameRules::default();
            let structures = StructureRegistry::with_starting(&world, &rules);
            let mut economy = SideEconomy::starting(&rules);
            economy.structure_count = 2;
            Self {
                world,
                rules,
                economy,
                structures,
                rng: ChaCha8Rng::seed_from_u64(7),
                events: TickEvents::default(),
            }
        }

        fn apply(&mut self, directive: &StrategyDirective) -> StrategyOutcome {
            apply_directive(
                directive,
                &self.world,
                &self.rules,
                &mut self.economy,
                &mut self.structures,
                &mut self.rng,
                &mut self.events,
            )
        }

        fn queued_units(&self) -> usize {
            self.structures
                .of(Side::Ai, StructureKind::Barracks)
                .iter()
                .filter_map(|s| s.barracks.as_ref())
                .map(|b| b.production.len())
                .sum()
        }
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        let plain = r#"{"structures":{"build":{"turret":2}},"units":{"melee":3}}"#;
        let directive = StrategyDirective::from_response(plain).unwrap();
        assert_eq!(directive.structures.build.turret, 2);
        assert_eq!(directive.structures.demolish, StructureCounts::default());
        assert_eq!(directive.units.melee, 3);

        let fenced = format!("```json\n{plain}\n```");
        assert_eq!(StrategyDirective::from_response(&fenced).unwrap(), directive);
    }

    #[test]
    fn test_parse_reason_and_unknown_keys() {
        let text = r#"{"strategy_reason":"turtle","mood":"calm","units":{"tank":1}}"#;
        let directive = StrategyDirective::from_response(text).unwrap();
        assert_eq!(directive.strategy_reason.as_deref(), Some("turtle"));
        assert_eq!(directive.units.tank, 1);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            StrategyDirective::from_response("  \n"),
            Err(StrategyParseError::Empty)
        ));
        assert!(matches!(
            StrategyDirective::from_response(r#"{"units":{"melee":-1}}"#),
            Err(StrategyParseError::Json(_))
        ));
        assert!(StrategyDirective::from_response("build more turrets").is_err());
    }

    #[test]
    fn test_demolish_highest_pool_id_first() {
        let mut fx = Fixture::new();
        for slot in fx.world.ai_pools.turret.iter().take(3) {
            fx.structures.insert(
                Structure::new(Side::Ai, StructureKind::Turret, slot.pos, None, 2)
                    .with_pool_id(Some(slot.id)),
            );
            fx.economy.structure_added(0);
        }
        fx.economy.resource = 0;

        let mut directive = StrategyDirective::inert();
        directive.structures.demolish.turret = 1;
        let outcome = fx.apply(&directive);

        assert_eq!(outcome.demolished, 1);
        let ids: Vec<_> = fx
            .structures
            .of(Side::Ai, StructureKind::Turret)
            .iter()
            .map(|s| s.pool_id)
            .collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
        assert_eq!(fx.economy.structure_count, 4);
        // The refund buys leftover melee; 10 resource is two of them.
        assert_eq!(outcome.queued, 2);
        assert_eq!(fx.economy.resource, 0);
        assert_eq!(
            fx.events.events[0],
            GameEvent::StructureRemoved {
                side: Side::Ai,
                kind: StructureKind::Turret,
                pos: GridPos::new(12, 3),
                refund: 10,
            }
        );
    }

    #[test]
    fn test_demolish_population_lowers_cap() {
        let mut fx = Fixture::new();
        let mut directive = StrategyDirective::inert();
        directive.structures.demolish.population = 5;
        fx.economy.resource = 0;

        let outcome = fx.apply(&directive);
        assert_eq!(outcome.demolished, 1);
        assert_eq!(fx.economy.max_population, 0);
        assert_eq!(fx.economy.structure_count, 1);
    }

    #[test]
    fn test_build_priority_stops_when_broke() {
        let mut fx = Fixture::new();
        let mut directive = StrategyDirective::inert();
        directive.structures.build.population = 1;
        directive.structures.build.turret = 2;
        directive.structures.build.barracks = 1;

        let outcome = fx.apply(&directive);
        assert_eq!(outcome.built, 2);
        let turrets: Vec<_> = fx
            .structures
            .of(Side::Ai, StructureKind::Turret)
            .iter()
            .map(|s| (s.pool_id, s.pos))
            .collect();
        assert_eq!(
            turrets,
            vec![(Some(1), GridPos::new(12, 5)), (Some(2), GridPos::new(8, 4))]
        );
        assert_eq!(fx.structures.of(Side::Ai, StructureKind::Barracks).len(), 1);
        assert_eq!(fx.structures.of(Side::Ai, StructureKind::Population).len(), 1);
        // 10 left over becomes two melee.
        assert_eq!(fx.economy.resource, 0);
        assert_eq!(fx.queued_units(), 2);
    }

    #[test]
    fn test_build_respects_cap_and_occupancy() {
        let mut fx = Fixture::new();
        fx.economy.resource = 1000;
        fx.economy.structure_count = 9;
        // A player structure on turret slot 1 makes it unavailable.
        fx.structures.insert(Structure::new(
            Side::Player,
            StructureKind::Turret,
            GridPos::new(12, 5),
            None,
            2,
        ));

        let mut directive = StrategyDirective::inert();
        directive.structures.build.turret = 3;
        let outcome = fx.apply(&directive);

        assert_eq!(outcome.built, 1);
        let turret = &fx.structures.of(Side::Ai, StructureKind::Turret)[0];
        assert_eq!(turret.pool_id, Some(2));
        assert_eq!(fx.economy.structure_count, 10);
    }

    #[test]
    fn test_barracks_build_gets_spawn_point() {
        let mut fx = Fixture::new();
        let mut directive = StrategyDirective::inert();
        directive.structures.build.barracks = 1;
        fx.apply(&directive);

        let built = &fx.structures.of(Side::Ai, StructureKind::Barracks)[1];
        assert_eq!(built.pool_id, Some(2));
        assert_eq!(
            built.barracks.as_ref().map(|b| b.spawn_point),
            Some(GridPos::new(11, 2))
        );
    }

    #[test]
    fn test_units_then_leftover_melee() {
        let mut fx = Fixture::new();
        fx.economy.resource = 20;
        let mut directive = StrategyDirective::inert();
        directive.units.tank = 1;
        directive.units.ranged = 5;

        let outcome = fx.apply(&directive);
        // Tank 10, then ranged 5 + 5, nothing left for melee.
        assert_eq!(outcome.queued, 3);
        assert_eq!(fx.economy.resource, 0);

        let queue = fx.structures.of(Side::Ai, StructureKind::Barracks)[0]
            .barracks
            .as_ref()
            .map(|b| b.production.queue.iter().map(|u| u.kind).collect::<Vec<_>>());
        assert_eq!(
            queue.as_deref(),
            Some(&[UnitKind::Tank, UnitKind::Ranged, UnitKind::Ranged][..])
        );
    }

    #[test]
    fn test_units_skipped_without_barracks() {
        let mut fx = Fixture::new();
        fx.structures.of_mut(Side::Ai, StructureKind::Barracks).clear();
        let mut directive = StrategyDirective::inert();
        directive.units.melee = 4;

        let outcome = fx.apply(&directive);
        assert_eq!(outcome.queued, 0);
        assert_eq!(fx.economy.resource, 50);
    }

    #[test]
    fn test_same_seed_same_barracks_choice() {
        let run = || {
            let mut fx = Fixture::new();
            let mut directive = StrategyDirective::inert();
            directive.structures.build.barracks = 2;
            fx.economy.resource = 100;
            fx.apply(&directive);
            fx.structures
                .of(Side::Ai, StructureKind::Barracks)
                .iter()
                .map(|s| s.barracks.as_ref().map_or(0, |b| b.production.len()))
                .collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first, run());
        assert_eq!(first.iter().sum::<usize>(), 12);
    }

    #[test]
    fn test_fallback_wave_sizes() {
        let sizes: Vec<_> = [1, 2, 3, 5, 6, 9]
            .into_iter()
            .map(|r| {
                let w = fallback_wave(r);
                (w.stage, w.melee, w.ranged, w.tank)
            })
            .collect();
        assert_eq!(
            sizes,
            vec![
                (1, 2, 0, 0),
                (1, 2, 0, 0),
                (2, 4, 2, 0),
                (3, 6, 3, 1),
                (3, 6, 3, 1),
                (5, 10, 5, 2),
            ]
        );
    }

    #[test]
    fn test_fallback_wave_placement() {
        let mut fx = Fixture::new();
        let slot = fx.world.ai_pools.barracks[1];
        fx.structures.insert(
            Structure::new(Side::Ai, StructureKind::Barracks, slot.pos, slot.spawn, 2)
                .with_pool_id(Some(slot.id)),
        );

        queue_fallback_wave(5, &fx.rules, &mut fx.structures);

        let kinds = |i: usize| -> Vec<UnitKind> {
            fx.structures.of(Side::Ai, StructureKind::Barracks)[i]
                .barracks
                .as_ref()
                .map(|b| b.production.queue.iter().map(|u| u.kind).collect())
                .unwrap_or_default()
        };
        let first = kinds(0);
        assert_eq!(first.len(), 7);
        assert_eq!(first[0], UnitKind::Tank);
        assert!(first[1..].iter().all(|&k| k == UnitKind::Melee));
        assert_eq!(kinds(1), vec![UnitKind::Ranged; 3]);
        assert_eq!(fx.economy.resource, 50);
    }

    #[test]
    fn test_scripted_advisor_replays_then_fails() {
        let mut advisor = ScriptedAdvisor::new([r#"{"units":{"melee":1}}"#, "nonsense"]);
        let request = AdvisoryRequest::default();
        assert!(advisor.advise(&request).is_ok());
        assert!(matches!(advisor.advise(&request), Err(AdvisorError::Parse(_))));
        assert!(matches!(advisor.advise(&request), Err(AdvisorError::Unavailable)));
        assert_eq!(advisor.remaining(), 0);
        assert!(NoAdvisor.advise(&request).is_err());
    }
}
