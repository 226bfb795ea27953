//! The simulation context and its tick loop.
//!
//! [`SimulationContext`] owns every piece of mutable game state. Callers
//! drive it with commands (place, sell, enqueue, cancel), round starts and
//! [`SimulationContext::tick`], and receive [`TickEvents`] back.
//!
//! # Determinism
//!
//! - Positions and speeds are fixed-point, timers are integer milliseconds
//! - The only randomness is a seeded ChaCha RNG owned by the context
//! - Structures and units are processed in a fixed order
//!
//! Two contexts built from the same rules and seed, fed the same commands
//! and tick lengths, hash identically after every tick.
//!
//! # Example
//!
//! ```
//! use td_core::prelude::*;
//!
//! let mut ctx = SimulationContext::new(GameRules::default(), 42);
//! ctx.place_structure(Side::Player, StructureKind::Turret, GridPos::new(1, 0))
//!     .unwrap();
//! ctx.start_round_with(&mut NoAdvisor).unwrap();
//! let events = ctx.tick(16);
//! assert_eq!(ctx.economy(Side::Player).resource, 30);
//! # let _ = events;
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::combat::Base;
use crate::economy::SideEconomy;
use crate::error::{AdvisorError, CommandError, GameError, Result};
use crate::events::{GameEvent, SoundCue, TickEvents};
use crate::map::{GridPos, GridWorld};
use crate::persistence::{EconomySave, SaveData, SaveStore, SideSave, StructureRecord, StructuresSave};
use crate::production::{
    advance_production, cancel_production, queue_production, CancelSlot, PendingUnit, ProductionStep,
};
use crate::rounds::{end_round, round_should_end, RoundPhase, RoundState, UnitRecord};
use crate::rules::GameRules;
use crate::side::{PerSide, Side};
use crate::snapshot::{AdvisoryRequest, GameStateSnapshot, RulesDocument, SideSnapshot};
use crate::strategy::{apply_directive, queue_fallback_wave, StrategyDirective, StrategyProvider};
use crate::structures::{BarracksState, Structure, StructureKind, StructureRegistry};
use crate::turrets::run_turret_system;
use crate::units::{run_unit_system, Unit, UnitId, UnitKind, UnitRoster};

/// All mutable state of one game.
///
/// # System Execution Order
///
/// Each tick runs, in order:
/// 1. **Production** - barracks advance and spawn (active rounds only)
/// 2. **Turrets** - cooldowns and shots
/// 3. **Reap** - dead units leave the roster
/// 4. **Units** - targeting, attacks and walking
/// 5. **Reap** - again, for the unit pass
/// 6. **Round end** - checked while a round is active
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationContext {
    tick: u64,
    seed: u64,
    world: GridWorld,
    rules: GameRules,
    round: RoundState,
    economies: PerSide<SideEconomy>,
    bases: PerSide<Base>,
    structures: StructureRegistry,
    units: UnitRoster,
    records: Vec<UnitRecord>,
    rng: ChaCha8Rng,
}

impl SimulationContext {
    /// A fresh game on the standard map.
    #[must_use]
    pub fn new(rules: GameRules, seed: u64) -> Self {
        Self::with_world(GridWorld::standard(), rules, seed)
    }

    /// A fresh game on a custom map.
    #[must_use]
    pub fn with_world(world: GridWorld, rules: GameRules, seed: u64) -> Self {
        let structures = StructureRegistry::with_starting(&world, &rules);
        let economies = PerSide::from_fn(|side| {
            let mut economy = SideEconomy::starting(&rules);
            economy.structure_count = count_u32(structures.count(side));
            economy
        });
        let bases = PerSide::from_fn(|side| Base::new(side, world.bases[side], rules.starting.base_hp));

        Self {
            tick: 0,
            seed,
            world,
            rules,
            round: RoundState::default(),
            economies,
            bases,
            structures,
            units: UnitRoster::new(),
            records: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Seed the context was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// The battlefield.
    #[must_use]
    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    /// Rules in force.
    #[must_use]
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Round counter, phase and winner.
    #[must_use]
    pub const fn round(&self) -> &RoundState {
        &self.round
    }

    /// One side's economy.
    #[must_use]
    pub fn economy(&self, side: Side) -> &SideEconomy {
        &self.economies[side]
    }

    /// One side's economy, mutably. Intended for tools and tests.
    pub fn economy_mut(&mut self, side: Side) -> &mut SideEconomy {
        &mut self.economies[side]
    }

    /// One side's base.
    #[must_use]
    pub fn base(&self, side: Side) -> &Base {
        &self.bases[side]
    }

    /// Every structure.
    #[must_use]
    pub fn structures(&self) -> &StructureRegistry {
        &self.structures
    }

    /// Units on the field.
    #[must_use]
    pub fn units(&self) -> &UnitRoster {
        &self.units
    }

    /// Production records of recent rounds.
    #[must_use]
    pub fn records(&self) -> &[UnitRecord] {
        &self.records
    }

    /// The winner, once a base has fallen.
    #[must_use]
    pub const fn winner(&self) -> Option<Side> {
        self.round.winner
    }

    fn ensure_not_over(&self) -> Result<()> {
        if self.round.is_over() {
            return Err(CommandError::GameOver.into());
        }
        Ok(())
    }

    /// Place a structure for `side`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Placement`] naming the first legality rule that
    /// fails, or [`CommandError::GameOver`]. Nothing changes on error.
    pub fn place_structure(&mut self, side: Side, kind: StructureKind, pos: GridPos) -> Result<TickEvents> {
        self.ensure_not_over()?;
        let stats = *self.rules.structures.get(kind);
        self.world.check_placement(
            side,
            kind,
            pos,
            stats.cost,
            self.rules.max_structures,
            &self.economies[side],
            &self.structures,
        )?;

        let pool_id = match side {
            Side::Ai => self.world.ai_pools.id_at(kind, pos),
            Side::Player => None,
        };
        let spawn = self.world.barracks_spawn(side, pos);
        self.structures.insert(
            Structure::new(side, kind, pos, spawn, self.rules.player_queue_limit).with_pool_id(pool_id),
        );
        let economy = &mut self.economies[side];
        economy.spend(stats.cost);
        economy.structure_added(stats.max_population_bonus);
        tracing::debug!(%side, ?kind, %pos, resource = economy.resource, "Structure placed");

        let mut events = TickEvents::default();
        events.push(GameEvent::StructurePlaced { side, kind, pos });
        Ok(events)
    }

    /// Sell the structure `side` owns on `pos` for the refund value.
    ///
    /// A barracks' current unit and queue are dropped without refund.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NoStructure`] if the side owns nothing there.
    pub fn sell_structure(&mut self, side: Side, pos: GridPos) -> Result<TickEvents> {
        self.ensure_not_over()?;
        let removed = self
            .structures
            .remove_at(side, pos)
            .ok_or(CommandError::NoStructure(pos))?;

        let kind = removed.kind;
        let refund = self.rules.refund_for(kind);
        let economy = &mut self.economies[side];
        economy.deposit(refund);
        economy.structure_removed(self.rules.structures.get(kind).max_population_bonus);
        tracing::debug!(%side, ?kind, %pos, refund, "Structure sold");

        let mut events = TickEvents::default();
        events.push(GameEvent::StructureRemoved {
            side,
            kind,
            pos,
            refund,
        });
        Ok(events)
    }

    fn barracks_at(&mut self, side: Side, pos: GridPos) -> Result<&mut BarracksState> {
        let structure = self
            .structures
            .find_mut(side, pos)
            .ok_or(CommandError::NoStructure(pos))?;
        let kind = structure.kind;
        structure
            .barracks
            .as_mut()
            .ok_or(GameError::Command(CommandError::NotBarracks { pos, kind }))
    }

    /// Order a unit from the barracks `side` owns on `pos`.
    ///
    /// The cost is charged at once.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Production`] for the first failing gate (round
    /// inactive, resource, population, queue limit) or a
    /// [`GameError::Command`] if there is no barracks on `pos`.
    pub fn enqueue_unit(&mut self, side: Side, pos: GridPos, kind: UnitKind) -> Result<()> {
        self.ensure_not_over()?;
        let unit = PendingUnit::priced(kind, self.rules.units.get(kind));
        let round_active = self.round.is_active();
        let economy = &mut self.economies[side];
        let structure = self
            .structures
            .find_mut(side, pos)
            .ok_or(CommandError::NoStructure(pos))?;
        let found = structure.kind;
        let barracks = structure
            .barracks
            .as_mut()
            .ok_or(CommandError::NotBarracks { pos, kind: found })?;

        queue_production(&mut barracks.production, unit, round_active, economy)?;
        tracing::debug!(%side, ?kind, %pos, queued = barracks.production.len(), "Unit queued");
        Ok(())
    }

    /// Cancel a unit in the barracks `side` owns on `pos`, refunding its cost.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::EmptySlot`] if the slot holds nothing, or a
    /// [`GameError::Command`] if there is no barracks on `pos`.
    pub fn cancel_production(&mut self, side: Side, pos: GridPos, slot: CancelSlot) -> Result<PendingUnit> {
        self.ensure_not_over()?;
        let mut economy = self.economies[side];
        let barracks = self.barracks_at(side, pos)?;
        let cancelled =
            cancel_production(&mut barracks.production, slot, &mut economy).ok_or(CommandError::EmptySlot)?;
        self.economies[side] = economy;
        tracing::debug!(%side, kind = ?cancelled.kind, refund = cancelled.cost, "Production cancelled");
        Ok(cancelled)
    }

    fn ensure_can_start(&self) -> Result<()> {
        self.ensure_not_over()?;
        if self.round.is_active() {
            return Err(CommandError::RoundInProgress.into());
        }
        Ok(())
    }

    /// Start the next round with an advisor's answer.
    ///
    /// A directive is applied as is. Any advisor error queues the local
    /// fallback wave and then applies the inert directive.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::RoundInProgress`] or [`CommandError::GameOver`].
    pub fn begin_round(&mut self, advice: std::result::Result<StrategyDirective, AdvisorError>) -> Result<TickEvents> {
        self.ensure_can_start()?;
        let mut events = TickEvents::default();
        events.push(GameEvent::Checkpoint);

        self.round.phase = RoundPhase::Active;
        let round = self.round.round;
        tracing::info!(round, "Round started");
        events.push(GameEvent::RoundStarted { round });

        let directive = match advice {
            Ok(directive) => directive,
            Err(error) => {
                tracing::warn!(round, %error, "Advisor unavailable, using fallback wave");
                queue_fallback_wave(round, &self.rules, &mut self.structures);
                StrategyDirective::inert()
            }
        };
        let outcome = apply_directive(
            &directive,
            &self.world,
            &self.rules,
            &mut self.economies.ai,
            &mut self.structures,
            &mut self.rng,
            &mut events,
        );
        tracing::debug!(
            round,
            demolished = outcome.demolished,
            built = outcome.built,
            queued = outcome.queued,
            reason = directive.strategy_reason.as_deref().unwrap_or(""),
            "Opponent directive applied"
        );
        Ok(events)
    }

    /// Ask `provider` for a directive and start the next round with it.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::RoundInProgress`] or [`CommandError::GameOver`].
    /// Advisor failures are not errors; they trigger the fallback.
    pub fn start_round_with<P: StrategyProvider + ?Sized>(&mut self, provider: &mut P) -> Result<TickEvents> {
        self.ensure_can_start()?;
        let request = self.advisory_request();
        let advice = provider.advise(&request);
        self.begin_round(advice)
    }

    /// Advance the game by `dt_ms`, capped at the rules' tick limit.
    ///
    /// Once the game is over every tick is a no-op.
    pub fn tick(&mut self, dt_ms: u32) -> TickEvents {
        let mut events = TickEvents::default();
        if self.round.is_over() {
            return events;
        }
        let dt = dt_ms.min(self.rules.max_tick_ms);

        // 1. Production
        if self.round.is_active() {
            self.run_production_system(dt, &mut events);
        }

        // 2. Turrets
        run_turret_system(
            &mut self.structures,
            &mut self.units,
            &self.world,
            &self.rules.turret,
            dt,
            &mut events,
        );
        self.reap_dead(&mut events);

        // 3. Units
        let winner = run_unit_system(&mut self.units, &mut self.bases, &self.world, dt, &mut events);
        self.reap_dead(&mut events);

        // 4. Game over or round end
        if let Some(winner) = winner {
            self.finish_game(winner, &mut events);
        } else if self.round.is_active() && round_should_end(&self.economies, &self.units, &self.structures) {
            end_round(
                &mut self.round,
                &self.world,
                &self.rules,
                &mut self.economies,
                &mut self.structures,
                &mut self.records,
                &mut events,
            );
        }

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    fn run_production_system(&mut self, dt_ms: u32, events: &mut TickEvents) {
        let round = self.round.round;
        for side in Side::ALL {
            let economy = &mut self.economies[side];
            for structure in self.structures.of_mut(side, StructureKind::Barracks) {
                let barracks_pos = structure.pos;
                let Some(barracks) = structure.barracks.as_mut() else {
                    continue;
                };

                match advance_production(&mut barracks.production, dt_ms, economy) {
                    ProductionStep::Idle | ProductionStep::Blocked(_) => {}
                    ProductionStep::Started(kind) => events.push(GameEvent::ProductionProgress {
                        side,
                        barracks: barracks_pos,
                        kind,
                        percent: 0,
                    }),
                    ProductionStep::Progress { kind, percent } => {
                        events.push(GameEvent::ProductionProgress {
                            side,
                            barracks: barracks_pos,
                            kind,
                            percent,
                        });
                    }
                    ProductionStep::Completed(unit) => {
                        let spawn_point = barracks.spawn_point;
                        let stats = self.rules.units.get(unit.kind);
                        let id = self.units.spawn(side, unit.kind, stats, spawn_point, &self.world).id;
                        self.records.push(UnitRecord {
                            side,
                            kind: unit.kind,
                            round,
                        });
                        tracing::debug!(%side, kind = ?unit.kind, id = id.0, pos = %spawn_point, "Unit spawned");
                        events.push(GameEvent::UnitSpawned {
                            id,
                            side,
                            kind: unit.kind,
                            pos: spawn_point,
                        });
                    }
                }
            }
        }
    }

    fn reap_dead(&mut self, events: &mut TickEvents) {
        let dead = self.units.reap_dead();
        self.remove_units(dead, events);
    }

    fn remove_units(&mut self, units: Vec<Unit>, events: &mut TickEvents) {
        for unit in units {
            self.economies[unit.side].remove_population(unit.population_cost);
            tracing::debug!(side = %unit.side, kind = ?unit.kind, id = unit.id.0, "Unit killed");
            events.push(GameEvent::UnitKilled {
                id: unit.id,
                side: unit.side,
                kind: unit.kind,
            });
            events.push(GameEvent::Sound {
                cue: SoundCue::UnitRemoved(unit.kind),
            });
        }
    }

    fn finish_game(&mut self, winner: Side, events: &mut TickEvents) {
        self.round.winner = Some(winner);
        self.round.phase = RoundPhase::Idle;
        let survivors = self.units.drain_all();
        self.remove_units(survivors, events);
        tracing::info!(%winner, round = self.round.round, "Game over");
        events.push(GameEvent::GameOver { winner });
    }

    /// Put a unit straight onto the field, charging its population.
    ///
    /// Bypasses production and the population cap. Intended for tools,
    /// scenarios and tests.
    pub fn spawn_unit(&mut self, side: Side, kind: UnitKind, spawn_point: GridPos) -> UnitId {
        let stats = self.rules.units.get(kind);
        self.economies[side].add_population(stats.population_cost);
        self.units.spawn(side, kind, stats, spawn_point, &self.world).id
    }

    /// The game as `side` sees it.
    #[must_use]
    pub fn snapshot(&self, side: Side) -> GameStateSnapshot {
        let round = self.round.round;
        let capture = |s: Side| {
            SideSnapshot::capture(
                s,
                round,
                &self.economies[s],
                &self.bases[s],
                &self.structures,
                &self.units,
                &self.records,
            )
        };
        GameStateSnapshot {
            round,
            own: capture(side),
            enemy: capture(side.opponent()),
        }
    }

    /// The request sent to an opponent advisor.
    #[must_use]
    pub fn advisory_request(&self) -> AdvisoryRequest {
        AdvisoryRequest::new(self.snapshot(Side::Ai), RulesDocument::from_rules(&self.rules))
    }

    /// Capture the persistent part of the game.
    #[must_use]
    pub fn save_data(&self) -> SaveData {
        let records =
            |side: Side| self.structures.side(side).iter().map(StructureRecord::capture).collect();
        SaveData {
            economy: Some(EconomySave {
                round: Some(self.round.round),
                player: Some(SideSave::capture(&self.economies.player, self.bases.player.hp)),
                ai: Some(SideSave::capture(&self.economies.ai, self.bases.ai.hp)),
            }),
            structures: Some(StructuresSave {
                player: records(Side::Player),
                ai: records(Side::Ai),
            }),
        }
    }

    /// Apply a save on top of the current state.
    ///
    /// Missing fields keep their current values. The field is cleared and
    /// the round left idle. Structure counts and population are brought
    /// back in line with the registry and the (empty) roster.
    pub fn restore(&mut self, save: &SaveData) {
        if let Some(economy) = &save.economy {
            if let Some(round) = economy.round {
                self.round.round = round.max(1);
            }
            for (side, section) in [(Side::Player, economy.player), (Side::Ai, economy.ai)] {
                match section {
                    Some(section) => section.apply(&mut self.economies[side], &mut self.bases[side].hp),
                    None => tracing::warn!(%side, "Save has no economy for side, keeping current values"),
                }
            }
        } else {
            tracing::warn!("Save has no economy section, keeping current values");
        }
        if let Some(structures) = &save.structures {
            self.structures = StructureRegistry::from_sets(structures.restore(&self.world, &self.rules));
        }

        self.units.drain_all();
        self.round.phase = RoundPhase::Idle;
        self.round.winner = Side::ALL
            .into_iter()
            .find(|&side| self.bases[side].hp <= 0)
            .map(Side::opponent);
        if let Some(winner) = self.round.winner {
            tracing::info!(%winner, "Restored a finished game");
        }
        for side in Side::ALL {
            let owned = count_u32(self.structures.count(side));
            let economy = &mut self.economies[side];
            if economy.structure_count != owned {
                tracing::warn!(%side, saved = economy.structure_count, owned, "Structure count corrected");
                economy.structure_count = owned;
            }
            if economy.population != 0 {
                tracing::warn!(%side, saved = economy.population, "Population reset for empty field");
                economy.population = 0;
            }
        }
    }

    /// Save to `store`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if writing fails.
    pub fn persist<S: SaveStore + ?Sized>(&self, store: &mut S) -> std::result::Result<(), S::Error> {
        store.save(&self.save_data())
    }

    /// Restore from `store` if it holds a save. Returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns the store's error if reading fails.
    pub fn load_from<S: SaveStore + ?Sized>(&mut self, store: &S) -> std::result::Result<bool, S::Error> {
        match store.load()? {
            Some(save) => {
                self.restore(&save);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Start over with the same world, rules and seed.
    pub fn reset(&mut self) {
        let world = std::mem::take(&mut self.world);
        let rules = std::mem::take(&mut self.rules);
        *self = Self::with_world(world, rules, self.seed);
        tracing::info!(seed = self.seed, "Game reset");
    }

    /// Start over and forget the stored save.
    ///
    /// # Errors
    ///
    /// Returns the store's error if clearing fails. The game is reset
    /// either way.
    pub fn reset_with<S: SaveStore + ?Sized>(&mut self, store: &mut S) -> std::result::Result<(), S::Error> {
        self.reset();
        store.clear()
    }

    /// Hash of the whole game state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.round.hash(&mut hasher);
        self.economies.hash(&mut hasher);
        self.bases.hash(&mut hasher);
        self.structures.hash(&mut hasher);
        self.units.hash(&mut hasher);
        self.records.hash(&mut hasher);
        self.rng.get_word_pos().hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the whole context.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {}", e)))
    }

    /// Deserialize a context produced by [`Self::serialize`].
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {}", e))
        })
    }
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self::new(GameRules::default(), 0)
    }
}

fn count_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlacementError, ProductionError};
    use crate::persistence::MemoryStore;
    use crate::strategy::{NoAdvisor, ScriptedAdvisor};

    const PLAYER_BARRACKS: GridPos = GridPos::new(2, 8);

    fn ctx() -> SimulationContext {
        SimulationContext::new(GameRules::default(), 7)
    }

    fn ai_queue_len(ctx: &SimulationContext) -> usize {
        ctx.structures()
            .of(Side::Ai, StructureKind::Barracks)
            .iter()
            .filter_map(|s| s.barracks.as_ref())
            .map(|b| b.production.len() + usize::from(b.production.current.is_some()))
            .sum()
    }

    #[test]
    fn test_fresh_game() {
        let ctx = ctx();
        assert_eq!(ctx.round().round, 1);
        assert!(!ctx.round().is_active());
        for side in Side::ALL {
            let economy = ctx.economy(side);
            assert_eq!(economy.resource, 50);
            assert_eq!(economy.population, 0);
            assert_eq!(economy.max_population, 3);
            assert_eq!(economy.structure_count, 2);
            assert_eq!(ctx.base(side).hp, 100);
        }
    }

    #[test]
    fn test_place_then_run_out_of_money() {
        let mut ctx = ctx();
        ctx.place_structure(Side::Player, StructureKind::Population, GridPos::new(0, 0))
            .unwrap();
        ctx.place_structure(Side::Player, StructureKind::Turret, GridPos::new(1, 0))
            .unwrap();
        assert_eq!(ctx.economy(Side::Player).resource, 10);
        assert_eq!(ctx.economy(Side::Player).structure_count, 4);
        assert_eq!(ctx.economy(Side::Player).max_population, 6);

        let err = ctx
            .place_structure(Side::Player, StructureKind::Turret, GridPos::new(2, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::Placement(PlacementError::InsufficientResources { required: 20, available: 10 })
        ));
        assert_eq!(ctx.economy(Side::Player).structure_count, 4);
    }

    #[test]
    fn test_sell_refunds_half() {
        let mut ctx = ctx();
        let pos = GridPos::new(0, 0);
        ctx.place_structure(Side::Player, StructureKind::Population, pos).unwrap();
        let events = ctx.sell_structure(Side::Player, pos).unwrap();

        assert_eq!(ctx.economy(Side::Player).resource, 40);
        assert_eq!(ctx.economy(Side::Player).structure_count, 2);
        assert_eq!(ctx.economy(Side::Player).max_population, 3);
        assert_eq!(events.events.len(), 1);
        assert!(matches!(
            ctx.sell_structure(Side::Player, pos),
            Err(GameError::Command(CommandError::NoStructure(_)))
        ));
    }

    #[test]
    fn test_enqueue_gates() {
        let mut ctx = ctx();
        assert!(matches!(
            ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Melee),
            Err(GameError::Production(ProductionError::RoundInactive))
        ));
        assert!(matches!(
            ctx.enqueue_unit(Side::Player, GridPos::new(0, 9), UnitKind::Melee),
            Err(GameError::Command(CommandError::NotBarracks { .. }))
        ));

        ctx.start_round_with(&mut ScriptedAdvisor::new(["{}"])).unwrap();
        ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Melee).unwrap();
        ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Melee).unwrap();
        assert_eq!(ctx.economy(Side::Player).resource, 40);

        let before = ctx.economy(Side::Player).resource;
        assert!(matches!(
            ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Melee),
            Err(GameError::Production(ProductionError::QueueFull))
        ));
        assert_eq!(ctx.economy(Side::Player).resource, before);
    }

    #[test]
    fn test_cancel_refunds_and_promotes() {
        let mut ctx = ctx();
        ctx.start_round_with(&mut ScriptedAdvisor::new(["{}"])).unwrap();
        ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Tank).unwrap();
        ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Melee).unwrap();
        ctx.tick(100); // promotes the tank
        ctx.tick(100);

        let cancelled = ctx
            .cancel_production(Side::Player, PLAYER_BARRACKS, CancelSlot::Current)
            .unwrap();
        assert_eq!(cancelled.kind, UnitKind::Tank);
        assert_eq!(ctx.economy(Side::Player).resource, 45);

        let barracks = ctx.structures().find(Side::Player, PLAYER_BARRACKS).unwrap();
        let current = barracks.barracks.as_ref().unwrap().production.current.unwrap();
        assert_eq!(current.unit.kind, UnitKind::Melee);
        assert_eq!(current.elapsed_ms, 0);

        assert!(matches!(
            ctx.cancel_production(Side::Player, PLAYER_BARRACKS, CancelSlot::Queued(0)),
            Err(GameError::Command(CommandError::EmptySlot))
        ));
    }

    #[test]
    fn test_fallback_round_start() {
        let mut ctx = ctx();
        let events = ctx.start_round_with(&mut NoAdvisor).unwrap();
        assert!(ctx.round().is_active());
        assert!(events.wants_checkpoint());
        assert!(events.events.contains(&GameEvent::RoundStarted { round: 1 }));
        // Two free melee, then 50 resource of leftover melee.
        assert_eq!(ai_queue_len(&ctx), 12);
        assert_eq!(ctx.economy(Side::Ai).resource, 0);

        assert!(matches!(
            ctx.start_round_with(&mut NoAdvisor),
            Err(GameError::Command(CommandError::RoundInProgress))
        ));
    }

    #[test]
    fn test_tick_is_capped() {
        let mut ctx = ctx();
        ctx.start_round_with(&mut ScriptedAdvisor::new(["{}"])).unwrap();
        ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Melee).unwrap();
        ctx.tick(5000); // promotes
        ctx.tick(5000);

        let barracks = ctx.structures().find(Side::Player, PLAYER_BARRACKS).unwrap();
        let current = barracks.barracks.as_ref().unwrap().production.current.unwrap();
        assert_eq!(current.elapsed_ms, 100);
    }

    #[test]
    fn test_production_spawns_and_records() {
        let mut ctx = ctx();
        ctx.start_round_with(&mut ScriptedAdvisor::new(["{}"])).unwrap();
        ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, UnitKind::Melee).unwrap();

        let mut spawned = None;
        for _ in 0..30 {
            let events = ctx.tick(100);
            spawned = spawned.or_else(|| {
                events.events.iter().find_map(|e| match e {
                    GameEvent::UnitSpawned { pos, .. } => Some(*pos),
                    _ => None,
                })
            });
        }
        assert_eq!(spawned, Some(GridPos::new(2, 7)));
        assert_eq!(ctx.economy(Side::Player).population, 1);
        assert!(ctx
            .records()
            .iter()
            .any(|r| r.side == Side::Player && r.kind == UnitKind::Melee && r.round == 1));
    }

    #[test]
    fn test_quiet_round_ends_immediately() {
        let mut ctx = ctx();
        ctx.economy_mut(Side::Player).resource = 0;
        ctx.economy_mut(Side::Ai).resource = 0;
        ctx.begin_round(Ok(StrategyDirective::inert())).unwrap();

        let events = ctx.tick(16);
        assert!(events.round_ended());
        assert_eq!(ctx.round().round, 2);
        assert!(!ctx.round().is_active());
        assert_eq!(ctx.economy(Side::Player).resource, 50);
        assert_eq!(ctx.economy(Side::Ai).resource, 50);
    }

    #[test]
    fn test_hoarding_side_keeps_round_open() {
        let mut ctx = ctx();
        ctx.economy_mut(Side::Ai).resource = 0;
        ctx.begin_round(Ok(StrategyDirective::inert())).unwrap();
        for _ in 0..10 {
            assert!(!ctx.tick(100).round_ended());
        }
        assert!(ctx.round().is_active());
    }

    #[test]
    fn test_undefended_base_falls() {
        let mut ctx = ctx();
        ctx.economy_mut(Side::Player).resource = 0;
        ctx.start_round_with(&mut NoAdvisor).unwrap();

        let mut winner = None;
        for _ in 0..3000 {
            let events = ctx.tick(100);
            if let Some(w) = events.winner() {
                winner = Some(w);
                break;
            }
        }
        assert_eq!(winner, Some(Side::Ai));
        assert_eq!(ctx.base(Side::Player).hp, 0);
        assert!(ctx.units().is_empty());
        assert_eq!(ctx.economy(Side::Ai).population, 0);

        let hash = ctx.state_hash();
        assert!(ctx.tick(100).is_empty());
        assert_eq!(ctx.state_hash(), hash);
        assert!(matches!(
            ctx.place_structure(Side::Player, StructureKind::Turret, GridPos::new(1, 0)),
            Err(GameError::Command(CommandError::GameOver))
        ));
    }

    #[test]
    fn test_game_over_removes_survivors_with_events() {
        let mut ctx = ctx();
        ctx.economy_mut(Side::Player).resource = 0;
        ctx.start_round_with(&mut NoAdvisor).unwrap();

        // Stop one tick short of the base falling.
        for _ in 0..3000 {
            let mut ahead = ctx.clone();
            if ahead.tick(100).winner().is_some() {
                break;
            }
            ctx.tick(100);
        }
        assert!(ctx.winner().is_none());

        let far_end = *ctx.world().path_for(Side::Player).last().unwrap();
        let survivor = ctx.spawn_unit(Side::Player, UnitKind::Melee, far_end);
        let events = ctx.tick(100);
        assert_eq!(events.winner(), Some(Side::Ai));
        assert!(ctx.units().is_empty());
        assert_eq!(ctx.economy(Side::Player).population, 0);

        let killed = events.events.iter().position(|e| {
            *e == GameEvent::UnitKilled {
                id: survivor,
                side: Side::Player,
                kind: UnitKind::Melee,
            }
        });
        let game_over = events
            .events
            .iter()
            .position(|e| matches!(e, GameEvent::GameOver { .. }));
        assert!(killed.unwrap() < game_over.unwrap());
        assert!(events.events.contains(&GameEvent::Sound {
            cue: SoundCue::UnitRemoved(UnitKind::Melee),
        }));
    }

    #[test]
    fn test_restore_dead_base_is_game_over() {
        let mut ctx = ctx();
        let save = SaveData::from_json(r#"{"economy":{"round":3,"player":{"baseHp":0}}}"#).unwrap();
        ctx.restore(&save);
        assert_eq!(ctx.winner(), Some(Side::Ai));
        assert!(matches!(
            ctx.start_round_with(&mut NoAdvisor),
            Err(GameError::Command(CommandError::GameOver))
        ));

        let live = SaveData::from_json(r#"{"economy":{"ai":{"baseHp":40}}}"#).unwrap();
        ctx.restore(&live);
        assert_eq!(ctx.winner(), None);
    }

    #[test]
    fn test_deterministic_hash() {
        let run = || {
            let mut ctx = ctx();
            ctx.start_round_with(&mut NoAdvisor).unwrap();
            for _ in 0..200 {
                ctx.tick(50);
            }
            ctx.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut ctx = ctx();
        ctx.start_round_with(&mut NoAdvisor).unwrap();
        for _ in 0..60 {
            ctx.tick(100);
        }

        let bytes = ctx.serialize().unwrap();
        let mut restored = SimulationContext::deserialize(&bytes).unwrap();
        assert_eq!(ctx.state_hash(), restored.state_hash());

        for _ in 0..60 {
            ctx.tick(100);
            restored.tick(100);
        }
        assert_eq!(ctx.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_save_restore_and_reset() {
        let mut ctx = ctx();
        ctx.place_structure(Side::Player, StructureKind::Resource, GridPos::new(0, 0))
            .unwrap();
        let mut store = MemoryStore::new();
        ctx.persist(&mut store).unwrap();

        let mut other = SimulationContext::new(GameRules::default(), 99);
        assert_eq!(other.load_from(&store), Ok(true));
        assert_eq!(other.economy(Side::Player), ctx.economy(Side::Player));
        assert_eq!(other.structures(), ctx.structures());

        other.reset_with(&mut store).unwrap();
        assert_eq!(other.economy(Side::Player).resource, 50);
        assert_eq!(other.economy(Side::Player).structure_count, 2);
        assert_eq!(store.load(), Ok(None));
    }

    #[test]
    fn test_restore_fixes_structure_count() {
        let mut ctx = ctx();
        let save = SaveData::from_json(r#"{"economy":{"round":4,"ai":{"structureCount":9,"baseHp":40}}}"#)
            .unwrap();
        ctx.restore(&save);
        assert_eq!(ctx.round().round, 4);
        assert_eq!(ctx.base(Side::Ai).hp, 40);
        assert_eq!(ctx.economy(Side::Ai).structure_count, 2);
        assert_eq!(ctx.economy(Side::Player).resource, 50);
    }

    #[test]
    fn test_advisory_request_is_from_opponent_seat() {
        let mut ctx = ctx();
        ctx.place_structure(Side::Player, StructureKind::Turret, GridPos::new(1, 0))
            .unwrap();
        let request = ctx.advisory_request();
        assert_eq!(request.state.own.resource, 50);
        assert_eq!(request.state.enemy.resource, 30);
        assert_eq!(request.state.enemy.structures_by_type.turret, 1);
    }
}
