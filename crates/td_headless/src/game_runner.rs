//! Unattended games for simulation and batch runs.
//!
//! A [`PlayerPolicy`] stands in for the human: it builds between rounds,
//! keeps its barracks busy during rounds, and starts the next round as
//! soon as one ends. Every loop is bounded by the configured tick limit.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use td_core::error::{GameError, PlacementError};
use td_core::map::{GridPos, Territory};
use td_core::rules::GameRules;
use td_core::side::Side;
use td_core::simulation::SimulationContext;
use td_core::strategy::StrategyProvider;
use td_core::structures::StructureKind;
use td_core::units::UnitKind;

/// How the stand-in player plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerPolicy {
    /// Turrets to keep standing.
    pub turrets: usize,
    /// Resource structures to keep standing.
    pub resource_structures: usize,
    /// Units ordered in rotation.
    pub unit_mix: Vec<UnitKind>,
}

impl Default for PlayerPolicy {
    fn default() -> Self {
        Self {
            turrets: 2,
            resource_structures: 1,
            unit_mix: vec![UnitKind::Melee, UnitKind::Melee, UnitKind::Ranged],
        }
    }
}

impl PlayerPolicy {
    /// Build toward the structure targets, turrets first.
    ///
    /// Returns the number of structures placed.
    pub fn build(&self, ctx: &mut SimulationContext) -> usize {
        let mut placed = 0;
        for (kind, target) in [
            (StructureKind::Turret, self.turrets),
            (StructureKind::Resource, self.resource_structures),
        ] {
            while ctx.structures().of(Side::Player, kind).len() < target {
                if !place_anywhere(ctx, kind) {
                    break;
                }
                placed += 1;
            }
        }
        placed
    }

    /// Order units from every player barracks until the first refusal.
    ///
    /// `cursor` tracks the position in the unit mix across calls.
    pub fn order_units(&self, ctx: &mut SimulationContext, cursor: &mut usize) -> usize {
        if self.unit_mix.is_empty() {
            return 0;
        }
        let barracks: Vec<GridPos> = ctx
            .structures()
            .of(Side::Player, StructureKind::Barracks)
            .iter()
            .map(|s| s.pos)
            .collect();

        let mut ordered = 0;
        for pos in barracks {
            loop {
                let kind = self.unit_mix[*cursor % self.unit_mix.len()];
                if ctx.enqueue_unit(Side::Player, pos, kind).is_err() {
                    break;
                }
                *cursor += 1;
                ordered += 1;
            }
        }
        ordered
    }
}

/// Try every player tile in row order until `kind` is placed.
///
/// Stops early when the side cannot afford it or has no room left.
fn place_anywhere(ctx: &mut SimulationContext, kind: StructureKind) -> bool {
    let width = i32::try_from(ctx.world().width()).unwrap_or(i32::MAX);
    let height = i32::try_from(ctx.world().height()).unwrap_or(i32::MAX);
    for gy in 0..height {
        for gx in 0..width {
            let pos = GridPos::new(gx, gy);
            if ctx.world().territory(pos) != Some(Territory::Owned(Side::Player)) {
                continue;
            }
            match ctx.place_structure(Side::Player, kind, pos) {
                Ok(_) => return true,
                Err(GameError::Placement(
                    PlacementError::InsufficientResources { .. } | PlacementError::StructureLimit { .. },
                )) => return false,
                Err(_) => {}
            }
        }
    }
    false
}

/// Configuration for one unattended game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Random seed.
    pub seed: u64,
    /// Tick limit; the game is left undecided when it is reached.
    pub max_ticks: u64,
    /// Length of every tick.
    pub dt_ms: u32,
    /// Rules in force.
    pub rules: GameRules,
    /// Stand-in player.
    pub policy: PlayerPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_ticks: 60_000,
            dt_ms: 50,
            rules: GameRules::default(),
            policy: PlayerPolicy::default(),
        }
    }
}

/// How an unattended game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// Seed played.
    pub seed: u64,
    /// Winner, `None` if the tick limit was hit first.
    pub winner: Option<Side>,
    /// Round the game ended in.
    pub rounds: u32,
    /// Ticks run.
    pub ticks: u64,
    /// Player base hit points at the end.
    pub player_base_hp: i32,
    /// Opponent base hit points at the end.
    pub ai_base_hp: i32,
    /// State hash at the end.
    pub final_state_hash: u64,
}

impl GameResult {
    fn capture(ctx: &SimulationContext) -> Self {
        Self {
            seed: ctx.seed(),
            winner: ctx.winner(),
            rounds: ctx.round().round,
            ticks: ctx.tick_count(),
            player_base_hp: ctx.base(Side::Player).hp,
            ai_base_hp: ctx.base(Side::Ai).hp,
            final_state_hash: ctx.state_hash(),
        }
    }
}

/// Play one game to a decision or the tick limit.
pub fn run_game<P: StrategyProvider + ?Sized>(config: &GameConfig, advisor: &mut P) -> GameResult {
    let mut ctx = SimulationContext::new(config.rules.clone(), config.seed);
    let mut cursor = 0;
    info!(seed = config.seed, max_ticks = config.max_ticks, "Starting game");

    while ctx.tick_count() < config.max_ticks && ctx.winner().is_none() {
        if !ctx.round().is_active() {
            config.policy.build(&mut ctx);
            if let Err(e) = ctx.start_round_with(advisor) {
                debug!(error = %e, "Round did not start");
                break;
            }
        }
        config.policy.order_units(&mut ctx, &mut cursor);
        let events = ctx.tick(config.dt_ms);
        if events.round_ended() {
            debug!(round = ctx.round().round, tick = ctx.tick_count(), "Round over");
        }
    }

    let result = GameResult::capture(&ctx);
    info!(
        seed = result.seed,
        winner = ?result.winner,
        rounds = result.rounds,
        ticks = result.ticks,
        "Game finished"
    );
    result
}
