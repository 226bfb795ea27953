//! Test fixtures and helpers.
//!
//! Pre-built game states and map positions
//! for consistent testing.

use td_core::events::TickEvents;
use td_core::map::{GridPos, Territory};
use td_core::rules::GameRules;
use td_core::side::Side;
use td_core::simulation::SimulationContext;
use td_core::strategy::{NoAdvisor, StrategyDirective};
use td_core::structures::StructureKind;

/// Seed used by fixtures unless a test picks its own.
pub const DEFAULT_SEED: u64 = 7;

/// The player's starting barracks on the standard map.
pub const PLAYER_BARRACKS: GridPos = GridPos::new(2, 8);

/// The opponent's starting barracks on the standard map.
pub const AI_BARRACKS: GridPos = GridPos::new(12, 1);

/// Tick length of a 60 Hz frame, rounded down.
pub const FRAME_MS: u32 = 16;

/// A fresh game with default rules.
#[must_use]
pub fn fresh_game(seed: u64) -> SimulationContext {
    SimulationContext::new(GameRules::default(), seed)
}

/// Default rules with some fields changed.
#[must_use]
pub fn rules_with(edit: impl FnOnce(&mut GameRules)) -> GameRules {
    let mut rules = GameRules::default();
    edit(&mut rules);
    rules
}

/// A game whose first round is running with the opponent idle.
///
/// # Panics
///
/// Panics if the round cannot start, which a fresh game always can.
#[must_use]
pub fn idle_opponent_round(seed: u64) -> SimulationContext {
    let mut ctx = fresh_game(seed);
    ctx.begin_round(Ok(StrategyDirective::default()))
        .expect("fresh game starts a round");
    ctx
}

/// A game whose first round is running on the fallback wave.
///
/// # Panics
///
/// Panics if the round cannot start, which a fresh game always can.
#[must_use]
pub fn fallback_round(seed: u64) -> SimulationContext {
    let mut ctx = fresh_game(seed);
    ctx.start_round_with(&mut NoAdvisor)
        .expect("fresh game starts a round");
    ctx
}

/// Tiles where `side` may place a non-barracks structure right now,
/// ignoring cost and the structure cap. Row-major order.
#[must_use]
pub fn open_build_sites(ctx: &SimulationContext, side: Side) -> Vec<GridPos> {
    let world = ctx.world();
    let width = i32::try_from(world.width()).unwrap_or(i32::MAX);
    let height = i32::try_from(world.height()).unwrap_or(i32::MAX);
    (0..height)
        .flat_map(|gy| (0..width).map(move |gx| GridPos::new(gx, gy)))
        .filter(|&pos| {
            world.territory(pos) == Some(Territory::Owned(side))
                && !world.is_road(pos)
                && !world.is_base(pos)
                && !ctx.structures().is_occupied(pos)
        })
        .collect()
}

/// Place `count` structures of `kind` for the player on open sites.
///
/// # Panics
///
/// Panics if a placement is rejected.
pub fn place_player_structures(ctx: &mut SimulationContext, kind: StructureKind, count: usize) {
    assert_ne!(kind, StructureKind::Barracks, "barracks need a barracks site");
    for pos in open_build_sites(ctx, Side::Player).into_iter().take(count) {
        ctx.place_structure(Side::Player, kind, pos)
            .expect("placement on an open site");
    }
}

/// Tick until the round ends or `max_ticks` pass.
///
/// Returns the events of the tick that ended the round.
pub fn run_until_round_end(ctx: &mut SimulationContext, dt_ms: u32, max_ticks: u64) -> Option<TickEvents> {
    for _ in 0..max_ticks {
        let events = ctx.tick(dt_ms);
        if events.round_ended() || events.winner().is_some() {
            return Some(events);
        }
    }
    None
}

/// Tick until a base falls or `max_ticks` pass. Returns the winner.
pub fn run_until_game_over(ctx: &mut SimulationContext, dt_ms: u32, max_ticks: u64) -> Option<Side> {
    for _ in 0..max_ticks {
        if let Some(winner) = ctx.tick(dt_ms).winner() {
            return Some(winner);
        }
    }
    ctx.winner()
}
