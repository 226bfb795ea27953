//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Saves, batch statistics and replays of advisor directives all rely on a
//! game being reproducible from its seed. Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`td_core::math::Fixed`] for positions, speeds and ranges.
//!
//! - **HashMap iteration order**: Structures live in per-kind vectors and
//!   units in spawn order; nothing iterates a hash map.
//!
//! - **System randomness**: Opponent production draws from the game's own
//!   seeded ChaCha RNG, never from the thread RNG.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (turrets, production, etc.)
//! 2. **Property tests**: Random command sequences must still be reproducible
//! 3. **Integration tests**: Full games are reproducible
//! 4. **Parallel tests**: Running N games in parallel all match

use std::thread;

use td_core::simulation::SimulationContext;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use td_test_utils::determinism::verify_determinism;
/// use td_test_utils::fixtures::{fallback_round, DEFAULT_SEED};
///
/// let result = verify_determinism(
///     3,
///     100,
///     || fallback_round(DEFAULT_SEED),
///     |ctx| {
///         ctx.tick(50);
///     },
///     |ctx| ctx.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a game twice with fixed-length ticks and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64, dt_ms: u32) -> bool
where
    F: Fn() -> SimulationContext,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |ctx| {
            ctx.tick(dt_ms);
        },
        SimulationContext::state_hash,
    )
    .is_deterministic
}

/// Run N games on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64, dt_ms: u32) -> DeterminismResult
where
    F: Fn() -> SimulationContext + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut ctx = setup_fn();
                    for _ in 0..num_ticks {
                        ctx.tick(dt_ms);
                    }
                    ctx.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs match throughout, `Some(tick)` for the first tick
/// after which their hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt_ms: u32) -> Option<u64>
where
    F: Fn() -> SimulationContext,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.tick(dt_ms);
        b.tick(dt_ms);

        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a bincode round trip preserves the state hash, and that the
/// copy keeps matching the original afterwards.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64, dt_ms: u32) -> bool
where
    F: Fn() -> SimulationContext,
{
    let mut ctx = setup_fn();
    for _ in 0..num_ticks {
        ctx.tick(dt_ms);
    }

    let Ok(bytes) = ctx.serialize() else {
        return false;
    };
    let Ok(mut restored) = SimulationContext::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != ctx.state_hash() {
        return false;
    }

    for _ in 0..num_ticks {
        ctx.tick(dt_ms);
        restored.tick(dt_ms);
    }
    restored.state_hash() == ctx.state_hash()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible player inputs for
/// property-based testing of the simulation.
pub mod strategies {
    use proptest::prelude::*;
    use td_core::map::GridPos;
    use td_core::production::CancelSlot;
    use td_core::side::Side;
    use td_core::simulation::SimulationContext;
    use td_core::strategy::{StrategyDirective, StructureCounts, StructureOrders, UnitCounts};
    use td_core::structures::StructureKind;
    use td_core::units::UnitKind;

    use crate::fixtures::PLAYER_BARRACKS;

    /// A player input.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TestCommand {
        /// Place a structure.
        Place(StructureKind, GridPos),
        /// Sell whatever the player owns on a tile.
        Sell(GridPos),
        /// Order a unit from the starting barracks.
        Enqueue(UnitKind),
        /// Cancel the unit in production.
        CancelCurrent,
        /// Start a round with a directive.
        StartRound(StrategyDirective),
        /// Advance time.
        Tick(u32),
    }

    impl TestCommand {
        /// Apply to a game, ignoring rejections.
        pub fn apply(&self, ctx: &mut SimulationContext) {
            match self {
                Self::Place(kind, pos) => {
                    let _ = ctx.place_structure(Side::Player, *kind, *pos);
                }
                Self::Sell(pos) => {
                    let _ = ctx.sell_structure(Side::Player, *pos);
                }
                Self::Enqueue(kind) => {
                    let _ = ctx.enqueue_unit(Side::Player, PLAYER_BARRACKS, *kind);
                }
                Self::CancelCurrent => {
                    let _ = ctx.cancel_production(Side::Player, PLAYER_BARRACKS, CancelSlot::Current);
                }
                Self::StartRound(directive) => {
                    let _ = ctx.begin_round(Ok(directive.clone()));
                }
                Self::Tick(dt_ms) => {
                    ctx.tick(*dt_ms);
                }
            }
        }
    }

    /// Generate a tile on or just off the standard map.
    pub fn arb_grid_pos() -> impl Strategy<Value = GridPos> {
        (-1i32..16, -1i32..11).prop_map(|(gx, gy)| GridPos::new(gx, gy))
    }

    /// Generate a structure type.
    pub fn arb_structure_kind() -> impl Strategy<Value = StructureKind> {
        prop::sample::select(StructureKind::ALL.to_vec())
    }

    /// Generate a unit type.
    pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
        prop::sample::select(UnitKind::ALL.to_vec())
    }

    /// Generate a tick length, including ones above the cap.
    pub fn arb_dt_ms() -> impl Strategy<Value = u32> {
        prop_oneof![1u32..=100, Just(16u32), 100u32..=1000]
    }

    fn arb_structure_counts() -> impl Strategy<Value = StructureCounts> {
        (0u32..3, 0u32..3, 0u32..3, 0u32..3).prop_map(|(population, barracks, turret, resource)| {
            StructureCounts {
                population,
                barracks,
                turret,
                resource,
            }
        })
    }

    /// Generate an opponent directive with small counts.
    pub fn arb_directive() -> impl Strategy<Value = StrategyDirective> {
        (
            arb_structure_counts(),
            arb_structure_counts(),
            (0u32..6, 0u32..6, 0u32..6),
        )
            .prop_map(|(build, demolish, (melee, ranged, tank))| StrategyDirective {
                strategy_reason: None,
                structures: StructureOrders { build, demolish },
                units: UnitCounts { melee, ranged, tank },
            })
    }

    /// Generate any player input.
    pub fn arb_command() -> impl Strategy<Value = TestCommand> {
        prop_oneof![
            (arb_structure_kind(), arb_grid_pos()).prop_map(|(kind, pos)| TestCommand::Place(kind, pos)),
            arb_grid_pos().prop_map(TestCommand::Sell),
            arb_unit_kind().prop_map(TestCommand::Enqueue),
            Just(TestCommand::CancelCurrent),
            arb_directive().prop_map(TestCommand::StartRound),
            arb_dt_ms().prop_map(TestCommand::Tick),
        ]
    }

    /// Generate a sequence of inputs.
    pub fn arb_command_sequence(max_len: usize) -> impl Strategy<Value = Vec<TestCommand>> {
        proptest::collection::vec(arb_command(), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{fallback_round, fresh_game, idle_opponent_round, DEFAULT_SEED};
    use proptest::prelude::*;
    use td_core::side::Side;
    use td_core::strategy::StrategyDirective;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_idle_game_determinism() {
        assert!(verify_simulation_determinism(|| fresh_game(DEFAULT_SEED), 100, 16));
    }

    #[test]
    fn test_fallback_round_determinism() {
        assert!(verify_simulation_determinism(|| fallback_round(DEFAULT_SEED), 400, 50));
    }

    #[test]
    fn test_find_divergence_on_deterministic_game() {
        assert_eq!(find_first_divergence(|| fallback_round(3), 300, 33), None);
    }

    #[test]
    fn test_parallel_games_match() {
        let result = run_parallel_simulations(|| fallback_round(11), 4, 300, 50);
        result.assert_deterministic();
        assert_eq!(result.hashes.len(), 4);
    }

    // =========================================================================
    // Serialization round-trip tests
    // =========================================================================

    #[test]
    fn test_serialization_preserves_fresh_game() {
        assert!(verify_serialization_determinism(|| fresh_game(DEFAULT_SEED), 0, 16));
    }

    #[test]
    fn test_serialization_preserves_battle() {
        assert!(verify_serialization_determinism(|| fallback_round(5), 250, 100));
    }

    #[test]
    fn test_directive_draws_repeat_for_seed() {
        let directive =
            StrategyDirective::from_response(r#"{"units":{"melee":3,"ranged":3,"tank":3}}"#).unwrap();
        let hash_after_start = |seed| {
            let mut ctx = fresh_game(seed);
            ctx.begin_round(Ok(directive.clone())).unwrap();
            ctx.state_hash()
        };
        assert_eq!(hash_after_start(1), hash_after_start(1));
    }

    // =========================================================================
    // Property tests
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_command_sequences_are_reproducible(commands in arb_command_sequence(60)) {
            let run = || {
                let mut ctx = fresh_game(DEFAULT_SEED);
                for command in &commands {
                    command.apply(&mut ctx);
                }
                ctx.state_hash()
            };
            prop_assert_eq!(run(), run());
        }

        #[test]
        fn prop_structure_count_matches_registry(commands in arb_command_sequence(60)) {
            let mut ctx = fresh_game(DEFAULT_SEED);
            for command in &commands {
                command.apply(&mut ctx);
                for side in Side::ALL {
                    let owned = u32::try_from(ctx.structures().count(side)).unwrap();
                    prop_assert_eq!(ctx.economy(side).structure_count, owned);
                    prop_assert!(owned <= ctx.rules().max_structures);
                }
            }
        }

        #[test]
        fn prop_population_matches_living_units(commands in arb_command_sequence(60)) {
            let mut ctx = idle_opponent_round(DEFAULT_SEED);
            for command in &commands {
                command.apply(&mut ctx);
                for side in Side::ALL {
                    let living: i32 = ctx
                        .units()
                        .units()
                        .iter()
                        .filter(|u| u.side == side)
                        .map(|u| u.population_cost)
                        .sum();
                    prop_assert_eq!(ctx.economy(side).population, living);
                }
            }
        }

        #[test]
        fn prop_resource_never_negative_for_player(commands in arb_command_sequence(60)) {
            let mut ctx = fresh_game(DEFAULT_SEED);
            for command in &commands {
                command.apply(&mut ctx);
                prop_assert!(ctx.economy(Side::Player).resource >= 0);
            }
        }
    }
}
