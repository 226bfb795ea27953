//! # TD Core
//!
//! Deterministic simulation core for a two-sided lane-defense game.
//!
//! This crate contains **only** game logic:
//! - No rendering
//! - No IO beyond the [`persistence::SaveStore`] seam
//! - No system randomness (one seeded ChaCha RNG per game)
//! - No floating-point math in the simulation (uses fixed-point)
//!
//! This separation enables:
//! - Headless runs and batch balance testing
//! - Save/restore at round boundaries
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`map`] - Grid, territory, lane and opponent position pools
//! - [`rules`] - Tunable game data
//! - [`economy`] - Per-side resource and population
//! - [`structures`] - Structures and their registry
//! - [`production`] - Barracks queues
//! - [`units`] - Units, walking and fighting
//! - [`turrets`] - Turret fire
//! - [`rounds`] - Round end, rewards and grants
//! - [`strategy`] - Opponent directives and the fallback wave
//! - [`snapshot`] - Views handed to an advisor
//! - [`persistence`] - Save data
//! - [`simulation`] - Core simulation loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod economy;
pub mod error;
pub mod events;
pub mod map;
pub mod math;
pub mod persistence;
pub mod production;
pub mod rounds;
pub mod rules;
pub mod side;
pub mod simulation;
pub mod snapshot;
pub mod strategy;
pub mod structures;
pub mod turrets;
pub mod units;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::Base;
    pub use crate::economy::SideEconomy;
    pub use crate::error::{
        AdvisorError, CommandError, GameError, PlacementError, ProductionError, Result, StrategyParseError,
    };
    pub use crate::events::{EffectKind, GameEvent, SoundCue, TickEvents};
    pub use crate::map::{GridPos, GridWorld, Territory, Tile};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::persistence::{MemoryStore, SaveData, SaveStore};
    pub use crate::production::{CancelSlot, PendingUnit, ProductionQueue};
    pub use crate::rounds::{RoundPhase, RoundState};
    pub use crate::rules::GameRules;
    pub use crate::side::{PerSide, Side};
    pub use crate::simulation::SimulationContext;
    pub use crate::snapshot::{AdvisoryRequest, GameStateSnapshot};
    pub use crate::strategy::{NoAdvisor, ScriptedAdvisor, StrategyDirective, StrategyProvider};
    pub use crate::structures::{Structure, StructureKind, StructureRegistry};
    pub use crate::units::{Unit, UnitId, UnitKind, UnitRoster};
}
