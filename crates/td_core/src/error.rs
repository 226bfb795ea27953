//! Error types for the lane-defense simulation.
//!
//! Every error here is recoverable. Callers receive them as `Err` values and
//! the simulation state is left untouched whenever an operation is rejected.

use thiserror::Error;

use crate::map::GridPos;
use crate::structures::StructureKind;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// A structure placement was rejected.
    #[error(transparent)]
    Placement(#[from] PlacementError),

    /// A production request was rejected.
    #[error(transparent)]
    Production(#[from] ProductionError),

    /// A command referenced something that does not exist.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

/// Reasons a structure cannot be placed, one per legality rule.
///
/// Variants are listed in the order the rules are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Coordinates fall outside the map.
    #[error("({gx}, {gy}) is outside the map")]
    OutOfBounds {
        /// Column.
        gx: i32,
        /// Row.
        gy: i32,
    },
    /// The side already owns the maximum number of structures.
    #[error("structure limit of {max} reached")]
    StructureLimit {
        /// The configured cap.
        max: u32,
    },
    /// The tile does not belong to the placing side.
    #[error("{0} is not in own territory")]
    ForeignTerritory(GridPos),
    /// Barracks may only go on the side's candidate tiles.
    #[error("{0} is not a barracks site")]
    NotBarracksSite(GridPos),
    /// Roads are never buildable.
    #[error("{0} is a road tile")]
    Road(GridPos),
    /// A base occupies the tile.
    #[error("{0} holds a base")]
    BaseTile(GridPos),
    /// Another structure occupies the tile.
    #[error("{0} is already occupied")]
    Occupied(GridPos),
    /// Not enough resource to pay for the structure.
    #[error("need {required} resource, have {available}")]
    InsufficientResources {
        /// Structure cost.
        required: i32,
        /// Current resource.
        available: i32,
    },
}

/// Errors that can occur during production operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionError {
    /// Units can only be ordered while a round is running.
    RoundInactive,
    /// Cannot afford the unit cost.
    InsufficientResources,
    /// Spawning the unit would exceed the population cap.
    PopulationCapReached,
    /// The production queue is full.
    QueueFull,
}

impl std::fmt::Display for ProductionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundInactive => write!(f, "No round is in progress"),
            Self::InsufficientResources => write!(f, "Insufficient resources"),
            Self::PopulationCapReached => write!(f, "Population cap reached"),
            Self::QueueFull => write!(f, "Production queue is full"),
        }
    }
}

impl std::error::Error for ProductionError {}

/// A command addressed a structure or queue slot that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// No structure of the side stands on the tile.
    #[error("no structure at {0}")]
    NoStructure(GridPos),
    /// The structure is not a barracks.
    #[error("{kind:?} at {pos} cannot produce units")]
    NotBarracks {
        /// Tile addressed.
        pos: GridPos,
        /// What actually stands there.
        kind: StructureKind,
    },
    /// The queue slot is empty.
    #[error("nothing to cancel in that slot")]
    EmptySlot,
    /// The game has already been decided.
    #[error("the game is over")]
    GameOver,
    /// A round is already running.
    #[error("a round is already in progress")]
    RoundInProgress,
}

/// The strategy advisor's response could not be turned into a directive.
#[derive(Debug, Error)]
pub enum StrategyParseError {
    /// The response was empty.
    #[error("empty advisor response")]
    Empty,
    /// The response was not valid directive JSON.
    #[error("malformed directive: {0}")]
    Json(#[from] serde_json::Error),
}

/// The strategy advisor could not provide a directive.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// No advisor is configured.
    #[error("no strategy advisor configured")]
    Unavailable,
    /// The advisor did not answer in time.
    #[error("advisor timed out after {0} ms")]
    Timeout(u64),
    /// The advisor call itself failed.
    #[error("advisor call failed: {0}")]
    Call(String),
    /// The advisor answered with something unusable.
    #[error(transparent)]
    Parse(#[from] StrategyParseError),
}
