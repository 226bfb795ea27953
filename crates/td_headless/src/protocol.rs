//! JSON protocol for headless play sessions.
//!
//! The session communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and game events
//!
//! # Protocol Flow
//!
//! 1. Session starts, outputs `{"type":"ready","version":"1.0",...}`
//! 2. Controller sends commands as JSON lines
//! 3. Each command gets one response; ticks and round starts answer with events
//! 4. `quit` ends the session with `{"type":"bye"}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0,"round":1}
//! -> {"cmd":"place","kind":"turret","gx":1,"gy":0}
//! <- {"type":"events","tick":0,"events":[{"event":"structure_placed",...}]}
//! -> {"cmd":"start_round"}
//! <- {"type":"events","tick":0,"events":[{"event":"checkpoint"},{"event":"round_started","round":1}]}
//! -> {"cmd":"enqueue","gx":2,"gy":8,"unit":"melee"}
//! <- {"type":"ok","cmd":"enqueue"}
//! -> {"cmd":"tick","count":60,"dt_ms":16}
//! <- {"type":"events","tick":60,"events":[...]}
//! -> {"cmd":"place","kind":"turret","gx":9,"gy":9}
//! <- {"type":"rejected","cmd":"place","reason":"(9, 9) is not in own territory"}
//! ```

use serde::{Deserialize, Serialize};
use td_core::events::GameEvent;
use td_core::map::GridPos;
use td_core::rounds::RoundPhase;
use td_core::side::Side;
use td_core::simulation::SimulationContext;
use td_core::snapshot::SideSnapshot;
use td_core::structures::StructureKind;
use td_core::units::{Unit, UnitKind};

/// Protocol version reported on startup.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Session)
// ============================================================================

/// Commands that can be sent to a play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Place a structure.
    Place {
        /// Structure type.
        kind: StructureKind,
        /// Column.
        gx: i32,
        /// Row.
        gy: i32,
        /// Owner, the player unless given.
        #[serde(default = "default_side")]
        side: Side,
    },

    /// Sell a structure for its refund.
    Sell {
        /// Column.
        gx: i32,
        /// Row.
        gy: i32,
        /// Owner, the player unless given.
        #[serde(default = "default_side")]
        side: Side,
    },

    /// Order a unit from a player barracks.
    Enqueue {
        /// Barracks column.
        gx: i32,
        /// Barracks row.
        gy: i32,
        /// Unit type.
        unit: UnitKind,
    },

    /// Cancel a unit in a player barracks.
    Cancel {
        /// Barracks column.
        gx: i32,
        /// Barracks row.
        gy: i32,
        /// Waiting slot to cancel; the unit in production when absent.
        #[serde(default)]
        slot: Option<usize>,
    },

    /// Start the next round, consulting the advisor.
    StartRound,

    /// Advance the game.
    Tick {
        /// Number of ticks (default: 1).
        #[serde(default = "default_tick_count")]
        count: u32,
        /// Length of each tick; wall-clock time since the last tick when absent.
        #[serde(default)]
        dt_ms: Option<u32>,
    },

    /// Report the game state without advancing time.
    State,

    /// Write a save now.
    Save,

    /// Start a fresh game and forget the save.
    Reset,

    /// End the session.
    Quit,
}

fn default_side() -> Side {
    Side::Player
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Session -> Controller)
// ============================================================================

/// Responses sent from a play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Session is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Ticks run so far (non-zero after resuming a save).
        tick: u64,
        /// Current round.
        round: u32,
    },

    /// Command accepted, nothing to report.
    Ok {
        /// Command name.
        cmd: String,
    },

    /// Command refused by the game rules. Nothing changed.
    Rejected {
        /// Command name.
        cmd: String,
        /// Why.
        reason: String,
    },

    /// Events produced by a command.
    Events {
        /// Ticks run so far.
        tick: u64,
        /// Events in order.
        events: Vec<GameEvent>,
    },

    /// Current game state.
    State(Box<StateReport>),

    /// The command could not be processed.
    Error {
        /// What went wrong.
        message: String,
        /// Command name, when the line parsed.
        cmd: Option<String>,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Full game state report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    /// Ticks run so far.
    pub tick: u64,
    /// State hash for determinism checks.
    pub hash: u64,
    /// Current round.
    pub round: u32,
    /// Round phase.
    pub phase: RoundPhase,
    /// Winner, once decided.
    pub winner: Option<Side>,
    /// Player side.
    pub player: SideSnapshot,
    /// Opponent side.
    pub ai: SideSnapshot,
    /// Units on the field.
    pub units: Vec<UnitState>,
}

impl StateReport {
    /// Capture a game.
    #[must_use]
    pub fn capture(ctx: &SimulationContext) -> Self {
        Self {
            tick: ctx.tick_count(),
            hash: ctx.state_hash(),
            round: ctx.round().round,
            phase: ctx.round().phase,
            winner: ctx.winner(),
            player: ctx.snapshot(Side::Player).own,
            ai: ctx.snapshot(Side::Ai).own,
            units: ctx.units().units().iter().map(UnitState::from).collect(),
        }
    }
}

/// State of a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    /// Handle.
    pub id: u32,
    /// Owner.
    pub side: Side,
    /// Type.
    pub kind: UnitKind,
    /// Nearest tile.
    pub tile: GridPos,
    /// Hit points left.
    pub hp: i32,
    /// Hit points when undamaged.
    pub max_hp: i32,
}

impl From<&Unit> for UnitState {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id.0,
            side: unit.side,
            kind: unit.kind,
            tile: unit.tile,
            hp: unit.hp,
            max_hp: unit.max_hp,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64, round: u32) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
            round,
        }
    }

    /// Create an acknowledgment.
    #[must_use]
    pub fn ok(cmd: &str) -> Self {
        Self::Ok { cmd: cmd.to_string() }
    }

    /// Create a rejection.
    #[must_use]
    pub fn rejected(cmd: &str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            cmd: cmd.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {}"}}"#, e)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error for lines that are not a known command.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Sell { .. } => "sell",
            Self::Enqueue { .. } => "enqueue",
            Self::Cancel { .. } => "cancel",
            Self::StartRound => "start_round",
            Self::Tick { .. } => "tick",
            Self::State => "state",
            Self::Save => "save",
            Self::Reset => "reset",
            Self::Quit => "quit",
        }
    }
}
