//! One-way notifications for renderers, audio and UI.
//!
//! The core never waits on a consumer. Events are collected per tick or per
//! command and handed back to the caller.

use serde::{Deserialize, Serialize};

use crate::map::GridPos;
use crate::math::Vec2Fixed;
use crate::side::{PerSide, Side};
use crate::structures::StructureKind;
use crate::units::{UnitId, UnitKind};

/// Visual kind of an attack effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Ranged unit projectile.
    Projectile,
    /// Turret beam.
    Laser,
}

impl EffectKind {
    /// How long the effect stays on screen.
    #[must_use]
    pub const fn duration_ms(self) -> u32 {
        match self {
            Self::Projectile => 300,
            Self::Laser => 200,
        }
    }
}

/// Audio cue names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    /// Melee strike.
    AttackMelee,
    /// Ranged strike.
    AttackRanged,
    /// Tank strike.
    AttackTank,
    /// Turret shot.
    AttackTurret,
    /// First footstep frame.
    UnitMove1,
    /// Second footstep frame.
    UnitMove2,
    /// A unit of this type died.
    UnitRemoved(UnitKind),
}

/// Something collaborators may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// A structure was placed or granted.
    StructurePlaced {
        /// Owner.
        side: Side,
        /// Type.
        kind: StructureKind,
        /// Tile.
        pos: GridPos,
    },
    /// A structure was sold or demolished.
    StructureRemoved {
        /// Former owner.
        side: Side,
        /// Type.
        kind: StructureKind,
        /// Tile.
        pos: GridPos,
        /// Resource returned.
        refund: i32,
    },
    /// A barracks' current unit changed progress.
    ProductionProgress {
        /// Owner.
        side: Side,
        /// Barracks tile.
        barracks: GridPos,
        /// Unit in production.
        kind: UnitKind,
        /// Percentage complete.
        percent: u32,
    },
    /// A unit entered the field.
    UnitSpawned {
        /// Unit handle.
        id: UnitId,
        /// Owner.
        side: Side,
        /// Type.
        kind: UnitKind,
        /// Spawn tile.
        pos: GridPos,
    },
    /// A unit died.
    UnitKilled {
        /// Unit handle.
        id: UnitId,
        /// Owner.
        side: Side,
        /// Type.
        kind: UnitKind,
    },
    /// An attack effect should be drawn.
    AttackEffect {
        /// Attacker's side.
        side: Side,
        /// Effect kind.
        kind: EffectKind,
        /// Origin in tile units.
        from: Vec2Fixed,
        /// Destination in tile units.
        to: Vec2Fixed,
        /// Display time.
        duration_ms: u32,
    },
    /// A sound should be played.
    Sound {
        /// Cue to play.
        cue: SoundCue,
    },
    /// A base lost hit points.
    BaseDamaged {
        /// Owner of the base.
        side: Side,
        /// Hit points left.
        hp: i32,
    },
    /// A base reached zero hit points.
    BaseDestroyed {
        /// Owner of the base.
        side: Side,
    },
    /// The game is decided.
    GameOver {
        /// The side whose unit destroyed the enemy base.
        winner: Side,
    },
    /// A round began.
    RoundStarted {
        /// Round number.
        round: u32,
    },
    /// A round ended and rewards were paid.
    RoundEnded {
        /// The round that just finished.
        round: u32,
        /// Resource paid to each side.
        rewards: PerSide<i32>,
    },
    /// A periodic grant could not be placed and was paid out instead.
    GrantCompensated {
        /// Structure type that was due.
        kind: StructureKind,
        /// Resource paid.
        amount: i32,
    },
    /// State should be persisted now.
    Checkpoint,
}

/// Events produced by one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Events in the order they happened.
    pub events: Vec<GameEvent>,
}

impl TickEvents {
    /// Record an event.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Check if nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The winner, if the game ended this tick.
    #[must_use]
    pub fn winner(&self) -> Option<Side> {
        self.events.iter().find_map(|event| match event {
            GameEvent::GameOver { winner } => Some(*winner),
            _ => None,
        })
    }

    /// Whether a round ended this tick.
    #[must_use]
    pub fn round_ended(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, GameEvent::RoundEnded { .. }))
    }

    /// Whether state should be persisted after this tick.
    #[must_use]
    pub fn wants_checkpoint(&self) -> bool {
        self.events.contains(&GameEvent::Checkpoint)
    }
}

impl Extend<GameEvent> for TickEvents {
    fn extend<I: IntoIterator<Item = GameEvent>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}
