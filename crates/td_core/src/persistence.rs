//! Save data and the storage seam.
//!
//! Every field of a save is optional. Loading applies whatever is present
//! and keeps the in-memory value for anything missing, so older or partial
//! saves never fail to load.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use crate::economy::SideEconomy;
use crate::map::{GridPos, GridWorld};
use crate::production::ProductionQueue;
use crate::rules::GameRules;
use crate::side::{PerSide, Side};
use crate::structures::{Structure, StructureKind, StructureSet};

/// Persisted economy of one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SideSave {
    /// Spendable resource.
    pub resource: Option<i32>,
    /// Population consumed by living units.
    pub population: Option<i32>,
    /// Population cap.
    pub max_population: Option<i32>,
    /// Structures owned.
    pub structure_count: Option<u32>,
    /// Base hit points.
    pub base_hp: Option<i32>,
}

impl SideSave {
    /// Capture a side.
    #[must_use]
    pub const fn capture(economy: &SideEconomy, base_hp: i32) -> Self {
        Self {
            resource: Some(economy.resource),
            population: Some(economy.population),
            max_population: Some(economy.max_population),
            structure_count: Some(economy.structure_count),
            base_hp: Some(base_hp),
        }
    }

    /// Overwrite the fields present in the save.
    pub fn apply(&self, economy: &mut SideEconomy, base_hp: &mut i32) {
        if let Some(resource) = self.resource {
            economy.resource = resource;
        }
        if let Some(population) = self.population {
            economy.population = population;
        }
        if let Some(max_population) = self.max_population {
            economy.max_population = max_population;
        }
        if let Some(count) = self.structure_count {
            economy.structure_count = count;
        }
        if let Some(hp) = self.base_hp {
            *base_hp = hp;
        }
    }
}

/// Persisted economy section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomySave {
    /// Current round.
    pub round: Option<u32>,
    /// Player side.
    pub player: Option<SideSave>,
    /// Opponent side.
    pub ai: Option<SideSave>,
}

/// A persisted structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureRecord {
    /// Type.
    pub kind: StructureKind,
    /// Column.
    pub gx: i32,
    /// Row.
    pub gy: i32,
    /// Opponent pool slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<u32>,
    /// Barracks spawn point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_point: Option<GridPos>,
    /// Barracks production line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<ProductionQueue>,
}

impl StructureRecord {
    /// Capture a structure.
    #[must_use]
    pub fn capture(structure: &Structure) -> Self {
        Self {
            kind: structure.kind,
            gx: structure.pos.gx,
            gy: structure.pos.gy,
            pool_id: structure.pool_id,
            spawn_point: structure.barracks.as_ref().map(|b| b.spawn_point),
            production: structure.barracks.as_ref().map(|b| b.production.clone()),
        }
    }

    /// Rebuild the structure for `side`.
    ///
    /// A barracks saved without its spawn point takes it from the map.
    #[must_use]
    pub fn restore(&self, side: Side, world: &GridWorld, rules: &GameRules) -> Structure {
        let pos = GridPos::new(self.gx, self.gy);
        let spawn = self.spawn_point.or_else(|| world.barracks_spawn(side, pos));
        let mut structure =
            Structure::new(side, self.kind, pos, spawn, rules.player_queue_limit).with_pool_id(self.pool_id);
        if let (Some(barracks), Some(production)) = (structure.barracks.as_mut(), &self.production) {
            barracks.production = production.clone();
        }
        structure
    }
}

/// Persisted structures section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuresSave {
    /// Player structures.
    pub player: Vec<StructureRecord>,
    /// Opponent structures.
    pub ai: Vec<StructureRecord>,
}

impl StructuresSave {
    /// Rebuild both sides' structure sets.
    #[must_use]
    pub fn restore(&self, world: &GridWorld, rules: &GameRules) -> PerSide<StructureSet> {
        PerSide::from_fn(|side| {
            let records = match side {
                Side::Player => &self.player,
                Side::Ai => &self.ai,
            };
            let mut set = StructureSet::default();
            for record in records {
                set.get_mut(record.kind).push(record.restore(side, world, rules));
            }
            set
        })
    }
}

/// A complete save.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveData {
    /// Economy section.
    pub economy: Option<EconomySave>,
    /// Structures section.
    pub structures: Option<StructuresSave>,
}

impl SaveData {
    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a save.
    ///
    /// # Errors
    ///
    /// Returns an error for text that is not a save object. Missing fields
    /// are not an error.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Where saves live.
pub trait SaveStore {
    /// Storage failure.
    type Error: std::error::Error;

    /// Read the stored save, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load(&self) -> Result<Option<SaveData>, Self::Error>;

    /// Replace the stored save.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn save(&mut self, data: &SaveData) -> Result<(), Self::Error>;

    /// Forget the stored save.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// Save store kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Option<SaveData>,
    writes: usize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves written so far.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl SaveStore for MemoryStore {
    type Error = Infallible;

    fn load(&self) -> Result<Option<SaveData>, Infallible> {
        Ok(self.data.clone())
    }

    fn save(&mut self, data: &SaveData) -> Result<(), Infallible> {
        self.data = Some(data.clone());
        self.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Infallible> {
        self.data = None;
        Ok(())
    }
}
