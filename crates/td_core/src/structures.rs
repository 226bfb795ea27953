//! Structure registry: who owns what, where.
//!
//! Structures are stored per side and per type in a fixed table rather than
//! a map keyed by strings, so every lookup is an exhaustive match.
//! A tile holds at most one structure, which makes the tile the natural
//! handle for commands such as selling or ordering units.

use serde::{Deserialize, Serialize};

use crate::map::{GridPos, GridWorld, PoolSlot};
use crate::production::ProductionQueue;
use crate::rules::GameRules;
use crate::side::{PerSide, Side};

/// Type of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Raises the population cap.
    Population,
    /// Produces units.
    Barracks,
    /// Shoots enemy units on the road.
    Turret,
    /// Raises the round reward.
    Resource,
}

impl StructureKind {
    /// All types, in registry order.
    pub const ALL: [StructureKind; 4] = [
        StructureKind::Population,
        StructureKind::Barracks,
        StructureKind::Turret,
        StructureKind::Resource,
    ];

    /// Order in which a directive's build requests are processed.
    pub const BUILD_PRIORITY: [StructureKind; 4] = [
        StructureKind::Turret,
        StructureKind::Barracks,
        StructureKind::Resource,
        StructureKind::Population,
    ];
}

/// Barracks component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarracksState {
    /// Where produced units appear.
    pub spawn_point: GridPos,
    /// Production line.
    pub production: ProductionQueue,
}

/// Turret component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TurretState {
    /// Time since the last shot. `None` until the turret first sees units.
    pub since_last_shot_ms: Option<u32>,
}

/// A placed structure.
///
/// Type-specific state is carried in optional components, present exactly
/// when `kind` calls for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Structure {
    /// Owner.
    pub side: Side,
    /// Type.
    pub kind: StructureKind,
    /// Tile.
    pub pos: GridPos,
    /// Opponent position pool id, when built from a pool.
    pub pool_id: Option<u32>,
    /// Present on barracks.
    pub barracks: Option<BarracksState>,
    /// Present on turrets.
    pub turret: Option<TurretState>,
}

impl Structure {
    /// Build a structure with the components its type needs.
    ///
    /// `spawn_point` is only used for barracks.
    #[must_use]
    pub fn new(
        side: Side,
        kind: StructureKind,
        pos: GridPos,
        spawn_point: Option<GridPos>,
        queue_limit: usize,
    ) -> Self {
        let barracks = (kind == StructureKind::Barracks).then(|| BarracksState {
            spawn_point: spawn_point.unwrap_or(pos),
            production: ProductionQueue::with_max_size(queue_limit),
        });
        let turret = (kind == StructureKind::Turret).then(TurretState::default);
        Self {
            side,
            kind,
            pos,
            pool_id: None,
            barracks,
            turret,
        }
    }

    /// Tag the structure with a pool id.
    #[must_use]
    pub fn with_pool_id(mut self, pool_id: Option<u32>) -> Self {
        self.pool_id = pool_id;
        self
    }
}

/// One side's structures, grouped by type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StructureSet {
    /// Population structures.
    pub population: Vec<Structure>,
    /// Barracks.
    pub barracks: Vec<Structure>,
    /// Turrets.
    pub turret: Vec<Structure>,
    /// Resource structures.
    pub resource: Vec<Structure>,
}

impl StructureSet {
    /// Structures of a type, in placement order.
    #[must_use]
    pub fn get(&self, kind: StructureKind) -> &[Structure] {
        match kind {
            StructureKind::Population => &self.population,
            StructureKind::Barracks => &self.barracks,
            StructureKind::Turret => &self.turret,
            StructureKind::Resource => &self.resource,
        }
    }

    /// Mutable structures of a type.
    pub fn get_mut(&mut self, kind: StructureKind) -> &mut Vec<Structure> {
        match kind {
            StructureKind::Population => &mut self.population,
            StructureKind::Barracks => &mut self.barracks,
            StructureKind::Turret => &mut self.turret,
            StructureKind::Resource => &mut self.resource,
        }
    }

    /// All structures, grouped by type in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        StructureKind::ALL.into_iter().flat_map(|kind| self.get(kind))
    }

    /// Total number of structures.
    #[must_use]
    pub fn len(&self) -> usize {
        StructureKind::ALL.iter().map(|&kind| self.get(kind).len()).sum()
    }

    /// Check if the side owns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every structure on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StructureRegistry {
    sides: PerSide<StructureSet>,
}

impl StructureRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding each side's starting structures.
    ///
    /// Opponent structures standing on pool slots receive that slot's id.
    #[must_use]
    pub fn with_starting(world: &GridWorld, rules: &GameRules) -> Self {
        let mut registry = Self::new();
        for (side, starting) in world.starting_structures.iter() {
            for entry in starting {
                let spawn = world.barracks_spawn(side, entry.pos);
                let pool_id = match side {
                    Side::Ai => world.ai_pools.id_at(entry.kind, entry.pos),
                    Side::Player => None,
                };
                registry.insert(
                    Structure::new(side, entry.kind, entry.pos, spawn, rules.player_queue_limit)
                        .with_pool_id(pool_id),
                );
            }
        }
        registry
    }

    /// Rebuild a registry from per-side structure lists.
    #[must_use]
    pub fn from_sets(sides: PerSide<StructureSet>) -> Self {
        Self { sides }
    }

    /// One side's structures.
    #[must_use]
    pub fn side(&self, side: Side) -> &StructureSet {
        &self.sides[side]
    }

    /// One side's structures, mutably.
    pub fn side_mut(&mut self, side: Side) -> &mut StructureSet {
        &mut self.sides[side]
    }

    /// Structures of one side and type.
    #[must_use]
    pub fn of(&self, side: Side, kind: StructureKind) -> &[Structure] {
        self.sides[side].get(kind)
    }

    /// Structures of one side and type, mutably.
    pub fn of_mut(&mut self, side: Side, kind: StructureKind) -> &mut Vec<Structure> {
        self.sides[side].get_mut(kind)
    }

    /// Number of structures a side owns.
    #[must_use]
    pub fn count(&self, side: Side) -> usize {
        self.sides[side].len()
    }

    /// Add a structure under its owner and type.
    pub fn insert(&mut self, structure: Structure) {
        let (side, kind) = (structure.side, structure.kind);
        self.of_mut(side, kind).push(structure);
    }

    /// Remove a side's structure standing on `pos`.
    pub fn remove_at(&mut self, side: Side, pos: GridPos) -> Option<Structure> {
        StructureKind::ALL.into_iter().find_map(|kind| {
            let list = self.of_mut(side, kind);
            let index = list.iter().position(|s| s.pos == pos)?;
            Some(list.remove(index))
        })
    }

    /// A side's structure standing on `pos`.
    #[must_use]
    pub fn find(&self, side: Side, pos: GridPos) -> Option<&Structure> {
        self.sides[side].iter().find(|s| s.pos == pos)
    }

    /// A side's structure standing on `pos`, mutably.
    pub fn find_mut(&mut self, side: Side, pos: GridPos) -> Option<&mut Structure> {
        let set = &mut self.sides[side];
        let (kind, index) = StructureKind::ALL.into_iter().find_map(|kind| {
            set.get(kind)
                .iter()
                .position(|s| s.pos == pos)
                .map(|i| (kind, i))
        })?;
        set.get_mut(kind).get_mut(index)
    }

    /// Whether any structure of either side stands on `pos`.
    #[must_use]
    pub fn is_occupied(&self, pos: GridPos) -> bool {
        Side::ALL
            .iter()
            .any(|&side| self.find(side, pos).is_some())
    }

    /// Every barracks of both sides, mutably, player first.
    pub fn barracks_mut(&mut self) -> impl Iterator<Item = &mut Structure> {
        let StructureRegistry { sides } = self;
        sides
            .player
            .barracks
            .iter_mut()
            .chain(sides.ai.barracks.iter_mut())
    }

    /// Every turret of both sides, mutably, player first.
    pub fn turrets_mut(&mut self) -> impl Iterator<Item = &mut Structure> {
        let StructureRegistry { sides } = self;
        sides
            .player
            .turret
            .iter_mut()
            .chain(sides.ai.turret.iter_mut())
    }

    /// Lowest-id slot whose tile no structure of either side occupies.
    #[must_use]
    pub fn first_free_slot<'a>(&self, slots: &'a [PoolSlot]) -> Option<&'a PoolSlot> {
        slots
            .iter()
            .filter(|slot| !self.is_occupied(slot.pos))
            .min_by_key(|slot| slot.id)
    }

    /// Whether any barracks of either side has work in hand.
    #[must_use]
    pub fn any_production(&self) -> bool {
        Side::ALL.iter().any(|&side| {
            self.of(side, StructureKind::Barracks).iter().any(|s| {
                s.barracks
                    .as_ref()
                    .is_some_and(|b| !b.production.is_idle())
            })
        })
    }
}
