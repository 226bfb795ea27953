//! Static grid world: tiles, territory, bases, lane paths and build sites.
//!
//! The world never changes during a game. Everything mutable (structures,
//! units, economies) lives in the [`SimulationContext`] and is passed in
//! when a placement has to be judged.
//!
//! [`SimulationContext`]: crate::simulation::SimulationContext

use serde::{Deserialize, Serialize};

use crate::economy::SideEconomy;
use crate::error::PlacementError;
use crate::side::{PerSide, Side};
use crate::structures::{StructureKind, StructureRegistry};

/// Width of the standard map in tiles.
pub const MAP_WIDTH: u32 = 15;
/// Height of the standard map in tiles.
pub const MAP_HEIGHT: u32 = 10;
/// Tile edge in pixels, for renderers.
pub const TILE_SIZE_PX: u32 = 64;

/// Integer grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column.
    pub gx: i32,
    /// Row.
    pub gy: i32,
}

impl GridPos {
    /// Create grid coordinates.
    #[must_use]
    pub const fn new(gx: i32, gy: i32) -> Self {
        Self { gx, gy }
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.gx, self.gy)
    }
}

/// Ground type of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tile {
    /// Buildable dark grass.
    DarkGrass,
    /// Buildable grass.
    Grass,
    /// Lane tile units walk on. Never buildable.
    Road,
}

/// Ownership of a tile for placement purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Territory {
    /// Owned by one side.
    Owned(Side),
    /// Nobody may build here.
    Neutral,
}

/// A numbered candidate slot in an opponent position pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSlot {
    /// Pool id, consumed lowest first and vacated highest first.
    pub id: u32,
    /// Tile of the structure.
    pub pos: GridPos,
    /// Spawn point, for barracks slots.
    pub spawn: Option<GridPos>,
}

/// Position pools for each buildable structure kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionPools {
    /// Population slots.
    pub population: Vec<PoolSlot>,
    /// Barracks slots with spawn points.
    pub barracks: Vec<PoolSlot>,
    /// Turret slots.
    pub turret: Vec<PoolSlot>,
    /// Resource slots.
    pub resource: Vec<PoolSlot>,
}

impl PositionPools {
    /// Slots for a structure kind, in id order.
    #[must_use]
    pub fn get(&self, kind: StructureKind) -> &[PoolSlot] {
        match kind {
            StructureKind::Population => &self.population,
            StructureKind::Barracks => &self.barracks,
            StructureKind::Turret => &self.turret,
            StructureKind::Resource => &self.resource,
        }
    }

    /// Pool id of the slot at `pos`, if any.
    #[must_use]
    pub fn id_at(&self, kind: StructureKind, pos: GridPos) -> Option<u32> {
        self.get(kind).iter().find(|slot| slot.pos == pos).map(|slot| slot.id)
    }
}

/// A structure present when a game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingStructure {
    /// Structure type.
    pub kind: StructureKind,
    /// Tile.
    pub pos: GridPos,
}

/// The static battlefield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridWorld {
    width: u32,
    height: u32,
    /// Tiles in row-major order.
    tiles: Vec<Tile>,
    /// Territory in row-major order.
    territory: Vec<Territory>,
    /// Base tile per side.
    pub bases: PerSide<GridPos>,
    /// Waypoints from the player's barracks lane to the opponent base.
    pub player_path: Vec<GridPos>,
    /// Waypoints where a walking unit turns around visually.
    pub flip_points: Vec<GridPos>,
    /// Barracks sites and their spawn points, per side.
    pub barracks_sites: PerSide<Vec<(GridPos, GridPos)>>,
    /// Opponent position pools.
    pub ai_pools: PositionPools,
    /// Structures each side starts with.
    pub starting_structures: PerSide<Vec<StartingStructure>>,
}

const STANDARD_TILES: [[u8; 15]; 10] = [
    [0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
    [0, 2, 2, 2, 2, 2, 2, 2, 0, 1, 0, 2, 2, 1, 0],
    [1, 2, 1, 0, 1, 0, 1, 2, 1, 0, 1, 2, 1, 0, 1],
    [0, 2, 0, 1, 0, 1, 0, 2, 0, 1, 0, 2, 2, 2, 0],
    [1, 2, 2, 2, 1, 0, 1, 2, 1, 0, 1, 0, 1, 2, 1],
    [0, 1, 0, 2, 0, 1, 0, 2, 0, 1, 0, 1, 0, 2, 0],
    [1, 0, 2, 2, 1, 0, 1, 2, 2, 2, 2, 2, 2, 2, 1],
    [0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0],
    [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
];

// P = player, A = opponent, N = neutral
const STANDARD_TERRITORY: [&str; 10] = [
    "PPPPPPPPAAAAAAA",
    "PPPPPPPPAAAAAAA",
    "PNNNNNNNAAANNNA",
    "PNPPPPPNAAANAAA",
    "PNPPPPPNAAANNNA",
    "PNNNPPPNAAAAANA",
    "PPPNPPPNAAAAANA",
    "PNNNPPPNNNNNNNA",
    "PPPPPPPAAAAAAAA",
    "PPPPPPPAAAAAAAA",
];

const PLAYER_PATH: [(i32, i32); 34] = [
    (2, 7), (3, 7), (3, 6), (3, 5), (2, 5), (1, 5), (1, 4), (1, 3), (1, 2), (2, 2),
    (3, 2), (4, 2), (5, 2), (6, 2), (7, 2), (7, 3), (7, 4), (7, 5), (7, 6), (7, 7),
    (8, 7), (9, 7), (10, 7), (11, 7), (12, 7), (13, 7), (13, 6), (13, 5), (13, 4),
    (12, 4), (11, 4), (11, 3), (11, 2), (12, 2),
];

const FLIP_POINTS: [(i32, i32); 4] = [(3, 7), (1, 5), (13, 7), (11, 4)];

const PLAYER_BARRACKS_SITES: [((i32, i32), (i32, i32)); 19] = [
    ((1, 1), (1, 2)),
    ((2, 1), (2, 2)),
    ((3, 1), (3, 2)),
    ((4, 1), (4, 2)),
    ((5, 1), (5, 2)),
    ((6, 1), (6, 2)),
    ((0, 2), (1, 2)),
    ((0, 3), (1, 3)),
    ((3, 3), (3, 2)),
    ((4, 3), (4, 2)),
    ((5, 3), (5, 2)),
    ((0, 4), (1, 4)),
    ((3, 4), (3, 5)),
    ((0, 5), (1, 5)),
    ((4, 5), (3, 5)),
    ((4, 6), (3, 6)),
    ((4, 7), (3, 7)),
    ((2, 8), (2, 7)),
    ((3, 8), (3, 7)),
];

const AI_BARRACKS_POOL: [((i32, i32), (i32, i32)); 9] = [
    ((12, 1), (12, 2)),
    ((11, 1), (11, 2)),
    ((10, 3), (11, 3)),
    ((14, 5), (13, 5)),
    ((14, 6), (13, 6)),
    ((12, 8), (12, 7)),
    ((10, 6), (10, 7)),
    ((10, 8), (10, 7)),
    ((8, 8), (8, 7)),
];

const AI_POPULATION_POOL: [(i32, i32); 9] = [
    (14, 0), (13, 0), (12, 0), (11, 0), (10, 0), (9, 0), (8, 0), (8, 1), (9, 1),
];

const AI_TURRET_POOL: [(i32, i32); 9] = [
    (12, 5), (8, 4), (12, 3), (9, 6), (11, 5), (11, 6), (8, 5), (12, 6), (8, 6),
];

// Slot 9 shares its tile with barracks slot 9; whichever is built first wins.
const AI_RESOURCE_POOL: [(i32, i32); 9] = [
    (14, 9), (13, 9), (12, 9), (11, 9), (10, 9), (9, 9), (8, 9), (9, 8), (8, 8),
];

fn pos((gx, gy): (i32, i32)) -> GridPos {
    GridPos::new(gx, gy)
}

fn numbered(slots: &[(i32, i32)]) -> Vec<PoolSlot> {
    (1u32..)
        .zip(slots)
        .map(|(id, &at)| PoolSlot {
            id,
            pos: pos(at),
            spawn: None,
        })
        .collect()
}

impl GridWorld {
    /// The standard 15×10 two-lane battlefield.
    #[must_use]
    pub fn standard() -> Self {
        let tiles = STANDARD_TILES
            .iter()
            .flat_map(|row| row.iter())
            .map(|&code| match code {
                2 => Tile::Road,
                1 => Tile::Grass,
                _ => Tile::DarkGrass,
            })
            .collect();
        let territory = STANDARD_TERRITORY
            .iter()
            .flat_map(|row| row.chars())
            .map(|code| match code {
                'P' => Territory::Owned(Side::Player),
                'A' => Territory::Owned(Side::Ai),
                _ => Territory::Neutral,
            })
            .collect();

        let barracks_pool: Vec<PoolSlot> = (1u32..)
            .zip(AI_BARRACKS_POOL)
            .map(|(id, (at, spawn))| PoolSlot {
                id,
                pos: pos(at),
                spawn: Some(pos(spawn)),
            })
            .collect();
        let ai_sites = barracks_pool
            .iter()
            .filter_map(|slot| slot.spawn.map(|spawn| (slot.pos, spawn)))
            .collect();

        Self {
            width: MAP_WIDTH,
            height: MAP_HEIGHT,
            tiles,
            territory,
            bases: PerSide::new(GridPos::new(1, 7), GridPos::new(13, 2)),
            player_path: PLAYER_PATH.iter().copied().map(pos).collect(),
            flip_points: FLIP_POINTS.iter().copied().map(pos).collect(),
            barracks_sites: PerSide::new(
                PLAYER_BARRACKS_SITES
                    .iter()
                    .map(|&(at, spawn)| (pos(at), pos(spawn)))
                    .collect(),
                ai_sites,
            ),
            ai_pools: PositionPools {
                population: numbered(&AI_POPULATION_POOL),
                barracks: barracks_pool,
                turret: numbered(&AI_TURRET_POOL),
                resource: numbered(&AI_RESOURCE_POOL),
            },
            starting_structures: PerSide::new(
                vec![
                    StartingStructure {
                        kind: StructureKind::Population,
                        pos: GridPos::new(0, 9),
                    },
                    StartingStructure {
                        kind: StructureKind::Barracks,
                        pos: GridPos::new(2, 8),
                    },
                ],
                vec![
                    StartingStructure {
                        kind: StructureKind::Population,
                        pos: GridPos::new(14, 0),
                    },
                    StartingStructure {
                        kind: StructureKind::Barracks,
                        pos: GridPos::new(12, 1),
                    },
                ],
            ),
        }
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.gx >= 0 && pos.gy >= 0 && (pos.gx as u32) < self.width && (pos.gy as u32) < self.height
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.gy as usize) * (self.width as usize) + (pos.gx as usize))
    }

    /// Tile at coordinates, `None` if out of bounds.
    #[must_use]
    pub fn tile(&self, pos: GridPos) -> Option<Tile> {
        self.index(pos).map(|i| self.tiles[i])
    }

    /// Territory at coordinates, `None` if out of bounds.
    #[must_use]
    pub fn territory(&self, pos: GridPos) -> Option<Territory> {
        self.index(pos).map(|i| self.territory[i])
    }

    /// Reassign a tile's territory. Returns `false` if out of bounds.
    pub fn set_territory(&mut self, pos: GridPos, territory: Territory) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.territory[i] = territory;
                true
            }
            None => false,
        }
    }

    /// Whether the tile is a road.
    #[must_use]
    pub fn is_road(&self, pos: GridPos) -> bool {
        self.tile(pos) == Some(Tile::Road)
    }

    /// Whether either base stands on the tile.
    #[must_use]
    pub fn is_base(&self, pos: GridPos) -> bool {
        self.bases.player == pos || self.bases.ai == pos
    }

    /// Spawn point of a barracks site, `None` if `pos` is not a site of `side`.
    #[must_use]
    pub fn barracks_spawn(&self, side: Side, pos: GridPos) -> Option<GridPos> {
        self.barracks_sites[side]
            .iter()
            .find(|(site, _)| *site == pos)
            .map(|&(_, spawn)| spawn)
    }

    /// The lane a side's units walk, from its own side to the enemy base.
    #[must_use]
    pub fn path_for(&self, side: Side) -> Vec<GridPos> {
        match side {
            Side::Player => self.player_path.clone(),
            Side::Ai => self.player_path.iter().rev().copied().collect(),
        }
    }

    /// Whether a waypoint reverses a walking unit's facing.
    #[must_use]
    pub fn is_flip_point(&self, pos: GridPos) -> bool {
        self.flip_points.contains(&pos)
    }

    /// Judge a placement against the legality rules, in order.
    ///
    /// The first failing rule is reported. Nothing is mutated.
    pub fn check_placement(
        &self,
        side: Side,
        kind: StructureKind,
        pos: GridPos,
        cost: i32,
        max_structures: u32,
        economy: &SideEconomy,
        structures: &StructureRegistry,
    ) -> Result<(), PlacementError> {
        let Some(territory) = self.territory(pos) else {
            return Err(PlacementError::OutOfBounds {
                gx: pos.gx,
                gy: pos.gy,
            });
        };
        if economy.structure_count >= max_structures {
            return Err(PlacementError::StructureLimit {
                max: max_structures,
            });
        }
        if territory != Territory::Owned(side) {
            return Err(PlacementError::ForeignTerritory(pos));
        }
        if kind == StructureKind::Barracks && self.barracks_spawn(side, pos).is_none() {
            return Err(PlacementError::NotBarracksSite(pos));
        }
        if self.is_road(pos) {
            return Err(PlacementError::Road(pos));
        }
        if self.is_base(pos) {
            return Err(PlacementError::BaseTile(pos));
        }
        if structures.is_occupied(pos) {
            return Err(PlacementError::Occupied(pos));
        }
        if !economy.can_afford(cost) {
            return Err(PlacementError::InsufficientResources {
                required: cost,
                available: economy.resource,
            });
        }
        Ok(())
    }
}

impl Default for GridWorld {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::GameRules;

    fn fresh() -> (GridWorld, SideEconomy, StructureRegistry) {
        let world = GridWorld::standard();
        let rules = GameRules::default();
        let registry = StructureRegistry::with_starting(&world, &rules);
        (world, SideEconomy::starting(&rules), registry)
    }

    #[test]
    fn test_standard_dimensions_and_tables() {
        let world = GridWorld::standard();
        assert_eq!(world.width(), 15);
        assert_eq!(world.height(), 10);
        assert_eq!(world.player_path.len(), 34);
        assert_eq!(world.ai_pools.turret.len(), 9);
        assert_eq!(world.ai_pools.turret[2].id, 3);
        assert_eq!(world.ai_pools.turret[2].pos, GridPos::new(12, 3));
    }

    #[test]
    fn test_every_path_waypoint_is_road() {
        let world = GridWorld::standard();
        for waypoint in &world.player_path {
            assert!(world.is_road(*waypoint), "{waypoint} should be road");
        }
    }

    #[test]
    fn test_ai_path_is_reversed_player_path() {
        let world = GridWorld::standard();
        let ai = world.path_for(Side::Ai);
        assert_eq!(ai.first(), world.player_path.last());
        assert_eq!(ai.last(), world.player_path.first());
    }

    #[test]
    fn test_tile_lookup_out_of_bounds() {
        let world = GridWorld::standard();
        assert_eq!(world.tile(GridPos::new(-1, 0)), None);
        assert_eq!(world.tile(GridPos::new(15, 0)), None);
        assert_eq!(world.tile(GridPos::new(2, 7)), Some(Tile::Road));
        assert_eq!(
            world.territory(GridPos::new(9, 0)),
            Some(Territory::Owned(Side::Ai))
        );
    }

    #[test]
    fn test_placement_accepts_open_own_tile() {
        let (world, economy, registry) = fresh();
        let result = world.check_placement(
            Side::Player,
            StructureKind::Turret,
            GridPos::new(1, 0),
            20,
            10,
            &economy,
            &registry,
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_placement_rules_reject_in_order() {
        let (mut world, mut economy, registry) = fresh();
        // Roads and bases are neutral on the standard map; claim two so the
        // later rules become reachable.
        world.set_territory(GridPos::new(3, 5), Territory::Owned(Side::Player));
        world.set_territory(GridPos::new(1, 7), Territory::Owned(Side::Player));
        let check = |kind, pos, economy: &SideEconomy| {
            world.check_placement(Side::Player, kind, pos, 20, 10, economy, &registry)
        };

        assert_eq!(
            check(StructureKind::Turret, GridPos::new(20, 0), &economy),
            Err(PlacementError::OutOfBounds { gx: 20, gy: 0 })
        );
        assert_eq!(
            check(StructureKind::Turret, GridPos::new(9, 0), &economy),
            Err(PlacementError::ForeignTerritory(GridPos::new(9, 0)))
        );
        assert_eq!(
            check(StructureKind::Turret, GridPos::new(1, 2), &economy),
            Err(PlacementError::ForeignTerritory(GridPos::new(1, 2)))
        );
        assert_eq!(
            check(StructureKind::Barracks, GridPos::new(0, 0), &economy),
            Err(PlacementError::NotBarracksSite(GridPos::new(0, 0)))
        );
        assert_eq!(
            check(StructureKind::Turret, GridPos::new(3, 5), &economy),
            Err(PlacementError::Road(GridPos::new(3, 5)))
        );
        assert_eq!(
            check(StructureKind::Turret, GridPos::new(1, 7), &economy),
            Err(PlacementError::BaseTile(GridPos::new(1, 7)))
        );
        assert_eq!(
            check(StructureKind::Barracks, GridPos::new(2, 8), &economy),
            Err(PlacementError::Occupied(GridPos::new(2, 8)))
        );

        economy.resource = 19;
        assert_eq!(
            check(StructureKind::Turret, GridPos::new(1, 0), &economy),
            Err(PlacementError::InsufficientResources {
                required: 20,
                available: 19
            })
        );

        // The cap is checked before territory.
        economy.structure_count = 10;
        assert_eq!(
            check(StructureKind::Turret, GridPos::new(9, 0), &economy),
            Err(PlacementError::StructureLimit { max: 10 })
        );
    }

    #[test]
    fn test_set_territory_out_of_bounds() {
        let mut world = GridWorld::standard();
        assert!(!world.set_territory(GridPos::new(15, 10), Territory::Neutral));
    }

    #[test]
    fn test_barracks_site_lookup() {
        let world = GridWorld::standard();
        assert_eq!(
            world.barracks_spawn(Side::Player, GridPos::new(4, 7)),
            Some(GridPos::new(3, 7))
        );
        assert_eq!(
            world.barracks_spawn(Side::Ai, GridPos::new(10, 3)),
            Some(GridPos::new(11, 3))
        );
        assert_eq!(world.barracks_spawn(Side::Ai, GridPos::new(4, 7)), None);
    }
}
