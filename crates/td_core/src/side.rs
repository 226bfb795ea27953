//! The two opposing sides and a table indexed by them.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One of the two opposing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The human-controlled side.
    Player,
    /// The opponent side driven by strategy directives.
    Ai,
}

impl Side {
    /// Both sides in processing order.
    pub const ALL: [Side; 2] = [Side::Player, Side::Ai];

    /// The opposing side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Player => Self::Ai,
            Self::Ai => Self::Player,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Ai => write!(f, "ai"),
        }
    }
}

/// A value per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PerSide<T> {
    /// The player's value.
    pub player: T,
    /// The opponent's value.
    pub ai: T,
}

impl<T> PerSide<T> {
    /// Build a table from both values.
    pub const fn new(player: T, ai: T) -> Self {
        Self { player, ai }
    }

    /// Build a table by evaluating `f` for each side.
    pub fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self {
            player: f(Side::Player),
            ai: f(Side::Ai),
        }
    }

    /// Iterate `(side, value)` pairs in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (Side, &T)> {
        [(Side::Player, &self.player), (Side::Ai, &self.ai)].into_iter()
    }
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Player => &self.player,
            Side::Ai => &self.ai,
        }
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Player => &mut self.player,
            Side::Ai => &mut self.ai,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_is_involution() {
        for side in Side::ALL {
            assert_ne!(side, side.opponent());
            assert_eq!(side, side.opponent().opponent());
        }
    }

    #[test]
    fn test_per_side_indexing() {
        let mut table = PerSide::new(1, 2);
        table[Side::Ai] += 10;
        assert_eq!(table[Side::Player], 1);
        assert_eq!(table[Side::Ai], 12);
        let sides: Vec<Side> = table.iter().map(|(side, _)| side).collect();
        assert_eq!(sides, Side::ALL.to_vec());
    }
}
