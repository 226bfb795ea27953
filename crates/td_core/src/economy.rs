//! Per-side economy: resource, population and structure bookkeeping.
//!
//! The economy is plain integer state. Every operation that changes it
//! lives on [`SideEconomy`] so the bookkeeping rules (population never
//! exceeds the cap at spawn, structure count tracks the registry) are
//! enforced in one place.

use serde::{Deserialize, Serialize};

use crate::rules::GameRules;

/// Economy state of one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideEconomy {
    /// Spendable resource.
    pub resource: i32,
    /// Population consumed by living units.
    pub population: i32,
    /// Population cap.
    pub max_population: i32,
    /// Number of structures owned.
    pub structure_count: u32,
}

impl SideEconomy {
    /// Create an economy with explicit values.
    #[must_use]
    pub const fn new(resource: i32, max_population: i32, structure_count: u32) -> Self {
        Self {
            resource,
            population: 0,
            max_population,
            structure_count,
        }
    }

    /// Economy at the start of a fresh game, before starting structures.
    ///
    /// Starting structures are counted by the registry that places them.
    #[must_use]
    pub const fn starting(rules: &GameRules) -> Self {
        Self::new(rules.starting.resource, rules.starting.max_population, 0)
    }

    /// Check if the side can afford a cost.
    #[must_use]
    pub const fn can_afford(&self, cost: i32) -> bool {
        self.resource >= cost
    }

    /// Spend resource if available.
    ///
    /// Returns true if the transaction succeeded.
    pub fn spend(&mut self, amount: i32) -> bool {
        if self.can_afford(amount) {
            self.resource -= amount;
            true
        } else {
            false
        }
    }

    /// Add resource.
    pub fn deposit(&mut self, amount: i32) {
        self.resource += amount;
    }

    /// Whether a unit of the given population cost fits under the cap.
    #[must_use]
    pub const fn has_population_room(&self, population_cost: i32) -> bool {
        self.population + population_cost <= self.max_population
    }

    /// Account for a unit entering the field.
    pub fn add_population(&mut self, population_cost: i32) {
        self.population += population_cost;
    }

    /// Account for a unit leaving the field.
    pub fn remove_population(&mut self, population_cost: i32) {
        self.population -= population_cost;
    }

    /// Record a structure joining the side.
    pub fn structure_added(&mut self, max_population_bonus: i32) {
        self.structure_count += 1;
        self.max_population += max_population_bonus;
    }

    /// Record a structure leaving the side.
    pub fn structure_removed(&mut self, max_population_bonus: i32) {
        self.structure_count = self.structure_count.saturating_sub(1);
        self.max_population -= max_population_bonus;
    }
}
