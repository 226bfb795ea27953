//! Barracks production: queues, the current item and its progress.
//!
//! Each barracks runs a small state machine:
//!
//! - **Idle**: no current item and an empty queue.
//! - **Producing**: a current item whose elapsed time advances every tick.
//! - **Blocked**: the current item is finished but the owner's population
//!   cap has no room. The spawn is retried every tick.
//!
//! A finished item leaves the barracks as soon as it fits under the cap.
//! The next queued item is promoted on the following tick.
//!
//! Time is integer milliseconds throughout.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::economy::SideEconomy;
use crate::error::ProductionError;
use crate::math::Fixed;
use crate::rules::UnitStats;
use crate::units::UnitKind;

/// A unit waiting in a barracks queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingUnit {
    /// Unit type.
    pub kind: UnitKind,
    /// Resource charged when the unit was ordered. Refunded on cancel.
    pub cost: i32,
    /// Population the unit takes once spawned.
    pub population_cost: i32,
    /// Build time in milliseconds.
    pub production_time_ms: u32,
}

impl PendingUnit {
    /// A unit ordered at its listed price.
    #[must_use]
    pub const fn priced(kind: UnitKind, stats: &UnitStats) -> Self {
        Self {
            kind,
            cost: stats.cost,
            population_cost: stats.population_cost,
            production_time_ms: stats.production_time_ms,
        }
    }

    /// A unit granted for free.
    #[must_use]
    pub const fn free(kind: UnitKind, stats: &UnitStats) -> Self {
        Self {
            cost: 0,
            ..Self::priced(kind, stats)
        }
    }
}

/// The unit a barracks is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrentProduction {
    /// What is being built.
    pub unit: PendingUnit,
    /// Time spent so far.
    pub elapsed_ms: u32,
}

impl CurrentProduction {
    /// Start producing a unit from scratch.
    #[must_use]
    pub const fn start(unit: PendingUnit) -> Self {
        Self {
            unit,
            elapsed_ms: 0,
        }
    }

    /// Check if production is complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.elapsed_ms >= self.unit.production_time_ms
    }

    /// Progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> Fixed {
        if self.unit.production_time_ms == 0 {
            return Fixed::ONE;
        }
        let ratio = Fixed::from_num(self.elapsed_ms) / Fixed::from_num(self.unit.production_time_ms);
        ratio.min(Fixed::ONE)
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.unit.production_time_ms == 0 {
            100
        } else {
            let done = u64::from(self.elapsed_ms.min(self.unit.production_time_ms));
            let pct = done * 100 / u64::from(self.unit.production_time_ms);
            u32::try_from(pct).unwrap_or(100)
        }
    }

    /// Advance production by `dt_ms`.
    pub fn advance(&mut self, dt_ms: u32) {
        self.elapsed_ms = self
            .elapsed_ms
            .saturating_add(dt_ms)
            .min(self.unit.production_time_ms);
    }
}

/// Which unit of a barracks to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelSlot {
    /// The unit in production.
    Current,
    /// A waiting unit, 0 being next in line.
    Queued(usize),
}

/// Production queue component for barracks.
///
/// The unit in production is held apart from the waiting line, so the
/// queue limit only counts units that have not started.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProductionQueue {
    /// The unit in production.
    pub current: Option<CurrentProduction>,
    /// Units waiting to start.
    pub queue: VecDeque<PendingUnit>,
    /// Maximum number of waiting units accepted through [`Self::add`].
    pub max_queue_size: usize,
}

impl ProductionQueue {
    /// Create a production queue with a specific max size.
    #[must_use]
    pub fn with_max_size(max_queue_size: usize) -> Self {
        Self {
            current: None,
            queue: VecDeque::new(),
            max_queue_size,
        }
    }

    /// Check if the waiting line is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.max_queue_size
    }

    /// No unit in production and none waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// Number of waiting units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Add a unit to the waiting line.
    ///
    /// Returns `Err` if the line is full.
    pub fn add(&mut self, unit: PendingUnit) -> Result<(), ProductionError> {
        if self.is_full() {
            return Err(ProductionError::QueueFull);
        }
        self.queue.push_back(unit);
        Ok(())
    }

    /// Add a unit regardless of the queue limit.
    pub fn push_unbounded(&mut self, unit: PendingUnit) {
        self.queue.push_back(unit);
    }

    /// Remove a unit from the barracks.
    ///
    /// Cancelling the current unit promotes the next waiting unit with a
    /// fresh start. Returns the removed unit, or `None` for an empty slot.
    pub fn cancel(&mut self, slot: CancelSlot) -> Option<PendingUnit> {
        match slot {
            CancelSlot::Current => {
                let cancelled = self.current.take()?;
                self.current = self.queue.pop_front().map(CurrentProduction::start);
                Some(cancelled.unit)
            }
            CancelSlot::Queued(index) => self.queue.remove(index),
        }
    }

    /// Drop everything, without refunds.
    pub fn clear(&mut self) {
        self.current = None;
        self.queue.clear();
    }
}

/// Outcome of advancing one barracks by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionStep {
    /// Nothing to do.
    Idle,
    /// A waiting unit moved into production.
    Started(UnitKind),
    /// The current unit advanced.
    Progress {
        /// Unit in production.
        kind: UnitKind,
        /// Percentage complete.
        percent: u32,
    },
    /// The current unit is done but the population cap is full.
    Blocked(UnitKind),
    /// A unit is ready to enter the field. Population is already counted.
    Completed(PendingUnit),
}

/// Advance one barracks by `dt_ms`.
///
/// An idle barracks promotes its next waiting unit without advancing it.
/// A finished unit is released only when the owner has population room,
/// in which case the owner's population is charged here.
pub fn advance_production(
    queue: &mut ProductionQueue,
    dt_ms: u32,
    economy: &mut SideEconomy,
) -> ProductionStep {
    let Some(current) = queue.current.as_mut() else {
        return match queue.queue.pop_front() {
            Some(next) => {
                queue.current = Some(CurrentProduction::start(next));
                ProductionStep::Started(next.kind)
            }
            None => ProductionStep::Idle,
        };
    };

    current.advance(dt_ms);
    if !current.is_complete() {
        return ProductionStep::Progress {
            kind: current.unit.kind,
            percent: current.percentage(),
        };
    }

    let unit = current.unit;
    if !economy.has_population_room(unit.population_cost) {
        return ProductionStep::Blocked(unit.kind);
    }
    economy.add_population(unit.population_cost);
    queue.current = None;
    ProductionStep::Completed(unit)
}

/// Queue a unit for production on a player barracks.
///
/// Checks, in order: an active round, affordability, population room
/// (living units only, queued units are not counted) and the queue
/// limit. The cost is deducted on success.
pub fn queue_production(
    queue: &mut ProductionQueue,
    unit: PendingUnit,
    round_active: bool,
    economy: &mut SideEconomy,
) -> Result<(), ProductionError> {
    if !round_active {
        return Err(ProductionError::RoundInactive);
    }
    if !economy.can_afford(unit.cost) {
        return Err(ProductionError::InsufficientResources);
    }
    if !economy.has_population_room(unit.population_cost) {
        return Err(ProductionError::PopulationCapReached);
    }
    queue.add(unit)?;
    economy.spend(unit.cost);
    Ok(())
}

/// Cancel a unit and refund exactly what was charged for it.
///
/// Returns the cancelled unit, or `None` if the slot was empty.
pub fn cancel_production(
    queue: &mut ProductionQueue,
    slot: CancelSlot,
    economy: &mut SideEconomy,
) -> Option<PendingUnit> {
    let unit = queue.cancel(slot)?;
    economy.deposit(unit.cost);
    Some(unit)
}
