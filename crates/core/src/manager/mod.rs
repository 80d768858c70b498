//! Allocation managers: one per slice of the unit design.
//!
//! Every mutation runs to completion before returning: read the design,
//! clamp the request against freshly computed bounds, write, then notify.
//! Observers run after the design lock is released, so they may read the
//! design but cannot call back into the manager that is notifying them.

mod armor;
mod bay;
mod heat_sink;

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;

use crate::{
    design::{SharedDesign, UnitDesign},
    error::{EngineError, Result},
    rules::RulesTable,
    tech::TechContext,
};

pub use armor::{ArmorAllocationManager, ArmorEvent, ArmorRow};
pub use bay::{BayAllocationManager, BayEvent, BayRow, Occupancy};
pub use heat_sink::{HeatSinkAllocationManager, HeatSinkEvent, HeatSinkLayout, HeatSinkOption};

/// Shared, host-owned handle to the active tech context.
pub type SharedTech = Arc<RwLock<TechContext>>;

/// Rules table shared by the managers of one editing session.
pub type SharedRules = Arc<dyn RulesTable>;

/// Numeric edit range pushed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EditBounds {
    /// Lowest accepted value.
    pub min: f64,
    /// Highest accepted value.
    pub max: f64,
    /// Grid spacing.
    pub step: f64,
}

impl EditBounds {
    /// Bounds of `[min, max]` on a `step` grid; `max` never falls below `min`.
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self {
            min,
            max: max.max(min),
            step,
        }
    }

    /// Integer range with a unit step.
    pub fn counts(min: u32, max: u32) -> Self {
        Self::new(f64::from(min), f64::from(max), 1.0)
    }

    /// Snap `value` to the step grid, then pull it inside `[min, max]`
    /// without leaving the grid. Non-finite requests are rejected.
    pub fn clamp(&self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let snapped = (value / self.step).round() * self.step;
        let clamped = if snapped > self.max {
            ((self.max / self.step).floor() * self.step).max(self.min)
        } else if snapped < self.min {
            self.min
        } else {
            snapped
        };
        Some(clamped)
    }
}

/// Compare clamped tonnages and capacities, which always sit on a half-ton grid.
pub(crate) fn same_value(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Weak references to the design and tech context a manager works on.
#[derive(Debug, Clone)]
pub(crate) struct Subject {
    design: Weak<RwLock<UnitDesign>>,
    tech: Weak<RwLock<TechContext>>,
}

impl Subject {
    pub(crate) fn new(design: &SharedDesign, tech: &SharedTech) -> Self {
        Self {
            design: Arc::downgrade(design),
            tech: Arc::downgrade(tech),
        }
    }

    pub(crate) fn retarget(&mut self, design: &SharedDesign) {
        self.design = Arc::downgrade(design);
    }

    pub(crate) fn design(&self) -> Result<SharedDesign> {
        self.design.upgrade().ok_or(EngineError::DesignDetached)
    }

    /// Snapshot of the tech context for the duration of one query.
    pub(crate) fn tech(&self) -> Result<TechContext> {
        let tech = self.tech.upgrade().ok_or(EngineError::TechContextDetached)?;
        let snapshot = tech.read().clone();
        Ok(snapshot)
    }
}
