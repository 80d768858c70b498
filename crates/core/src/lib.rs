#![warn(clippy::all, missing_docs)]

//! Construction constraint engine for the loadout editor.
//!
//! Filters equipment catalogs down to what a unit may legally mount, keeps
//! bays, armor and heat sinks inside the bounds the construction rules
//! allow, and reports every accepted change to the host.

pub mod catalog;
pub mod config;
pub mod design;
pub mod error;
pub mod legality;
pub mod manager;
pub mod notify;
pub mod rules;
pub mod tech;

pub use catalog::{Catalog, Catalogs, OptionDescriptor, OptionFamily, OptionKind};
pub use config::{AppConfig, UnitSettings};
pub use design::{SharedDesign, UnitDesign, UnitType};
pub use error::{EngineError, Result};
pub use manager::{
    ArmorAllocationManager, BayAllocationManager, EditBounds, HeatSinkAllocationManager,
    SharedRules, SharedTech,
};
pub use rules::{RulesTable, StandardRules};
pub use tech::{TechBase, TechContext, TechLevel, TechManager};
