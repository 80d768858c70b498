//! Catalog entry types.

use serde::{Deserialize, Serialize};

use crate::tech::{TechAdvancement, TechBase};

use super::OptionFamily;

/// Equipment flag marking which unit category may mount an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentClass {
    /// Mechs, including land-air mechs.
    Mech,
    /// Combat and support vehicles.
    Tank,
    /// Fighters, small craft and large aerospace hulls.
    Aero,
}

/// A catalog entry: a shared header plus per-family data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    /// Stable catalog key.
    pub id: String,
    /// Name shown in option lists.
    pub display_name: String,
    /// When and where the option is available.
    pub tech: TechAdvancement,
    /// Unit categories allowed to mount the option.
    #[serde(default)]
    pub classes: Vec<EquipmentClass>,
    /// Family-specific data.
    pub kind: OptionKind,
}

/// Per-family part of a catalog entry, tagged by `family` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum OptionKind {
    /// Transport bay type.
    Bay(BayTraits),
    /// Armor type.
    Armor(ArmorTraits),
    /// Heat-sink type.
    HeatSink(HeatSinkTraits),
}

/// Sizing and staffing of a transport bay type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayTraits {
    /// Tons per unit of capacity.
    pub weight_per_unit: f64,
    /// Crew carried per unit of capacity.
    #[serde(default)]
    pub personnel_per_unit: u32,
    /// Occupancy per unit is not fixed (infantry), so personnel is unknown.
    #[serde(default)]
    pub variable_capacity: bool,
    /// Cargo-class bays size in half-unit steps and may have no doors.
    #[serde(default)]
    pub cargo_class: bool,
    /// Overrides the default size granularity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl BayTraits {
    /// Capacity granularity when resizing.
    pub fn size_step(&self) -> f64 {
        match self.step {
            Some(step) if step > 0.0 => step,
            _ if self.cargo_class => 0.5,
            _ => 1.0,
        }
    }

    /// Fewest doors an installed bay of this type may have.
    pub fn min_doors(&self) -> u32 {
        if self.cargo_class {
            0
        } else {
            1
        }
    }
}

/// Construction traits of an armor type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorTraits {
    /// Usable by industrial units below experimental rules.
    #[serde(default)]
    pub industrial_class: bool,
    /// Not allowed on VTOL, WiGE or hover movement, nor on land-air mechs.
    #[serde(default)]
    pub requires_unlocked_movement: bool,
    /// Critical slots the armor occupies; bulky armor is barred from LAMs.
    #[serde(default)]
    pub slots: u32,
    /// Armor points per ton relative to standard armor.
    #[serde(default = "unit_multiplier")]
    pub points_multiplier: f64,
}

fn unit_multiplier() -> f64 {
    1.0
}

/// How a heat sink dissipates heat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DissipationClass {
    /// One point per sink.
    Single,
    /// Two points per sink.
    Double,
    /// Laser heat sink.
    Laser,
    /// Prototype double heat sink.
    Prototype,
    /// Freezer heat sink.
    Freezer,
}

/// Construction traits of a heat-sink type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatSinkTraits {
    /// Dissipation class; aerospace units only tell single from double.
    pub dissipation: DissipationClass,
    /// Compact sinks fit two to a slot inside the engine.
    #[serde(default)]
    pub compact: bool,
}

impl OptionDescriptor {
    /// Family the entry belongs to.
    pub fn family(&self) -> OptionFamily {
        match self.kind {
            OptionKind::Bay(_) => OptionFamily::Bay,
            OptionKind::Armor(_) => OptionFamily::Armor,
            OptionKind::HeatSink(_) => OptionFamily::HeatSink,
        }
    }

    /// Whether units of `class` may mount the option.
    pub fn allows(&self, class: EquipmentClass) -> bool {
        self.classes.contains(&class)
    }

    /// Whether the option is Clan construction.
    pub fn is_clan(&self) -> bool {
        self.tech.base == TechBase::Clan
    }

    /// Bay traits, if this is a bay type.
    pub fn bay(&self) -> Option<&BayTraits> {
        match &self.kind {
            OptionKind::Bay(traits) => Some(traits),
            _ => None,
        }
    }

    /// Armor traits, if this is an armor type.
    pub fn armor(&self) -> Option<&ArmorTraits> {
        match &self.kind {
            OptionKind::Armor(traits) => Some(traits),
            _ => None,
        }
    }

    /// Heat-sink traits, if this is a heat-sink type.
    pub fn heat_sink(&self) -> Option<&HeatSinkTraits> {
        match &self.kind {
            OptionKind::HeatSink(traits) => Some(traits),
            _ => None,
        }
    }
}
