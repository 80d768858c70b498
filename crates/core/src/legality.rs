//! Reduces a catalog to the options a unit may select under a tech context.
//!
//! Pure functions of their inputs: nothing is cached here, and an empty
//! result is an answer rather than an error.

use crate::{
    catalog::{Catalog, EquipmentClass, OptionDescriptor, OptionFamily},
    design::{ArmorSelection, MovementMode, UnitDesign},
    tech::{TechBase, TechLevel, TechManager, PATCHWORK_ARMOR},
};

/// Unit attributes the filter depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitProfile {
    /// Equipment flag options must carry.
    pub class: EquipmentClass,
    /// Movement mode; some armor locks up aerial and hover chassis.
    pub movement: MovementMode,
    /// Land-air mech (convertible between mech and fighter modes).
    pub land_air: bool,
    /// Industrial units are held to industrial armor.
    pub industrial: bool,
    /// Primitive units are held to single heat sinks.
    pub primitive: bool,
}

impl UnitProfile {
    /// Profile of `design`.
    pub fn of(design: &UnitDesign) -> Self {
        Self {
            class: design.unit_type.equipment_class(),
            movement: design.movement_mode,
            land_air: design.unit_type.is_land_air(),
            industrial: design.is_industrial,
            primitive: design.is_primitive,
        }
    }

    /// Armor that locks up the chassis is barred from aerial, hover and
    /// convertible units.
    pub fn forbids_locked_armor(&self) -> bool {
        self.land_air || self.movement.locks_out_heavy_armor()
    }
}

/// Whether a single option clears the tech context.
pub fn is_legal(option: &OptionDescriptor, tech: &impl TechManager) -> bool {
    tech.is_legal(&option.tech)
}

/// Name of `option` as listed to the user. Under mixed tech, faction-bound
/// options carry their tech base so the IS and Clan variants stay apart.
pub fn listed_name(option: &OptionDescriptor, tech: &impl TechManager) -> String {
    let base = option.tech.base;
    if !tech.is_mixed_tech() || base == TechBase::All {
        return option.display_name.clone();
    }
    let suffix = format!("({})", base.label());
    if option.display_name.ends_with(&suffix) {
        option.display_name.clone()
    } else {
        format!("{} {suffix}", option.display_name)
    }
}

/// Options of `catalog` the unit may select, in catalog order.
///
/// Under mixed tech both the Inner Sphere and Clan variants of an option are
/// offered as separate entries; otherwise only the variant matching the
/// context's tech base survives. Industrial units below experimental rules
/// are limited to industrial armor regardless of everything else.
pub fn legal_options<'a>(
    catalog: &'a Catalog,
    tech: &impl TechManager,
    profile: &UnitProfile,
) -> Vec<&'a OptionDescriptor> {
    if catalog.family() == OptionFamily::Armor && industrial_restricted(tech, profile) {
        return catalog
            .iter()
            .filter(|option| option.armor().is_some_and(|armor| armor.industrial_class))
            .collect();
    }

    catalog
        .iter()
        .filter(|option| option.allows(profile.class))
        .filter(|option| is_legal(option, tech))
        .filter(|option| fits_shape(option, profile))
        .collect()
}

/// An entry of the armor type list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmorChoice<'a> {
    /// A catalog armor type.
    Armor(&'a OptionDescriptor),
    /// Patchwork armor.
    Patchwork,
}

impl ArmorChoice<'_> {
    /// Design selection this entry stands for.
    pub fn selection(&self) -> ArmorSelection {
        match self {
            ArmorChoice::Armor(option) => ArmorSelection::option(option.id.clone()),
            ArmorChoice::Patchwork => ArmorSelection::Patchwork,
        }
    }

    /// Name shown in the armor list.
    pub fn display_name(&self, tech: &impl TechManager) -> String {
        match self {
            ArmorChoice::Armor(option) => listed_name(option, tech),
            ArmorChoice::Patchwork => "Patchwork".to_string(),
        }
    }
}

/// Legal armor options followed by the patchwork entry when patchwork armor
/// itself is legal.
pub fn armor_choices<'a>(
    catalog: &'a Catalog,
    tech: &impl TechManager,
    profile: &UnitProfile,
) -> Vec<ArmorChoice<'a>> {
    let mut choices: Vec<_> = legal_options(catalog, tech, profile)
        .into_iter()
        .map(ArmorChoice::Armor)
        .collect();
    if tech.is_legal(&PATCHWORK_ARMOR) {
        choices.push(ArmorChoice::Patchwork);
    }
    choices
}

fn industrial_restricted(tech: &impl TechManager, profile: &UnitProfile) -> bool {
    profile.industrial && tech.tech_level() < TechLevel::Experimental
}

fn fits_shape(option: &OptionDescriptor, profile: &UnitProfile) -> bool {
    match option.armor() {
        Some(armor) => {
            !(armor.requires_unlocked_movement && profile.forbids_locked_armor())
                && !(profile.land_air && armor.slots > 0)
        }
        None => true,
    }
}
