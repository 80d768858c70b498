//! Host-supplied construction limits.
//!
//! The managers never hard-code tonnage formulas; they ask a [`RulesTable`].
//! [`StandardRules`] is the table the shell uses.

use crate::design::{MovementMode, UnitDesign, UnitType};

/// Construction limits the managers clamp against.
pub trait RulesTable {
    /// Most bay doors the hull can carry.
    fn max_bay_doors(&self, design: &UnitDesign) -> u32;

    /// Heaviest armor allocation the design can carry.
    fn max_armor_tonnage(&self, design: &UnitDesign) -> f64;

    /// Tonnage not yet allocated to anything.
    fn remaining_weight_budget(&self, design: &UnitDesign) -> f64;

    /// Upper bound on heat sinks, if the unit type has one.
    fn heat_sink_ceiling(&self, design: &UnitDesign) -> Option<u32>;
}

/// Armor points carried per ton of standard armor.
const POINTS_PER_TON: f64 = 16.0;

/// Internal structure points per location: head, center torso, side torso,
/// arm, leg. Indexed by `(tonnage - 20) / 5`.
const MECH_STRUCTURE: [[u32; 5]; 17] = [
    [3, 6, 5, 3, 4],
    [3, 8, 6, 4, 6],
    [3, 10, 7, 5, 7],
    [3, 11, 8, 6, 8],
    [3, 12, 10, 6, 10],
    [3, 14, 11, 7, 11],
    [3, 16, 12, 8, 12],
    [3, 18, 13, 9, 13],
    [3, 20, 14, 10, 14],
    [3, 21, 15, 10, 15],
    [3, 22, 15, 11, 15],
    [3, 23, 16, 12, 16],
    [3, 25, 17, 13, 17],
    [3, 27, 18, 14, 18],
    [3, 29, 19, 15, 19],
    [3, 30, 20, 16, 20],
    [3, 31, 21, 17, 21],
];

/// Rules table following the published construction rules closely enough
/// for interactive editing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    fn max_armor_points(design: &UnitDesign) -> f64 {
        match design.unit_type {
            UnitType::Mech | UnitType::LandAirMech => {
                f64::from(mech_armor_points(design.tonnage, design.movement_mode))
            }
            UnitType::Tank | UnitType::SupportVehicle => (design.tonnage * 3.5).floor() + 40.0,
            UnitType::AerospaceFighter | UnitType::ConventionalFighter => design.tonnage * 8.0,
            _ => design.tonnage * 0.1 * POINTS_PER_TON,
        }
    }
}

impl RulesTable for StandardRules {
    fn max_bay_doors(&self, design: &UnitDesign) -> u32 {
        let hull = design.tonnage.max(0.0);
        match design.unit_type {
            UnitType::SmallCraft => 2,
            UnitType::DropShip => 7 + (hull / 50_000.0).floor() as u32,
            UnitType::JumpShip | UnitType::WarShip | UnitType::SpaceStation => {
                8 + (hull / 100_000.0).floor() as u32
            }
            UnitType::Tank | UnitType::SupportVehicle => 4,
            _ => 0,
        }
    }

    fn max_armor_tonnage(&self, design: &UnitDesign) -> f64 {
        ceil_half_ton(Self::max_armor_points(design) / POINTS_PER_TON)
    }

    fn remaining_weight_budget(&self, design: &UnitDesign) -> f64 {
        let sinks = design
            .heat_sinks
            .total_count
            .saturating_sub(design.free_heat_sinks());
        let used = design.fixed_tonnage
            + design.bays.total_tonnage()
            + design.armor_tonnage()
            + f64::from(sinks);
        design.tonnage - used
    }

    fn heat_sink_ceiling(&self, design: &UnitDesign) -> Option<u32> {
        if !design.unit_type.is_aerospace() {
            return None;
        }
        let spare = self.remaining_weight_budget(design).max(0.0).floor() as u32;
        Some(design.heat_sinks.total_count + spare)
    }
}

fn mech_armor_points(tonnage: f64, movement: MovementMode) -> u32 {
    let row = ((tonnage / 5.0).round() as i64 - 4).clamp(0, 16) as usize;
    let [_head, center, side, arm, leg] = MECH_STRUCTURE[row];
    let arm = if movement == MovementMode::Quad { leg } else { arm };
    // Head armor is capped at 9 rather than twice its structure.
    9 + 2 * (center + 2 * side + 2 * arm + 2 * leg)
}

/// Round up to the next half ton.
pub fn ceil_half_ton(tons: f64) -> f64 {
    (tons * 2.0).ceil() / 2.0
}

/// Round down to the previous half ton.
pub fn floor_half_ton(tons: f64) -> f64 {
    (tons * 2.0).floor() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{EngineDescriptor, EngineKind};

    #[test]
    fn mech_armor_follows_structure_table() {
        let assault = UnitDesign::new("Atlas", UnitType::Mech, 100.0);
        assert_eq!(mech_armor_points(100.0, MovementMode::Biped), 307);
        assert_eq!(StandardRules.max_armor_tonnage(&assault), 19.5);

        let light = UnitDesign::new("Locust", UnitType::Mech, 20.0);
        assert_eq!(mech_armor_points(20.0, MovementMode::Biped), 69);
        assert_eq!(StandardRules.max_armor_tonnage(&light), 4.5);
    }

    #[test]
    fn vehicle_armor_and_doors() {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        // 175 + 40 = 215 points => 13.4375 t => 13.5
        assert_eq!(StandardRules.max_armor_tonnage(&tank), 13.5);
        assert_eq!(StandardRules.max_bay_doors(&tank), 4);

        let dropship = UnitDesign::new("Union", UnitType::DropShip, 3_500.0);
        assert_eq!(StandardRules.max_bay_doors(&dropship), 7);
    }

    #[test]
    fn ledger_counts_every_allocation() {
        let mut fighter = UnitDesign::new("Sparrowhawk", UnitType::AerospaceFighter, 30.0)
            .with_engine(EngineDescriptor::new(EngineKind::Fusion, 210));
        fighter.fixed_tonnage = 20.0;
        fighter.armor.tonnage = 4.0;
        fighter.heat_sinks.total_count = 12;
        assert_eq!(StandardRules.remaining_weight_budget(&fighter), 4.0);
        assert_eq!(StandardRules.heat_sink_ceiling(&fighter), Some(16));

        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        assert_eq!(StandardRules.heat_sink_ceiling(&tank), None);
    }
}
