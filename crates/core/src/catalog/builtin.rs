use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::tech::{TechAdvancement, TechBase, TechLevel};

use super::{
    ArmorTraits, BayTraits, Catalog, Catalogs, DissipationClass, EquipmentClass, HeatSinkTraits,
    OptionDescriptor, OptionFamily, OptionKind,
};

/// Id of the plain cargo bay.
pub const CARGO_BAY: &str = "cargo";
/// Id of standard armor, the default selection for new designs.
pub const STANDARD_ARMOR: &str = "standard";
/// Id of the single heat sink, the only type primitive units may mount.
pub const SINGLE_HEAT_SINK: &str = "single";

use EquipmentClass::{Aero, Mech, Tank};

const ALL_UNITS: &[EquipmentClass] = &[Mech, Tank, Aero];
const CARRIERS: &[EquipmentClass] = &[Tank, Aero];
const GROUND: &[EquipmentClass] = &[Mech, Tank];

/// Lazily built registries shared by every session that does not load its own.
pub(crate) static CATALOGS: Lazy<Catalogs> = Lazy::new(|| Catalogs {
    bays: Arc::new(Catalog::new(OptionFamily::Bay, bays())),
    armor: Arc::new(Catalog::new(OptionFamily::Armor, armor())),
    heat_sinks: Arc::new(Catalog::new(OptionFamily::HeatSink, heat_sinks())),
});

fn descriptor(
    id: &str,
    name: &str,
    tech: TechAdvancement,
    classes: &[EquipmentClass],
    kind: OptionKind,
) -> OptionDescriptor {
    OptionDescriptor {
        id: id.to_string(),
        display_name: name.to_string(),
        tech,
        classes: classes.to_vec(),
        kind,
    }
}

fn unit_bay(weight_per_unit: f64, personnel_per_unit: u32) -> OptionKind {
    OptionKind::Bay(BayTraits {
        weight_per_unit,
        personnel_per_unit,
        variable_capacity: false,
        cargo_class: false,
        step: None,
    })
}

fn infantry_bay(weight_per_unit: f64) -> OptionKind {
    OptionKind::Bay(BayTraits {
        weight_per_unit,
        personnel_per_unit: 0,
        variable_capacity: true,
        cargo_class: false,
        step: None,
    })
}

fn cargo_bay(weight_per_unit: f64) -> OptionKind {
    OptionKind::Bay(BayTraits {
        weight_per_unit,
        personnel_per_unit: 0,
        variable_capacity: false,
        cargo_class: true,
        step: None,
    })
}

fn bays() -> Vec<OptionDescriptor> {
    let intro = TechAdvancement::new(TechBase::All, TechLevel::Introductory).common(2300);
    let standard = TechAdvancement::new(TechBase::All, TechLevel::Standard).common(2400);
    vec![
        descriptor("mech", "Mech", standard.clone(), CARRIERS, unit_bay(150.0, 2)),
        descriptor("fighter", "Fighter", standard.clone(), &[Aero], unit_bay(150.0, 2)),
        descriptor("small_craft", "Small Craft", standard.clone(), &[Aero], unit_bay(200.0, 5)),
        descriptor(
            "protomech",
            "ProtoMech",
            TechAdvancement::new(TechBase::Clan, TechLevel::Standard)
                .prototype(3055)
                .production(3060)
                .common(3060),
            CARRIERS,
            unit_bay(50.0, 6),
        ),
        descriptor("light_vehicle", "Light Vehicle", standard.clone(), CARRIERS, unit_bay(50.0, 5)),
        descriptor(
            "heavy_vehicle",
            "Heavy Vehicle",
            standard.clone(),
            CARRIERS,
            unit_bay(100.0, 8),
        ),
        descriptor(
            "super_heavy_vehicle",
            "Super Heavy Vehicle",
            TechAdvancement::new(TechBase::All, TechLevel::Advanced).production(2470),
            CARRIERS,
            unit_bay(200.0, 8),
        ),
        descriptor("infantry_foot", "Infantry (Foot)", intro.clone(), CARRIERS, infantry_bay(5.0)),
        descriptor("infantry_jump", "Infantry (Jump)", intro.clone(), CARRIERS, infantry_bay(6.0)),
        descriptor(
            "infantry_motorized",
            "Infantry (Motorized)",
            intro.clone(),
            CARRIERS,
            infantry_bay(7.0),
        ),
        descriptor(
            "infantry_mechanized",
            "Infantry (Mechanized)",
            standard.clone(),
            CARRIERS,
            infantry_bay(8.0),
        ),
        descriptor(
            "battle_armor_is",
            "Battle Armor (IS)",
            TechAdvancement::new(TechBase::InnerSphere, TechLevel::Standard)
                .prototype(3050)
                .production(3050)
                .common(3052),
            CARRIERS,
            unit_bay(8.0, 6),
        ),
        descriptor(
            "battle_armor_clan",
            "Battle Armor (Clan)",
            TechAdvancement::new(TechBase::Clan, TechLevel::Standard)
                .production(2868)
                .common(2870),
            CARRIERS,
            unit_bay(10.0, 5),
        ),
        descriptor(
            "battle_armor_cs",
            "Battle Armor (ComStar)",
            TechAdvancement::new(TechBase::InnerSphere, TechLevel::Standard)
                .production(3053)
                .common(3058),
            CARRIERS,
            unit_bay(12.0, 6),
        ),
        descriptor(CARGO_BAY, "Cargo", intro.clone(), CARRIERS, cargo_bay(1.0)),
        descriptor("liquid_cargo", "Cargo (Liquid)", intro.clone(), CARRIERS, cargo_bay(1.1)),
        descriptor(
            "refrigerated_cargo",
            "Cargo (Refrigerated)",
            standard.clone(),
            CARRIERS,
            cargo_bay(1.15),
        ),
        descriptor("insulated_cargo", "Cargo (Insulated)", standard, CARRIERS, cargo_bay(1.15)),
        descriptor("livestock_cargo", "Cargo (Livestock)", intro, CARRIERS, cargo_bay(1.2)),
    ]
}

fn plating(slots: u32, points_multiplier: f64) -> ArmorTraits {
    ArmorTraits {
        industrial_class: false,
        requires_unlocked_movement: false,
        slots,
        points_multiplier,
    }
}

fn industrial(points_multiplier: f64) -> OptionKind {
    OptionKind::Armor(ArmorTraits {
        industrial_class: true,
        ..plating(0, points_multiplier)
    })
}

fn armor() -> Vec<OptionDescriptor> {
    use TechBase::{All, Clan, InnerSphere};
    use TechLevel::{Advanced, Introductory, Standard};

    vec![
        descriptor(
            STANDARD_ARMOR,
            "Standard",
            TechAdvancement::new(All, Introductory).common(2470),
            ALL_UNITS,
            OptionKind::Armor(plating(0, 1.0)),
        ),
        descriptor(
            "ferro_fibrous",
            "Ferro-Fibrous",
            TechAdvancement::new(InnerSphere, Standard)
                .prototype(2557)
                .production(2571)
                .common(3055)
                .extinct(2810)
                .reintroduced(3040),
            ALL_UNITS,
            OptionKind::Armor(plating(14, 1.12)),
        ),
        descriptor(
            "clan_ferro_fibrous",
            "Ferro-Fibrous",
            TechAdvancement::new(Clan, Standard).production(2820).common(2825),
            ALL_UNITS,
            OptionKind::Armor(plating(7, 1.2)),
        ),
        descriptor(
            "light_ferro_fibrous",
            "Light Ferro-Fibrous",
            TechAdvancement::new(InnerSphere, Standard)
                .prototype(3055)
                .production(3067)
                .common(3070),
            GROUND,
            OptionKind::Armor(plating(7, 1.06)),
        ),
        descriptor(
            "heavy_ferro_fibrous",
            "Heavy Ferro-Fibrous",
            TechAdvancement::new(InnerSphere, Standard)
                .prototype(3055)
                .production(3069)
                .common(3070),
            GROUND,
            OptionKind::Armor(plating(21, 1.24)),
        ),
        descriptor(
            "stealth",
            "Stealth",
            TechAdvancement::new(InnerSphere, Standard)
                .prototype(3051)
                .production(3063)
                .common(3072),
            GROUND,
            OptionKind::Armor(plating(12, 1.0)),
        ),
        descriptor(
            "reactive",
            "Reactive",
            TechAdvancement::new(InnerSphere, Advanced).prototype(3063).production(3081),
            GROUND,
            OptionKind::Armor(plating(14, 1.0)),
        ),
        descriptor(
            "clan_reactive",
            "Reactive",
            TechAdvancement::new(Clan, Advanced).prototype(3065).production(3081),
            GROUND,
            OptionKind::Armor(plating(7, 1.0)),
        ),
        descriptor(
            "reflective",
            "Reflective",
            TechAdvancement::new(InnerSphere, Advanced).prototype(3058).production(3066),
            ALL_UNITS,
            OptionKind::Armor(plating(10, 1.0)),
        ),
        descriptor(
            "clan_reflective",
            "Reflective",
            TechAdvancement::new(Clan, Advanced).prototype(3061).production(3067),
            ALL_UNITS,
            OptionKind::Armor(plating(5, 1.0)),
        ),
        descriptor(
            "hardened",
            "Hardened",
            TechAdvancement::new(All, Advanced).prototype(3047).production(3081),
            GROUND,
            OptionKind::Armor(ArmorTraits {
                requires_unlocked_movement: true,
                ..plating(0, 0.5)
            }),
        ),
        descriptor(
            "ferro_lamellor",
            "Ferro-Lamellor",
            TechAdvancement::new(Clan, Advanced).prototype(3070).production(3109),
            GROUND,
            OptionKind::Armor(plating(12, 0.9)),
        ),
        descriptor(
            "industrial",
            "Industrial",
            TechAdvancement::new(All, Introductory).common(2350),
            &[Mech],
            industrial(0.67),
        ),
        descriptor(
            "heavy_industrial",
            "Heavy Industrial",
            TechAdvancement::new(All, Standard).common(2460),
            &[Mech],
            industrial(1.0),
        ),
        descriptor(
            "commercial",
            "Commercial",
            TechAdvancement::new(All, Introductory).common(2300),
            &[Mech],
            industrial(0.5),
        ),
    ]
}

fn sink(dissipation: DissipationClass, compact: bool) -> OptionKind {
    OptionKind::HeatSink(HeatSinkTraits {
        dissipation,
        compact,
    })
}

fn heat_sinks() -> Vec<OptionDescriptor> {
    use DissipationClass::{Double, Freezer, Laser, Prototype, Single};
    use TechBase::{All, Clan, InnerSphere};
    use TechLevel::{Advanced, Experimental, Introductory, Standard};

    vec![
        descriptor(
            SINGLE_HEAT_SINK,
            "Single",
            TechAdvancement::new(All, Introductory).common(2022),
            ALL_UNITS,
            sink(Single, false),
        ),
        descriptor(
            "double_is",
            "Double (IS)",
            TechAdvancement::new(InnerSphere, Standard)
                .prototype(2567)
                .production(2567)
                .common(3050)
                .extinct(2865)
                .reintroduced(3040),
            ALL_UNITS,
            sink(Double, false),
        ),
        descriptor(
            "double_clan",
            "Double (Clan)",
            TechAdvancement::new(Clan, Standard).production(2825).common(2830),
            ALL_UNITS,
            sink(Double, false),
        ),
        descriptor(
            "compact",
            "Compact",
            TechAdvancement::new(InnerSphere, Advanced).prototype(3058).production(3079),
            &[Mech],
            sink(Single, true),
        ),
        descriptor(
            "laser",
            "Laser",
            TechAdvancement::new(Clan, Advanced).prototype(3040).production(3051),
            &[Mech, Aero],
            sink(Laser, false),
        ),
        descriptor(
            "prototype_double",
            "Prototype Double",
            TechAdvancement::new(InnerSphere, Experimental).prototype(2559),
            &[Mech],
            sink(Prototype, false),
        ),
        descriptor(
            "freezer",
            "Freezers",
            TechAdvancement::new(InnerSphere, Experimental).prototype(3022),
            &[Mech],
            sink(Freezer, false),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogs_are_populated_and_consistent() {
        let catalogs = Catalogs::builtin();
        assert_eq!(catalogs.bays.len(), bays().len());
        assert_eq!(catalogs.heat_sinks.len(), 7);
        assert!(catalogs.bays.get(CARGO_BAY).is_some());
        assert!(catalogs.armor.get(STANDARD_ARMOR).is_some());
        assert!(catalogs.heat_sinks.get(SINGLE_HEAT_SINK).is_some());

        let industrial: Vec<_> = catalogs
            .armor
            .iter()
            .filter(|option| option.armor().is_some_and(|armor| armor.industrial_class))
            .map(|option| option.id.as_str())
            .collect();
        assert_eq!(industrial, ["industrial", "heavy_industrial", "commercial"]);
    }
}
