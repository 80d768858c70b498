//! The mutable unit design the managers edit.
//!
//! The host owns the design behind a [`SharedDesign`] handle; managers keep
//! only a weak reference and re-read it on every call.

use std::{collections::BTreeMap, fmt, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::catalog::{
    builtin::{SINGLE_HEAT_SINK, STANDARD_ARMOR},
    EquipmentClass, OptionDescriptor,
};

/// Shared, host-owned handle to a unit design.
pub type SharedDesign = Arc<RwLock<UnitDesign>>;

/// Unit categories the editor builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// BattleMech or IndustrialMech.
    Mech,
    /// Mech convertible to fighter mode.
    LandAirMech,
    /// Combat vehicle.
    Tank,
    /// Support vehicle.
    SupportVehicle,
    /// Aerospace fighter.
    AerospaceFighter,
    /// Conventional fighter.
    ConventionalFighter,
    /// Small craft.
    SmallCraft,
    /// DropShip.
    DropShip,
    /// JumpShip.
    JumpShip,
    /// WarShip.
    WarShip,
    /// Space station.
    SpaceStation,
}

impl UnitType {
    /// Equipment flag an option needs to be mountable on this unit.
    pub fn equipment_class(self) -> EquipmentClass {
        match self {
            UnitType::Mech | UnitType::LandAirMech => EquipmentClass::Mech,
            UnitType::Tank | UnitType::SupportVehicle => EquipmentClass::Tank,
            _ => EquipmentClass::Aero,
        }
    }

    /// Whether the unit mounts aerospace equipment.
    pub fn is_aerospace(self) -> bool {
        self.equipment_class() == EquipmentClass::Aero
    }

    /// Whether the unit is a land-air mech.
    pub fn is_land_air(self) -> bool {
        self == UnitType::LandAirMech
    }

    /// DropShips and JumpShip-class hulls assign bay doors individually.
    pub fn has_editable_bay_doors(self) -> bool {
        matches!(
            self,
            UnitType::DropShip | UnitType::JumpShip | UnitType::WarShip | UnitType::SpaceStation
        )
    }

    /// Movement mode a freshly created unit of this type starts with.
    pub fn default_movement(self) -> MovementMode {
        match self {
            UnitType::Mech | UnitType::LandAirMech => MovementMode::Biped,
            UnitType::Tank | UnitType::SupportVehicle => MovementMode::Tracked,
            UnitType::DropShip => MovementMode::Spheroid,
            UnitType::JumpShip | UnitType::WarShip | UnitType::SpaceStation => {
                MovementMode::Stationary
            }
            _ => MovementMode::Aerodyne,
        }
    }
}

/// How the unit moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    /// Two-legged mech.
    Biped,
    /// Four-legged mech.
    Quad,
    /// Three-legged mech.
    Tripod,
    /// Tracked vehicle.
    Tracked,
    /// Wheeled vehicle.
    Wheeled,
    /// Hovercraft.
    Hover,
    /// VTOL.
    Vtol,
    /// Wing-in-ground-effect craft.
    Wige,
    /// Surface naval vessel.
    Naval,
    /// Hydrofoil.
    Hydrofoil,
    /// Submarine.
    Submarine,
    /// Winged aerospace hull.
    Aerodyne,
    /// Spheroid aerospace hull.
    Spheroid,
    /// No movement at all.
    Stationary,
}

impl MovementMode {
    /// Aerial and hover movement cannot carry armor that locks up the chassis.
    pub fn locks_out_heavy_armor(self) -> bool {
        matches!(self, MovementMode::Hover | MovementMode::Vtol | MovementMode::Wige)
    }
}

/// Engine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Standard fusion.
    Fusion,
    /// Extra-light fusion.
    XlFusion,
    /// Light fusion.
    LightFusion,
    /// Compact fusion.
    CompactFusion,
    /// Extra-extra-light fusion.
    XxlFusion,
    /// Fission.
    Fission,
    /// Fuel cell.
    FuelCell,
    /// Internal combustion.
    Ice,
    /// No engine.
    None,
}

/// Engine facts the heat-sink rules depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// Engine type.
    pub kind: EngineKind,
    /// Engine rating.
    pub rating: u32,
}

impl EngineDescriptor {
    /// Engine of `kind` at `rating`.
    pub fn new(kind: EngineKind, rating: u32) -> Self {
        Self { kind, rating }
    }

    /// Heat sinks that come with the engine at no weight cost.
    pub fn free_heat_sinks(&self) -> u32 {
        match self.kind {
            EngineKind::Fusion
            | EngineKind::XlFusion
            | EngineKind::LightFusion
            | EngineKind::CompactFusion
            | EngineKind::XxlFusion => 10,
            EngineKind::Fission => 5,
            EngineKind::FuelCell => 1,
            EngineKind::Ice | EngineKind::None => 0,
        }
    }

    /// Heat sinks the engine can house without using critical slots.
    pub fn integral_heat_sink_capacity(&self, compact: bool) -> u32 {
        let capacity = self.rating / 25;
        if compact {
            capacity * 2
        } else {
            capacity
        }
    }
}

/// Stable identity of an installed bay; survives resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BayNumber(pub u32);

impl fmt::Display for BayNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One installed transport bay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportBayInstance {
    /// Stable identity of the bay.
    pub bay_number: BayNumber,
    /// Bay type catalog id.
    pub type_id: String,
    /// Installed capacity, in the type's units.
    pub capacity: f64,
    /// Doors assigned to the bay.
    pub doors: u32,
    /// Weight of the bay at its current capacity.
    pub tonnage: f64,
}

impl TransportBayInstance {
    /// Build a bay of `bay_type` with no doors assigned yet.
    pub fn new(bay_number: BayNumber, bay_type: &OptionDescriptor, capacity: f64) -> Self {
        let tonnage = bay_type
            .bay()
            .map(|traits| traits.weight_per_unit * capacity)
            .unwrap_or_default();
        Self {
            bay_number,
            type_id: bay_type.id.clone(),
            capacity,
            doors: 0,
            tonnage,
        }
    }
}

/// Installed bays keyed by their stable bay number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BayArena {
    bays: BTreeMap<BayNumber, TransportBayInstance>,
    /// Highest bay number ever stored; numbers are never handed out twice.
    #[serde(default)]
    last_issued: u32,
}

impl BayArena {
    /// Bay stored under `number`.
    pub fn get(&self, number: BayNumber) -> Option<&TransportBayInstance> {
        self.bays.get(&number)
    }

    /// Mutable bay stored under `number`.
    pub fn get_mut(&mut self, number: BayNumber) -> Option<&mut TransportBayInstance> {
        self.bays.get_mut(&number)
    }

    /// Bays in bay-number order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TransportBayInstance> {
        self.bays.values()
    }

    /// Number of installed bays.
    pub fn len(&self) -> usize {
        self.bays.len()
    }

    /// Whether no bays are installed.
    pub fn is_empty(&self) -> bool {
        self.bays.is_empty()
    }

    /// One past the highest bay number this arena has ever stored.
    pub fn next_number(&self) -> BayNumber {
        let highest = self.bays.keys().next_back().map_or(0, |number| number.0);
        BayNumber(highest.max(self.last_issued) + 1)
    }

    /// Insert or replace the bay stored under its own bay number.
    pub fn put(&mut self, bay: TransportBayInstance) -> Option<TransportBayInstance> {
        self.last_issued = self.last_issued.max(bay.bay_number.0);
        self.bays.insert(bay.bay_number, bay)
    }

    /// Take the bay out of the arena.
    pub fn remove(&mut self, number: BayNumber) -> Option<TransportBayInstance> {
        self.bays.remove(&number)
    }

    /// Doors assigned across all bays.
    pub fn total_doors(&self) -> u32 {
        self.bays.values().map(|bay| bay.doors).sum()
    }

    /// Weight of all installed bays.
    pub fn total_tonnage(&self) -> f64 {
        self.bays.values().map(|bay| bay.tonnage).sum()
    }
}

/// Armor type selection; patchwork means each location picks its own type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorSelection {
    /// A catalog armor type.
    Option(String),
    /// Patchwork armor.
    Patchwork,
}

impl ArmorSelection {
    /// Selection of catalog armor `id`.
    pub fn option(id: impl Into<String>) -> Self {
        ArmorSelection::Option(id.into())
    }

    /// Whether patchwork is selected.
    pub fn is_patchwork(&self) -> bool {
        matches!(self, ArmorSelection::Patchwork)
    }
}

impl fmt::Display for ArmorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmorSelection::Option(id) => f.write_str(id),
            ArmorSelection::Patchwork => f.write_str("patchwork"),
        }
    }
}

/// Armor part of a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorAllocationState {
    /// Selected armor type.
    pub selection: ArmorSelection,
    /// User-chosen tonnage. Kept untouched while patchwork is selected so it
    /// can be restored afterwards.
    pub tonnage: f64,
}

/// Aerospace heat-sink choice; aerospace rules do not split IS and Clan doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AeroHeatSink {
    /// Single heat sinks.
    Single,
    /// Double heat sinks of either tech base.
    Double,
}

impl AeroHeatSink {
    /// Position in the aerospace type list.
    pub fn index(self) -> usize {
        match self {
            AeroHeatSink::Single => 0,
            AeroHeatSink::Double => 1,
        }
    }
}

/// Heat-sink type key; its space depends on the presentation layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatSinkKey {
    /// Surface layout: a heat-sink catalog id.
    Equipment(String),
    /// Aerospace layout.
    Aero(AeroHeatSink),
}

impl fmt::Display for HeatSinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatSinkKey::Equipment(id) => f.write_str(id),
            HeatSinkKey::Aero(AeroHeatSink::Single) => f.write_str("single"),
            HeatSinkKey::Aero(AeroHeatSink::Double) => f.write_str("double"),
        }
    }
}

/// Heat-sink part of a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatSinkAllocationState {
    /// Selected heat-sink type.
    pub selected: HeatSinkKey,
    /// Heat sinks installed.
    pub total_count: u32,
    /// Heat sinks fixed to the chassis of an omni unit.
    pub base_chassis_count: u32,
}

/// A unit under construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDesign {
    /// Design name.
    pub name: String,
    /// Unit category.
    pub unit_type: UnitType,
    /// Movement mode.
    pub movement_mode: MovementMode,
    /// Total unit tonnage.
    pub tonnage: f64,
    /// Installed engine.
    pub engine: EngineDescriptor,
    /// Omni units fix part of their heat sinks to the chassis.
    pub is_omni: bool,
    /// Primitive units are limited to single heat sinks.
    pub is_primitive: bool,
    /// Industrial units are limited to industrial armor.
    pub is_industrial: bool,
    /// Weight of everything the managers do not allocate (structure, engine,
    /// weapons); feeds the weight ledger.
    pub fixed_tonnage: f64,
    /// Installed transport bays.
    pub bays: BayArena,
    /// Armor allocation.
    pub armor: ArmorAllocationState,
    /// Heat-sink allocation.
    pub heat_sinks: HeatSinkAllocationState,
    /// Armor tonnage per location, summed when patchwork is selected.
    pub location_armor: Vec<f64>,
}

impl UnitDesign {
    /// A blank design with standard armor and the engine's free heat sinks.
    pub fn new(name: impl Into<String>, unit_type: UnitType, tonnage: f64) -> Self {
        let engine = EngineDescriptor::new(EngineKind::Fusion, 0);
        let selected = if unit_type.is_aerospace() {
            HeatSinkKey::Aero(AeroHeatSink::Single)
        } else {
            HeatSinkKey::Equipment(SINGLE_HEAT_SINK.to_string())
        };
        Self {
            name: name.into(),
            unit_type,
            movement_mode: unit_type.default_movement(),
            tonnage,
            engine,
            is_omni: false,
            is_primitive: false,
            is_industrial: false,
            fixed_tonnage: 0.0,
            bays: BayArena::default(),
            armor: ArmorAllocationState {
                selection: ArmorSelection::option(STANDARD_ARMOR),
                tonnage: 0.0,
            },
            heat_sinks: HeatSinkAllocationState {
                selected,
                total_count: engine.free_heat_sinks(),
                base_chassis_count: 0,
            },
            location_armor: Vec::new(),
        }
    }

    /// Swap the engine, raising the heat-sink count to its free allotment.
    pub fn with_engine(mut self, engine: EngineDescriptor) -> Self {
        self.engine = engine;
        self.heat_sinks.total_count = self.heat_sinks.total_count.max(engine.free_heat_sinks());
        self
    }

    /// Override the unit type's default movement mode.
    pub fn with_movement(mut self, movement_mode: MovementMode) -> Self {
        self.movement_mode = movement_mode;
        self
    }

    /// Wrap the design in a shared handle for the host to own.
    pub fn shared(self) -> SharedDesign {
        Arc::new(RwLock::new(self))
    }

    /// Armor tonnage dictated by the per-location allocation.
    pub fn patchwork_armor_tonnage(&self) -> f64 {
        self.location_armor.iter().sum()
    }

    /// Armor tonnage currently counted against the design.
    pub fn armor_tonnage(&self) -> f64 {
        if self.armor.selection.is_patchwork() {
            self.patchwork_armor_tonnage()
        } else {
            self.armor.tonnage
        }
    }

    /// Heat sinks the engine provides for free.
    pub fn free_heat_sinks(&self) -> u32 {
        self.engine.free_heat_sinks()
    }

    /// How many heat sinks may be fixed to the chassis.
    ///
    /// Aerospace units may fix any of their installed heat sinks; other units
    /// are limited to what the engine houses.
    pub fn integral_heat_sink_capacity(&self, compact: bool) -> u32 {
        if self.unit_type.is_aerospace() {
            self.heat_sinks.total_count
        } else {
            self.engine.integral_heat_sink_capacity(compact)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalogs;

    #[test]
    fn engine_allotments() {
        let fusion = EngineDescriptor::new(EngineKind::Fusion, 300);
        assert_eq!(fusion.free_heat_sinks(), 10);
        assert_eq!(fusion.integral_heat_sink_capacity(false), 12);
        assert_eq!(fusion.integral_heat_sink_capacity(true), 24);
        assert_eq!(EngineDescriptor::new(EngineKind::Ice, 200).free_heat_sinks(), 0);
    }

    #[test]
    fn arena_numbers_and_replaces_in_place() {
        let catalogs = Catalogs::builtin();
        let cargo = catalogs.bays.get("cargo").expect("cargo bay");
        let mut arena = BayArena::default();
        assert_eq!(arena.next_number(), BayNumber(1));

        arena.put(TransportBayInstance::new(BayNumber(1), cargo, 10.0));
        arena.put(TransportBayInstance::new(BayNumber(4), cargo, 2.0));
        assert_eq!(arena.next_number(), BayNumber(5));
        assert_eq!(arena.total_tonnage(), 12.0);

        let replaced = arena.put(TransportBayInstance::new(BayNumber(1), cargo, 3.5));
        assert!(replaced.is_some());
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(BayNumber(1)).map(|bay| bay.capacity), Some(3.5));

        // Removing the highest bay does not free its number.
        arena.remove(BayNumber(4));
        assert_eq!(arena.next_number(), BayNumber(5));
    }

    #[test]
    fn patchwork_tonnage_comes_from_locations() {
        let mut design = UnitDesign::new("Test", UnitType::Tank, 50.0);
        design.armor.tonnage = 6.0;
        design.location_armor = vec![1.0, 1.5, 2.0];
        assert_eq!(design.armor_tonnage(), 6.0);
        design.armor.selection = ArmorSelection::Patchwork;
        assert_eq!(design.armor_tonnage(), 4.5);
    }
}
