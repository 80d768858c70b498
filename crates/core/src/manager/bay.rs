use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{
    catalog::{BayTraits, Catalog, OptionDescriptor, OptionFamily},
    design::{BayNumber, SharedDesign, TransportBayInstance, UnitDesign},
    error::{EngineError, Result},
    legality::{legal_options, UnitProfile},
    notify::{ChangeNotifier, ObserverId},
};

use super::{EditBounds, SharedRules, SharedTech, Subject};

/// Personnel carried by a bay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// Known head count.
    Count(u32),
    /// Variable-capacity bays whose occupants depend on what is loaded.
    Indeterminate,
}

impl Occupancy {
    /// Head count, if known.
    pub fn count(self) -> Option<u32> {
        match self {
            Occupancy::Count(count) => Some(count),
            Occupancy::Indeterminate => None,
        }
    }
}

impl fmt::Display for Occupancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occupancy::Count(count) => write!(f, "{count}"),
            Occupancy::Indeterminate => f.write_str("*"),
        }
    }
}

/// One row of the installed or available bay table.
///
/// Available rows describe catalog types, so they carry no bay number, door
/// count or tonnage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BayRow {
    /// Installed bay number; `None` for catalog rows.
    pub bay: Option<BayNumber>,
    /// Bay type catalog id.
    pub type_id: String,
    /// Name shown in the table.
    pub display_name: String,
    /// Capacity.
    pub size: f64,
    /// Assigned doors.
    pub doors: Option<u32>,
    /// Bay weight.
    pub tonnage: Option<f64>,
    /// Personnel carried.
    pub occupants: Occupancy,
}

/// Change reported by [`BayAllocationManager`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BayEvent {
    /// A bay was installed.
    Added {
        /// Number of the new bay.
        bay: BayNumber,
        /// Its bay type.
        type_id: String,
    },
    /// A bay was removed.
    Removed {
        /// Number the bay had.
        bay: BayNumber,
        /// Doors free afterwards.
        door_budget: u32,
    },
    /// A bay was resized.
    Resized {
        /// Resized bay.
        bay: BayNumber,
        /// New capacity.
        capacity: f64,
        /// New bay weight.
        tonnage: f64,
    },
    /// A bay's door count changed.
    DoorsChanged {
        /// Affected bay.
        bay: BayNumber,
        /// New door count.
        doors: u32,
        /// Doors free afterwards.
        door_budget: u32,
    },
}

impl fmt::Display for BayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BayEvent::Added { bay, type_id } => write!(f, "bay {bay} added ({type_id})"),
            BayEvent::Removed { bay, door_budget } => {
                write!(f, "bay {bay} removed, {door_budget} doors free")
            }
            BayEvent::Resized {
                bay,
                capacity,
                tonnage,
            } => write!(f, "bay {bay} resized to {capacity} ({tonnage} t)"),
            BayEvent::DoorsChanged {
                bay,
                doors,
                door_budget,
            } => write!(f, "bay {bay} has {doors} doors, {door_budget} free"),
        }
    }
}

/// Installs, removes and edits transport bays.
pub struct BayAllocationManager {
    subject: Subject,
    catalog: Arc<Catalog>,
    rules: SharedRules,
    /// Bay types offered for installation, as of the last refresh.
    offered: Vec<String>,
    notifier: ChangeNotifier<BayEvent>,
}

impl BayAllocationManager {
    /// Manager for `design`, refreshed against `tech`.
    pub fn new(
        design: &SharedDesign,
        tech: &SharedTech,
        catalog: Arc<Catalog>,
        rules: SharedRules,
    ) -> Result<Self> {
        let mut manager = Self {
            subject: Subject::new(design, tech),
            catalog,
            rules,
            offered: Vec::new(),
            notifier: ChangeNotifier::new(),
        };
        manager.refresh()?;
        Ok(manager)
    }

    /// Point the manager at another design and refresh against it.
    pub fn set_design(&mut self, design: &SharedDesign) -> Result<()> {
        self.subject.retarget(design);
        self.refresh()
    }

    /// Recompute the offered bay types and pull door counts back under the
    /// hull maximum. Installed bays are never removed.
    pub fn refresh(&mut self) -> Result<()> {
        let previous = self.notifier.suppress();
        let result = self.reload();
        self.notifier.resume(previous);
        result
    }

    fn reload(&mut self) -> Result<()> {
        let design = self.subject.design()?;
        let tech = self.subject.tech()?;
        let profile = UnitProfile::of(&design.read());
        self.offered = legal_options(&self.catalog, &tech, &profile)
            .into_iter()
            .map(|option| option.id.clone())
            .collect();

        let mut unit = design.write();
        let mut excess = unit
            .bays
            .total_doors()
            .saturating_sub(self.rules.max_bay_doors(&unit));
        let mut trimmed = Vec::new();
        if excess > 0 {
            // Later bays give up doors first; bays keep their minimum unless
            // nothing else is left to trim.
            let floors = unit
                .bays
                .iter()
                .rev()
                .map(|bay| -> Result<(BayNumber, u32)> {
                    let (_, traits) = self.bay_type(&bay.type_id)?;
                    Ok((bay.bay_number, traits.min_doors()))
                })
                .collect::<Result<Vec<_>>>()?;
            for below_minimum in [false, true] {
                for &(number, min_doors) in &floors {
                    let Some(bay) = unit.bays.get_mut(number) else {
                        continue;
                    };
                    let floor = if below_minimum { 0 } else { min_doors };
                    let cut = bay.doors.saturating_sub(floor).min(excess);
                    if cut == 0 {
                        continue;
                    }
                    bay.doors -= cut;
                    excess -= cut;
                    if bay.doors < min_doors {
                        let doors = bay.doors;
                        warn!(%number, doors, min_doors, "bay left below its minimum doors");
                    }
                    trimmed.push((number, bay.doors));
                }
            }
        }
        drop(unit);

        for (bay, doors) in trimmed {
            self.notifier.notify(BayEvent::DoorsChanged {
                bay,
                doors,
                door_budget: 0,
            });
        }
        debug!(offered = self.offered.len(), "bay types refreshed");
        Ok(())
    }

    /// Register an observer for bay changes.
    pub fn subscribe(&mut self, observer: impl FnMut(&BayEvent) + 'static) -> ObserverId {
        self.notifier.subscribe(observer)
    }

    /// Drop an observer; false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Doors the hull can have in total.
    pub fn max_doors(&self) -> Result<u32> {
        let design = self.subject.design()?;
        let max = self.rules.max_bay_doors(&design.read());
        Ok(max)
    }

    /// Doors still available to assign.
    pub fn door_budget(&self) -> Result<u32> {
        let design = self.subject.design()?;
        let budget = self.budget_of(&design.read());
        Ok(budget)
    }

    /// Whether this hull assigns doors per bay.
    pub fn doors_editable(&self) -> Result<bool> {
        let design = self.subject.design()?;
        let editable = design.read().unit_type.has_editable_bay_doors();
        Ok(editable)
    }

    /// Install a bay of `type_id` at its smallest size.
    ///
    /// Returns `None` without touching the design when the type is not
    /// offered or the door budget cannot cover the bay's minimum doors.
    pub fn add_bay(&mut self, type_id: &str) -> Result<Option<BayNumber>> {
        let (descriptor, traits) = self.bay_type(type_id)?;
        if !self.offered.iter().any(|id| id == type_id) {
            warn!(type_id, "bay type is not offered for this unit");
            return Ok(None);
        }

        let design = self.subject.design()?;
        let mut unit = design.write();
        let min_doors = traits.min_doors();
        if self.budget_of(&unit) < min_doors {
            debug!(type_id, min_doors, "not enough door budget for a new bay");
            return Ok(None);
        }

        let number = unit.bays.next_number();
        let mut bay = TransportBayInstance::new(number, descriptor, traits.size_step());
        bay.doors = min_doors;
        unit.bays.put(bay);
        drop(unit);

        debug!(%number, type_id, "bay added");
        self.notifier.notify(BayEvent::Added {
            bay: number,
            type_id: type_id.to_string(),
        });
        Ok(Some(number))
    }

    /// Remove bay `number`; false if it is not installed.
    pub fn remove_bay(&mut self, number: BayNumber) -> Result<bool> {
        let design = self.subject.design()?;
        let mut unit = design.write();
        if unit.bays.remove(number).is_none() {
            warn!(%number, "no such bay");
            return Ok(false);
        }
        let door_budget = self.budget_of(&unit);
        drop(unit);

        debug!(%number, door_budget, "bay removed");
        self.notifier.notify(BayEvent::Removed {
            bay: number,
            door_budget,
        });
        Ok(true)
    }

    /// Replace the bay with one of `capacity` units, snapped to the type's
    /// step. The bay number and door count carry over.
    pub fn resize_bay(&mut self, number: BayNumber, capacity: f64) -> Result<bool> {
        let design = self.subject.design()?;
        let mut unit = design.write();
        let Some(current) = unit.bays.get(number) else {
            warn!(%number, "no such bay");
            return Ok(false);
        };
        let (descriptor, traits) = self.bay_type(&current.type_id)?;
        let Some(capacity) = size_bounds(traits).clamp(capacity) else {
            warn!(%number, capacity, "bay size must be a finite number");
            return Ok(false);
        };
        if super::same_value(capacity, current.capacity) {
            trace!(%number, capacity, "bay size unchanged");
            return Ok(false);
        }

        let mut replacement = TransportBayInstance::new(number, descriptor, capacity);
        replacement.doors = current.doors;
        let tonnage = replacement.tonnage;
        unit.bays.put(replacement);
        drop(unit);

        debug!(%number, capacity, tonnage, "bay resized");
        self.notifier.notify(BayEvent::Resized {
            bay: number,
            capacity,
            tonnage,
        });
        Ok(true)
    }

    /// Clamp `requested` into the bay's door range and apply it. Hulls that
    /// do not assign doors per bay ignore the request.
    pub fn set_doors(&mut self, number: BayNumber, requested: u32) -> Result<bool> {
        let design = self.subject.design()?;
        let mut unit = design.write();
        if !unit.unit_type.has_editable_bay_doors() {
            trace!(%number, "bay doors are fixed on this hull");
            return Ok(false);
        }
        let budget = self.budget_of(&unit);
        let Some(current) = unit.bays.get(number) else {
            warn!(%number, "no such bay");
            return Ok(false);
        };
        let (_, traits) = self.bay_type(&current.type_id)?;
        let (min, max) = (traits.min_doors(), budget + current.doors);
        if max < min {
            warn!(%number, min, max, "bay door range is empty");
            return Ok(false);
        }
        let doors = requested.clamp(min, max);
        if doors == current.doors {
            trace!(%number, requested, doors, "bay doors unchanged");
            return Ok(false);
        }

        let door_budget = max - doors;
        if let Some(bay) = unit.bays.get_mut(number) {
            bay.doors = doors;
        }
        drop(unit);

        debug!(%number, doors, door_budget, "bay doors changed");
        self.notifier.notify(BayEvent::DoorsChanged {
            bay: number,
            doors,
            door_budget,
        });
        Ok(true)
    }

    /// Personnel the bay carries, or `None` if no such bay is installed.
    pub fn occupant_count(&self, number: BayNumber) -> Result<Option<Occupancy>> {
        let design = self.subject.design()?;
        let unit = design.read();
        let Some(bay) = unit.bays.get(number) else {
            return Ok(None);
        };
        let (_, traits) = self.bay_type(&bay.type_id)?;
        Ok(Some(occupancy(traits, bay.capacity)))
    }

    /// Personnel across all bays with a known count. Variable-capacity bays
    /// are left out rather than counted as zero.
    pub fn known_occupants(&self) -> Result<u32> {
        Ok(self
            .installed_rows()?
            .iter()
            .filter_map(|row| row.occupants.count())
            .fold(0, u32::saturating_add))
    }

    /// Door range of bay `number`, if installed.
    pub fn door_bounds(&self, number: BayNumber) -> Result<Option<EditBounds>> {
        let design = self.subject.design()?;
        let unit = design.read();
        let Some(bay) = unit.bays.get(number) else {
            return Ok(None);
        };
        let (_, traits) = self.bay_type(&bay.type_id)?;
        let max = self.budget_of(&unit) + bay.doors;
        Ok(Some(EditBounds::counts(traits.min_doors(), max)))
    }

    /// Size range of bay `number`, if installed.
    pub fn size_bounds(&self, number: BayNumber) -> Result<Option<EditBounds>> {
        let design = self.subject.design()?;
        let unit = design.read();
        let Some(bay) = unit.bays.get(number) else {
            return Ok(None);
        };
        let (_, traits) = self.bay_type(&bay.type_id)?;
        Ok(Some(size_bounds(traits)))
    }

    /// Installed bays in bay-number order.
    pub fn installed_rows(&self) -> Result<Vec<BayRow>> {
        let design = self.subject.design()?;
        let unit = design.read();
        unit.bays
            .iter()
            .map(|bay| {
                let (descriptor, traits) = self.bay_type(&bay.type_id)?;
                Ok(BayRow {
                    bay: Some(bay.bay_number),
                    type_id: bay.type_id.clone(),
                    display_name: descriptor.display_name.clone(),
                    size: bay.capacity,
                    doors: Some(bay.doors),
                    tonnage: Some(bay.tonnage),
                    occupants: occupancy(traits, bay.capacity),
                })
            })
            .collect()
    }

    /// Bay types that may be installed, at their default size.
    pub fn available_rows(&self) -> Result<Vec<BayRow>> {
        self.offered
            .iter()
            .map(|id| {
                let (descriptor, traits) = self.bay_type(id)?;
                let size = traits.size_step();
                Ok(BayRow {
                    bay: None,
                    type_id: id.clone(),
                    display_name: descriptor.display_name.clone(),
                    size,
                    doors: None,
                    tonnage: None,
                    occupants: occupancy(traits, size),
                })
            })
            .collect()
    }

    fn budget_of(&self, unit: &UnitDesign) -> u32 {
        self.rules
            .max_bay_doors(unit)
            .saturating_sub(unit.bays.total_doors())
    }

    fn bay_type(&self, id: &str) -> Result<(&OptionDescriptor, &BayTraits)> {
        let descriptor = self.catalog.require(id)?;
        let traits = descriptor.bay().ok_or_else(|| EngineError::MissingDescriptor {
            family: OptionFamily::Bay,
            id: id.to_string(),
        })?;
        Ok((descriptor, traits))
    }
}

fn size_bounds(traits: &BayTraits) -> EditBounds {
    let step = traits.size_step();
    EditBounds::new(step, f64::MAX, step)
}

fn occupancy(traits: &BayTraits, capacity: f64) -> Occupancy {
    if traits.variable_capacity {
        Occupancy::Indeterminate
    } else {
        // Float to int casts saturate; keep the product saturating too.
        Occupancy::Count(traits.personnel_per_unit.saturating_mul(capacity.floor() as u32))
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::RwLock;

    use super::*;
    use crate::{
        catalog::Catalogs,
        design::UnitType,
        manager::testing::{recorder, FixedRules},
        tech::TechContext,
    };

    fn fixture(
        unit_type: UnitType,
        doors: u32,
    ) -> anyhow::Result<(SharedDesign, SharedTech, BayAllocationManager)> {
        let design = UnitDesign::new("Test", unit_type, 100.0).shared();
        let tech: SharedTech = Arc::new(RwLock::new(TechContext::default()));
        let rules = Arc::new(FixedRules {
            doors,
            ..FixedRules::default()
        });
        let manager =
            BayAllocationManager::new(&design, &tech, Catalogs::builtin().bays, rules)?;
        Ok((design, tech, manager))
    }

    #[test]
    fn door_budget_scenario() -> anyhow::Result<()> {
        let (design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        let mut numbers = Vec::new();
        for _ in 0..3 {
            numbers.extend(manager.add_bay("fighter")?);
        }
        assert_eq!(numbers.len(), 3);
        assert_eq!(manager.door_budget()?, 3);

        assert!(manager.set_doors(numbers[0], 5)?);
        let doors = design.read().bays.get(numbers[0]).map(|bay| bay.doors);
        assert_eq!(doors, Some(4));
        assert_eq!(manager.door_budget()?, 0);
        assert!(design.read().bays.total_doors() <= 6);

        // A non-cargo bay cannot drop below one door.
        assert!(!manager.set_doors(numbers[1], 0)?);
        assert_eq!(manager.door_bounds(numbers[1])?, Some(EditBounds::counts(1, 1)));
        Ok(())
    }

    #[test]
    fn add_bay_guards_door_budget() -> anyhow::Result<()> {
        let (_design, _tech, mut manager) = fixture(UnitType::DropShip, 1)?;
        assert!(manager.add_bay("fighter")?.is_some());
        assert_eq!(manager.add_bay("fighter")?, None);
        // Cargo needs no doors.
        let cargo = manager.add_bay("cargo")?;
        assert!(cargo.is_some());
        assert_eq!(manager.installed_rows()?.len(), 2);
        Ok(())
    }

    #[test]
    fn unknown_and_unoffered_types() -> anyhow::Result<()> {
        let (_design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        assert!(matches!(
            manager.add_bay("hangar"),
            Err(EngineError::MissingDescriptor { .. })
        ));
        // Clan-only protomech bays are not offered to an Inner Sphere design.
        assert_eq!(manager.add_bay("protomech")?, None);
        Ok(())
    }

    #[test]
    fn resize_keeps_identity_and_doors() -> anyhow::Result<()> {
        let (design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        let (events, observer) = recorder::<BayEvent>();
        manager.subscribe(observer);

        let cargo = manager.add_bay("cargo")?.expect("cargo bay");
        assert!(manager.set_doors(cargo, 2)?);
        assert!(manager.resize_bay(cargo, 12.3)?);
        let bay = design.read().bays.get(cargo).cloned().expect("bay survives");
        assert_eq!(bay.bay_number, cargo);
        assert_eq!(bay.doors, 2);
        assert_eq!(bay.capacity, 12.5);
        assert_eq!(bay.tonnage, 12.5);

        // Below one step clamps to one step.
        assert!(manager.resize_bay(cargo, 0.0)?);
        assert!(!manager.resize_bay(cargo, 0.2)?);
        assert_eq!(events.borrow().len(), 4);
        Ok(())
    }

    #[test]
    fn non_finite_size_is_ignored() -> anyhow::Result<()> {
        let (design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        let cargo = manager.add_bay("cargo")?.expect("cargo bay");
        manager.resize_bay(cargo, 10.0)?;
        let (events, observer) = recorder::<BayEvent>();
        manager.subscribe(observer);

        assert!(!manager.resize_bay(cargo, f64::NAN)?);
        assert!(!manager.resize_bay(cargo, f64::NEG_INFINITY)?);
        let capacity = design.read().bays.get(cargo).map(|bay| bay.capacity);
        assert_eq!(capacity, Some(10.0));
        assert!(events.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn huge_bays_saturate_occupants() -> anyhow::Result<()> {
        let (_design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        let first = manager.add_bay("small_craft")?.expect("bay");
        let second = manager.add_bay("small_craft")?.expect("bay");
        assert!(manager.resize_bay(first, 1e10)?);
        assert!(manager.resize_bay(second, 1e10)?);

        assert_eq!(manager.occupant_count(first)?, Some(Occupancy::Count(u32::MAX)));
        assert_eq!(manager.known_occupants()?, u32::MAX);
        assert_eq!(manager.installed_rows()?.len(), 2);
        Ok(())
    }

    #[test]
    fn doors_fixed_outside_large_hulls() -> anyhow::Result<()> {
        let (_design, _tech, mut manager) = fixture(UnitType::Tank, 4)?;
        let bay = manager.add_bay("infantry_foot")?.expect("infantry bay");
        assert!(!manager.doors_editable()?);
        assert!(!manager.set_doors(bay, 3)?);
        assert_eq!(manager.occupant_count(bay)?, Some(Occupancy::Indeterminate));
        assert_eq!(manager.known_occupants()?, 0);
        Ok(())
    }

    #[test]
    fn removing_frees_doors() -> anyhow::Result<()> {
        let (_design, _tech, mut manager) = fixture(UnitType::DropShip, 2)?;
        let first = manager.add_bay("small_craft")?.expect("bay");
        manager.add_bay("small_craft")?;
        assert_eq!(manager.door_budget()?, 0);
        assert_eq!(manager.occupant_count(first)?, Some(Occupancy::Count(5)));
        assert_eq!(manager.known_occupants()?, 10);

        assert!(manager.remove_bay(first)?);
        assert!(!manager.remove_bay(first)?);
        assert_eq!(manager.door_budget()?, 1);

        let last = manager.installed_rows()?.last().and_then(|row| row.bay).expect("bay");
        assert!(manager.remove_bay(last)?);
        let replacement = manager.add_bay("small_craft")?.expect("bay");
        assert!(replacement > last);
        Ok(())
    }

    #[test]
    fn refresh_trims_doors_without_notifying() -> anyhow::Result<()> {
        let (design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        let bay = manager.add_bay("fighter")?.expect("bay");
        manager.set_doors(bay, 6)?;

        let (events, observer) = recorder::<BayEvent>();
        manager.subscribe(observer);
        let smaller = UnitDesign {
            bays: design.read().bays.clone(),
            ..UnitDesign::new("Smaller", UnitType::DropShip, 100.0)
        }
        .shared();
        manager.rules = Arc::new(FixedRules {
            doors: 2,
            ..FixedRules::default()
        });
        manager.set_design(&smaller)?;

        assert_eq!(smaller.read().bays.total_doors(), 2);
        assert!(events.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn refresh_trims_surplus_doors_before_minimums() -> anyhow::Result<()> {
        let (design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        let first = manager.add_bay("fighter")?.expect("bay");
        let second = manager.add_bay("fighter")?.expect("bay");
        manager.set_doors(first, 4)?;
        let doors_of = |number| design.read().bays.get(number).map(|bay| bay.doors);

        manager.rules = Arc::new(FixedRules {
            doors: 3,
            ..FixedRules::default()
        });
        manager.refresh()?;
        assert_eq!(doors_of(first), Some(2));
        assert_eq!(doors_of(second), Some(1));

        manager.rules = Arc::new(FixedRules {
            doors: 1,
            ..FixedRules::default()
        });
        manager.refresh()?;
        assert_eq!(doors_of(first), Some(1));
        assert_eq!(doors_of(second), Some(0));
        Ok(())
    }

    #[test]
    fn dropped_design_is_reported() -> anyhow::Result<()> {
        let (design, _tech, mut manager) = fixture(UnitType::DropShip, 6)?;
        drop(design);
        assert!(matches!(
            manager.add_bay("fighter"),
            Err(EngineError::DesignDetached)
        ));
        Ok(())
    }
}
