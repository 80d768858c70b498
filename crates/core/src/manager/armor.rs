use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{
    catalog::Catalog,
    design::{ArmorSelection, SharedDesign, UnitDesign},
    error::Result,
    legality::{armor_choices, UnitProfile},
    notify::{ChangeNotifier, ObserverId},
    rules::floor_half_ton,
    tech::{TechConstant, TechContext, TechManager, PATCHWORK_ARMOR},
};

use super::{same_value, EditBounds, SharedRules, SharedTech, Subject};

/// Armor tonnage granularity.
const TONNAGE_STEP: f64 = 0.5;

/// Points of standard armor per ton.
const POINTS_PER_TON: f64 = 16.0;

/// One entry of the armor type list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmorRow {
    /// Selection this row applies.
    pub selection: ArmorSelection,
    /// Name shown in the list.
    pub display_name: String,
}

/// Change reported by [`ArmorAllocationManager`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ArmorEvent {
    /// A new armor type was selected.
    TypeChanged {
        /// The selection now in effect.
        selection: ArmorSelection,
        /// Tech constant recorded for it.
        tech_constant: TechConstant,
    },
    /// The armor tonnage changed.
    TonnageChanged {
        /// New tonnage.
        tonnage: f64,
        /// Tonnage range at the time of the change.
        bounds: EditBounds,
    },
}

impl fmt::Display for ArmorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmorEvent::TypeChanged {
                selection,
                tech_constant,
            } => write!(f, "armor set to {selection} ({tech_constant})"),
            ArmorEvent::TonnageChanged { tonnage, bounds } => {
                write!(f, "armor tonnage {tonnage} of {}", bounds.max)
            }
        }
    }
}

/// Selects the armor type and sizes the armor allocation.
pub struct ArmorAllocationManager {
    subject: Subject,
    catalog: Arc<Catalog>,
    rules: SharedRules,
    offered: Vec<ArmorRow>,
    notifier: ChangeNotifier<ArmorEvent>,
}

impl ArmorAllocationManager {
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

    /// Recompute the armor type list and pull the stored tonnage under the
    /// current maximum. The selected type is left alone even if it is no
    /// longer offered.
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
        self.offered = armor_choices(&self.catalog, &tech, &profile)
            .into_iter()
            .map(|choice| ArmorRow {
                selection: choice.selection(),
                display_name: choice.display_name(&tech),
            })
            .collect();

        let patchwork = design.read().armor.selection.is_patchwork();
        if !patchwork {
            let tonnage = design.read().armor.tonnage;
            self.apply_tonnage(&design, tonnage)?;
        }
        debug!(offered = self.offered.len(), "armor types refreshed");
        Ok(())
    }

    /// Register an observer for armor changes.
    pub fn subscribe(&mut self, observer: impl FnMut(&ArmorEvent) + 'static) -> ObserverId {
        self.notifier.subscribe(observer)
    }

    /// Drop an observer; false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Selected armor type.
    pub fn selection(&self) -> Result<ArmorSelection> {
        let design = self.subject.design()?;
        let selection = design.read().armor.selection.clone();
        Ok(selection)
    }

    /// Armor tonnage counted against the design; the per-location sum while
    /// patchwork is selected.
    pub fn tonnage(&self) -> Result<f64> {
        let design = self.subject.design()?;
        let tonnage = design.read().armor_tonnage();
        Ok(tonnage)
    }

    /// False while patchwork is selected; tonnage edits and the maximize and
    /// use-remaining actions are then ignored.
    pub fn tonnage_editable(&self) -> Result<bool> {
        Ok(!self.selection()?.is_patchwork())
    }

    /// Tonnage range the armor may be set to.
    pub fn tonnage_bounds(&self) -> Result<EditBounds> {
        let design = self.subject.design()?;
        let bounds = self.bounds_of(&design.read());
        Ok(bounds)
    }

    /// Armor types that may be selected, patchwork last when it is legal.
    pub fn available_rows(&self) -> &[ArmorRow] {
        &self.offered
    }

    /// Switch the armor type.
    ///
    /// Leaving patchwork restores the recorded tonnage, capped at the
    /// current maximum.
    pub fn select_armor(&mut self, selection: ArmorSelection) -> Result<bool> {
        if let ArmorSelection::Option(id) = &selection {
            self.catalog.require(id)?;
        }
        if !self.offered.iter().any(|row| row.selection == selection) {
            warn!(%selection, "armor type is not offered for this unit");
            return Ok(false);
        }

        let design = self.subject.design()?;
        let mut unit = design.write();
        if unit.armor.selection == selection {
            trace!(%selection, "armor type unchanged");
            return Ok(false);
        }
        let leaving_patchwork = unit.armor.selection.is_patchwork();
        unit.armor.selection = selection.clone();
        drop(unit);

        let tech_constant = self.tech_constant_of(&selection)?;
        debug!(%selection, %tech_constant, "armor type changed");
        self.notifier.notify(ArmorEvent::TypeChanged {
            selection,
            tech_constant,
        });

        if leaving_patchwork {
            let recorded = design.read().armor.tonnage;
            self.apply_tonnage(&design, recorded)?;
        }
        Ok(true)
    }

    /// Set the armor tonnage, clamped to `[0, max]` on the half-ton grid.
    pub fn set_tonnage(&mut self, tonnage: f64) -> Result<bool> {
        let design = self.subject.design()?;
        if design.read().armor.selection.is_patchwork() {
            trace!(tonnage, "armor tonnage is fixed by patchwork locations");
            return Ok(false);
        }
        self.apply_tonnage(&design, tonnage)
    }

    /// Set the tonnage to the maximum the design allows.
    pub fn maximize_armor(&mut self) -> Result<bool> {
        let max = self.tonnage_bounds()?.max;
        self.set_tonnage(max)
    }

    /// Grow or shrink the armor to absorb whatever tonnage the design has
    /// left unallocated.
    pub fn use_remaining_tonnage(&mut self) -> Result<bool> {
        let design = self.subject.design()?;
        let target = {
            let unit = design.read();
            let remaining = self.rules.remaining_weight_budget(&unit);
            floor_half_ton(unit.armor.tonnage + remaining)
        };
        self.set_tonnage(target)
    }

    /// Armor points the allocated tonnage buys. `None` under patchwork,
    /// where each location counts its own points.
    pub fn armor_points(&self) -> Result<Option<u32>> {
        let design = self.subject.design()?;
        let unit = design.read();
        let ArmorSelection::Option(id) = &unit.armor.selection else {
            return Ok(None);
        };
        let multiplier = self
            .catalog
            .require(id)?
            .armor()
            .map_or(1.0, |armor| armor.points_multiplier);
        Ok(Some((unit.armor.tonnage * POINTS_PER_TON * multiplier).floor() as u32))
    }

    /// Tech constant recorded for the current selection.
    pub fn resolved_tech_constant(&self) -> Result<TechConstant> {
        let selection = self.selection()?;
        self.tech_constant_of(&selection)
    }

    fn tech_constant_of(&self, selection: &ArmorSelection) -> Result<TechConstant> {
        let tech: TechContext = self.subject.tech()?;
        match selection {
            ArmorSelection::Option(id) => {
                let option = self.catalog.require(id)?;
                Ok(option.tech.tech_constant(tech.year, option.is_clan()))
            }
            ArmorSelection::Patchwork => {
                Ok(PATCHWORK_ARMOR.tech_constant(tech.year, tech.is_clan()))
            }
        }
    }

    fn bounds_of(&self, unit: &UnitDesign) -> EditBounds {
        let max = self.rules.max_armor_tonnage(unit).max(0.0);
        EditBounds::new(0.0, max, TONNAGE_STEP)
    }

    fn apply_tonnage(&mut self, design: &SharedDesign, requested: f64) -> Result<bool> {
        let mut unit = design.write();
        let bounds = self.bounds_of(&unit);
        let Some(tonnage) = bounds.clamp(requested) else {
            warn!(requested, "armor tonnage must be a finite number");
            return Ok(false);
        };
        if same_value(tonnage, unit.armor.tonnage) {
            trace!(requested, tonnage, "armor tonnage unchanged");
            return Ok(false);
        }
        unit.armor.tonnage = tonnage;
        drop(unit);

        debug!(tonnage, max = bounds.max, "armor tonnage changed");
        self.notifier.notify(ArmorEvent::TonnageChanged { tonnage, bounds });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::RwLock;

    use super::*;
    use crate::{
        catalog::Catalogs,
        design::UnitType,
        error::EngineError,
        manager::testing::{recorder, FixedRules},
        tech::{TechBase, TechLevel},
    };

    fn advanced() -> TechContext {
        TechContext::new(TechLevel::Advanced, TechBase::InnerSphere, 3067)
    }

    fn fixture(
        design: UnitDesign,
        tech: TechContext,
        rules: FixedRules,
    ) -> anyhow::Result<(SharedDesign, SharedTech, ArmorAllocationManager)> {
        let design = design.shared();
        let tech: SharedTech = Arc::new(RwLock::new(tech));
        let manager = ArmorAllocationManager::new(
            &design,
            &tech,
            Catalogs::builtin().armor,
            Arc::new(rules),
        )?;
        Ok((design, tech, manager))
    }

    #[test]
    fn set_tonnage_is_idempotent() -> anyhow::Result<()> {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        let (design, _tech, mut manager) =
            fixture(tank, TechContext::default(), FixedRules::default())?;
        let (events, observer) = recorder::<ArmorEvent>();
        manager.subscribe(observer);

        assert!(manager.set_tonnage(6.3)?);
        assert!(!manager.set_tonnage(6.3)?);
        assert_eq!(design.read().armor.tonnage, 6.5);
        assert_eq!(events.borrow().len(), 1);

        assert!(manager.set_tonnage(42.0)?);
        assert!(manager.set_tonnage(-1.0)?);
        assert_eq!(manager.tonnage()?, 0.0);
        Ok(())
    }

    #[test]
    fn patchwork_round_trip_restores_capped_tonnage() -> anyhow::Result<()> {
        let mut tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        tank.location_armor = vec![1.0, 2.0, 0.5];
        let (design, _tech, mut manager) = fixture(tank, advanced(), FixedRules::default())?;
        manager.set_tonnage(8.0)?;

        assert!(manager.select_armor(ArmorSelection::Patchwork)?);
        assert!(!manager.tonnage_editable()?);
        assert_eq!(manager.tonnage()?, 3.5);
        assert!(!manager.set_tonnage(2.0)?);
        assert!(!manager.maximize_armor()?);

        manager.rules = Arc::new(FixedRules {
            armor: 6.0,
            ..FixedRules::default()
        });
        let (events, observer) = recorder::<ArmorEvent>();
        manager.subscribe(observer);
        assert!(manager.select_armor(ArmorSelection::option("standard"))?);
        assert_eq!(design.read().armor.tonnage, 6.0);
        let events = events.borrow();
        assert!(matches!(events[0], ArmorEvent::TypeChanged { .. }));
        assert!(matches!(events[1], ArmorEvent::TonnageChanged { tonnage, .. } if tonnage == 6.0));
        assert_eq!(events.len(), 2);
        Ok(())
    }

    #[test]
    fn patchwork_needs_advanced_rules() -> anyhow::Result<()> {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        let (design, _tech, mut manager) =
            fixture(tank, TechContext::default(), FixedRules::default())?;
        assert!(!manager.select_armor(ArmorSelection::Patchwork)?);
        assert!(!design.read().armor.selection.is_patchwork());
        assert!(matches!(
            manager.select_armor(ArmorSelection::option("unobtanium")),
            Err(EngineError::MissingDescriptor { .. })
        ));
        Ok(())
    }

    #[test]
    fn helper_actions() -> anyhow::Result<()> {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        let rules = FixedRules {
            remaining: 3.2,
            ..FixedRules::default()
        };
        let (_design, _tech, mut manager) = fixture(tank, TechContext::default(), rules)?;
        manager.set_tonnage(4.0)?;
        assert!(manager.use_remaining_tonnage()?);
        assert_eq!(manager.tonnage()?, 7.0);
        assert!(manager.maximize_armor()?);
        assert_eq!(manager.tonnage()?, 10.0);
        assert_eq!(manager.armor_points()?, Some(160));
        Ok(())
    }

    #[test]
    fn tech_constants() -> anyhow::Result<()> {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        let (_design, _tech, mut manager) = fixture(tank, advanced(), FixedRules::default())?;
        let standard = manager.resolved_tech_constant()?;
        assert_eq!(standard.level, TechLevel::Introductory);
        assert!(!standard.clan);

        manager.select_armor(ArmorSelection::Patchwork)?;
        let patchwork = manager.resolved_tech_constant()?;
        assert_eq!(patchwork.level, TechLevel::Advanced);
        assert!(!patchwork.clan);
        Ok(())
    }

    #[test]
    fn non_finite_tonnage_is_ignored() -> anyhow::Result<()> {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        let (design, _tech, mut manager) =
            fixture(tank, TechContext::default(), FixedRules::default())?;
        manager.set_tonnage(4.0)?;
        let (events, observer) = recorder::<ArmorEvent>();
        manager.subscribe(observer);

        assert!(!manager.set_tonnage(f64::NAN)?);
        assert!(!manager.set_tonnage(f64::INFINITY)?);
        assert_eq!(design.read().armor.tonnage, 4.0);
        assert!(events.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn mixed_tech_rows_name_the_tech_base() -> anyhow::Result<()> {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        let mixed = TechContext::new(TechLevel::Advanced, TechBase::InnerSphere, 3085).mixed(true);
        let (_design, _tech, manager) = fixture(tank, mixed, FixedRules::default())?;
        let name_of = |id: &str| {
            manager
                .available_rows()
                .iter()
                .find(|row| row.selection == ArmorSelection::option(id))
                .map(|row| row.display_name.clone())
        };
        assert_eq!(name_of("reactive").as_deref(), Some("Reactive (IS)"));
        assert_eq!(name_of("clan_reactive").as_deref(), Some("Reactive (Clan)"));
        assert_eq!(name_of("standard").as_deref(), Some("Standard"));
        Ok(())
    }

    #[test]
    fn industrial_units_see_industrial_armor_only() -> anyhow::Result<()> {
        let mut loader = UnitDesign::new("Loader", UnitType::Mech, 50.0);
        loader.is_industrial = true;
        let (_design, _tech, manager) =
            fixture(loader, TechContext::default(), FixedRules::default())?;
        let offered: Vec<String> = manager
            .available_rows()
            .iter()
            .map(|row| row.selection.to_string())
            .collect();
        assert_eq!(offered, ["industrial", "heavy_industrial", "commercial"]);
        Ok(())
    }

    #[test]
    fn refresh_reclamps_quietly() -> anyhow::Result<()> {
        let tank = UnitDesign::new("Hauler", UnitType::Tank, 50.0);
        let (design, _tech, mut manager) =
            fixture(tank, TechContext::default(), FixedRules::default())?;
        manager.set_tonnage(9.0)?;
        let (events, observer) = recorder::<ArmorEvent>();
        manager.subscribe(observer);

        manager.rules = Arc::new(FixedRules {
            armor: 5.0,
            ..FixedRules::default()
        });
        manager.refresh()?;
        assert_eq!(design.read().armor.tonnage, 5.0);
        assert!(events.borrow().is_empty());
        Ok(())
    }
}
