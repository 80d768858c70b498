use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{
    catalog::{builtin::SINGLE_HEAT_SINK, Catalog, DissipationClass, OptionFamily},
    design::{AeroHeatSink, HeatSinkKey, SharedDesign, UnitDesign},
    error::{EngineError, Result},
    legality::{legal_options, listed_name, UnitProfile},
    notify::{ChangeNotifier, ObserverId},
    tech::TechContext,
};

use super::{EditBounds, SharedRules, SharedTech, Subject};

/// How heat-sink types are keyed for the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatSinkLayout {
    /// One entry per catalog option.
    Surface,
    /// Single or double, regardless of construction origin.
    Aerospace,
}

impl HeatSinkLayout {
    /// Layout used by `unit`.
    pub fn of(unit: &UnitDesign) -> Self {
        if unit.unit_type.is_aerospace() {
            HeatSinkLayout::Aerospace
        } else {
            HeatSinkLayout::Surface
        }
    }
}

/// One entry of the heat-sink type list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatSinkOption {
    /// Key to select this option with.
    pub key: HeatSinkKey,
    /// Name shown in the list.
    pub display_name: String,
}

/// Change reported by [`HeatSinkAllocationManager`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeatSinkEvent {
    /// Type or total count changed.
    Changed {
        /// Selected type.
        key: HeatSinkKey,
        /// Heat sinks installed.
        count: u32,
    },
    /// The omni base chassis count changed.
    BaseCountChanged {
        /// Heat sinks fixed to the chassis.
        count: u32,
        /// Range of the base count at the time of the change.
        bounds: EditBounds,
    },
}

impl fmt::Display for HeatSinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatSinkEvent::Changed { key, count } => write!(f, "{count} {key} heat sinks"),
            HeatSinkEvent::BaseCountChanged { count, bounds } => {
                write!(f, "{count} of {} heat sinks fixed to the chassis", bounds.max)
            }
        }
    }
}

/// Selects the heat-sink type and sizes the heat-sink allocation.
pub struct HeatSinkAllocationManager {
    subject: Subject,
    catalog: Arc<Catalog>,
    rules: SharedRules,
    offered: Vec<HeatSinkOption>,
    notifier: ChangeNotifier<HeatSinkEvent>,
}

impl HeatSinkAllocationManager {
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

    /// Recompute the offered types and re-clamp both counts. The selected
    /// type stays selected even when it is no longer offered.
    pub fn refresh(&mut self) -> Result<()> {
        let previous = self.notifier.suppress();
        let result = self.reload();
        self.notifier.resume(previous);
        result
    }

    fn reload(&mut self) -> Result<()> {
        let design = self.subject.design()?;
        let tech = self.subject.tech()?;
        self.offered = self.offered_options(&design.read(), &tech);

        let total = design.read().heat_sinks.total_count;
        self.apply_total(&design, total)?;
        self.clamp_base(&design)?;
        debug!(offered = self.offered.len(), "heat sink types refreshed");
        Ok(())
    }

    fn offered_options(&self, unit: &UnitDesign, tech: &TechContext) -> Vec<HeatSinkOption> {
        let legal = legal_options(&self.catalog, tech, &UnitProfile::of(unit));
        let legal = legal
            .into_iter()
            .filter(|option| !unit.is_primitive || option.id == SINGLE_HEAT_SINK);

        match HeatSinkLayout::of(unit) {
            HeatSinkLayout::Surface => legal
                .map(|option| HeatSinkOption {
                    key: HeatSinkKey::Equipment(option.id.clone()),
                    display_name: listed_name(option, tech),
                })
                .collect(),
            HeatSinkLayout::Aerospace => {
                let mut kinds: Vec<AeroHeatSink> = legal
                    .filter_map(|option| match option.heat_sink()?.dissipation {
                        DissipationClass::Single => Some(AeroHeatSink::Single),
                        DissipationClass::Double => Some(AeroHeatSink::Double),
                        _ => None,
                    })
                    .collect();
                kinds.sort_by_key(|kind| kind.index());
                kinds.dedup();
                kinds
                    .into_iter()
                    .map(|kind| HeatSinkOption {
                        key: HeatSinkKey::Aero(kind),
                        display_name: match kind {
                            AeroHeatSink::Single => "Single".to_string(),
                            AeroHeatSink::Double => "Double".to_string(),
                        },
                    })
                    .collect()
            }
        }
    }

    /// Register an observer for heat-sink changes.
    pub fn subscribe(&mut self, observer: impl FnMut(&HeatSinkEvent) + 'static) -> ObserverId {
        self.notifier.subscribe(observer)
    }

    /// Drop an observer; false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Layout the type list uses for the current unit.
    pub fn layout(&self) -> Result<HeatSinkLayout> {
        let design = self.subject.design()?;
        let layout = HeatSinkLayout::of(&design.read());
        Ok(layout)
    }

    /// Selected heat-sink type.
    pub fn selected(&self) -> Result<HeatSinkKey> {
        let design = self.subject.design()?;
        let selected = design.read().heat_sinks.selected.clone();
        Ok(selected)
    }

    /// Heat sinks installed.
    pub fn total_count(&self) -> Result<u32> {
        let design = self.subject.design()?;
        let count = design.read().heat_sinks.total_count;
        Ok(count)
    }

    /// Heat sinks fixed to an omni chassis.
    pub fn base_chassis_count(&self) -> Result<u32> {
        let design = self.subject.design()?;
        let count = design.read().heat_sinks.base_chassis_count;
        Ok(count)
    }

    /// Heat-sink types that may be selected.
    pub fn available_options(&self) -> &[HeatSinkOption] {
        &self.offered
    }

    /// Range of the total count.
    pub fn count_bounds(&self) -> Result<EditBounds> {
        let design = self.subject.design()?;
        let (min, max) = self.count_range(&design.read());
        Ok(EditBounds::counts(min, max))
    }

    /// Range of the base chassis count.
    pub fn base_bounds(&self) -> Result<EditBounds> {
        let design = self.subject.design()?;
        let max = self.base_capacity(&design.read())?;
        Ok(EditBounds::counts(0, max))
    }

    /// Select the heat-sink type, then re-clamp the base chassis count.
    pub fn select_type(&mut self, key: HeatSinkKey) -> Result<bool> {
        if let HeatSinkKey::Equipment(id) = &key {
            self.catalog.require(id)?;
        }
        if !self.offered.iter().any(|option| option.key == key) {
            warn!(%key, "heat sink type is not offered for this unit");
            return Ok(false);
        }

        let design = self.subject.design()?;
        let mut unit = design.write();
        if unit.heat_sinks.selected == key {
            trace!(%key, "heat sink type unchanged");
            return Ok(false);
        }
        unit.heat_sinks.selected = key.clone();
        let count = unit.heat_sinks.total_count;
        drop(unit);

        debug!(%key, count, "heat sink type changed");
        self.notifier.notify(HeatSinkEvent::Changed { key, count });
        // Compact sinks change how many fit in the engine.
        self.clamp_base(&design)?;
        Ok(true)
    }

    /// Set the number of heat sinks, never below the engine's free
    /// allotment and, on aerospace units, never above the ceiling.
    pub fn set_total_count(&mut self, count: u32) -> Result<bool> {
        let design = self.subject.design()?;
        let changed = self.apply_total(&design, count)?;
        if changed {
            self.clamp_base(&design)?;
        }
        Ok(changed)
    }

    /// Set how many heat sinks are fixed to the chassis. Ignored unless the
    /// unit is an omni.
    pub fn set_base_chassis_count(&mut self, count: u32) -> Result<bool> {
        let design = self.subject.design()?;
        if !design.read().is_omni {
            trace!(count, "base chassis heat sinks apply to omni units only");
            return Ok(false);
        }
        self.apply_base(&design, count)
    }

    /// Installed heat sinks that take up critical slots outside the engine.
    /// `None` for aerospace units, which have no critical slots to fill.
    pub fn free_critical_slot_count(&self) -> Result<Option<u32>> {
        let design = self.subject.design()?;
        let unit = design.read();
        if HeatSinkLayout::of(&unit) == HeatSinkLayout::Aerospace {
            return Ok(None);
        }
        let allotment = if unit.is_omni {
            unit.heat_sinks.base_chassis_count
        } else {
            self.base_capacity(&unit)?
        };
        let total = unit.heat_sinks.total_count;
        Ok(Some(total - total.min(allotment)))
    }

    fn count_range(&self, unit: &UnitDesign) -> (u32, u32) {
        let min = unit.free_heat_sinks();
        let max = match HeatSinkLayout::of(unit) {
            HeatSinkLayout::Surface => u32::MAX,
            HeatSinkLayout::Aerospace => self.rules.heat_sink_ceiling(unit).unwrap_or(u32::MAX),
        };
        (min, max.max(min))
    }

    fn base_capacity(&self, unit: &UnitDesign) -> Result<u32> {
        let compact = match &unit.heat_sinks.selected {
            HeatSinkKey::Equipment(id) => {
                let option = self.catalog.require(id)?;
                let traits = option.heat_sink().ok_or_else(|| EngineError::MissingDescriptor {
                    family: OptionFamily::HeatSink,
                    id: id.clone(),
                })?;
                traits.compact
            }
            HeatSinkKey::Aero(_) => false,
        };
        Ok(unit.integral_heat_sink_capacity(compact))
    }

    fn apply_total(&mut self, design: &SharedDesign, requested: u32) -> Result<bool> {
        let mut unit = design.write();
        let (min, max) = self.count_range(&unit);
        let count = requested.clamp(min, max);
        if count == unit.heat_sinks.total_count {
            trace!(requested, count, "heat sink count unchanged");
            return Ok(false);
        }
        unit.heat_sinks.total_count = count;
        let key = unit.heat_sinks.selected.clone();
        drop(unit);

        debug!(%key, count, "heat sink count changed");
        self.notifier.notify(HeatSinkEvent::Changed { key, count });
        Ok(true)
    }

    fn apply_base(&mut self, design: &SharedDesign, requested: u32) -> Result<bool> {
        let mut unit = design.write();
        let capacity = self.base_capacity(&unit)?;
        let bounds = EditBounds::counts(0, capacity);
        let count = requested.min(capacity);
        if count == unit.heat_sinks.base_chassis_count {
            trace!(requested, count, "base chassis heat sinks unchanged");
            return Ok(false);
        }
        unit.heat_sinks.base_chassis_count = count;
        drop(unit);

        debug!(count, "base chassis heat sinks changed");
        self.notifier.notify(HeatSinkEvent::BaseCountChanged { count, bounds });
        Ok(true)
    }

    /// Pull the base chassis count back under its capacity.
    fn clamp_base(&mut self, design: &SharedDesign) -> Result<bool> {
        let current = design.read().heat_sinks.base_chassis_count;
        self.apply_base(design, current)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::RwLock;

    use super::*;
    use crate::{
        catalog::Catalogs,
        design::{EngineDescriptor, EngineKind, UnitType},
        manager::testing::{recorder, FixedRules},
        tech::{TechBase, TechLevel},
    };

    fn fixture(
        design: UnitDesign,
        tech: TechContext,
        rules: FixedRules,
    ) -> anyhow::Result<(SharedDesign, SharedTech, HeatSinkAllocationManager)> {
        let design = design.shared();
        let tech: SharedTech = Arc::new(RwLock::new(tech));
        let manager = HeatSinkAllocationManager::new(
            &design,
            &tech,
            Catalogs::builtin().heat_sinks,
            Arc::new(rules),
        )?;
        Ok((design, tech, manager))
    }

    fn mech() -> UnitDesign {
        UnitDesign::new("Griffin", UnitType::Mech, 55.0)
            .with_engine(EngineDescriptor::new(EngineKind::Fusion, 250))
    }

    fn keys(manager: &HeatSinkAllocationManager) -> Vec<String> {
        manager
            .available_options()
            .iter()
            .map(|option| option.key.to_string())
            .collect()
    }

    #[test]
    fn total_never_drops_below_free_allotment() -> anyhow::Result<()> {
        let (design, _tech, mut manager) =
            fixture(mech(), TechContext::default(), FixedRules::default())?;
        assert!(!manager.set_total_count(4)?);
        assert!(manager.set_total_count(15)?);
        assert!(manager.set_total_count(4)?);
        assert_eq!(design.read().heat_sinks.total_count, 10);
        assert_eq!(manager.count_bounds()?.min, 10.0);
        Ok(())
    }

    #[test]
    fn base_count_needs_omni() -> anyhow::Result<()> {
        let (design, _tech, mut manager) =
            fixture(mech(), TechContext::default(), FixedRules::default())?;
        assert!(!manager.set_base_chassis_count(3)?);
        assert_eq!(manager.base_chassis_count()?, 0);

        design.write().is_omni = true;
        assert!(manager.set_base_chassis_count(30)?);
        // A rating 250 engine houses ten standard heat sinks.
        assert_eq!(manager.base_chassis_count()?, 10);
        Ok(())
    }

    #[test]
    fn selection_survives_tech_swap() -> anyhow::Result<()> {
        let mixed = TechContext::new(TechLevel::Standard, TechBase::Clan, 3067).mixed(true);
        let (design, tech, mut manager) = fixture(mech(), mixed, FixedRules::default())?;
        let double_is = HeatSinkKey::Equipment("double_is".to_string());
        assert!(manager.select_type(double_is.clone())?);

        *tech.write() = TechContext::new(TechLevel::Standard, TechBase::Clan, 3067);
        manager.refresh()?;
        assert_eq!(manager.selected()?, double_is);
        assert_eq!(design.read().heat_sinks.selected, double_is);
        assert_eq!(keys(&manager), ["single", "double_clan"]);
        Ok(())
    }

    #[test]
    fn primitive_units_get_single_only() -> anyhow::Result<()> {
        let mut primitive = mech();
        primitive.is_primitive = true;
        let (_design, _tech, mut manager) =
            fixture(primitive, TechContext::default(), FixedRules::default())?;
        assert_eq!(keys(&manager), ["single"]);
        let double = HeatSinkKey::Equipment("double_is".to_string());
        assert!(!manager.select_type(double)?);
        Ok(())
    }

    #[test]
    fn aerospace_layout_collapses_doubles() -> anyhow::Result<()> {
        let fighter = UnitDesign::new("Sabre", UnitType::AerospaceFighter, 25.0);
        let tech = TechContext::new(TechLevel::Standard, TechBase::InnerSphere, 3067).mixed(true);
        let rules = FixedRules {
            heat_sink_ceiling: Some(14),
            ..FixedRules::default()
        };
        let (_design, _tech, mut manager) = fixture(fighter, tech, rules)?;
        assert_eq!(manager.layout()?, HeatSinkLayout::Aerospace);
        assert_eq!(keys(&manager), ["single", "double"]);
        assert!(manager.select_type(HeatSinkKey::Aero(AeroHeatSink::Double))?);

        assert!(manager.set_total_count(20)?);
        assert_eq!(manager.total_count()?, 14);
        assert_eq!(manager.free_critical_slot_count()?, None);
        Ok(())
    }

    #[test]
    fn aerospace_base_count_follows_total() -> anyhow::Result<()> {
        let mut fighter = UnitDesign::new("Sabre", UnitType::AerospaceFighter, 25.0);
        fighter.is_omni = true;
        let rules = FixedRules {
            heat_sink_ceiling: Some(30),
            ..FixedRules::default()
        };
        let (_design, _tech, mut manager) = fixture(fighter, TechContext::default(), rules)?;
        manager.set_total_count(16)?;
        assert!(manager.set_base_chassis_count(40)?);
        assert_eq!(manager.base_chassis_count()?, 16);

        let (events, observer) = recorder::<HeatSinkEvent>();
        manager.subscribe(observer);
        manager.set_total_count(12)?;
        assert_eq!(manager.base_chassis_count()?, 12);
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], HeatSinkEvent::Changed { count: 12, .. }));
        assert!(matches!(events[1], HeatSinkEvent::BaseCountChanged { count: 12, .. }));
        Ok(())
    }

    #[test]
    fn critical_slots_outside_the_engine() -> anyhow::Result<()> {
        // Compact heat sinks reach production in 3079.
        let advanced = TechContext::new(TechLevel::Advanced, TechBase::InnerSphere, 3080);
        let (_design, _tech, mut manager) = fixture(mech(), advanced, FixedRules::default())?;
        manager.set_total_count(15)?;
        assert_eq!(manager.free_critical_slot_count()?, Some(5));

        assert!(manager.select_type(HeatSinkKey::Equipment("compact".to_string()))?);
        assert_eq!(manager.free_critical_slot_count()?, Some(0));
        Ok(())
    }
}
