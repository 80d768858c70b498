//! Application configuration: the tech context and the unit an editing
//! session starts from.
//!
//! Values come from `<config_dir>/loadout/config.toml`, overridden by
//! `LOADOUT_*` environment variables (`LOADOUT_TECH__YEAR=3085`).

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    catalog::Catalogs,
    design::{EngineDescriptor, EngineKind, MovementMode, UnitDesign, UnitType},
    tech::TechContext,
};

const APP_DIR: &str = "loadout";
const CONFIG_FILE: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# Loadout configuration.
#
# Any key can be overridden from the environment, e.g.
#   LOADOUT_TECH__LEVEL=advanced LOADOUT_UNIT__TONNAGE=5000

# Directory holding bays.json, armor.json and heat_sinks.json overrides.
# catalog_dir = "/path/to/catalogs"

[tech]
# introductory, standard, advanced, experimental or unofficial
level = "standard"
# inner_sphere, clan or all
base = "inner_sphere"
mixed = false
year = 3067

[unit]
name = "Union"
# mech, land_air_mech, tank, support_vehicle, aerospace_fighter,
# conventional_fighter, small_craft, drop_ship, jump_ship, war_ship, space_station
unit_type = "drop_ship"
tonnage = 3600.0
fixed_tonnage = 2000.0
omni = false
primitive = false
industrial = false

[unit.engine]
kind = "fusion"
rating = 0
"#;

/// Settings for the unit a session starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitSettings {
    /// Design name.
    pub name: String,
    /// Unit category.
    pub unit_type: UnitType,
    /// Defaults to the unit type's usual movement mode.
    pub movement_mode: Option<MovementMode>,
    /// Total unit tonnage.
    pub tonnage: f64,
    /// Installed engine.
    pub engine: EngineDescriptor,
    /// Start as an omni unit.
    pub omni: bool,
    /// Start as a primitive unit.
    pub primitive: bool,
    /// Start as an industrial unit.
    pub industrial: bool,
    /// Weight outside the managed allocations.
    pub fixed_tonnage: f64,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            name: "Union".to_string(),
            unit_type: UnitType::DropShip,
            movement_mode: None,
            tonnage: 3600.0,
            engine: EngineDescriptor::new(EngineKind::Fusion, 0),
            omni: false,
            primitive: false,
            industrial: false,
            fixed_tonnage: 2000.0,
        }
    }
}

impl UnitSettings {
    /// Blank design described by these settings.
    pub fn build(&self) -> UnitDesign {
        let mut design = UnitDesign::new(self.name.clone(), self.unit_type, self.tonnage)
            .with_engine(self.engine);
        if let Some(movement) = self.movement_mode {
            design = design.with_movement(movement);
        }
        design.is_omni = self.omni;
        design.is_primitive = self.primitive;
        design.is_industrial = self.industrial;
        design.fixed_tonnage = self.fixed_tonnage;
        design
    }
}

/// Everything a session is configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tech context the session starts in.
    pub tech: TechContext,
    /// Unit the session starts with.
    pub unit: UnitSettings,
    /// Directory of JSON catalogs replacing the built-in ones.
    pub catalog_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load from the default location and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path()?)
    }

    /// Load from `path` (which may be absent) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("LOADOUT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("invalid config {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Catalogs from `catalog_dir`, or the built-in ones.
    pub fn catalogs(&self) -> Result<Catalogs> {
        match &self.catalog_dir {
            Some(dir) => Catalogs::load_dir(dir)
                .with_context(|| format!("failed to load catalogs from {}", dir.display())),
            None => Ok(Catalogs::builtin()),
        }
    }
}

/// `<config_dir>/loadout/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| anyhow!("could not determine config directory"))?;
    Ok(base.join(APP_DIR).join(CONFIG_FILE))
}

/// Write the commented default configuration if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path()?;
    write_default_config(&path)?;
    Ok(path)
}

/// Returns whether a file was written.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::{TechBase, TechLevel};
    use tempfile::tempdir;

    #[test]
    fn default_file_matches_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(APP_DIR).join(CONFIG_FILE);
        assert!(write_default_config(&path)?);
        assert!(!write_default_config(&path)?);

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[tech]
level = "advanced"
base = "clan"
year = 3085

[unit]
name = "Hellbringer"
unit_type = "mech"
tonnage = 65.0
omni = true

[unit.engine]
kind = "xl_fusion"
rating = 325
"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.tech, TechContext::new(TechLevel::Advanced, TechBase::Clan, 3085));
        let design = config.unit.build();
        assert_eq!(design.unit_type, UnitType::Mech);
        assert_eq!(design.movement_mode, MovementMode::Biped);
        assert!(design.is_omni);
        assert_eq!(design.heat_sinks.total_count, 10);
        assert_eq!(design.integral_heat_sink_capacity(false), 13);
        Ok(())
    }

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.unit, UnitSettings::default());
        assert!(config.catalog_dir.is_none());
        Ok(())
    }
}
