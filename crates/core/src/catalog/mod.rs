//! Option catalogs for transport bays, armor and heat sinks.

/// Built-in registries used when no catalog directory is configured.
pub mod builtin;
mod models;

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

pub use models::{
    ArmorTraits, BayTraits, DissipationClass, EquipmentClass, HeatSinkTraits, OptionDescriptor,
    OptionKind,
};

/// The option family a catalog holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionFamily {
    /// Transport bay types.
    Bay,
    /// Armor types.
    Armor,
    /// Heat sink types.
    HeatSink,
}

impl OptionFamily {
    fn file_name(self) -> &'static str {
        match self {
            OptionFamily::Bay => "bays.json",
            OptionFamily::Armor => "armor.json",
            OptionFamily::HeatSink => "heat_sinks.json",
        }
    }
}

impl fmt::Display for OptionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionFamily::Bay => "bay",
            OptionFamily::Armor => "armor",
            OptionFamily::HeatSink => "heat sink",
        };
        f.write_str(name)
    }
}

/// Ordered, immutable registry of one option family.
#[derive(Debug, Clone)]
pub struct Catalog {
    family: OptionFamily,
    entries: Vec<OptionDescriptor>,
}

impl Catalog {
    /// Build a catalog, dropping entries whose kind does not match `family`.
    pub fn new(family: OptionFamily, entries: Vec<OptionDescriptor>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|entry| {
                let matches = entry.family() == family;
                if !matches {
                    warn!("dropping {} from {} catalog", entry.id, family);
                }
                matches
            })
            .collect();
        Self { family, entries }
    }

    /// Load a catalog from a JSON array of descriptors.
    pub fn load(family: OptionFamily, path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let entries: Vec<OptionDescriptor> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        if let Some(stray) = entries.iter().find(|entry| entry.family() != family) {
            bail!(
                "{} lists {} `{}` in the {} catalog",
                path.display(),
                stray.family(),
                stray.id,
                family
            );
        }
        debug!("loaded {} {} options from {}", entries.len(), family, path.display());
        Ok(Self { family, entries })
    }

    /// Option family every entry of this catalog belongs to.
    pub fn family(&self) -> OptionFamily {
        self.family
    }

    /// Entries in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionDescriptor> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry with `id`, if any.
    pub fn get(&self, id: &str) -> Option<&OptionDescriptor> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Resolve an id the design already references; absence means the
    /// stored reference is corrupt.
    pub fn require(&self, id: &str) -> Result<&OptionDescriptor> {
        self.get(id).ok_or_else(|| EngineError::MissingDescriptor {
            family: self.family,
            id: id.to_string(),
        })
    }
}

/// The three catalogs an editing session works from.
#[derive(Debug, Clone)]
pub struct Catalogs {
    /// Transport bay types.
    pub bays: Arc<Catalog>,
    /// Armor types.
    pub armor: Arc<Catalog>,
    /// Heat-sink types.
    pub heat_sinks: Arc<Catalog>,
}

impl Catalogs {
    /// Shared handles to the built-in registries.
    pub fn builtin() -> Self {
        builtin::CATALOGS.clone()
    }

    /// Load `bays.json`, `armor.json` and `heat_sinks.json` from `dir`,
    /// falling back to the built-in registry for any file that is absent.
    pub fn load_dir(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        let fallback = Self::builtin();
        let pick = |family: OptionFamily, builtin: Arc<Catalog>| -> anyhow::Result<Arc<Catalog>> {
            let path = dir.join(family.file_name());
            if path.is_file() {
                Ok(Arc::new(Catalog::load(family, &path)?))
            } else {
                Ok(builtin)
            }
        };
        Ok(Self {
            bays: pick(OptionFamily::Bay, fallback.bays)?,
            armor: pick(OptionFamily::Armor, fallback.armor)?,
            heat_sinks: pick(OptionFamily::HeatSink, fallback.heat_sinks)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn loads_overrides_and_falls_back_to_builtin() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("bays.json"),
            r#"[
  {
    "id": "cargo",
    "display_name": "Cargo",
    "tech": { "base": "all", "level": "introductory" },
    "classes": ["aero", "tank"],
    "kind": {
      "family": "bay",
      "weight_per_unit": 1.0,
      "personnel_per_unit": 0,
      "cargo_class": true
    }
  }
]"#,
        )?;

        let catalogs = Catalogs::load_dir(dir.path())?;
        assert_eq!(catalogs.bays.len(), 1);
        let cargo = catalogs.bays.get("cargo").expect("cargo bay loaded");
        assert!(cargo.bay().is_some_and(|bay| bay.cargo_class));
        assert_eq!(catalogs.armor.len(), Catalogs::builtin().armor.len());
        Ok(())
    }

    #[test]
    fn rejects_entries_from_another_family() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("armor.json");
        fs::write(
            &path,
            r#"[{
  "id": "single",
  "display_name": "Single",
  "tech": { "base": "all", "level": "introductory" },
  "kind": { "family": "heat_sink", "dissipation": "single" }
}]"#,
        )?;
        let err = Catalog::load(OptionFamily::Armor, &path).unwrap_err();
        assert!(err.to_string().contains("heat sink `single`"));
        Ok(())
    }

    #[test]
    fn require_reports_missing_descriptor() {
        let catalogs = Catalogs::builtin();
        let err = catalogs.armor.require("unobtainium").unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingDescriptor {
                family: OptionFamily::Armor,
                ..
            }
        ));
    }
}
