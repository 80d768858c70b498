//! Technology rules: tech base, rules level and advancement dates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Equipment tree an option belongs to, or that a session builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechBase {
    /// Usable by either faction.
    All,
    /// Inner Sphere construction.
    InnerSphere,
    /// Clan construction.
    Clan,
}

impl TechBase {
    /// Short label shown next to options when mixed tech is active.
    pub fn label(self) -> &'static str {
        match self {
            TechBase::All => "All",
            TechBase::InnerSphere => "IS",
            TechBase::Clan => "Clan",
        }
    }
}

/// Rules level, ordered from most to least restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechLevel {
    /// Introductory box set rules.
    Introductory,
    /// Tournament-legal standard rules.
    Standard,
    /// Advanced rules.
    Advanced,
    /// Experimental rules.
    Experimental,
    /// Anything goes.
    Unofficial,
}

impl TechLevel {
    /// Position of the level in the ordering above.
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TechLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TechLevel::Introductory => "Introductory",
            TechLevel::Standard => "Standard",
            TechLevel::Advanced => "Advanced",
            TechLevel::Experimental => "Experimental",
            TechLevel::Unofficial => "Unofficial",
        };
        f.write_str(name)
    }
}

/// Rules level and faction an item counts as for a given year.
///
/// This is what the design records next to a selected armor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TechConstant {
    /// Rules level at the evaluated year.
    pub level: TechLevel,
    /// Whether the item counts as Clan construction.
    pub clan: bool,
}

impl fmt::Display for TechConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = if self.clan { "Clan" } else { "IS" };
        write!(f, "{} {}", base, self.level)
    }
}

/// Introduction history of an option.
///
/// An item is experimental once prototyped, advanced once in production and
/// reaches its baseline `level` when it becomes common.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechAdvancement {
    /// Faction that builds it.
    pub base: TechBase,
    /// Baseline rules level once common.
    pub level: TechLevel,
    /// Year of the first prototype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype: Option<u32>,
    /// Year production starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<u32>,
    /// Year the item becomes common.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<u32>,
    /// Year the item goes extinct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extinct: Option<u32>,
    /// Year the item is reintroduced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reintroduced: Option<u32>,
}

impl TechAdvancement {
    /// An undated advancement at the given baseline level.
    pub const fn new(base: TechBase, level: TechLevel) -> Self {
        Self {
            base,
            level,
            prototype: None,
            production: None,
            common: None,
            extinct: None,
            reintroduced: None,
        }
    }

    /// Set the prototype year.
    pub const fn prototype(mut self, year: u32) -> Self {
        self.prototype = Some(year);
        self
    }

    /// Set the production year.
    pub const fn production(mut self, year: u32) -> Self {
        self.production = Some(year);
        self
    }

    /// Set the year the item becomes common.
    pub const fn common(mut self, year: u32) -> Self {
        self.common = Some(year);
        self
    }

    /// Set the extinction year.
    pub const fn extinct(mut self, year: u32) -> Self {
        self.extinct = Some(year);
        self
    }

    /// Set the reintroduction year.
    pub const fn reintroduced(mut self, year: u32) -> Self {
        self.reintroduced = Some(year);
        self
    }

    /// First year the item exists in any form.
    pub fn introduction_year(&self) -> Option<u32> {
        self.prototype.or(self.production).or(self.common)
    }

    /// Whether the item exists (and has not gone extinct) in `year`.
    /// Undated items are always available.
    pub fn is_available_in(&self, year: u32) -> bool {
        if self.introduction_year().is_some_and(|intro| intro > year) {
            return false;
        }
        match self.extinct {
            Some(extinct) if extinct <= year => self.reintroduced.is_some_and(|r| r <= year),
            _ => true,
        }
    }

    /// Rules level the item has in `year`.
    pub fn tech_level_at(&self, year: u32) -> TechLevel {
        let reached = |date: Option<u32>| date.is_some_and(|d| d <= year);
        if reached(self.common) {
            self.level
        } else if reached(self.production) {
            self.level.max(TechLevel::Advanced)
        } else if reached(self.prototype) {
            self.level.max(TechLevel::Experimental)
        } else if self.introduction_year().is_none() {
            self.level
        } else {
            TechLevel::Unofficial
        }
    }

    /// Tech constant recorded for the item in `year`.
    pub fn tech_constant(&self, year: u32, clan: bool) -> TechConstant {
        TechConstant {
            level: self.tech_level_at(year),
            clan,
        }
    }
}

/// Advancement of patchwork armor, the mixed per-location armor option.
pub const PATCHWORK_ARMOR: TechAdvancement =
    TechAdvancement::new(TechBase::All, TechLevel::Advanced).production(2500);

/// Read access to the active technology rules.
pub trait TechManager {
    /// Rules level in force.
    fn tech_level(&self) -> TechLevel;
    /// Primary tech base.
    fn tech_base(&self) -> TechBase;
    /// Whether both tech bases are allowed.
    fn is_mixed_tech(&self) -> bool;
    /// Campaign year.
    fn tech_year(&self) -> u32;

    /// Whether the primary tech base is Clan.
    fn is_clan(&self) -> bool {
        self.tech_base() == TechBase::Clan
    }

    /// An item is legal when its tech base is usable, it exists in the
    /// context year and its rules level in that year does not exceed the
    /// context level.
    fn is_legal(&self, advancement: &TechAdvancement) -> bool {
        let base_ok = match advancement.base {
            TechBase::All => true,
            base => self.is_mixed_tech() || base == self.tech_base(),
        };
        let year = self.tech_year();
        base_ok
            && advancement.is_available_in(year)
            && advancement.tech_level_at(year) <= self.tech_level()
    }
}

/// Snapshot of the technology rules an editing session builds under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechContext {
    /// Rules level in force.
    pub level: TechLevel,
    /// `All` is treated as mixed tech with an Inner Sphere primary base.
    pub base: TechBase,
    /// Allow options of either tech base.
    pub mixed: bool,
    /// Campaign year.
    pub year: u32,
}

impl TechContext {
    /// Context without mixed tech.
    pub fn new(level: TechLevel, base: TechBase, year: u32) -> Self {
        Self {
            level,
            base,
            mixed: false,
            year,
        }
    }

    /// Toggle mixed tech.
    pub fn mixed(mut self, mixed: bool) -> Self {
        self.mixed = mixed;
        self
    }
}

impl Default for TechContext {
    fn default() -> Self {
        Self::new(TechLevel::Standard, TechBase::InnerSphere, 3067)
    }
}

impl TechManager for TechContext {
    fn tech_level(&self) -> TechLevel {
        self.level
    }

    fn tech_base(&self) -> TechBase {
        match self.base {
            TechBase::All => TechBase::InnerSphere,
            base => base,
        }
    }

    fn is_mixed_tech(&self) -> bool {
        self.mixed || self.base == TechBase::All
    }

    fn tech_year(&self) -> u32 {
        self.year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ferro() -> TechAdvancement {
        TechAdvancement::new(TechBase::InnerSphere, TechLevel::Standard)
            .prototype(2557)
            .production(2571)
            .common(3055)
            .extinct(2810)
            .reintroduced(3040)
    }

    #[test]
    fn level_follows_introduction_stages() {
        let adv = ferro();
        assert_eq!(adv.tech_level_at(2560), TechLevel::Experimental);
        assert_eq!(adv.tech_level_at(2600), TechLevel::Advanced);
        assert_eq!(adv.tech_level_at(3067), TechLevel::Standard);
        assert_eq!(adv.tech_level_at(2400), TechLevel::Unofficial);
    }

    #[test]
    fn extinction_hides_item_until_reintroduced() {
        let adv = ferro();
        assert!(adv.is_available_in(2700));
        assert!(!adv.is_available_in(3025));
        assert!(adv.is_available_in(3050));
    }

    #[test]
    fn tech_base_must_match_unless_mixed() {
        let clan_item = TechAdvancement::new(TechBase::Clan, TechLevel::Standard).common(2830);
        let is_context = TechContext::new(TechLevel::Standard, TechBase::InnerSphere, 3067);
        assert!(!is_context.is_legal(&clan_item));
        assert!(is_context.clone().mixed(true).is_legal(&clan_item));

        let clan_context = TechContext::new(TechLevel::Standard, TechBase::Clan, 3067);
        assert!(clan_context.is_legal(&clan_item));
    }

    #[test]
    fn patchwork_requires_advanced_rules() {
        let standard = TechContext::default();
        assert!(!standard.is_legal(&PATCHWORK_ARMOR));
        let advanced = TechContext::new(TechLevel::Advanced, TechBase::InnerSphere, 3067);
        assert!(advanced.is_legal(&PATCHWORK_ARMOR));
        assert_eq!(
            PATCHWORK_ARMOR.tech_constant(3067, true),
            TechConstant {
                level: TechLevel::Advanced,
                clan: true
            }
        );
    }
}
