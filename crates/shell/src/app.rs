use std::{
    cell::RefCell,
    fmt::{self, Write as _},
    io::{BufRead, Write},
    rc::Rc,
    str::FromStr,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use loadout_core::{
    catalog::Catalogs,
    design::{
        AeroHeatSink, ArmorSelection, BayNumber, HeatSinkKey, SharedDesign, UnitDesign, UnitType,
    },
    manager::{
        ArmorAllocationManager, ArmorEvent, BayAllocationManager, BayEvent,
        HeatSinkAllocationManager, HeatSinkEvent, HeatSinkLayout, SharedRules, SharedTech,
    },
    rules::RulesTable,
    tech::{TechBase, TechContext, TechLevel},
    AppConfig,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

const HELP: &str = "\
commands:
  show                          unit summary
  json                          dump the design as JSON
  bays | available-bays         installed bays / bay types that may be added
  add-bay <type>                install a bay
  remove-bay <n>                remove bay #n
  resize <n> <size>             resize bay #n
  doors <n> <count>             set the doors of bay #n
  armor-types                   armor types that may be selected
  armor <type|patchwork>        select the armor type
  tonnage <t> | max-armor | use-remaining
  heat-sinks                    heat sink types that may be selected
  hs-type <key> | hs-count <n> | hs-base <n>
  tech <level> <base> <year> [mixed]
  unit <type> <tonnage>         start a new unit
  quit";

/// A presentation intent typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Show,
    Json,
    Bays,
    AvailableBays,
    AddBay(String),
    RemoveBay(BayNumber),
    Resize(BayNumber, f64),
    Doors(BayNumber, u32),
    ArmorTypes,
    Armor(ArmorSelection),
    Tonnage(f64),
    MaxArmor,
    UseRemaining,
    HeatSinks,
    /// Resolved against the unit's heat-sink layout when executed.
    HeatSinkType(String),
    HeatSinkCount(u32),
    HeatSinkBase(u32),
    Tech(TechContext),
    Unit { unit_type: UnitType, tonnage: f64 },
    Quit,
}

impl Command {
    /// `None` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match name {
            "help" | "?" => Command::Help,
            "show" => Command::Show,
            "json" => Command::Json,
            "bays" => Command::Bays,
            "available-bays" => Command::AvailableBays,
            "add-bay" => Command::AddBay(word(args, 0, "bay type")?.to_string()),
            "remove-bay" => Command::RemoveBay(bay_number(args)?),
            "resize" => Command::Resize(bay_number(args)?, number(args, 1, "size")?),
            "doors" => Command::Doors(bay_number(args)?, number(args, 1, "door count")?),
            "armor-types" => Command::ArmorTypes,
            "armor" => {
                let id = word(args, 0, "armor type")?;
                if id == "patchwork" {
                    Command::Armor(ArmorSelection::Patchwork)
                } else {
                    Command::Armor(ArmorSelection::option(id))
                }
            }
            "tonnage" => Command::Tonnage(number(args, 0, "tonnage")?),
            "max-armor" => Command::MaxArmor,
            "use-remaining" => Command::UseRemaining,
            "heat-sinks" => Command::HeatSinks,
            "hs-type" => Command::HeatSinkType(word(args, 0, "heat sink type")?.to_string()),
            "hs-count" => Command::HeatSinkCount(number(args, 0, "heat sink count")?),
            "hs-base" => Command::HeatSinkBase(number(args, 0, "base heat sink count")?),
            "tech" => {
                let level: TechLevel = variant(word(args, 0, "tech level")?, "tech level")?;
                let base: TechBase = variant(word(args, 1, "tech base")?, "tech base")?;
                let year = number(args, 2, "year")?;
                let mixed = match args.get(3) {
                    None => false,
                    Some(&"mixed") => true,
                    Some(other) => bail!("expected `mixed`, got `{other}`"),
                };
                Command::Tech(TechContext::new(level, base, year).mixed(mixed))
            }
            "unit" => Command::Unit {
                unit_type: variant(word(args, 0, "unit type")?, "unit type")?,
                tonnage: number(args, 1, "tonnage")?,
            },
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command `{other}` (try `help`)"),
        };
        Ok(Some(command))
    }
}

fn word<'a>(args: &[&'a str], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .copied()
        .ok_or_else(|| anyhow!("missing {what}"))
}

fn number<T>(args: &[&str], index: usize, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = word(args, index, what)?;
    raw.parse()
        .with_context(|| format!("invalid {what} `{raw}`"))
}

fn bay_number(args: &[&str]) -> Result<BayNumber> {
    let raw = word(args, 0, "bay number")?;
    let raw = raw.strip_prefix('#').unwrap_or(raw);
    let number = raw
        .parse()
        .with_context(|| format!("invalid bay number `{raw}`"))?;
    Ok(BayNumber(number))
}

/// Parse a snake_case enum variant; dashes are accepted for underscores.
fn variant<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_value(Value::String(raw.replace('-', "_")))
        .with_context(|| format!("unknown {what} `{raw}`"))
}

/// Editing session: the shared design, the tech context and the managers
/// that edit the design.
pub struct Session {
    design: SharedDesign,
    tech: SharedTech,
    rules: SharedRules,
    bays: BayAllocationManager,
    armor: ArmorAllocationManager,
    heat_sinks: HeatSinkAllocationManager,
    /// Change events delivered since the last command.
    events: Rc<RefCell<Vec<String>>>,
}

impl Session {
    pub fn new(config: &AppConfig, catalogs: Catalogs, rules: SharedRules) -> Result<Self> {
        let design = config.unit.build().shared();
        let tech: SharedTech = Arc::new(RwLock::new(config.tech.clone()));

        let mut bays =
            BayAllocationManager::new(&design, &tech, catalogs.bays, rules.clone())?;
        let mut armor =
            ArmorAllocationManager::new(&design, &tech, catalogs.armor, rules.clone())?;
        let mut heat_sinks = HeatSinkAllocationManager::new(
            &design,
            &tech,
            catalogs.heat_sinks,
            rules.clone(),
        )?;

        let events = Rc::new(RefCell::new(Vec::new()));
        bays.subscribe(collector::<BayEvent>(&events));
        armor.subscribe(collector::<ArmorEvent>(&events));
        heat_sinks.subscribe(collector::<HeatSinkEvent>(&events));

        info!(unit = %config.unit.name, "editing session started");
        Ok(Self {
            design,
            tech,
            rules,
            bays,
            armor,
            heat_sinks,
            events,
        })
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> Result<()> {
        writeln!(output, "{}", self.summary()?)?;
        write!(output, "> ")?;
        output.flush()?;
        for line in input.lines() {
            let line = line.context("failed to read command")?;
            match Command::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => match self.execute(command) {
                    Ok(text) => write!(output, "{text}")?,
                    Err(err) => {
                        warn!("command failed: {err:#}");
                        writeln!(output, "error: {err:#}")?;
                    }
                },
                Ok(None) => {}
                Err(err) => writeln!(output, "error: {err:#}")?,
            }
            write!(output, "> ")?;
            output.flush()?;
        }
        Ok(())
    }

    /// Apply one command and return what to print: delivered change events
    /// first, then the command's own output.
    pub fn execute(&mut self, command: Command) -> Result<String> {
        debug!(?command, "executing");
        let mut out = String::new();
        let applied = match command {
            Command::Help => {
                out.push_str(HELP);
                None
            }
            Command::Show => {
                out.push_str(&self.summary()?);
                None
            }
            Command::Json => {
                let json = serde_json::to_string_pretty(&*self.design.read())?;
                out.push_str(&json);
                None
            }
            Command::Bays => {
                self.bay_table(&mut out, true)?;
                None
            }
            Command::AvailableBays => {
                self.bay_table(&mut out, false)?;
                None
            }
            Command::AddBay(type_id) => Some(self.bays.add_bay(&type_id)?.is_some()),
            Command::RemoveBay(number) => Some(self.bays.remove_bay(number)?),
            Command::Resize(number, size) => Some(self.bays.resize_bay(number, size)?),
            Command::Doors(number, doors) => Some(self.bays.set_doors(number, doors)?),
            Command::ArmorTypes => {
                let selected = self.armor.selection()?;
                for row in self.armor.available_rows() {
                    let mark = if row.selection == selected { '*' } else { ' ' };
                    writeln!(out, "{mark} {:<20} {}", row.selection, row.display_name)?;
                }
                None
            }
            Command::Armor(selection) => Some(self.armor.select_armor(selection)?),
            Command::Tonnage(tonnage) => Some(self.armor.set_tonnage(tonnage)?),
            Command::MaxArmor => Some(self.armor.maximize_armor()?),
            Command::UseRemaining => Some(self.armor.use_remaining_tonnage()?),
            Command::HeatSinks => {
                self.heat_sink_table(&mut out)?;
                None
            }
            Command::HeatSinkType(raw) => {
                let key = self.heat_sink_key(&raw)?;
                Some(self.heat_sinks.select_type(key)?)
            }
            Command::HeatSinkCount(count) => Some(self.heat_sinks.set_total_count(count)?),
            Command::HeatSinkBase(count) => Some(self.heat_sinks.set_base_chassis_count(count)?),
            Command::Tech(tech) => {
                *self.tech.write() = tech;
                self.refresh()?;
                out.push_str(&self.summary()?);
                None
            }
            Command::Unit { unit_type, tonnage } => {
                let design = UnitDesign::new(format!("New {unit_type:?}"), unit_type, tonnage)
                    .shared();
                self.switch_design(design)?;
                out.push_str(&self.summary()?);
                None
            }
            Command::Quit => None,
        };

        let mut text: String = self
            .events
            .borrow_mut()
            .drain(..)
            .map(|event| format!("{event}\n"))
            .collect();
        if applied == Some(false) {
            text.push_str("no change\n");
        }
        if !out.is_empty() {
            text.push_str(&out);
            if !out.ends_with('\n') {
                text.push('\n');
            }
        }
        Ok(text)
    }

    /// Move every manager to `design`. On failure all of them go back to
    /// the previous design.
    fn switch_design(&mut self, design: SharedDesign) -> Result<()> {
        let previous = std::mem::replace(&mut self.design, design);
        if let Err(err) = self.retarget() {
            self.design = previous;
            if let Err(rollback) = self.retarget() {
                warn!(error = %rollback, "could not restore the previous design");
            }
            return Err(err);
        }
        Ok(())
    }

    fn retarget(&mut self) -> Result<()> {
        self.bays.set_design(&self.design)?;
        self.armor.set_design(&self.design)?;
        self.heat_sinks.set_design(&self.design)?;
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.bays.refresh()?;
        self.armor.refresh()?;
        self.heat_sinks.refresh()?;
        Ok(())
    }

    fn summary(&self) -> Result<String> {
        let unit = self.design.read().clone();
        let tech = self.tech.read().clone();
        let armor_bounds = self.armor.tonnage_bounds()?;
        let heat_bounds = self.heat_sinks.count_bounds()?;

        let mut out = String::new();
        writeln!(
            out,
            "{} ({:?}, {} t) under {}",
            unit.name,
            unit.unit_type,
            unit.tonnage,
            Era(&tech)
        )?;
        writeln!(
            out,
            "  unallocated  {} t",
            self.rules.remaining_weight_budget(&unit)
        )?;
        let points = match self.armor.armor_points()? {
            Some(points) => format!("{points} points"),
            None => "per location".to_string(),
        };
        writeln!(
            out,
            "  armor        {} {} t of {} t ({points}), {}",
            unit.armor.selection,
            self.armor.tonnage()?,
            armor_bounds.max,
            self.armor.resolved_tech_constant()?
        )?;
        writeln!(
            out,
            "  heat sinks   {} x {} (at least {}), {} on the chassis",
            unit.heat_sinks.total_count,
            unit.heat_sinks.selected,
            heat_bounds.min,
            unit.heat_sinks.base_chassis_count
        )?;
        if let Some(free) = self.heat_sinks.free_critical_slot_count()? {
            writeln!(out, "  crit slots   {free} heat sinks outside the engine")?;
        }
        writeln!(
            out,
            "  bays         {} installed, {} of {} doors free, {} personnel",
            unit.bays.len(),
            self.bays.door_budget()?,
            self.bays.max_doors()?,
            self.bays.known_occupants()?
        )?;
        Ok(out)
    }

    fn bay_table(&self, out: &mut String, installed: bool) -> Result<()> {
        let rows = if installed {
            self.bays.installed_rows()?
        } else {
            self.bays.available_rows()?
        };
        if rows.is_empty() {
            out.push_str("(none)\n");
        }
        for row in rows {
            let number = row.bay.map(|bay| bay.to_string()).unwrap_or_default();
            let doors = row.doors.map(|doors| doors.to_string()).unwrap_or_default();
            let tonnage = row.tonnage.map(|t| format!("{t} t")).unwrap_or_default();
            writeln!(
                out,
                "{number:>4} {:<22} {:<24} size {:<6} doors {doors:<3} {tonnage:<10} crew {}",
                row.type_id, row.display_name, row.size, row.occupants
            )?;
        }
        Ok(())
    }

    fn heat_sink_table(&self, out: &mut String) -> Result<()> {
        let selected = self.heat_sinks.selected()?;
        for option in self.heat_sinks.available_options() {
            let mark = if option.key == selected { '*' } else { ' ' };
            match &option.key {
                HeatSinkKey::Aero(kind) => {
                    writeln!(out, "{mark} [{}] {}", kind.index(), option.display_name)?
                }
                HeatSinkKey::Equipment(id) => {
                    writeln!(out, "{mark} {id:<20} {}", option.display_name)?
                }
            }
        }
        Ok(())
    }

    fn heat_sink_key(&self, raw: &str) -> Result<HeatSinkKey> {
        match self.heat_sinks.layout()? {
            HeatSinkLayout::Surface => Ok(HeatSinkKey::Equipment(raw.to_string())),
            HeatSinkLayout::Aerospace => {
                let kind = [AeroHeatSink::Single, AeroHeatSink::Double]
                    .into_iter()
                    .find(|kind| {
                        raw == kind.index().to_string()
                            || raw == HeatSinkKey::Aero(*kind).to_string()
                    })
                    .ok_or_else(|| {
                        anyhow!("aerospace heat sinks are `single` (0) or `double` (1)")
                    })?;
                Ok(HeatSinkKey::Aero(kind))
            }
        }
    }
}

fn collector<E>(events: &Rc<RefCell<Vec<String>>>) -> impl FnMut(&E) + 'static
where
    E: fmt::Display + 'static,
{
    let events = Rc::clone(events);
    move |event: &E| events.borrow_mut().push(event.to_string())
}

/// Tech context as shown in the summary line.
struct Era<'a>(&'a TechContext);

impl fmt::Display for Era<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tech = self.0;
        let mixed = if tech.mixed { " mixed" } else { "" };
        write!(f, "{} {}{} rules, {}", tech.level, tech.base.label(), mixed, tech.year)
    }
}
