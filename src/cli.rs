use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::combat::{
    stat_breakdown, CombatEngine, Fleet, FormationState, LayerSummary, ModifierLayer,
    StatModifier, StatusMachine, Timestamp,
};
use crate::config::{is_yaml, load_config, EngineConfig};
use crate::data::catalog::{load_catalog_file, Catalog, CatalogFile};
use crate::data::validate::{validate_catalog_file, ValidationSeverity};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Simulate,
    Breakdown,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("simulate") => Some(Command::Simulate),
        Some("breakdown") => Some(Command::Breakdown),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Simulate) => handle_simulate(args),
        Some(Command::Breakdown) => handle_breakdown(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("usage: fleetcore <simulate|breakdown|validate>");
            2
        }
    }
}

/// One side of a scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSetup {
    pub id: String,
    /// Unit count per ship type.
    pub ships: BTreeMap<String, u32>,
    pub posture: Option<String>,
    pub loadouts: BTreeMap<String, Vec<String>>,
    pub formation: Option<FormationState>,
    pub status: Option<StatusMachine>,
    /// Abilities activated at the scenario start.
    pub abilities: Vec<String>,
    pub environment: Vec<ModifierLayer>,
}

impl FleetSetup {
    pub fn build(&self, catalog: &Catalog, start: Timestamp) -> Fleet {
        let mut fleet = Fleet::new(self.id.clone());
        for (ship_type, count) in &self.ships {
            fleet.add_ships(catalog, ship_type, *count);
        }
        fleet.posture = self.posture.clone();
        fleet.loadouts = self.loadouts.clone();
        fleet.status = self.status.clone();
        fleet.environment = self.environment.clone();
        fleet.set_formation(catalog, self.formation.clone());
        for ability in &self.abilities {
            let outcome = fleet.activate_ability(catalog, ability, start);
            if !outcome.is_activated() {
                tracing::warn!(fleet = %self.id, ability = %ability, ?outcome, "scenario ability not activated");
            }
        }
        fleet
    }
}

/// Battle setup read by `simulate` and `breakdown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Catalog file, relative to the scenario file.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// Inline catalog, merged after `catalog_path` entries.
    #[serde(default)]
    pub catalog: Option<CatalogFile>,
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default = "default_start")]
    pub start: Timestamp,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    pub attacker: FleetSetup,
    pub defender: FleetSetup,
}

fn default_start() -> Timestamp {
    DateTime::<Utc>::UNIX_EPOCH
}

fn default_max_rounds() -> u32 {
    20
}

pub struct LoadedScenario {
    pub scenario: Scenario,
    pub engine: CombatEngine,
}

pub fn load_scenario(path: impl AsRef<Path>) -> Result<LoadedScenario> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let scenario: Scenario = if is_yaml(path) {
        serde_yaml::from_str(&raw)?
    } else {
        serde_json::from_str(&raw)?
    };
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut file = match &scenario.catalog_path {
        Some(catalog_path) => load_catalog_file(base.join(catalog_path))?,
        None => CatalogFile::default(),
    };
    if let Some(inline) = scenario.catalog.clone() {
        file.ships.extend(inline.ships);
        file.gems.extend(inline.gems);
        file.postures.extend(inline.postures);
        file.abilities.extend(inline.abilities);
        file.formations.extend(inline.formations);
        file.counters.extend(inline.counters);
    }
    let report = validate_catalog_file(&file);
    if report.has_errors() {
        let first = report
            .diagnostics
            .iter()
            .find(|d| d.severity == ValidationSeverity::Error)
            .map(ToString::to_string)
            .unwrap_or_default();
        return Err(EngineError::InvalidCatalog(first));
    }

    let config = match &scenario.config_path {
        Some(config_path) => load_config(base.join(config_path))?,
        None => EngineConfig::default(),
    };
    let engine = CombatEngine::new(Arc::new(Catalog::from_file(file)), config)?;
    Ok(LoadedScenario { scenario, engine })
}

fn handle_simulate(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: fleetcore simulate <scenario.yaml> [max_rounds]");
        return 2;
    };
    let loaded = match load_scenario(path) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("failed to load scenario: {err}");
            return 1;
        }
    };
    let LoadedScenario { scenario, engine } = loaded;
    let max_rounds = parse_u32_arg(args.get(3), "max_rounds", scenario.max_rounds);

    let mut attacker = scenario.attacker.build(engine.catalog(), scenario.start);
    let mut defender = scenario.defender.build(engine.catalog(), scenario.start);
    let summary = engine.simulate_battle(&mut attacker, &mut defender, scenario.start, max_rounds);

    match serde_json::to_string_pretty(&summary) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize battle summary: {err}");
            1
        }
    }
}

#[derive(Debug, Serialize)]
struct GroupBreakdown {
    fleet: String,
    ship_type: String,
    resolved: StatModifier,
    layers: Vec<LayerSummary>,
}

fn handle_breakdown(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: fleetcore breakdown <scenario.yaml>");
        return 2;
    };
    let LoadedScenario { scenario, engine } = match load_scenario(path) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("failed to load scenario: {err}");
            return 1;
        }
    };

    let mut rows = Vec::new();
    for setup in [&scenario.attacker, &scenario.defender] {
        let fleet = setup.build(engine.catalog(), scenario.start);
        for ship_type in fleet.living_types() {
            let (resolved, layers) =
                stat_breakdown(engine.catalog(), &fleet, ship_type, scenario.start, true);
            rows.push(GroupBreakdown {
                fleet: fleet.id.clone(),
                ship_type: ship_type.to_string(),
                resolved,
                layers,
            });
        }
    }

    match serde_json::to_string_pretty(&rows) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize breakdown: {err}");
            1
        }
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: fleetcore validate <catalog.yaml>");
        return 2;
    };

    let file = match load_catalog_file(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to load catalog: {err}");
            return 1;
        }
    };
    let report = validate_catalog_file(&file);
    for diag in &report.diagnostics {
        eprintln!("- {diag}");
    }
    if report.has_errors() {
        eprintln!(
            "validation failed: {} error(s)",
            report.count(ValidationSeverity::Error)
        );
        1
    } else {
        println!(
            "validation passed: {path} ({} warning(s))",
            report.count(ValidationSeverity::Warning)
        );
        0
    }
}

fn parse_u32_arg(raw: Option<&String>, name: &str, default: u32) -> u32 {
    raw.and_then(|value| value.parse::<u32>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}
