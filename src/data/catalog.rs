//! Static game catalog: ship specs, gems, postures, abilities, formation
//! position bonuses and the formation counter table.
//!
//! Built once at startup (from YAML or JSON) and shared read-only, usually as
//! `Arc<Catalog>` inside [crate::combat::CombatEngine]. Tests build fixtures
//! with the `with_*` helpers instead of touching files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::combat::fleet::ShipTypeId;
use crate::combat::formation::{FormationType, Position};
use crate::combat::modifier::StatModifier;
use crate::combat::stacking::CombatCondition;
use crate::config::is_yaml;
use crate::data::ship::ShipSpec;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub modifier: StatModifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub modifier: StatModifier,
    #[serde(default)]
    pub combat: CombatCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Ship type that carries the ability. `None` = fleet-wide.
    #[serde(default)]
    pub ship_type: Option<ShipTypeId>,
    pub duration_secs: f64,
    #[serde(default)]
    pub cooldown_secs: f64,
    pub modifier: StatModifier,
    #[serde(default = "default_true")]
    pub combat_only: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationDef {
    pub formation_type: FormationType,
    #[serde(default)]
    pub positions: BTreeMap<Position, StatModifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterEntry {
    pub attacker: FormationType,
    pub defender: FormationType,
    pub multiplier: f64,
}

/// On-disk shape: flat lists, indexed into maps by [Catalog::from_file].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    pub ships: Vec<ShipSpec>,
    pub gems: Vec<GemDef>,
    pub postures: Vec<PostureDef>,
    pub abilities: Vec<AbilityDef>,
    pub formations: Vec<FormationDef>,
    pub counters: Vec<CounterEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    ships: BTreeMap<ShipTypeId, ShipSpec>,
    gems: BTreeMap<String, GemDef>,
    postures: BTreeMap<String, PostureDef>,
    abilities: BTreeMap<String, AbilityDef>,
    formations: BTreeMap<FormationType, FormationDef>,
    counters: BTreeMap<(FormationType, FormationType), f64>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a parsed file. Later duplicates replace earlier ones;
    /// [crate::data::validate::validate_catalog_file] reports them.
    pub fn from_file(file: CatalogFile) -> Self {
        let mut catalog = Self::new();
        for ship in file.ships {
            catalog.ships.insert(ship.id.clone(), ship);
        }
        for gem in file.gems {
            catalog.gems.insert(gem.id.clone(), gem);
        }
        for posture in file.postures {
            catalog.postures.insert(posture.id.clone(), posture);
        }
        for ability in file.abilities {
            catalog.abilities.insert(ability.id.clone(), ability);
        }
        for formation in file.formations {
            catalog.formations.insert(formation.formation_type, formation);
        }
        for counter in file.counters {
            catalog
                .counters
                .insert((counter.attacker, counter.defender), counter.multiplier);
        }
        catalog
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    pub fn with_ship(mut self, ship: ShipSpec) -> Self {
        self.ships.insert(ship.id.clone(), ship);
        self
    }

    pub fn with_gem(mut self, id: impl Into<String>, modifier: StatModifier) -> Self {
        let id = id.into();
        self.gems.insert(
            id.clone(),
            GemDef {
                id,
                name: None,
                modifier,
            },
        );
        self
    }

    pub fn with_posture(mut self, id: impl Into<String>, modifier: StatModifier) -> Self {
        let id = id.into();
        self.postures.insert(
            id.clone(),
            PostureDef {
                id,
                name: None,
                modifier,
                combat: CombatCondition::Always,
            },
        );
        self
    }

    pub fn with_ability(mut self, ability: AbilityDef) -> Self {
        self.abilities.insert(ability.id.clone(), ability);
        self
    }

    pub fn with_position_bonus(
        mut self,
        formation_type: FormationType,
        position: Position,
        modifier: StatModifier,
    ) -> Self {
        self.formations
            .entry(formation_type)
            .or_insert_with(|| FormationDef {
                formation_type,
                positions: BTreeMap::new(),
            })
            .positions
            .insert(position, modifier);
        self
    }

    pub fn with_counter(
        mut self,
        attacker: FormationType,
        defender: FormationType,
        multiplier: f64,
    ) -> Self {
        self.counters.insert((attacker, defender), multiplier);
        self
    }

    pub fn ship(&self, id: &str) -> Option<&ShipSpec> {
        self.ships.get(id)
    }

    pub fn ships(&self) -> impl Iterator<Item = &ShipSpec> {
        self.ships.values()
    }

    pub fn gem(&self, id: &str) -> Option<&GemDef> {
        self.gems.get(id)
    }

    pub fn posture(&self, id: &str) -> Option<&PostureDef> {
        self.postures.get(id)
    }

    pub fn ability(&self, id: &str) -> Option<&AbilityDef> {
        self.abilities.get(id)
    }

    pub fn abilities(&self) -> impl Iterator<Item = &AbilityDef> {
        self.abilities.values()
    }

    pub fn formation(&self, formation_type: FormationType) -> Option<&FormationDef> {
        self.formations.get(&formation_type)
    }

    pub fn position_bonus(
        &self,
        formation_type: FormationType,
        position: Position,
    ) -> Option<&StatModifier> {
        self.formation(formation_type)?.positions.get(&position)
    }

    /// Damage multiplier for `attacker` formation hitting `defender`
    /// formation. 1.0 when either side has no formation or the pair is not
    /// listed.
    pub fn counter_multiplier(
        &self,
        attacker: Option<FormationType>,
        defender: Option<FormationType>,
    ) -> f64 {
        match (attacker, defender) {
            (Some(a), Some(d)) => self.counters.get(&(a, d)).copied().unwrap_or(1.0),
            _ => 1.0,
        }
    }

    pub fn counters(&self) -> impl Iterator<Item = (FormationType, FormationType, f64)> + '_ {
        self.counters.iter().map(|((a, d), m)| (*a, *d, *m))
    }
}

/// Reads a catalog file without indexing it (validation wants the raw lists).
pub fn load_catalog_file(path: impl AsRef<Path>) -> Result<CatalogFile> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let file = if is_yaml(path) {
        serde_yaml::from_str(&raw)?
    } else {
        serde_json::from_str(&raw)?
    };
    Ok(file)
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let file = load_catalog_file(path)?;
    Ok(Catalog::from_file(file))
}
