//! Fleet state the engine mutates: ship groups with HP buckets, loadouts,
//! posture, formation, status machine, ability history and battle counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::abilities::{AbilityActivation, AbilityBook, ActivationOutcome};
use crate::combat::engine::EPSILON;
use crate::combat::formation::{FormationState, FormationType};
use crate::combat::stacking::ModifierLayer;
use crate::combat::status::StatusMachine;
use crate::combat::time::Timestamp;
use crate::data::catalog::Catalog;
use crate::data::ship::ShipSpec;

pub type ShipTypeId = String;

/// `count` units that each have `hp_per_unit` HP left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HpBucket {
    pub hp_per_unit: f64,
    pub count: u32,
}

impl HpBucket {
    pub fn total_hp(&self) -> f64 {
        self.hp_per_unit * self.count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipGroup {
    #[serde(default)]
    pub buckets: Vec<HpBucket>,
}

impl ShipGroup {
    pub fn new(count: u32, hp_per_unit: f64) -> Self {
        let mut group = Self::default();
        if count > 0 && hp_per_unit > 0.0 {
            group.buckets.push(HpBucket { hp_per_unit, count });
        }
        group
    }

    pub fn units(&self) -> u32 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn total_hp(&self) -> f64 {
        self.buckets.iter().map(HpBucket::total_hp).sum()
    }

    pub fn is_destroyed(&self) -> bool {
        self.units() == 0
    }

    /// Applies `damage` to the weakest units first. A bucket whose HP runs
    /// out is destroyed and the rest spills into the next one; the bucket
    /// that absorbs the remainder is split into full units plus at most one
    /// damaged unit. Returns the number of units lost.
    pub fn apply_damage(&mut self, damage: f64) -> u32 {
        if !(damage > 0.0) || self.is_destroyed() {
            return 0;
        }
        let before = self.units();
        self.buckets
            .sort_by(|a, b| a.hp_per_unit.total_cmp(&b.hp_per_unit));

        let mut remaining = damage;
        let mut next = Vec::with_capacity(self.buckets.len() + 1);
        for bucket in self.buckets.drain(..) {
            if remaining <= 0.0 {
                next.push(bucket);
                continue;
            }
            let total = bucket.total_hp();
            if total <= remaining + EPSILON {
                remaining -= total;
                continue;
            }
            let left = total - remaining;
            remaining = 0.0;

            let mut full = (left / bucket.hp_per_unit).floor();
            let mut partial = left - full * bucket.hp_per_unit;
            if partial > bucket.hp_per_unit - 1e-6 {
                full += 1.0;
                partial = 0.0;
            }
            if full >= 1.0 {
                next.push(HpBucket {
                    hp_per_unit: bucket.hp_per_unit,
                    count: full as u32,
                });
            }
            if partial > 1e-6 {
                next.push(HpBucket {
                    hp_per_unit: partial,
                    count: 1,
                });
            }
        }
        self.buckets = next;
        self.merge_buckets();
        before - self.units()
    }

    fn merge_buckets(&mut self) {
        self.buckets
            .sort_by(|a, b| a.hp_per_unit.total_cmp(&b.hp_per_unit));
        let mut merged: Vec<HpBucket> = Vec::with_capacity(self.buckets.len());
        for bucket in self.buckets.drain(..) {
            if bucket.count == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(last) if (last.hp_per_unit - bucket.hp_per_unit).abs() < 1e-6 => {
                    last.count += bucket.count;
                }
                _ => merged.push(bucket),
            }
        }
        self.buckets = merged;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleCounters {
    pub attacks: u64,
    pub defenses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    pub id: String,
    #[serde(default)]
    pub groups: BTreeMap<ShipTypeId, ShipGroup>,
    #[serde(default)]
    pub posture: Option<String>,
    /// Gem ids equipped per ship type.
    #[serde(default)]
    pub loadouts: BTreeMap<ShipTypeId, Vec<String>>,
    #[serde(default)]
    pub formation: Option<FormationState>,
    #[serde(default)]
    pub status: Option<StatusMachine>,
    #[serde(default)]
    pub abilities: AbilityBook,
    /// Caller-supplied layers (terrain, weather, synergy, events).
    #[serde(default)]
    pub environment: Vec<ModifierLayer>,
    #[serde(default)]
    pub counters: BattleCounters,
}

impl Fleet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            groups: BTreeMap::new(),
            posture: None,
            loadouts: BTreeMap::new(),
            formation: None,
            status: None,
            abilities: AbilityBook::new(),
            environment: Vec::new(),
            counters: BattleCounters::default(),
        }
    }

    /// Adds `count` full-HP units of `ship_type`, taking HP from the catalog.
    pub fn with_ships(mut self, catalog: &Catalog, ship_type: &str, count: u32) -> Self {
        self.add_ships(catalog, ship_type, count);
        self
    }

    pub fn add_ships(&mut self, catalog: &Catalog, ship_type: &str, count: u32) {
        let hp = ship_spec(catalog, ship_type).hp;
        let group = self.groups.entry(ship_type.to_string()).or_default();
        if count > 0 && hp > 0.0 {
            group.buckets.push(HpBucket {
                hp_per_unit: hp,
                count,
            });
            group.merge_buckets();
        }
        self.refresh_assignments(catalog);
    }

    pub fn with_gem(mut self, ship_type: &str, gem_id: impl Into<String>) -> Self {
        self.loadouts
            .entry(ship_type.to_string())
            .or_default()
            .push(gem_id.into());
        self
    }

    pub fn with_posture(mut self, posture_id: impl Into<String>) -> Self {
        self.posture = Some(posture_id.into());
        self
    }

    pub fn with_formation(mut self, catalog: &Catalog, formation: FormationState) -> Self {
        self.set_formation(catalog, Some(formation));
        self
    }

    pub fn with_status(mut self, machine: StatusMachine) -> Self {
        self.status = Some(machine);
        self
    }

    pub fn with_environment(mut self, layer: ModifierLayer) -> Self {
        self.environment.push(layer);
        self
    }

    pub fn set_formation(&mut self, catalog: &Catalog, formation: Option<FormationState>) {
        self.formation = formation;
        self.refresh_assignments(catalog);
    }

    pub fn formation_type(&self) -> Option<FormationType> {
        self.formation.as_ref().map(|f| f.formation_type)
    }

    pub fn has_formation(&self) -> bool {
        self.formation.is_some()
    }

    pub fn loadout(&self, ship_type: &str) -> &[String] {
        self.loadouts.get(ship_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn status_mut(&mut self) -> &mut StatusMachine {
        self.status.get_or_insert_with(StatusMachine::new)
    }

    pub fn is_alive(&self) -> bool {
        self.groups.values().any(|g| !g.is_destroyed())
    }

    pub fn total_units(&self) -> u32 {
        self.groups.values().map(ShipGroup::units).sum()
    }

    pub fn units_by_type(&self) -> BTreeMap<ShipTypeId, u32> {
        self.groups
            .iter()
            .map(|(ship_type, group)| (ship_type.clone(), group.units()))
            .collect()
    }

    /// Ship types with at least one unit left, in id order.
    pub fn living_types(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .filter(|(_, g)| !g.is_destroyed())
            .map(|(ship_type, _)| ship_type.as_str())
    }

    /// Recomputes the formation's HP-per-position cache from current
    /// buckets. No-op without a formation.
    pub fn refresh_assignments(&mut self, catalog: &Catalog) {
        let Some(formation) = self.formation.as_mut() else {
            return;
        };
        let entries: Vec<(&str, _, f64)> = self
            .groups
            .iter()
            .map(|(ship_type, group)| {
                let default = ship_spec(catalog, ship_type).default_position;
                (
                    ship_type.as_str(),
                    formation.position_of(ship_type, default),
                    group.total_hp(),
                )
            })
            .collect();
        formation.reassign(entries);
    }

    pub fn reset_counters(&mut self) {
        self.counters = BattleCounters::default();
    }

    /// Starts `ability_id` at `now`: records the activation and triggers the
    /// status machine nodes that listen for it.
    pub fn activate_ability(
        &mut self,
        catalog: &Catalog,
        ability_id: &str,
        now: Timestamp,
    ) -> ActivationOutcome {
        let Some(def) = catalog.ability(ability_id) else {
            tracing::warn!(fleet = %self.id, ability = ability_id, "unknown ability");
            return ActivationOutcome::UnknownAbility;
        };
        if let Some(ready_at) = self.abilities.ready_at(ability_id, now) {
            return ActivationOutcome::OnCooldown { ready_at };
        }
        if let Some(ship_type) = def.ship_type.as_deref() {
            let carried = self.groups.get(ship_type).is_some_and(|g| !g.is_destroyed());
            if !carried {
                return ActivationOutcome::NoCarrier;
            }
        }

        self.abilities.prune(now);
        let activation = AbilityActivation::from_def(def, now);
        let ends_at = activation.ends_at;
        self.abilities.record(activation);
        let nodes_triggered = match self.status.as_mut() {
            Some(machine) => machine.on_ability_activated(ability_id, def.ship_type.as_deref(), now),
            None => 0,
        };
        tracing::debug!(fleet = %self.id, ability = ability_id, nodes_triggered, "ability activated");
        ActivationOutcome::Activated {
            ends_at,
            nodes_triggered,
        }
    }
}

/// Catalog spec for `ship_type`, or a zero-stat placeholder with a warning.
pub(crate) fn ship_spec(catalog: &Catalog, ship_type: &str) -> ShipSpec {
    match catalog.ship(ship_type) {
        Some(spec) => spec.clone(),
        None => {
            tracing::warn!(ship_type, "ship type missing from catalog");
            ShipSpec::placeholder(ship_type)
        }
    }
}
