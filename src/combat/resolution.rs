//! One round of combat between two fleets, and multi-round battles built
//! from rounds.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::combat::context::{CombatContext, GroupHit};
use crate::combat::effective::fleet_attack_interval_secs;
use crate::combat::fleet::{Fleet, ShipTypeId};
use crate::combat::formation::AttackDirection;
use crate::combat::status::EffectSpec;
use crate::combat::time::{after_secs, Timestamp};
use crate::config::EngineConfig;
use crate::data::catalog::Catalog;
use crate::error::Result;

/// One direction of fire within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub attacker_id: String,
    pub defender_id: String,
    pub direction: AttackDirection,
    pub counter_multiplier: f64,
    pub attack_count: u64,
    /// Volley before distribution and mitigation.
    pub raw_damage: f64,
    pub damage_dealt: f64,
    pub critical: bool,
    pub first_strike: bool,
    pub hits: Vec<GroupHit>,
    pub units_lost: BTreeMap<ShipTypeId, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRoundResult {
    pub at: Timestamp,
    pub attacker_id: String,
    pub defender_id: String,
    pub attacker_damage_dealt: f64,
    pub defender_damage_dealt: f64,
    pub attacker_units_lost: BTreeMap<ShipTypeId, u32>,
    pub defender_units_lost: BTreeMap<ShipTypeId, u32>,
    /// Counter multiplier the attacker's formation had over the defender's.
    pub formation_multiplier: f64,
    pub attack: Option<PhaseReport>,
    pub return_fire: Option<PhaseReport>,
    /// Status effects queued onto the other side, as `(from fleet, effect id)`.
    pub effects_exchanged: Vec<(String, String)>,
}

impl CombatRoundResult {
    fn empty(attacker: &Fleet, defender: &Fleet, at: Timestamp) -> Self {
        Self {
            at,
            attacker_id: attacker.id.clone(),
            defender_id: defender.id.clone(),
            attacker_damage_dealt: 0.0,
            defender_damage_dealt: 0.0,
            attacker_units_lost: BTreeMap::new(),
            defender_units_lost: BTreeMap::new(),
            formation_multiplier: 1.0,
            attack: None,
            return_fire: None,
            effects_exchanged: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attacker,
    Defender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub rounds: Vec<CombatRoundResult>,
    /// `None` when both sides survive the round cap (or both die).
    pub winner: Option<Side>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

/// Resolves rounds against a shared, read-only catalog.
#[derive(Debug, Clone)]
pub struct CombatEngine {
    catalog: Arc<Catalog>,
    config: EngineConfig,
}

impl CombatEngine {
    /// Rejects configs that fail [`EngineConfig::validate`].
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { catalog, config })
    }

    /// Engine with the default config.
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            config: EngineConfig::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One round: `attacker` fires, `defender` returns fire if it survived,
    /// then both sides' status machines push their outgoing effects onto the
    /// other fleet, effective from the next round.
    pub fn execute_round(
        &self,
        attacker: &mut Fleet,
        defender: &mut Fleet,
        now: Timestamp,
    ) -> CombatRoundResult {
        let mut result = CombatRoundResult::empty(attacker, defender, now);

        for fleet in [&mut *attacker, &mut *defender] {
            if let Some(machine) = fleet.status.as_mut() {
                machine.advance(now);
            }
            fleet.abilities.prune(now);
        }

        if !attacker.is_alive() || !defender.is_alive() {
            tracing::debug!(attacker = %attacker.id, defender = %defender.id, "round skipped; a side is already destroyed");
            return result;
        }

        let attack = self.run_phase(attacker, defender, now);
        result.formation_multiplier = attack.counter_multiplier;
        result.attacker_damage_dealt = attack.damage_dealt;
        result.defender_units_lost = attack.units_lost.clone();
        result.attack = Some(attack);

        if defender.is_alive() {
            let reply = self.run_phase(defender, attacker, now);
            result.defender_damage_dealt = reply.damage_dealt;
            result.attacker_units_lost = reply.units_lost.clone();
            result.return_fire = Some(reply);
        }

        result.effects_exchanged = exchange_effects(attacker, defender, now);

        tracing::debug!(
            attacker = %attacker.id,
            defender = %defender.id,
            dealt = result.attacker_damage_dealt,
            received = result.defender_damage_dealt,
            "round resolved"
        );
        result
    }

    fn run_phase(&self, attacker: &mut Fleet, defender: &mut Fleet, now: Timestamp) -> PhaseReport {
        attacker.counters.attacks += 1;
        defender.counters.defenses += 1;

        let context = CombatContext::build(&self.catalog, &self.config, attacker, defender, now);
        let hits = context.resolve_against(&self.catalog, &self.config, defender, now);

        let mut damage_dealt = 0.0;
        let mut units_lost = BTreeMap::new();
        for hit in &hits {
            let Some(group) = defender.groups.get_mut(&hit.ship_type) else {
                continue;
            };
            damage_dealt += hit.damage;
            let lost = group.apply_damage(hit.damage);
            if lost > 0 {
                units_lost.insert(hit.ship_type.clone(), lost);
            }
        }
        defender.refresh_assignments(&self.catalog);

        tracing::debug!(
            attacker = %attacker.id,
            defender = %defender.id,
            direction = ?context.direction,
            raw = context.total_damage,
            dealt = damage_dealt,
            critical = context.critical(),
            "phase resolved"
        );

        PhaseReport {
            attacker_id: attacker.id.clone(),
            defender_id: defender.id.clone(),
            direction: context.direction,
            counter_multiplier: context.counter_multiplier,
            attack_count: context.attack_count,
            raw_damage: context.total_damage,
            damage_dealt,
            critical: context.critical(),
            first_strike: context.first_strike(),
            hits,
            units_lost,
        }
    }

    /// Runs rounds from `start` until a side is destroyed or `max_rounds`
    /// have been fought. The clock advances by the attacker's effective
    /// attack interval after each round.
    pub fn simulate_battle(
        &self,
        attacker: &mut Fleet,
        defender: &mut Fleet,
        start: Timestamp,
        max_rounds: u32,
    ) -> BattleSummary {
        let mut now = start;
        let mut rounds = Vec::new();
        for _ in 0..max_rounds {
            if !attacker.is_alive() || !defender.is_alive() {
                break;
            }
            rounds.push(self.execute_round(attacker, defender, now));
            let interval = fleet_attack_interval_secs(&self.catalog, &self.config, attacker, now);
            now = after_secs(now, interval);
        }

        let winner = match (attacker.is_alive(), defender.is_alive()) {
            (true, false) => Some(Side::Attacker),
            (false, true) => Some(Side::Defender),
            _ => None,
        };
        tracing::debug!(rounds = rounds.len(), ?winner, "battle finished");
        BattleSummary {
            rounds,
            winner,
            started_at: start,
            finished_at: now,
        }
    }
}

/// Pushes each living side's outgoing status effects onto the other fleet.
fn exchange_effects(attacker: &mut Fleet, defender: &mut Fleet, now: Timestamp) -> Vec<(String, String)> {
    let from_attacker = outgoing(attacker);
    let from_defender = outgoing(defender);
    let attacker_id = attacker.id.clone();
    let defender_id = defender.id.clone();
    let mut exchanged = Vec::new();

    for (source, target, effects) in [
        (attacker_id, &mut *defender, from_attacker),
        (defender_id, &mut *attacker, from_defender),
    ] {
        for (node_id, effect) in effects {
            target
                .status_mut()
                .apply_inbound_effect(&effect, &format!("{source}:{node_id}"), now);
            exchanged.push((source.clone(), effect.id));
        }
    }
    exchanged
}

fn outgoing(fleet: &Fleet) -> Vec<(String, EffectSpec)> {
    if !fleet.is_alive() {
        return Vec::new();
    }
    fleet
        .status
        .as_ref()
        .map(|machine| machine.outgoing_effects())
        .unwrap_or_default()
}
