//! Effective stats for one ship group: gather every layer that reaches the
//! group into a [ModifierStack], resolve it, and fold the result into the
//! ship type's base spec.
//!
//! Layer order follows the priority bands: equipment, posture, formation
//! position, environment (and caller-supplied synergy), status machine,
//! active abilities, then inbound buffs and debuffs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::fleet::{ship_spec, Fleet, ShipTypeId};
use crate::combat::modifier::{DamageChannel, StatModifier};
use crate::combat::stacking::{
    FormationCondition, LayerSummary, ModifierLayer, ModifierStack, ResolveContext, SourceKind,
};
use crate::combat::time::Timestamp;
use crate::config::EngineConfig;
use crate::data::catalog::Catalog;
use crate::data::ship::ShipSpec;

/// Stats of one unit after modifiers. Shields are kept raw (possibly
/// negative); mitigation floors them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveStats {
    pub ship_type: ShipTypeId,
    pub channel: DamageChannel,
    pub damage_per_unit: f64,
    pub shields: BTreeMap<DamageChannel, f64>,
    pub shield_pierce: f64,
    pub evasion: f64,
    pub accuracy: f64,
    pub crit_chance: f64,
    pub crit_multiplier: f64,
    pub first_strike: f64,
    pub speed: f64,
    pub attack_interval_secs: f64,
    pub ignore_counter: bool,
    pub evasion_lock: bool,
}

impl EffectiveStats {
    pub fn from_parts(spec: &ShipSpec, modifier: &StatModifier, config: &EngineConfig) -> Self {
        let shields = DamageChannel::ALL
            .iter()
            .map(|channel| {
                (
                    *channel,
                    spec.shield(*channel) + modifier.shield(*channel) as f64,
                )
            })
            .collect();
        let damage =
            (spec.damage + modifier.damage_flat as f64) * (1.0 + modifier.damage_pct);
        let interval =
            spec.attack_interval_secs * (1.0 + modifier.attack_interval_pct);

        Self {
            ship_type: spec.id.clone(),
            channel: spec.channel,
            damage_per_unit: damage.max(0.0),
            shields,
            shield_pierce: (spec.shield_pierce + modifier.shield_pierce_pct).clamp(0.0, 1.0),
            evasion: spec.evasion + modifier.evasion_pct,
            accuracy: spec.accuracy + modifier.accuracy_pct,
            crit_chance: (spec.crit_chance + modifier.crit_chance_pct).clamp(0.0, 1.0),
            crit_multiplier: (spec.crit_multiplier + modifier.crit_damage_pct).max(1.0),
            first_strike: (spec.first_strike + modifier.first_strike_pct).max(0.0),
            speed: (spec.speed + modifier.speed as f64).max(0.0),
            attack_interval_secs: if interval.is_finite() {
                interval.max(config.min_attack_interval_secs)
            } else {
                config.min_attack_interval_secs
            },
            ignore_counter: modifier.ignore_counter,
            evasion_lock: modifier.evasion_lock,
        }
    }

    pub fn shield(&self, channel: DamageChannel) -> f64 {
        self.shields.get(&channel).copied().unwrap_or(0.0)
    }

    /// Evasion the defender actually gets; zero under an evasion lock.
    pub fn usable_evasion(&self) -> f64 {
        if self.evasion_lock {
            0.0
        } else {
            self.evasion
        }
    }
}

fn flagged(kind: SourceKind, id: &str, what: &str, now: Timestamp) -> ModifierLayer {
    tracing::warn!(id, what, "catalog lookup failed; using zero modifier");
    ModifierLayer::new(
        kind,
        id,
        format!("unknown {what} '{id}'"),
        StatModifier::ZERO,
        now,
    )
}

/// Every layer that reaches `ship_type` in `fleet` at `now`.
pub fn build_stack(
    catalog: &Catalog,
    fleet: &Fleet,
    ship_type: &str,
    now: Timestamp,
) -> ModifierStack {
    let mut stack = ModifierStack::new();

    for gem_id in fleet.loadout(ship_type) {
        let layer = match catalog.gem(gem_id) {
            Some(gem) => ModifierLayer::new(
                SourceKind::Equipment,
                gem_id.as_str(),
                gem.name.clone().unwrap_or_else(|| gem_id.clone()),
                gem.modifier,
                now,
            ),
            None => flagged(SourceKind::Equipment, gem_id, "gem", now),
        };
        stack.push(layer);
    }

    if let Some(posture_id) = fleet.posture.as_deref() {
        let layer = match catalog.posture(posture_id) {
            Some(posture) => ModifierLayer::new(
                SourceKind::Posture,
                posture_id,
                posture.name.clone().unwrap_or_else(|| posture_id.to_string()),
                posture.modifier,
                now,
            )
            .when(posture.combat),
            None => flagged(SourceKind::Posture, posture_id, "posture", now),
        };
        stack.push(layer);
    }

    if let Some(formation) = fleet.formation.as_ref() {
        let default = ship_spec(catalog, ship_type).default_position;
        let position = formation.position_of(ship_type, default);
        if let Some(bonus) = catalog.position_bonus(formation.formation_type, position) {
            stack.push(
                ModifierLayer::new(
                    SourceKind::FormationPosition,
                    format!("{}:{}", formation.formation_type.as_str(), position.as_str()),
                    format!(
                        "{} formation, {} position",
                        formation.formation_type.as_str(),
                        position.as_str()
                    ),
                    *bonus,
                    now,
                )
                .requiring(FormationCondition::RequiresFormation),
            );
        }
    }

    stack.extend(fleet.environment.iter().cloned());

    if let Some(machine) = fleet.status.as_ref() {
        stack.extend(machine.collect_active_layers(ship_type, now));
        stack.extend(machine.inbound_layers(now));
    }

    stack.extend(fleet.abilities.active_layers(catalog, ship_type, now));
    stack
}

/// Resolve context for `fleet` at `now`.
pub fn resolve_context(fleet: &Fleet, now: Timestamp, in_combat: bool) -> ResolveContext {
    if in_combat {
        ResolveContext::combat(now, fleet.has_formation())
    } else {
        ResolveContext::idle(now, fleet.has_formation())
    }
}

pub fn effective_stats(
    catalog: &Catalog,
    config: &EngineConfig,
    fleet: &Fleet,
    ship_type: &str,
    now: Timestamp,
    in_combat: bool,
) -> EffectiveStats {
    let stack = build_stack(catalog, fleet, ship_type, now);
    let modifier = stack.resolve(&resolve_context(fleet, now, in_combat));
    EffectiveStats::from_parts(&ship_spec(catalog, ship_type), &modifier, config)
}

/// Resolved modifier plus the per-layer breakdown, for display.
pub fn stat_breakdown(
    catalog: &Catalog,
    fleet: &Fleet,
    ship_type: &str,
    now: Timestamp,
    in_combat: bool,
) -> (StatModifier, Vec<LayerSummary>) {
    let stack = build_stack(catalog, fleet, ship_type, now);
    let context = resolve_context(fleet, now, in_combat);
    (stack.resolve(&context), stack.summarize(&context))
}

/// Slowest living speed; a fleet moves as fast as its slowest group.
pub fn fleet_speed(catalog: &Catalog, config: &EngineConfig, fleet: &Fleet, now: Timestamp) -> f64 {
    fleet
        .living_types()
        .map(|t| effective_stats(catalog, config, fleet, t, now, false).speed)
        .reduce(f64::min)
        .unwrap_or(0.0)
}

/// Longest effective attack interval among living groups; the fleet fires
/// once every group is ready.
pub fn fleet_attack_interval_secs(
    catalog: &Catalog,
    config: &EngineConfig,
    fleet: &Fleet,
    now: Timestamp,
) -> f64 {
    fleet
        .living_types()
        .map(|t| effective_stats(catalog, config, fleet, t, now, true).attack_interval_secs)
        .reduce(f64::max)
        .unwrap_or(config.min_attack_interval_secs)
}
