//! Combat context: everything one attack direction (attacker -> defender)
//! needs, computed once per phase and dropped afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::effective::effective_stats;
use crate::combat::engine::{
    effective_shield, evasion_multiplier, is_critical, is_first_strike, mitigate, EPSILON,
};
use crate::combat::fleet::{Fleet, ShipTypeId};
use crate::combat::formation::{attack_direction, AttackDirection};
use crate::combat::modifier::DamageChannel;
use crate::combat::time::Timestamp;
use crate::config::EngineConfig;
use crate::data::catalog::Catalog;

/// Outgoing damage of one attacker ship group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupVolley {
    pub ship_type: ShipTypeId,
    pub channel: DamageChannel,
    pub units: u32,
    pub damage: f64,
    pub critical: bool,
    pub first_strike: bool,
    /// Counter multiplier this group actually used.
    pub counter_multiplier: f64,
}

/// Damage one defender ship group takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupHit {
    pub ship_type: ShipTypeId,
    /// Share of the raw volley routed to this group.
    pub assigned: f64,
    /// After shield mitigation, before evasion.
    pub mitigated: f64,
    pub damage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatContext {
    pub direction: AttackDirection,
    pub counter_multiplier: f64,
    /// Attacker's attack count for this phase (1 = first attack).
    pub attack_count: u64,
    pub volleys: Vec<GroupVolley>,
    pub damage_by_channel: BTreeMap<DamageChannel, f64>,
    pub total_damage: f64,
    /// Damage-weighted over attacker groups.
    pub shield_pierce: f64,
    /// Damage-weighted over attacker groups.
    pub accuracy: f64,
}

impl CombatContext {
    /// Builds the context for `attacker` hitting `defender` at `now`. The
    /// attacker's attack counter must already include this attack.
    pub fn build(
        catalog: &Catalog,
        config: &EngineConfig,
        attacker: &Fleet,
        defender: &Fleet,
        now: Timestamp,
    ) -> Self {
        let direction = attack_direction(attacker.formation_type(), defender.formation_type());
        let counter_multiplier =
            catalog.counter_multiplier(attacker.formation_type(), defender.formation_type());
        let attack_count = attacker.counters.attacks;

        let mut volleys = Vec::new();
        let mut damage_by_channel: BTreeMap<DamageChannel, f64> = BTreeMap::new();
        let mut total_damage = 0.0;
        let mut pierce_weighted = 0.0;
        let mut accuracy_weighted = 0.0;

        for ship_type in attacker.living_types() {
            let units = attacker.groups[ship_type].units();
            let stats = effective_stats(catalog, config, attacker, ship_type, now, true);
            let mut damage = stats.damage_per_unit * units as f64;

            let first_strike = is_first_strike(attack_count) && stats.first_strike > 0.0;
            if first_strike {
                damage *= 1.0 + stats.first_strike;
            }
            let critical = is_critical(attack_count, stats.crit_chance);
            if critical {
                damage *= stats.crit_multiplier;
            }
            let group_counter = if stats.ignore_counter && counter_multiplier < 1.0 {
                1.0
            } else {
                counter_multiplier
            };
            damage *= group_counter;

            if damage > 0.0 {
                *damage_by_channel.entry(stats.channel).or_default() += damage;
                total_damage += damage;
                pierce_weighted += stats.shield_pierce * damage;
                accuracy_weighted += stats.accuracy * damage;
            }
            volleys.push(GroupVolley {
                ship_type: ship_type.to_string(),
                channel: stats.channel,
                units,
                damage: damage.max(0.0),
                critical,
                first_strike,
                counter_multiplier: group_counter,
            });
        }

        let (shield_pierce, accuracy) = if total_damage > EPSILON {
            (pierce_weighted / total_damage, accuracy_weighted / total_damage)
        } else {
            (0.0, 0.0)
        };

        Self {
            direction,
            counter_multiplier,
            attack_count,
            volleys,
            damage_by_channel,
            total_damage,
            shield_pierce,
            accuracy,
        }
    }

    pub fn critical(&self) -> bool {
        self.volleys.iter().any(|v| v.critical)
    }

    pub fn first_strike(&self) -> bool {
        self.volleys.iter().any(|v| v.first_strike)
    }

    /// Splits the raw volley across defender groups: by formation position
    /// weights when the defender holds an occupied formation, else by unit
    /// count.
    pub fn distribute(&self, config: &EngineConfig, defender: &Fleet) -> BTreeMap<ShipTypeId, f64> {
        if self.total_damage <= EPSILON {
            return BTreeMap::new();
        }
        if let Some(formation) = defender.formation.as_ref() {
            if formation.occupied().next().is_some() {
                let weights = config.position_weights.for_direction(self.direction);
                return formation.distribute(self.total_damage, weights);
            }
        }
        let total_units = defender.total_units();
        if total_units == 0 {
            return BTreeMap::new();
        }
        defender
            .living_types()
            .map(|ship_type| {
                let share = defender.groups[ship_type].units() as f64 / total_units as f64;
                (ship_type.to_string(), self.total_damage * share)
            })
            .collect()
    }

    /// Per-channel shield mitigation, then evasion, for every defender group
    /// that receives damage.
    pub fn resolve_against(
        &self,
        catalog: &Catalog,
        config: &EngineConfig,
        defender: &Fleet,
        now: Timestamp,
    ) -> Vec<GroupHit> {
        self.distribute(config, defender)
            .into_iter()
            .map(|(ship_type, assigned)| {
                let stats = effective_stats(catalog, config, defender, &ship_type, now, true);
                let mitigated: f64 = self
                    .damage_by_channel
                    .iter()
                    .map(|(channel, channel_damage)| {
                        let raw = channel_damage / self.total_damage * assigned;
                        let shield = effective_shield(stats.shield(*channel), self.shield_pierce);
                        mitigate(raw, shield, config.shield_scaling_factor)
                    })
                    .sum();
                let evasion = evasion_multiplier(
                    stats.usable_evasion(),
                    self.accuracy,
                    config.min_evasion_multiplier,
                );
                GroupHit {
                    ship_type,
                    assigned,
                    mitigated,
                    damage: mitigated * evasion,
                }
            })
            .collect()
    }
}
