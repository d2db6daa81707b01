//! Active abilities: activation, cooldown bookkeeping, and the layers an
//! ability contributes while it runs.
//!
//! Ability definitions come from the catalog; a fleet only remembers when
//! each ability was used.

use serde::{Deserialize, Serialize};

use crate::combat::fleet::ShipTypeId;
use crate::combat::modifier::StatModifier;
use crate::combat::stacking::{CombatCondition, ModifierLayer, SourceKind};
use crate::combat::time::{after_secs, Timestamp};
use crate::data::catalog::{AbilityDef, Catalog};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityActivation {
    pub ability_id: String,
    /// Ship type the effect applies to. `None` = whole fleet.
    #[serde(default)]
    pub ship_type: Option<ShipTypeId>,
    pub started_at: Timestamp,
    pub ends_at: Timestamp,
    pub ready_at: Timestamp,
}

impl AbilityActivation {
    pub fn from_def(def: &AbilityDef, started_at: Timestamp) -> Self {
        let ends_at = after_secs(started_at, def.duration_secs);
        Self {
            ability_id: def.id.clone(),
            ship_type: def.ship_type.clone(),
            started_at,
            ends_at,
            ready_at: after_secs(ends_at, def.cooldown_secs),
        }
    }

    pub fn is_running(&self, now: Timestamp) -> bool {
        self.started_at <= now && now < self.ends_at
    }

    pub fn applies_to(&self, ship_type: &str) -> bool {
        self.ship_type.as_deref().map_or(true, |t| t == ship_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActivationOutcome {
    Activated {
        ends_at: Timestamp,
        nodes_triggered: usize,
    },
    OnCooldown {
        ready_at: Timestamp,
    },
    /// The ability belongs to a ship type the fleet has no living units of.
    NoCarrier,
    UnknownAbility,
}

impl ActivationOutcome {
    pub fn is_activated(&self) -> bool {
        matches!(self, ActivationOutcome::Activated { .. })
    }
}

/// Activation history of one fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityBook {
    #[serde(default)]
    activations: Vec<AbilityActivation>,
}

impl AbilityBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activations(&self) -> &[AbilityActivation] {
        &self.activations
    }

    /// When `ability_id` can next be used, if it is still cooling down.
    pub fn ready_at(&self, ability_id: &str, now: Timestamp) -> Option<Timestamp> {
        self.activations
            .iter()
            .filter(|a| a.ability_id == ability_id && a.ready_at > now)
            .map(|a| a.ready_at)
            .max()
    }

    pub fn record(&mut self, activation: AbilityActivation) {
        self.activations.push(activation);
    }

    /// Forgets activations that have finished and cooled down.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.activations.len();
        self.activations
            .retain(|a| a.ends_at > now || a.ready_at > now);
        before - self.activations.len()
    }

    /// Layers for abilities running at `now` that reach `ship_type`.
    pub fn active_layers(
        &self,
        catalog: &Catalog,
        ship_type: &str,
        now: Timestamp,
    ) -> Vec<ModifierLayer> {
        self.activations
            .iter()
            .filter(|a| a.is_running(now) && a.applies_to(ship_type))
            .map(|activation| {
                let (description, modifier, combat) = match catalog.ability(&activation.ability_id) {
                    Some(def) => (
                        def.name.clone().unwrap_or_else(|| def.id.clone()),
                        def.modifier,
                        if def.combat_only {
                            CombatCondition::CombatOnly
                        } else {
                            CombatCondition::Always
                        },
                    ),
                    None => {
                        tracing::warn!(ability = %activation.ability_id, "ability missing from catalog");
                        (
                            format!("unknown ability '{}'", activation.ability_id),
                            StatModifier::ZERO,
                            CombatCondition::Always,
                        )
                    }
                };
                ModifierLayer::new(
                    SourceKind::Ability,
                    activation.ability_id.clone(),
                    description,
                    modifier,
                    activation.started_at,
                )
                .expiring_at(Some(activation.ends_at))
                .when(combat)
            })
            .collect()
    }
}
