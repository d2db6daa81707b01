//! Modifier layers and the stack that resolves them.
//!
//! A layer is one sourced contribution (a gem, the posture, a status node
//! stage, an enemy debuff...). The stack is rebuilt per query and resolved
//! against a [ResolveContext]; ordering only affects which layers are
//! reported first in a breakdown, never the combined value.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::combat::modifier::StatModifier;
use crate::combat::time::{saturating_add, seconds_between, Timestamp};

/// Priority bands. Lower resolves (and is listed) first.
pub mod priority {
    pub const EQUIPMENT: i32 = 100;
    pub const POSTURE: i32 = 200;
    pub const FORMATION_POSITION: i32 = 300;
    pub const FORMATION_SYNERGY: i32 = 400;
    pub const ENVIRONMENT: i32 = 500;
    pub const ACTIVE_ABILITY: i32 = 600;
    pub const ALLY_BUFF: i32 = 700;
    pub const ENEMY_DEBUFF: i32 = 800;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Equipment,
    Posture,
    FormationPosition,
    FormationSynergy,
    Environment,
    Ability,
    StatusPassive,
    StatusTriggered,
    StatusTick,
    StatusAccumulated,
    AllyBuff,
    EnemyDebuff,
}

impl SourceKind {
    pub const fn default_priority(self) -> i32 {
        match self {
            Self::Equipment => priority::EQUIPMENT,
            Self::Posture => priority::POSTURE,
            Self::FormationPosition => priority::FORMATION_POSITION,
            Self::FormationSynergy => priority::FORMATION_SYNERGY,
            Self::Environment | Self::StatusPassive | Self::StatusAccumulated => {
                priority::ENVIRONMENT
            }
            Self::Ability | Self::StatusTriggered | Self::StatusTick => priority::ACTIVE_ABILITY,
            Self::AllyBuff => priority::ALLY_BUFF,
            Self::EnemyDebuff => priority::ENEMY_DEBUFF,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equipment => "equipment",
            Self::Posture => "posture",
            Self::FormationPosition => "formation_position",
            Self::FormationSynergy => "formation_synergy",
            Self::Environment => "environment",
            Self::Ability => "ability",
            Self::StatusPassive => "status_passive",
            Self::StatusTriggered => "status_triggered",
            Self::StatusTick => "status_tick",
            Self::StatusAccumulated => "status_accumulated",
            Self::AllyBuff => "ally_buff",
            Self::EnemyDebuff => "enemy_debuff",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatCondition {
    #[default]
    Always,
    CombatOnly,
    OutOfCombatOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationCondition {
    #[default]
    Always,
    RequiresFormation,
}

/// What a resolve is being asked about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveContext {
    pub now: Timestamp,
    pub in_combat: bool,
    pub has_formation: bool,
}

impl ResolveContext {
    pub fn combat(now: Timestamp, has_formation: bool) -> Self {
        Self {
            now,
            in_combat: true,
            has_formation,
        }
    }

    pub fn idle(now: Timestamp, has_formation: bool) -> Self {
        Self {
            now,
            in_combat: false,
            has_formation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierLayer {
    pub source: SourceKind,
    pub source_id: String,
    pub description: String,
    pub modifier: StatModifier,
    pub applied_at: Timestamp,
    /// `None` = permanent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    pub priority: i32,
    #[serde(default)]
    pub combat: CombatCondition,
    #[serde(default)]
    pub formation: FormationCondition,
}

impl ModifierLayer {
    pub fn new(
        source: SourceKind,
        source_id: impl Into<String>,
        description: impl Into<String>,
        modifier: StatModifier,
        applied_at: Timestamp,
    ) -> Self {
        Self {
            source,
            source_id: source_id.into(),
            description: description.into(),
            modifier,
            applied_at,
            expires_at: None,
            priority: source.default_priority(),
            combat: CombatCondition::Always,
            formation: FormationCondition::Always,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn expiring_at(mut self, expires_at: Option<Timestamp>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn lasting(self, duration: Duration) -> Self {
        let expires_at = saturating_add(self.applied_at, duration);
        self.expiring_at(Some(expires_at))
    }

    pub fn when(mut self, combat: CombatCondition) -> Self {
        self.combat = combat;
        self
    }

    pub fn requiring(mut self, formation: FormationCondition) -> Self {
        self.formation = formation;
        self
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    /// Whether this layer contributes under `context`.
    pub fn is_active(&self, context: &ResolveContext) -> bool {
        if self.is_expired(context.now) {
            return false;
        }
        let combat_ok = match self.combat {
            CombatCondition::Always => true,
            CombatCondition::CombatOnly => context.in_combat,
            CombatCondition::OutOfCombatOnly => !context.in_combat,
        };
        let formation_ok = match self.formation {
            FormationCondition::Always => true,
            FormationCondition::RequiresFormation => context.has_formation,
        };
        combat_ok && formation_ok
    }

    pub fn seconds_to_expiry(&self, now: Timestamp) -> Option<f64> {
        self.expires_at
            .map(|expiry| seconds_between(now, expiry).max(0.0))
    }
}

/// One row of a stat breakdown for UI/diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub source: SourceKind,
    pub source_id: String,
    pub description: String,
    pub priority: i32,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_to_expiry: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifierStack {
    layers: Vec<ModifierLayer>,
}

impl ModifierStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn push(&mut self, layer: ModifierLayer) {
        self.layers.push(layer);
    }

    pub fn extend<I>(&mut self, layers: I)
    where
        I: IntoIterator<Item = ModifierLayer>,
    {
        self.layers.extend(layers);
    }

    pub fn add_permanent(
        &mut self,
        source: SourceKind,
        source_id: impl Into<String>,
        description: impl Into<String>,
        modifier: StatModifier,
        now: Timestamp,
    ) {
        self.push(ModifierLayer::new(source, source_id, description, modifier, now));
    }

    pub fn add_temporary(
        &mut self,
        source: SourceKind,
        source_id: impl Into<String>,
        description: impl Into<String>,
        modifier: StatModifier,
        now: Timestamp,
        duration: Duration,
    ) {
        self.push(ModifierLayer::new(source, source_id, description, modifier, now).lasting(duration));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_conditional(
        &mut self,
        source: SourceKind,
        source_id: impl Into<String>,
        description: impl Into<String>,
        modifier: StatModifier,
        now: Timestamp,
        combat: CombatCondition,
        formation: FormationCondition,
    ) {
        self.push(
            ModifierLayer::new(source, source_id, description, modifier, now)
                .when(combat)
                .requiring(formation),
        );
    }

    /// Drops layers expired at `now`. Returns how many were removed.
    pub fn remove_expired(&mut self, now: Timestamp) -> usize {
        let before = self.layers.len();
        self.layers.retain(|layer| !layer.is_expired(now));
        before - self.layers.len()
    }

    pub fn remove_by_source(&mut self, source: SourceKind) -> usize {
        let before = self.layers.len();
        self.layers.retain(|layer| layer.source != source);
        before - self.layers.len()
    }

    pub fn remove_by_source_id(&mut self, source_id: &str) -> usize {
        let before = self.layers.len();
        self.layers.retain(|layer| layer.source_id != source_id);
        before - self.layers.len()
    }

    pub fn layers(&self) -> &[ModifierLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers in resolution order: by priority, ties in insertion order.
    fn ordered(&self) -> Vec<&ModifierLayer> {
        let mut ordered: Vec<&ModifierLayer> = self.layers.iter().collect();
        // sort_by_key is stable
        ordered.sort_by_key(|layer| layer.priority);
        ordered
    }

    pub fn resolve(&self, context: &ResolveContext) -> StatModifier {
        let mut total = StatModifier::ZERO;
        for layer in self.ordered() {
            if layer.is_active(context) {
                total.add_from(&layer.modifier);
            }
        }
        total
    }

    pub fn summarize(&self, context: &ResolveContext) -> Vec<LayerSummary> {
        self.ordered()
            .into_iter()
            .map(|layer| LayerSummary {
                source: layer.source,
                source_id: layer.source_id.clone(),
                description: layer.description.clone(),
                priority: layer.priority,
                active: layer.is_active(context),
                seconds_to_expiry: layer.seconds_to_expiry(context.now),
            })
            .collect()
    }
}

impl FromIterator<ModifierLayer> for ModifierStack {
    fn from_iter<T: IntoIterator<Item = ModifierLayer>>(iter: T) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn damage(pct: f64) -> StatModifier {
        StatModifier {
            damage_pct: pct,
            ..StatModifier::ZERO
        }
    }

    #[test]
    fn resolve_skips_expired_and_conditional_layers() {
        let mut stack = ModifierStack::new();
        stack.add_permanent(SourceKind::Equipment, "gem-a", "Ruby", damage(0.1), at(0));
        stack.add_temporary(
            SourceKind::Ability,
            "overcharge",
            "Overcharge",
            damage(0.5),
            at(0),
            Duration::seconds(10),
        );
        stack.add_conditional(
            SourceKind::Posture,
            "aggressive",
            "Aggressive",
            damage(0.2),
            at(0),
            CombatCondition::CombatOnly,
            FormationCondition::Always,
        );
        stack.add_conditional(
            SourceKind::FormationPosition,
            "wedge:front",
            "Wedge front",
            damage(0.05),
            at(0),
            CombatCondition::Always,
            FormationCondition::RequiresFormation,
        );

        let in_fight = stack.resolve(&ResolveContext::combat(at(5), true));
        assert!((in_fight.damage_pct - 0.85).abs() < 1e-12);

        let later = stack.resolve(&ResolveContext::combat(at(10), true));
        assert!((later.damage_pct - 0.35).abs() < 1e-12);

        let idle_no_formation = stack.resolve(&ResolveContext::idle(at(5), false));
        assert!((idle_no_formation.damage_pct - 0.6).abs() < 1e-12);
    }

    #[test]
    fn out_of_combat_only_is_the_inverse() {
        let mut stack = ModifierStack::new();
        stack.push(
            ModifierLayer::new(SourceKind::Environment, "dock", "Docked", damage(1.0), at(0))
                .when(CombatCondition::OutOfCombatOnly),
        );
        assert!(stack.resolve(&ResolveContext::combat(at(1), false)).is_zero());
        assert_eq!(
            stack.resolve(&ResolveContext::idle(at(1), false)).damage_pct,
            1.0
        );
    }

    #[test]
    fn summarize_orders_by_priority_and_reports_expiry() {
        let mut stack = ModifierStack::new();
        stack.push(
            ModifierLayer::new(SourceKind::EnemyDebuff, "corrode", "Corrode", damage(-0.1), at(0))
                .lasting(Duration::seconds(30)),
        );
        stack.add_permanent(SourceKind::Equipment, "gem-a", "Ruby", damage(0.1), at(0));
        stack.add_permanent(SourceKind::Equipment, "gem-b", "Onyx", damage(0.1), at(0));

        let summary = stack.summarize(&ResolveContext::combat(at(12), false));
        let ids: Vec<&str> = summary.iter().map(|s| s.source_id.as_str()).collect();
        assert_eq!(ids, vec!["gem-a", "gem-b", "corrode"]);
        assert_eq!(summary[2].seconds_to_expiry, Some(18.0));
        assert_eq!(summary[0].seconds_to_expiry, None);
        assert!(summary.iter().all(|s| s.active));
    }

    #[test]
    fn remove_by_source_and_id() {
        let mut stack = ModifierStack::new();
        stack.add_permanent(SourceKind::Equipment, "gem-a", "Ruby", damage(0.1), at(0));
        stack.add_permanent(SourceKind::Equipment, "gem-a", "Ruby", damage(0.1), at(0));
        stack.add_permanent(SourceKind::Posture, "hold", "Hold", damage(0.1), at(0));
        stack.add_temporary(
            SourceKind::Ability,
            "burst",
            "Burst",
            damage(0.1),
            at(0),
            Duration::seconds(1),
        );

        // same source id counts twice until removed
        let total = stack.resolve(&ResolveContext::combat(at(0), false));
        assert!((total.damage_pct - 0.4).abs() < 1e-12);

        assert_eq!(stack.remove_expired(at(1)), 1);
        assert_eq!(stack.remove_by_source_id("gem-a"), 2);
        assert_eq!(stack.remove_by_source(SourceKind::Posture), 1);
        assert!(stack.is_empty());
    }
}
