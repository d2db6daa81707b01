//! Per-fleet status machine.
//!
//! Each node is a small timed state machine that emits modifier layers
//! depending on its stage. The machine also keeps the buffs and debuffs other
//! fleets have placed on this one. Nodes live in the machine's own `Vec` and
//! are addressed by [NodeId]; nothing holds a pointer back to the machine.
//!
//! Stage table:
//!
//! | stage              | emits                                  | leaves when                         |
//! |--------------------|----------------------------------------|-------------------------------------|
//! | passive            | passive payload                        | ability activation -> triggered     |
//! | triggered          | triggered payload until `end`          | `now >= end` -> cooldown            |
//! | cooldown           | nothing                                | `now >= cooldown end` -> resting    |
//! | accumulating       | accumulated payload × accumulator      | ability activation -> triggered     |
//! | ticking            | tick payload for one period per tick   | never (resting stage)               |
//! | composite-active   | triggered payload + tick payload       | `now >= end` -> composite-cooldown  |
//! | composite-cooldown | nothing                                | `now >= cooldown end` -> resting    |

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::combat::fleet::ShipTypeId;
use crate::combat::modifier::StatModifier;
use crate::combat::stacking::{ModifierLayer, SourceKind};
use crate::combat::time::{after_secs, saturating_add, secs, seconds_between, Timestamp};

/// Index of a node inside its machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeScope {
    All,
    ShipTypes(Vec<ShipTypeId>),
}

impl NodeScope {
    pub fn covers(&self, ship_type: &str) -> bool {
        match self {
            NodeScope::All => true,
            NodeScope::ShipTypes(types) => types.iter().any(|t| t == ship_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStage {
    Passive,
    Triggered,
    Cooldown,
    Accumulating,
    Ticking,
    CompositeActive,
    CompositeCooldown,
}

impl NodeStage {
    pub fn is_cooldown(self) -> bool {
        matches!(self, NodeStage::Cooldown | NodeStage::CompositeCooldown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Triggered => "triggered",
            Self::Cooldown => "cooldown",
            Self::Accumulating => "accumulating",
            Self::Ticking => "ticking",
            Self::CompositeActive => "composite_active",
            Self::CompositeCooldown => "composite_cooldown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePayloads {
    pub passive: Option<StatModifier>,
    pub triggered: Option<StatModifier>,
    pub tick: Option<StatModifier>,
    /// Scaled by the accumulator value.
    pub accumulated: Option<StatModifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Buff,
    Debuff,
}

/// An effect one fleet places on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub id: String,
    pub polarity: Polarity,
    pub modifier: StatModifier,
    pub duration_secs: f64,
    #[serde(default = "one")]
    pub stacks: u32,
    #[serde(default = "one")]
    pub max_stacks: u32,
}

fn one() -> u32 {
    1
}

impl EffectSpec {
    pub fn debuff(id: impl Into<String>, modifier: StatModifier, duration_secs: f64) -> Self {
        Self {
            id: id.into(),
            polarity: Polarity::Debuff,
            modifier,
            duration_secs,
            stacks: 1,
            max_stacks: 1,
        }
    }

    pub fn buff(id: impl Into<String>, modifier: StatModifier, duration_secs: f64) -> Self {
        Self {
            polarity: Polarity::Buff,
            ..Self::debuff(id, modifier, duration_secs)
        }
    }

    pub fn stacking(mut self, stacks: u32, max_stacks: u32) -> Self {
        self.stacks = stacks;
        self.max_stacks = max_stacks;
        self
    }
}

/// A live buff/debuff received from another fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEffect {
    pub id: String,
    pub polarity: Polarity,
    pub modifier: StatModifier,
    pub stacks: u32,
    pub max_stacks: u32,
    pub applied_at: Timestamp,
    pub expires_at: Timestamp,
    /// Who applied it (fleet id, optionally with the node that produced it).
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusNode {
    pub id: String,
    pub scope: NodeScope,
    pub stage: NodeStage,
    /// Restricts triggering to one ability. `None` reacts to any ability.
    #[serde(default)]
    pub trigger_ability: Option<String>,
    #[serde(default)]
    pub composite: bool,

    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub cooldown_secs: f64,
    #[serde(default)]
    pub cooldown_ends_at: Option<Timestamp>,
    #[serde(default)]
    pub tick_period_secs: Option<f64>,
    #[serde(default)]
    pub last_tick_at: Option<Timestamp>,
    /// The latest tick's period still covered the latest advance.
    #[serde(default)]
    pub ticked: bool,

    #[serde(default)]
    pub activation_count: u32,
    /// Ticks fired since the node was created.
    #[serde(default)]
    pub stack_count: u32,
    #[serde(default)]
    pub accumulator: f64,
    #[serde(default)]
    pub accumulate_per_sec: f64,
    #[serde(default)]
    pub accumulator_cap: f64,
    #[serde(default)]
    pub last_accumulated_at: Option<Timestamp>,

    #[serde(default)]
    pub payloads: NodePayloads,
    /// Pushed onto the opposing fleet after each round while the node is active.
    #[serde(default)]
    pub outgoing: Option<EffectSpec>,
}

impl StatusNode {
    fn blank(id: impl Into<String>, scope: NodeScope, stage: NodeStage) -> Self {
        Self {
            id: id.into(),
            scope,
            stage,
            trigger_ability: None,
            composite: false,
            started_at: None,
            ends_at: None,
            duration_secs: 0.0,
            cooldown_secs: 0.0,
            cooldown_ends_at: None,
            tick_period_secs: None,
            last_tick_at: None,
            ticked: false,
            activation_count: 0,
            stack_count: 0,
            accumulator: 0.0,
            accumulate_per_sec: 0.0,
            accumulator_cap: 0.0,
            last_accumulated_at: None,
            payloads: NodePayloads::default(),
            outgoing: None,
        }
    }

    pub fn passive(id: impl Into<String>, scope: NodeScope, modifier: StatModifier) -> Self {
        let mut node = Self::blank(id, scope, NodeStage::Passive);
        node.payloads.passive = Some(modifier);
        node
    }

    pub fn triggered(
        id: impl Into<String>,
        scope: NodeScope,
        modifier: StatModifier,
        duration_secs: f64,
        cooldown_secs: f64,
    ) -> Self {
        let mut node = Self::blank(id, scope, NodeStage::Passive);
        node.payloads.triggered = Some(modifier);
        node.duration_secs = duration_secs;
        node.cooldown_secs = cooldown_secs;
        node
    }

    pub fn ticking(
        id: impl Into<String>,
        scope: NodeScope,
        modifier: StatModifier,
        period_secs: f64,
    ) -> Self {
        let mut node = Self::blank(id, scope, NodeStage::Ticking);
        node.payloads.tick = Some(modifier);
        node.tick_period_secs = Some(period_secs);
        node
    }

    pub fn accumulating(
        id: impl Into<String>,
        scope: NodeScope,
        per_unit: StatModifier,
        rate_per_sec: f64,
        cap: f64,
    ) -> Self {
        let mut node = Self::blank(id, scope, NodeStage::Accumulating);
        node.payloads.accumulated = Some(per_unit);
        node.accumulate_per_sec = rate_per_sec;
        node.accumulator_cap = cap;
        node
    }

    /// Triggered and ticking at once while active, then cools down.
    pub fn composite(
        id: impl Into<String>,
        scope: NodeScope,
        triggered: StatModifier,
        tick: StatModifier,
        period_secs: f64,
        duration_secs: f64,
        cooldown_secs: f64,
    ) -> Self {
        let mut node = Self::triggered(id, scope, triggered, duration_secs, cooldown_secs);
        node.composite = true;
        node.payloads.tick = Some(tick);
        node.tick_period_secs = Some(period_secs);
        node
    }

    pub fn with_passive(mut self, modifier: StatModifier) -> Self {
        self.payloads.passive = Some(modifier);
        self
    }

    pub fn with_trigger(mut self, modifier: StatModifier, duration_secs: f64, cooldown_secs: f64) -> Self {
        self.payloads.triggered = Some(modifier);
        self.duration_secs = duration_secs;
        self.cooldown_secs = cooldown_secs;
        self
    }

    pub fn with_accumulation(mut self, per_unit: StatModifier, rate_per_sec: f64, cap: f64) -> Self {
        self.payloads.accumulated = Some(per_unit);
        self.accumulate_per_sec = rate_per_sec;
        self.accumulator_cap = cap;
        self
    }

    pub fn triggered_by(mut self, ability_id: impl Into<String>) -> Self {
        self.trigger_ability = Some(ability_id.into());
        self
    }

    pub fn with_outgoing(mut self, effect: EffectSpec) -> Self {
        self.outgoing = Some(effect);
        self
    }

    /// Stage a node returns to after cooling down.
    fn resting_stage(&self) -> NodeStage {
        if self.accumulate_per_sec > 0.0 {
            NodeStage::Accumulating
        } else if self.tick_period_secs.is_some() && !self.composite {
            NodeStage::Ticking
        } else {
            NodeStage::Passive
        }
    }

    fn tick_period(&self) -> Option<Duration> {
        self.tick_period_secs.filter(|p| *p > 0.0).map(secs)
    }

    fn try_tick(&mut self, now: Timestamp) {
        let Some(period) = self.tick_period() else {
            return;
        };
        let due = match self.last_tick_at {
            None => true,
            Some(last) => now >= saturating_add(last, period),
        };
        if due {
            self.last_tick_at = Some(now);
            self.ticked = true;
            self.stack_count = self.stack_count.saturating_add(1);
        }
    }

    /// End of the window opened by the latest tick.
    fn tick_window_end(&self) -> Option<Timestamp> {
        let period = self.tick_period()?;
        let last = self.last_tick_at?;
        Some(saturating_add(last, period))
    }

    fn tick_live(&self, now: Timestamp) -> bool {
        self.last_tick_at.is_some_and(|last| last <= now)
            && self.tick_window_end().is_some_and(|end| now < end)
    }

    fn accumulate(&mut self, now: Timestamp) {
        let cap = self.accumulator_cap.max(0.0);
        if let Some(last) = self.last_accumulated_at {
            let elapsed = seconds_between(last, now).max(0.0);
            self.accumulator = (self.accumulator + self.accumulate_per_sec * elapsed).min(cap);
        }
        self.accumulator = self.accumulator.min(cap);
        self.last_accumulated_at = Some(now);
    }

    fn enter(&mut self, stage: NodeStage) {
        tracing::trace!(node = %self.id, from = self.stage.as_str(), to = stage.as_str(), "status node transition");
        self.stage = stage;
    }

    /// Runs stage transitions up to `now`. Several transitions can happen in
    /// one call when a long interval has passed.
    pub fn advance(&mut self, now: Timestamp) {
        loop {
            match self.stage {
                NodeStage::Passive => break,
                NodeStage::Ticking => {
                    self.try_tick(now);
                    break;
                }
                NodeStage::Accumulating => {
                    self.accumulate(now);
                    break;
                }
                NodeStage::Triggered | NodeStage::CompositeActive => {
                    let end = self.ends_at.unwrap_or(now);
                    if now < end {
                        if self.stage == NodeStage::CompositeActive {
                            self.try_tick(now);
                        }
                        break;
                    }
                    self.cooldown_ends_at = Some(after_secs(end, self.cooldown_secs));
                    let next = if self.stage == NodeStage::CompositeActive {
                        NodeStage::CompositeCooldown
                    } else {
                        NodeStage::Cooldown
                    };
                    self.enter(next);
                }
                NodeStage::Cooldown | NodeStage::CompositeCooldown => {
                    let ready_at = self.cooldown_ends_at.unwrap_or(now);
                    if now < ready_at {
                        break;
                    }
                    let next = self.resting_stage();
                    match next {
                        NodeStage::Accumulating => self.last_accumulated_at = Some(ready_at),
                        NodeStage::Ticking => self.last_tick_at = None,
                        _ => {}
                    }
                    self.enter(next);
                }
            }
        }
        self.ticked = matches!(self.stage, NodeStage::Ticking | NodeStage::CompositeActive)
            && self.tick_live(now);
    }

    /// Moves into the triggered stage. Returns false when the node cannot be
    /// triggered (no triggered payload, or cooling down).
    pub fn trigger(&mut self, start: Timestamp) -> bool {
        if self.payloads.triggered.is_none() || self.stage.is_cooldown() {
            return false;
        }
        let next = if self.composite {
            NodeStage::CompositeActive
        } else {
            NodeStage::Triggered
        };
        self.enter(next);
        self.started_at = Some(start);
        self.ends_at = Some(after_secs(start, self.duration_secs));
        self.activation_count = self.activation_count.saturating_add(1);
        // charge is spent by the trigger
        self.accumulator = 0.0;
        self.last_tick_at = None;
        self.ticked = false;
        if self.composite {
            self.try_tick(start);
        }
        true
    }

    fn layer(&self, kind: SourceKind, modifier: StatModifier, applied_at: Timestamp) -> ModifierLayer {
        ModifierLayer::new(
            kind,
            self.id.clone(),
            format!("{} ({})", self.id, self.stage.as_str()),
            modifier,
            applied_at,
        )
    }

    /// Layers this node produces in its current stage.
    pub fn layers(&self, now: Timestamp) -> Vec<ModifierLayer> {
        let mut out = Vec::new();
        let started = self.started_at.unwrap_or(now);
        match self.stage {
            NodeStage::Passive => {
                if let Some(m) = self.payloads.passive {
                    out.push(self.layer(SourceKind::StatusPassive, m, now));
                }
            }
            NodeStage::Triggered | NodeStage::CompositeActive => {
                if let Some(m) = self.payloads.triggered {
                    out.push(
                        self.layer(SourceKind::StatusTriggered, m, started)
                            .expiring_at(self.ends_at),
                    );
                }
                if self.stage == NodeStage::CompositeActive {
                    out.extend(self.tick_layer(now));
                }
            }
            NodeStage::Ticking => out.extend(self.tick_layer(now)),
            NodeStage::Accumulating => {
                if let Some(m) = self.payloads.accumulated {
                    if self.accumulator > 0.0 {
                        out.push(self.layer(
                            SourceKind::StatusAccumulated,
                            m.scaled(self.accumulator),
                            now,
                        ));
                    }
                }
            }
            NodeStage::Cooldown | NodeStage::CompositeCooldown => {}
        }
        out
    }

    /// The tick payload stays live from the tick until one period later.
    fn tick_layer(&self, now: Timestamp) -> Option<ModifierLayer> {
        if !self.tick_live(now) {
            return None;
        }
        let modifier = self.payloads.tick?;
        let fired_at = self.last_tick_at?;
        Some(
            self.layer(SourceKind::StatusTick, modifier, fired_at)
                .expiring_at(self.tick_window_end()),
        )
    }

    /// Whether this node currently pushes its outgoing effect.
    fn is_emitting(&self) -> bool {
        match self.stage {
            NodeStage::Passive => self.payloads.passive.is_some(),
            NodeStage::Triggered | NodeStage::CompositeActive => true,
            NodeStage::Ticking => self.ticked,
            NodeStage::Accumulating => self.accumulator > 0.0,
            NodeStage::Cooldown | NodeStage::CompositeCooldown => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusMachine {
    #[serde(default)]
    nodes: Vec<StatusNode>,
    #[serde(default)]
    inbound: BTreeMap<String, InboundEffect>,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: StatusNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn with_node(mut self, node: StatusNode) -> Self {
        self.add_node(node);
        self
    }

    pub fn node(&self, id: NodeId) -> Option<&StatusNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut StatusNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn find(&self, node_id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.id == node_id).map(NodeId)
    }

    pub fn nodes(&self) -> &[StatusNode] {
        &self.nodes
    }

    pub fn inbound(&self) -> impl Iterator<Item = &InboundEffect> {
        self.inbound.values()
    }

    pub fn inbound_effect(&self, id: &str) -> Option<&InboundEffect> {
        self.inbound.get(id)
    }

    pub fn advance(&mut self, now: Timestamp) {
        for node in &mut self.nodes {
            node.advance(now);
        }
        let before = self.inbound.len();
        self.inbound.retain(|_, effect| effect.expires_at > now);
        let purged = before - self.inbound.len();
        if purged > 0 {
            tracing::trace!(purged, "expired inbound effects purged");
        }
    }

    /// Triggers every eligible node. `ship_type = None` is a fleet-wide
    /// activation and reaches every node. Returns how many nodes triggered.
    pub fn on_ability_activated(
        &mut self,
        ability_id: &str,
        ship_type: Option<&str>,
        start: Timestamp,
    ) -> usize {
        let mut triggered = 0;
        for node in &mut self.nodes {
            let in_scope = ship_type.map_or(true, |t| node.scope.covers(t));
            let listens = node
                .trigger_ability
                .as_deref()
                .map_or(true, |wanted| wanted == ability_id);
            if in_scope && listens && node.trigger(start) {
                triggered += 1;
            }
        }
        triggered
    }

    /// Upserts an inbound effect: stacks add up to the cap and the expiry is
    /// refreshed to `now + duration`.
    pub fn apply_inbound_effect(&mut self, spec: &EffectSpec, source: &str, now: Timestamp) {
        let max_stacks = spec.max_stacks.max(1);
        let expires_at = after_secs(now, spec.duration_secs);
        match self.inbound.get_mut(&spec.id) {
            Some(existing) => {
                existing.max_stacks = max_stacks;
                existing.stacks = existing.stacks.saturating_add(spec.stacks).min(max_stacks);
                existing.expires_at = expires_at;
                existing.modifier = spec.modifier;
                existing.source = source.to_string();
            }
            None => {
                self.inbound.insert(
                    spec.id.clone(),
                    InboundEffect {
                        id: spec.id.clone(),
                        polarity: spec.polarity,
                        modifier: spec.modifier,
                        stacks: spec.stacks.min(max_stacks),
                        max_stacks,
                        applied_at: now,
                        expires_at,
                        source: source.to_string(),
                    },
                );
            }
        }
    }

    /// Node layers for one ship type.
    pub fn collect_active_layers(&self, ship_type: &str, now: Timestamp) -> Vec<ModifierLayer> {
        self.nodes
            .iter()
            .filter(|node| node.scope.covers(ship_type))
            .flat_map(|node| node.layers(now))
            .collect()
    }

    /// Layers for live inbound buffs/debuffs; these reach every ship type.
    pub fn inbound_layers(&self, now: Timestamp) -> Vec<ModifierLayer> {
        self.inbound
            .values()
            .filter(|effect| effect.expires_at > now && effect.stacks > 0)
            .map(|effect| {
                let kind = match effect.polarity {
                    Polarity::Buff => SourceKind::AllyBuff,
                    Polarity::Debuff => SourceKind::EnemyDebuff,
                };
                ModifierLayer::new(
                    kind,
                    effect.id.clone(),
                    format!("{} x{} from {}", effect.id, effect.stacks, effect.source),
                    effect.modifier.scaled(effect.stacks as f64),
                    effect.applied_at,
                )
                .expiring_at(Some(effect.expires_at))
            })
            .collect()
    }

    /// Effects active nodes push onto the opposing fleet, tagged with the
    /// node id that produced them.
    pub fn outgoing_effects(&self) -> Vec<(String, EffectSpec)> {
        self.nodes
            .iter()
            .filter(|node| node.is_emitting())
            .filter_map(|node| node.outgoing.clone().map(|spec| (node.id.clone(), spec)))
            .collect()
    }
}
