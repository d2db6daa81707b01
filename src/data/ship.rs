//! Ship type specs: base combat stats for one unit of a ship type, before any
//! modifier layer is applied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::formation::Position;
use crate::combat::modifier::DamageChannel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Native damage channel.
    pub channel: DamageChannel,
    /// Damage per unit per attack.
    pub damage: f64,
    /// Full HP of one unit.
    pub hp: f64,
    #[serde(default)]
    pub shields: BTreeMap<DamageChannel, f64>,
    #[serde(default)]
    pub evasion: f64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub shield_pierce: f64,
    #[serde(default)]
    pub crit_chance: f64,
    #[serde(default = "default_crit_multiplier")]
    pub crit_multiplier: f64,
    #[serde(default)]
    pub first_strike: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default = "default_attack_interval")]
    pub attack_interval_secs: f64,
    /// Slot used when a formation does not place this type explicitly.
    #[serde(default = "default_position")]
    pub default_position: Position,
}

fn default_crit_multiplier() -> f64 {
    1.5
}

fn default_attack_interval() -> f64 {
    2.0
}

fn default_position() -> Position {
    Position::Front
}

impl ShipSpec {
    pub fn new(id: impl Into<String>, channel: DamageChannel, damage: f64, hp: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            channel,
            damage,
            hp,
            shields: BTreeMap::new(),
            evasion: 0.0,
            accuracy: 0.0,
            shield_pierce: 0.0,
            crit_chance: 0.0,
            crit_multiplier: default_crit_multiplier(),
            first_strike: 0.0,
            speed: 0.0,
            attack_interval_secs: default_attack_interval(),
            default_position: default_position(),
        }
    }

    pub fn with_shield(mut self, channel: DamageChannel, value: f64) -> Self {
        self.shields.insert(channel, value);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.default_position = position;
        self
    }

    pub fn shield(&self, channel: DamageChannel) -> f64 {
        self.shields.get(&channel).copied().unwrap_or(0.0)
    }

    /// Stand-in for an id missing from the catalog: no damage, no defenses,
    /// one HP per unit so bucket math stays well defined.
    pub fn placeholder(id: &str) -> Self {
        let mut spec = Self::new(id, DamageChannel::Kinetic, 0.0, 1.0);
        spec.name = Some(format!("unknown ship type '{id}'"));
        spec.crit_multiplier = 1.0;
        spec
    }
}
