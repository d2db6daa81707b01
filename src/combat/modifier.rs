//! Additive stat bundles. Every bonus source in the game (gems, postures,
//! formation slots, status nodes, abilities, inbound buffs/debuffs) emits one
//! of these, and the stack folds them together with [StatModifier::combine].
//!
//! Percentages are fractions (`0.10` = +10%). Nothing here clamps; callers
//! clamp at the point of use.

use serde::{Deserialize, Serialize};

/// Damage/shield channel. A ship deals damage on exactly one channel and
/// carries a shield value for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageChannel {
    Laser,
    Kinetic,
    Missile,
    Plasma,
}

impl DamageChannel {
    pub const ALL: [DamageChannel; 4] = [
        DamageChannel::Laser,
        DamageChannel::Kinetic,
        DamageChannel::Missile,
        DamageChannel::Plasma,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Laser => 0,
            Self::Kinetic => 1,
            Self::Missile => 2,
            Self::Plasma => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Laser => "laser",
            Self::Kinetic => "kinetic",
            Self::Missile => "missile",
            Self::Plasma => "plasma",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatModifier {
    pub damage_pct: f64,
    /// Per-unit damage delta, applied before `damage_pct`.
    pub damage_flat: i64,
    pub laser_shield: i64,
    pub kinetic_shield: i64,
    pub missile_shield: i64,
    pub plasma_shield: i64,
    pub shield_pierce_pct: f64,
    pub evasion_pct: f64,
    pub accuracy_pct: f64,
    pub crit_chance_pct: f64,
    pub crit_damage_pct: f64,
    pub first_strike_pct: f64,
    pub speed: i64,
    /// Relative change to the attack interval. Negative fires faster.
    pub attack_interval_pct: f64,
    /// Attacker ignores an unfavourable formation counter.
    pub ignore_counter: bool,
    /// Defender gets no benefit from evasion.
    pub evasion_lock: bool,
}

impl StatModifier {
    pub const ZERO: StatModifier = StatModifier {
        damage_pct: 0.0,
        damage_flat: 0,
        laser_shield: 0,
        kinetic_shield: 0,
        missile_shield: 0,
        plasma_shield: 0,
        shield_pierce_pct: 0.0,
        evasion_pct: 0.0,
        accuracy_pct: 0.0,
        crit_chance_pct: 0.0,
        crit_damage_pct: 0.0,
        first_strike_pct: 0.0,
        speed: 0,
        attack_interval_pct: 0.0,
        ignore_counter: false,
        evasion_lock: false,
    };

    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Field-wise sum, logical OR for flags.
    pub fn combine(&self, other: &StatModifier) -> StatModifier {
        StatModifier {
            damage_pct: self.damage_pct + other.damage_pct,
            damage_flat: self.damage_flat + other.damage_flat,
            laser_shield: self.laser_shield + other.laser_shield,
            kinetic_shield: self.kinetic_shield + other.kinetic_shield,
            missile_shield: self.missile_shield + other.missile_shield,
            plasma_shield: self.plasma_shield + other.plasma_shield,
            shield_pierce_pct: self.shield_pierce_pct + other.shield_pierce_pct,
            evasion_pct: self.evasion_pct + other.evasion_pct,
            accuracy_pct: self.accuracy_pct + other.accuracy_pct,
            crit_chance_pct: self.crit_chance_pct + other.crit_chance_pct,
            crit_damage_pct: self.crit_damage_pct + other.crit_damage_pct,
            first_strike_pct: self.first_strike_pct + other.first_strike_pct,
            speed: self.speed + other.speed,
            attack_interval_pct: self.attack_interval_pct + other.attack_interval_pct,
            ignore_counter: self.ignore_counter || other.ignore_counter,
            evasion_lock: self.evasion_lock || other.evasion_lock,
        }
    }

    /// Adds another modifier into self (for running totals).
    pub fn add_from(&mut self, other: &StatModifier) {
        *self = self.combine(other);
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Multiplies every numeric field by `factor`; integer deltas are rounded.
    /// Flags survive only for a positive factor. Used for stack counts and
    /// accumulator charge.
    pub fn scaled(&self, factor: f64) -> StatModifier {
        let int = |v: i64| (v as f64 * factor).round() as i64;
        let keep_flags = factor > 0.0;
        StatModifier {
            damage_pct: self.damage_pct * factor,
            damage_flat: int(self.damage_flat),
            laser_shield: int(self.laser_shield),
            kinetic_shield: int(self.kinetic_shield),
            missile_shield: int(self.missile_shield),
            plasma_shield: int(self.plasma_shield),
            shield_pierce_pct: self.shield_pierce_pct * factor,
            evasion_pct: self.evasion_pct * factor,
            accuracy_pct: self.accuracy_pct * factor,
            crit_chance_pct: self.crit_chance_pct * factor,
            crit_damage_pct: self.crit_damage_pct * factor,
            first_strike_pct: self.first_strike_pct * factor,
            speed: int(self.speed),
            attack_interval_pct: self.attack_interval_pct * factor,
            ignore_counter: keep_flags && self.ignore_counter,
            evasion_lock: keep_flags && self.evasion_lock,
        }
    }

    /// Shield delta for one channel.
    pub fn shield(&self, channel: DamageChannel) -> i64 {
        match channel {
            DamageChannel::Laser => self.laser_shield,
            DamageChannel::Kinetic => self.kinetic_shield,
            DamageChannel::Missile => self.missile_shield,
            DamageChannel::Plasma => self.plasma_shield,
        }
    }

    pub fn with_shield(mut self, channel: DamageChannel, value: i64) -> Self {
        match channel {
            DamageChannel::Laser => self.laser_shield = value,
            DamageChannel::Kinetic => self.kinetic_shield = value,
            DamageChannel::Missile => self.missile_shield = value,
            DamageChannel::Plasma => self.plasma_shield = value,
        }
        self
    }
}

/// Folds any number of modifiers from the identity.
pub fn combine_all<'a, I>(modifiers: I) -> StatModifier
where
    I: IntoIterator<Item = &'a StatModifier>,
{
    modifiers
        .into_iter()
        .fold(StatModifier::ZERO, |acc, m| acc.combine(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatModifier {
        StatModifier {
            damage_pct: 0.25,
            damage_flat: 4,
            shield_pierce_pct: 0.1,
            speed: -3,
            evasion_lock: true,
            ..StatModifier::ZERO
        }
        .with_shield(DamageChannel::Missile, 12)
    }

    #[test]
    fn zero_is_identity() {
        let m = sample();
        assert_eq!(m.combine(&StatModifier::ZERO), m);
        assert_eq!(StatModifier::ZERO.combine(&m), m);
        assert!(StatModifier::default().is_zero());
    }

    #[test]
    fn flags_combine_with_or() {
        let a = StatModifier {
            ignore_counter: true,
            ..StatModifier::ZERO
        };
        let b = StatModifier {
            evasion_lock: true,
            ..StatModifier::ZERO
        };
        let c = a.combine(&b);
        assert!(c.ignore_counter && c.evasion_lock);
        assert!(!c.is_zero());
    }

    #[test]
    fn scaled_rounds_integers_and_drops_flags_at_zero() {
        let m = sample().scaled(2.5);
        assert_eq!(m.damage_flat, 10);
        assert_eq!(m.missile_shield, 30);
        assert_eq!(m.speed, -8);
        assert!((m.damage_pct - 0.625).abs() < 1e-12);
        assert!(m.evasion_lock);

        assert!(sample().scaled(0.0).is_zero());
    }

    #[test]
    fn combine_all_folds_from_zero() {
        let parts = [sample(), sample(), StatModifier::ZERO];
        let total = combine_all(parts.iter());
        assert_eq!(total.damage_flat, 8);
        assert_eq!(total.shield(DamageChannel::Missile), 24);
        assert!(combine_all(std::iter::empty()).is_zero());
    }
}
