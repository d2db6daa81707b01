//! Damage math primitives shared by the combat context and round resolution.
//!
//! Everything here is a pure function of its inputs; clamps live here so the
//! callers can hand over raw resolved stats.

pub const EPSILON: f64 = 1e-9;

/// Reference shield scaling factor for asymptotic mitigation.
pub const DEFAULT_SHIELD_SCALING: f64 = 0.15;

/// Evasion can remove at most 75% of incoming damage.
pub const MIN_EVASION_MULTIPLIER: f64 = 0.25;

/// Fastest allowed attack interval, in seconds.
pub const MIN_ATTACK_INTERVAL_SECS: f64 = 0.5;

/// Shield left after pierce: `shield × (1 − pierce)`, floored at 0.
/// Pierce is clamped to `[0, 1]` and a negative shield (debuffed below zero)
/// counts as no shield.
pub fn effective_shield(shield: f64, pierce_pct: f64) -> f64 {
    let pierce = pierce_pct.clamp(0.0, 1.0);
    (shield.max(0.0) * (1.0 - pierce)).max(0.0)
}

/// Asymptotic mitigation: `raw / (1 + shield × scaling)`. Strictly decreasing
/// in shield and never reaches zero for positive raw damage.
pub fn mitigate(raw_damage: f64, effective_shield: f64, scaling: f64) -> f64 {
    if raw_damage <= 0.0 {
        return 0.0;
    }
    raw_damage / (1.0 + effective_shield.max(0.0) * scaling.max(0.0))
}

/// Flat damage reduction from evasion net of attacker accuracy.
pub fn evasion_multiplier(evasion: f64, accuracy: f64, floor: f64) -> f64 {
    let effective = (evasion - accuracy).max(0.0);
    (1.0 - effective).max(floor)
}

/// Every `round(1/p)`-th attack is critical. `None` when crits are impossible.
pub fn crit_interval(crit_chance: f64) -> Option<u64> {
    if !crit_chance.is_finite() || crit_chance <= EPSILON {
        return None;
    }
    let interval = (1.0 / crit_chance.min(1.0)).round().max(1.0);
    Some(interval as u64)
}

/// Counter-based crit: long-run frequency matches `crit_chance` with no
/// randomness, so combat logs replay exactly.
pub fn is_critical(attack_count: u64, crit_chance: f64) -> bool {
    match crit_interval(crit_chance) {
        Some(interval) => attack_count > 0 && attack_count % interval == 0,
        None => false,
    }
}

/// First-strike bonus applies only to a side's first attack of the battle.
pub fn is_first_strike(attack_count: u64) -> bool {
    attack_count == 1
}
