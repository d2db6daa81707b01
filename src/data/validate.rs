use std::collections::HashSet;
use std::fmt;

use crate::combat::modifier::StatModifier;
use crate::data::catalog::CatalogFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn count(&self, severity: ValidationSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == severity)
            .count()
    }
}

/// Durations above this (about 31 years) are accepted but pin every derived
/// timestamp to the end of representable time.
pub const MAX_SANE_DURATION_SECS: f64 = 1e9;

fn check_duration(report: &mut ValidationReport, context: &str, field: &str, value: f64) {
    if value > MAX_SANE_DURATION_SECS {
        report.push(
            ValidationSeverity::Warning,
            context,
            format!("{field} {value} exceeds {MAX_SANE_DURATION_SECS}s; timestamps saturate"),
        );
    }
}

/// Checks a catalog file for gaps the engine would otherwise paper over at
/// combat time (non-positive HP, unknown references, duplicate ids...).
pub fn validate_catalog_file(file: &CatalogFile) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut ship_ids = HashSet::new();
    for ship in &file.ships {
        let context = format!("ships.{}", ship.id);
        if !ship_ids.insert(ship.id.as_str()) {
            report.push(ValidationSeverity::Warning, &context, "duplicate id; last entry wins");
        }
        if !(ship.hp > 0.0) {
            report.push(ValidationSeverity::Error, &context, "hp must be positive");
        }
        if ship.damage < 0.0 {
            report.push(ValidationSeverity::Error, &context, "damage must not be negative");
        }
        if !(0.0..=1.0).contains(&ship.crit_chance) {
            report.push(
                ValidationSeverity::Warning,
                &context,
                format!("crit_chance {} outside [0, 1]", ship.crit_chance),
            );
        }
        if !(0.0..=1.0).contains(&ship.shield_pierce) {
            report.push(
                ValidationSeverity::Warning,
                &context,
                format!("shield_pierce {} outside [0, 1]; clamped at combat time", ship.shield_pierce),
            );
        }
        if ship.attack_interval_secs <= 0.0 {
            report.push(
                ValidationSeverity::Warning,
                &context,
                "attack_interval_secs must be positive; floored at combat time",
            );
        }
        check_duration(&mut report, &context, "attack_interval_secs", ship.attack_interval_secs);
        if ship.shields.values().any(|v| *v < 0.0) {
            report.push(ValidationSeverity::Warning, &context, "negative base shield");
        }
    }

    let mut gem_ids = HashSet::new();
    for gem in &file.gems {
        let context = format!("gems.{}", gem.id);
        if !gem_ids.insert(gem.id.as_str()) {
            report.push(ValidationSeverity::Warning, &context, "duplicate id; last entry wins");
        }
        if gem.modifier.is_zero() {
            report.push(ValidationSeverity::Info, &context, "modifier is empty");
        }
    }

    let mut posture_ids = HashSet::new();
    for posture in &file.postures {
        let context = format!("postures.{}", posture.id);
        if !posture_ids.insert(posture.id.as_str()) {
            report.push(ValidationSeverity::Warning, &context, "duplicate id; last entry wins");
        }
    }

    let mut ability_ids = HashSet::new();
    for ability in &file.abilities {
        let context = format!("abilities.{}", ability.id);
        if !ability_ids.insert(ability.id.as_str()) {
            report.push(ValidationSeverity::Warning, &context, "duplicate id; last entry wins");
        }
        if !(ability.duration_secs > 0.0) {
            report.push(ValidationSeverity::Error, &context, "duration_secs must be positive");
        }
        if ability.cooldown_secs < 0.0 {
            report.push(ValidationSeverity::Error, &context, "cooldown_secs must not be negative");
        }
        check_duration(&mut report, &context, "duration_secs", ability.duration_secs);
        check_duration(&mut report, &context, "cooldown_secs", ability.cooldown_secs);
        if let Some(ship_type) = &ability.ship_type {
            if !ship_ids.contains(ship_type.as_str()) {
                report.push(
                    ValidationSeverity::Warning,
                    &context,
                    format!("references unknown ship type '{ship_type}'"),
                );
            }
        }
    }

    let mut formations = HashSet::new();
    for formation in &file.formations {
        let context = format!("formations.{}", formation.formation_type.as_str());
        if !formations.insert(formation.formation_type) {
            report.push(ValidationSeverity::Warning, &context, "duplicate formation; last entry wins");
        }
        if formation.positions.values().all(StatModifier::is_zero) {
            report.push(ValidationSeverity::Info, &context, "no position bonuses");
        }
    }

    let mut pairs = HashSet::new();
    for counter in &file.counters {
        let context = format!(
            "counters.{}->{}",
            counter.attacker.as_str(),
            counter.defender.as_str()
        );
        if !pairs.insert((counter.attacker, counter.defender)) {
            report.push(ValidationSeverity::Warning, &context, "duplicate pair; last entry wins");
        }
        if !(counter.multiplier > 0.0) {
            report.push(ValidationSeverity::Error, &context, "multiplier must be positive");
        } else if counter.multiplier == 1.0 {
            report.push(ValidationSeverity::Info, &context, "multiplier of 1.0 has no effect");
        }
        if counter.attacker == counter.defender && counter.multiplier != 1.0 {
            report.push(
                ValidationSeverity::Warning,
                &context,
                "mirror matchup with a non-neutral multiplier",
            );
        }
    }

    report
}
