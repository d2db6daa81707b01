//! Engine tuning: mitigation constants, clamps, and the position weights used
//! to spread damage across a formation.
//!
//! Defaults are the reference values. A config file (JSON or YAML, picked by
//! extension) only needs the keys it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::combat::engine::{
    DEFAULT_SHIELD_SCALING, MIN_ATTACK_INTERVAL_SECS, MIN_EVASION_MULTIPLIER,
};
use crate::combat::formation::DirectionWeights;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `k` in `raw / (1 + shield × k)`.
    pub shield_scaling_factor: f64,
    /// Lowest damage multiplier evasion can produce.
    pub min_evasion_multiplier: f64,
    /// Floor for a ship's effective attack interval.
    pub min_attack_interval_secs: f64,
    pub position_weights: DirectionWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shield_scaling_factor: DEFAULT_SHIELD_SCALING,
            min_evasion_multiplier: MIN_EVASION_MULTIPLIER,
            min_attack_interval_secs: MIN_ATTACK_INTERVAL_SECS,
            position_weights: DirectionWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.shield_scaling_factor > 0.0) || !self.shield_scaling_factor.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "shield_scaling_factor ({}) must be a positive number",
                self.shield_scaling_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.min_evasion_multiplier) {
            return Err(EngineError::InvalidConfig(format!(
                "min_evasion_multiplier ({}) must be within [0, 1]",
                self.min_evasion_multiplier
            )));
        }
        if !(self.min_attack_interval_secs > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "min_attack_interval_secs ({}) must be positive",
                self.min_attack_interval_secs
            )));
        }
        let weights = &self.position_weights;
        for (name, w) in [
            ("frontal", &weights.frontal),
            ("flanking", &weights.flanking),
            ("envelopment", &weights.envelopment),
        ] {
            let values = [w.front, w.flank, w.back, w.support];
            if values.iter().any(|v| *v < 0.0 || !v.is_finite()) {
                return Err(EngineError::InvalidConfig(format!(
                    "position weights for {name} must be finite and non-negative"
                )));
            }
            if w.total() <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "position weights for {name} must not all be zero"
                )));
            }
        }
        Ok(())
    }
}

/// Loads and validates a config file. `.yaml`/`.yml` parse as YAML, anything
/// else as JSON.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    let config: EngineConfig = if is_yaml(path) {
        serde_yaml::from_str(&raw)?
    } else {
        serde_json::from_str(&raw)?
    };
    config.validate()?;
    Ok(config)
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shield_scaling_factor, 0.15);
        assert_eq!(config.min_evasion_multiplier, 0.25);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = EngineConfig::default();
        config.min_evasion_multiplier = 1.5;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.shield_scaling_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.position_weights.flanking.front = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "shield_scaling_factor: 0.2").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.shield_scaling_factor, 0.2);
        assert_eq!(config.min_attack_interval_secs, 0.5);
        assert_eq!(config.position_weights, DirectionWeights::default());
    }

    #[test]
    fn json_config_loads() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"min_evasion_multiplier": 0.4}}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.min_evasion_multiplier, 0.4);
    }
}
