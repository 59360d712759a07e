//! Generation tuning — caps, windows, spawn odds and per-kind ranges.
//!
//! Every field has a default, so a config file only needs the values it
//! wants to change. Loading validates ranges before anything sees them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::disruption::DisruptionKind;
use crate::ids::Day;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Ranges used when rolling a spike of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindTuning {
    pub min_magnitude: f64,
    pub max_magnitude: f64,
    /// Days, inclusive range.
    pub min_duration: u32,
    pub max_duration: u32,
    /// Early-resolution cost before scaling by magnitude.
    pub base_resolution_cost: u64,
    /// Relative pick weight among the generatable kinds.
    pub weight: f64,
}

impl Default for KindTuning {
    fn default() -> Self {
        Self {
            min_magnitude: 0.2,
            max_magnitude: 0.5,
            min_duration: 2,
            max_duration: 4,
            base_resolution_cost: 100,
            weight: 1.0,
        }
    }
}

impl KindTuning {
    fn with(min_magnitude: f64, max_magnitude: f64, durations: (u32, u32), cost: u64) -> Self {
        Self {
            min_magnitude,
            max_magnitude,
            min_duration: durations.0,
            max_duration: durations.1,
            base_resolution_cost: cost,
            weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// No guaranteed spikes on or before this day.
    pub tutorial_grace_day: Day,
    /// Max covering spikes per player for the guaranteed generator.
    pub guaranteed_cap: usize,
    /// Max covering spikes per player for the opportunistic generator.
    pub opportunistic_cap: usize,
    /// Chance per call that the opportunistic generator fires.
    pub spawn_chance: f64,
    /// Same-kind spikes must be more than this many days apart.
    pub cooldown_window: u32,
    /// Chance that a price or delay spike also targets a route.
    pub route_target_chance: f64,
    pub kinds: BTreeMap<DisruptionKind, KindTuning>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut kinds = BTreeMap::new();
        kinds.insert(DisruptionKind::Demand, KindTuning::with(0.2, 0.6, (2, 4), 150));
        kinds.insert(DisruptionKind::Price, KindTuning::with(0.1, 0.5, (2, 4), 120));
        // Delay magnitude is whole days.
        kinds.insert(DisruptionKind::Delay, KindTuning::with(1.0, 3.0, (2, 3), 100));
        // Breakdown magnitude is the fraction of capacity left.
        kinds.insert(DisruptionKind::Breakdown, KindTuning::with(0.3, 0.7, (2, 4), 250));
        kinds.insert(DisruptionKind::Blizzard, KindTuning::with(0.5, 1.0, (1, 3), 300));
        Self {
            tutorial_grace_day: 1,
            guaranteed_cap: 2,
            opportunistic_cap: 2,
            spawn_chance: 0.25,
            cooldown_window: 2,
            route_target_chance: 0.5,
            kinds,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Tuning for `kind`, falling back to defaults when the file omits it.
    pub fn tuning(&self, kind: DisruptionKind) -> KindTuning {
        self.kinds.get(&kind).cloned().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.guaranteed_cap == 0 || self.opportunistic_cap == 0 {
            return Err(ConfigError::Invalid("caps must be at least 1".into()));
        }
        for (name, p) in [
            ("spawn_chance", self.spawn_chance),
            ("route_target_chance", self.route_target_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1]")));
            }
        }
        for (kind, t) in &self.kinds {
            let label = kind.label();
            if !(t.min_magnitude >= 0.0 && t.min_magnitude <= t.max_magnitude) {
                return Err(ConfigError::Invalid(format!(
                    "{label}: magnitude range must be non-negative and ordered"
                )));
            }
            if t.min_duration == 0 || t.min_duration > t.max_duration {
                return Err(ConfigError::Invalid(format!(
                    "{label}: duration range must be positive and ordered"
                )));
            }
            if !(t.weight >= 0.0 && t.weight.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "{label}: weight must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.guaranteed_cap, 2);
        assert_eq!(config.cooldown_window, 2);
        assert_eq!(config.kinds.len(), DisruptionKind::all().len());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GameConfig::from_json_str(r#"{ "spawn_chance": 0.9 }"#).unwrap();
        assert_eq!(config.spawn_chance, 0.9);
        assert_eq!(config.guaranteed_cap, 2);
        assert_eq!(config.tutorial_grace_day, 1);
    }

    #[test]
    fn test_kind_overrides() {
        let json = r#"{
            "kinds": {
                "blizzard": { "min_duration": 5, "max_duration": 6 }
            }
        }"#;
        let config = GameConfig::from_json_str(json).unwrap();
        let blizzard = config.tuning(DisruptionKind::Blizzard);
        assert_eq!(blizzard.min_duration, 5);
        // Kinds missing from the file fall back to the plain default.
        assert_eq!(config.tuning(DisruptionKind::Demand), KindTuning::default());
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let err = GameConfig::from_json_str(r#"{ "spawn_chance": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = GameConfig::from_json_str(
            r#"{ "kinds": { "delay": { "min_magnitude": 3.0, "max_magnitude": 1.0 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = GameConfig::from_json_str(r#"{ "guaranteed_cap": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = GameConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = GameConfig::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
