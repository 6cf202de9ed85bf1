//! Engine configuration
//!
//! Tunables for the command engine, curve store, phonemization pipeline and
//! pitch baking, loadable from YAML or JSON. Every field has a default so a
//! partial document only overrides what it names.

use crate::models::expression::ExpressionDescriptor;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_EXPRESSIONS_YAML: &str = include_str!("default_expressions.yaml");

static DEFAULT_EXPRESSIONS: Lazy<Vec<ExpressionDescriptor>> = Lazy::new(|| {
    match serde_yaml::from_str(DEFAULT_EXPRESSIONS_YAML) {
        Ok(descriptors) => descriptors,
        Err(e) => {
            log::error!("Embedded expression table is invalid: {}", e);
            Vec::new()
        }
    }
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid json config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of undo groups kept in history
    pub undo_limit: usize,
    /// Tick grid that curve edits snap to
    pub curve_interval: i32,
    /// Minimum distance in ticks between consecutive phoneme starts
    pub min_phoneme_gap: i32,
    /// Notes shorter than this are stretched during validation
    pub min_note_duration: i32,
    /// Share of the previous phoneme a preutter may consume when there is no gap
    pub zero_gap_preutter_ratio: f32,
    /// Same as above when the user has set an explicit preutter delta
    pub zero_gap_preutter_ratio_with_delta: f32,
    /// Allowed deviation in cents when baking rendered pitch into points
    pub bake_tolerance_cents: f64,
    /// Tick spacing of rendered pitch frames
    pub bake_frame_interval: i32,
    pub default_bpm: f64,
    pub default_beat_per_bar: i32,
    pub default_beat_unit: i32,
    pub default_resolution: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_limit: 100,
            curve_interval: 5,
            min_phoneme_gap: 10,
            min_note_duration: 1,
            zero_gap_preutter_ratio: 0.5,
            zero_gap_preutter_ratio_with_delta: 0.9,
            bake_tolerance_cents: 10.0,
            bake_frame_interval: 5,
            default_bpm: 120.0,
            default_beat_per_bar: 4,
            default_beat_unit: 4,
            default_resolution: 480,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        config.checked()
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.checked()
    }

    fn checked(self) -> Result<Self, ConfigError> {
        if self.curve_interval <= 0 {
            return Err(ConfigError::Invalid(format!(
                "curve_interval must be positive, got {}",
                self.curve_interval
            )));
        }
        if self.bake_frame_interval <= 0 {
            return Err(ConfigError::Invalid(format!(
                "bake_frame_interval must be positive, got {}",
                self.bake_frame_interval
            )));
        }
        if !(0.0..=1.0).contains(&self.zero_gap_preutter_ratio) {
            return Err(ConfigError::Invalid(format!(
                "zero_gap_preutter_ratio must be within 0..=1, got {}",
                self.zero_gap_preutter_ratio
            )));
        }
        if self.default_resolution <= 0 || self.default_bpm <= 0.0 {
            return Err(ConfigError::Invalid("tempo and resolution must be positive".to_string()));
        }
        Ok(self)
    }
}

/// Expression descriptors every new project starts with
pub fn default_expressions() -> Vec<ExpressionDescriptor> {
    DEFAULT_EXPRESSIONS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::expression::{abbr, ExpressionType};

    #[test]
    fn test_default_table_parses() {
        let exps = default_expressions();
        assert_eq!(exps.len(), 22);
        let vel = exps.iter().find(|d| d.abbr == abbr::VEL).unwrap();
        assert_eq!(vel.default_value, 100.0);
        let pitd = exps.iter().find(|d| d.abbr == abbr::PITD).unwrap();
        assert_eq!(pitd.kind, ExpressionType::Curve);
        let gen = exps.iter().find(|d| d.abbr == abbr::GEN).unwrap();
        assert_eq!(gen.flag.as_deref(), Some("g"));
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let config = EngineConfig::from_yaml("undo_limit: 5\nzero_gap_preutter_ratio: 0.25\n").unwrap();
        assert_eq!(config.undo_limit, 5);
        assert_eq!(config.zero_gap_preutter_ratio, 0.25);
        assert_eq!(config.curve_interval, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(EngineConfig::from_json(r#"{"curve_interval": 0}"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }
}
