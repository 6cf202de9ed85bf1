//! Expression descriptors and values
//!
//! A descriptor names an expression (velocity, volume, pitch deviation...)
//! and fixes its kind and range. Notes and phonemes carry sparse overrides
//! that fall back to the descriptor default.

use serde::{Deserialize, Serialize};

/// Well-known expression abbreviations
pub mod abbr {
    pub const DYN: &str = "dyn";
    pub const PITD: &str = "pitd";
    pub const CLR: &str = "clr";
    pub const ENG: &str = "eng";
    pub const VEL: &str = "vel";
    pub const VOL: &str = "vol";
    pub const ATK: &str = "atk";
    pub const DEC: &str = "dec";
    pub const GEN: &str = "gen";
    pub const GENC: &str = "genc";
    pub const BRE: &str = "bre";
    pub const BREC: &str = "brec";
    pub const LPF: &str = "lpf";
    pub const NORM: &str = "norm";
    pub const MOD: &str = "mod";
    pub const MODP: &str = "mod+";
    pub const ALT: &str = "alt";
    pub const DIR: &str = "dir";
    pub const SHFT: &str = "shft";
    pub const SHFC: &str = "shfc";
    pub const TENC: &str = "tenc";
    pub const VOIC: &str = "voic";

    /// Expressions every project must define
    pub const REQUIRED: [&str; 8] = [DYN, PITD, CLR, ENG, VEL, VOL, ATK, DEC];
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionType {
    Numerical,
    Options,
    Curve,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExpressionDescriptor {
    pub name: String,
    pub abbr: String,
    #[serde(rename = "type")]
    pub kind: ExpressionType,
    pub min: f32,
    pub max: f32,
    pub default_value: f32,
    /// Option expressions rendered as resampler flags use the option text itself
    #[serde(default)]
    pub is_flag: bool,
    /// Single-character resampler flag for numerical expressions
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

impl ExpressionDescriptor {
    pub fn numerical(name: &str, abbr: &str, min: f32, max: f32, default_value: f32) -> Self {
        Self {
            name: name.to_string(),
            abbr: abbr.to_string(),
            kind: ExpressionType::Numerical,
            min,
            max,
            default_value,
            is_flag: false,
            flag: None,
            options: Vec::new(),
        }
    }

    pub fn curve(name: &str, abbr: &str, min: f32, max: f32, default_value: f32) -> Self {
        Self {
            kind: ExpressionType::Curve,
            ..Self::numerical(name, abbr, min, max, default_value)
        }
    }

    pub fn options(name: &str, abbr: &str, is_flag: bool, options: Vec<String>) -> Self {
        let max = options.len().saturating_sub(1) as f32;
        Self {
            kind: ExpressionType::Options,
            is_flag,
            options,
            ..Self::numerical(name, abbr, 0.0, max, 0.0)
        }
    }

    /// Clamp a value to this descriptor's range.
    ///
    /// The voice color index is exempt: its range follows the singer's
    /// sub-bank count rather than the descriptor.
    pub fn clamp(&self, value: f32) -> f32 {
        if self.abbr == abbr::CLR {
            return value;
        }
        value.max(self.min).min(self.max)
    }
}

/// A sparse expression override on a note or one of its phonemes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Expression {
    pub abbr: String,
    /// Phoneme index within the phoneme run; `None` for note-level values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub value: f32,
}

impl Expression {
    pub fn new(abbr: &str, index: Option<usize>, value: f32) -> Self {
        Self {
            abbr: abbr.to_string(),
            index,
            value,
        }
    }
}
