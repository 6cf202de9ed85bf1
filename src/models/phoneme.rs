//! Phonemes, phoneme overrides and amplitude envelopes
//!
//! Phonemes are derived data: the validation pipeline regenerates them
//! wholesale on every pass and nothing here is persisted except overrides.

use serde::{Deserialize, Serialize};

/// Number of control points in an amplitude envelope
pub const ENVELOPE_POINTS: usize = 5;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct EnvelopePoint {
    /// Milliseconds relative to the phoneme start
    pub x: f32,
    /// Amplitude in percent
    pub y: f32,
}

/// Five-point attack/sustain/release amplitude curve
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub data: [EnvelopePoint; ENVELOPE_POINTS],
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            data: [
                EnvelopePoint { x: 0.0, y: 0.0 },
                EnvelopePoint { x: 0.0, y: 100.0 },
                EnvelopePoint { x: 0.0, y: 100.0 },
                EnvelopePoint { x: 0.0, y: 100.0 },
                EnvelopePoint { x: 0.0, y: 0.0 },
            ],
        }
    }
}

/// What the singer reported for a resolved alias
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SampleDescriptor {
    /// Alias after tone/prefix mapping
    pub alias: String,
    pub preutter_ms: f32,
    pub overlap_ms: f32,
}

/// Per-phoneme user adjustment, addressed by index within a phoneme run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PhonemeOverride {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phoneme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preutter_delta: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_delta: Option<f32>,
}

impl PhonemeOverride {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phoneme.as_deref().map_or(true, str::is_empty)
            && self.offset.is_none()
            && self.preutter_delta.is_none()
            && self.overlap_delta.is_none()
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Phoneme {
    /// Ticks relative to the parent note start (may be negative)
    pub position: i32,
    /// Alias as produced by the phonemizer, after overrides
    pub phoneme: String,
    /// Alias the singer resolved, empty when unresolved
    pub phoneme_mapped: String,
    /// Index of the parent note in the part's note list
    pub parent: usize,
    /// Index within the parent note's phonemes
    pub index: usize,
    /// Index within the whole phoneme run (what overrides address)
    pub run_index: usize,
    pub duration: i32,
    pub preutter: f32,
    pub overlap: f32,
    pub overlapped: bool,
    pub tail_intrude: f32,
    pub tail_overlap: f32,
    pub preutter_delta: Option<f32>,
    pub overlap_delta: Option<f32>,
    pub has_phoneme_override: bool,
    pub has_offset_override: bool,
    pub envelope: Envelope,
    pub sample: Option<SampleDescriptor>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub error: bool,
}

impl Phoneme {
    pub fn new(parent: usize, index: usize, run_index: usize, position: i32, phoneme: String) -> Self {
        Self {
            position,
            phoneme,
            phoneme_mapped: String::new(),
            parent,
            index,
            run_index,
            duration: 0,
            preutter: 0.0,
            overlap: 0.0,
            overlapped: false,
            tail_intrude: 0.0,
            tail_overlap: 0.0,
            preutter_delta: None,
            overlap_delta: None,
            has_phoneme_override: false,
            has_offset_override: false,
            envelope: Envelope::default(),
            sample: None,
            prev: None,
            next: None,
            error: false,
        }
    }

    pub fn end(&self) -> i32 {
        self.position + self.duration
    }
}

impl std::fmt::Display for Phoneme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" pos:{}", self.phoneme, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_emptiness() {
        let mut o = PhonemeOverride::new(2);
        assert!(o.is_empty());
        o.phoneme = Some(String::new());
        assert!(o.is_empty());
        o.offset = Some(-30);
        assert!(!o.is_empty());
    }

    #[test]
    fn test_default_envelope_shape() {
        let env = Envelope::default();
        assert_eq!(env.data[0].y, 0.0);
        assert_eq!(env.data[2].y, 100.0);
        assert_eq!(env.data[4].y, 0.0);
    }
}
