//! Phonemizer, singer and renderer capabilities
//!
//! The validation pipeline is the only caller of a [`Phonemizer`]. It builds
//! the neighbour context, hands over one run of slurred notes at a time and
//! receives a flat phoneme list positioned relative to the run's first note.

mod default;
mod oto;

pub use default::DefaultPhonemizer;
pub use oto::OtoTableSinger;

use crate::models::phoneme::SampleDescriptor;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhonemizerError {
    #[error("phonemizer {name} failed: {message}")]
    Failed { name: String, message: String },
    #[error("phonemizer {0} received an empty note run")]
    EmptyRun(String),
}

/// Per-phoneme attributes derived from phoneme expressions
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PhonemeAttributes {
    /// Index within the phoneme run
    pub index: usize,
    pub consonant_stretch_ratio: Option<f64>,
    pub alternate: Option<i32>,
    pub tone_shift: i32,
    pub voice_color: Option<String>,
}

/// A note as seen by a phonemizer
#[derive(Clone, Debug, PartialEq)]
pub struct PhonemizerNote {
    pub lyric: String,
    pub phonetic_hint: Option<String>,
    pub tone: i32,
    pub position: i32,
    pub duration: i32,
    pub attributes: Vec<PhonemeAttributes>,
}

/// One output phoneme, positioned in ticks relative to the run's first note
#[derive(Clone, Debug, PartialEq)]
pub struct PhonemizerPhoneme {
    pub phoneme: String,
    pub position: i32,
}

impl PhonemizerPhoneme {
    pub fn new(phoneme: &str, position: i32) -> Self {
        Self {
            phoneme: phoneme.to_string(),
            position,
        }
    }
}

pub trait Singer: Send + Sync {
    fn name(&self) -> &str;

    /// Missing singers stay representable but report `false`
    fn loaded(&self) -> bool;

    /// Resolve an alias at a tone to a concrete sample
    fn try_get_sample(&self, alias: &str, tone: i32) -> Option<SampleDescriptor>;

    /// Voice color sub-bank names, indexed by the color expression
    fn voice_colors(&self) -> Vec<String> {
        Vec::new()
    }
}

pub trait Phonemizer: Send {
    fn name(&self) -> &str;

    fn set_singer(&mut self, singer: Option<Arc<dyn Singer>>);

    fn set_timing(&mut self, _bpm: f64, _beat_unit: i32, _resolution: i32) {}

    /// Phonemize one run of slurred notes.
    ///
    /// `prev` and `next` are the true neighbours, with a slurred predecessor
    /// replaced by the head of its run.
    fn process(
        &mut self,
        notes: &[PhonemizerNote],
        prev: Option<&PhonemizerNote>,
        next: Option<&PhonemizerNote>,
    ) -> Result<Vec<PhonemizerPhoneme>, PhonemizerError>;
}

/// A rendered pitch curve in absolute tones, one frame per `interval` ticks
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedPitch {
    /// Ticks relative to the part start
    pub ticks: Vec<i32>,
    /// Tones (semitones, fractional)
    pub tones: Vec<f64>,
}

/// A render phrase handed to a renderer
#[derive(Clone, Debug, PartialEq)]
pub struct PhraseRequest {
    pub position: i32,
    pub end: i32,
    pub tones: Vec<i32>,
    pub phonemes: Vec<String>,
}

pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    fn supports_render_pitch(&self) -> bool {
        false
    }

    /// Pitch the renderer would sing for a phrase, if supported
    fn load_rendered_pitch(&self, _phrase: &PhraseRequest) -> Option<RenderedPitch> {
        None
    }
}

/// Renderer stand-in that supports nothing
#[derive(Debug, Default, Clone)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn name(&self) -> &str {
        "none"
    }
}
