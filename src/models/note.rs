//! Notes
//!
//! A note owns its persisted fields (timing, tone, lyric, pitch bends,
//! vibrato, expression and phoneme overrides). Linkage to neighbours and the
//! phonemes it sings are derived and rebuilt by validation; they are stored
//! as indices into the owning part's arenas.

use super::expression::{Expression, ExpressionDescriptor};
use super::phoneme::PhonemeOverride;
use super::pitch::{Pitch, PitchPoint, Vibrato};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lyric prefix marking a slur continuation of the previous note
pub const EXTEND_MARKER: &str = "+";

/// Shortest duration a resize can leave a note with
pub const MIN_NOTE_DURATION: i32 = 1;

static PHONETIC_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(.*)\]").expect("phonetic hint pattern is valid"));

static NEXT_NOTE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a note across sorting and undo
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NoteId(pub u64);

impl NoteId {
    pub fn next() -> Self {
        NoteId(NEXT_NOTE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    #[serde(skip, default = "NoteId::next")]
    pub id: NoteId,
    #[serde(rename = "pos")]
    pub position: i32,
    #[serde(rename = "dur")]
    pub duration: i32,
    #[serde(rename = "num")]
    pub tone: i32,
    #[serde(rename = "lrc")]
    pub lyric: String,
    #[serde(rename = "pit", default)]
    pub pitch: Pitch,
    #[serde(rename = "vbr", default)]
    pub vibrato: Vibrato,
    #[serde(rename = "nex", default)]
    pub note_expressions: Vec<Expression>,
    #[serde(rename = "pex", default)]
    pub phoneme_expressions: Vec<Expression>,
    #[serde(rename = "phm", default)]
    pub phoneme_overrides: Vec<PhonemeOverride>,

    /// Derived linkage (calculated, not stored)
    #[serde(skip)]
    pub prev: Option<usize>,
    #[serde(skip)]
    pub next: Option<usize>,
    /// Head of the slur chain this note continues
    #[serde(skip)]
    pub extends: Option<usize>,
    /// Index of this note's first phoneme within its phoneme run
    #[serde(skip)]
    pub phoneme_offset: usize,
    /// Duration including every note that extends this one
    #[serde(skip)]
    pub extended_duration: i32,
    /// Range into the part's phoneme list
    #[serde(skip)]
    pub phonemes: Range<usize>,
    #[serde(skip)]
    pub error: bool,
    #[serde(skip)]
    pub overlap_error: bool,
}

impl Note {
    /// Create a note with no pitch points
    pub fn new(tone: i32, position: i32, duration: i32, lyric: &str) -> Self {
        Self {
            id: NoteId::next(),
            position,
            duration,
            tone,
            lyric: lyric.to_string(),
            pitch: Pitch::default(),
            vibrato: Vibrato::default(),
            note_expressions: Vec::new(),
            phoneme_expressions: Vec::new(),
            phoneme_overrides: Vec::new(),
            prev: None,
            next: None,
            extends: None,
            phoneme_offset: 0,
            extended_duration: duration,
            phonemes: 0..0,
            error: false,
            overlap_error: false,
        }
    }

    pub fn end(&self) -> i32 {
        self.position + self.duration
    }

    pub fn extended_end(&self) -> i32 {
        self.position + self.extended_duration
    }

    /// Whether the lyric asks to continue the previous note's phonemes
    pub fn is_extender(&self) -> bool {
        self.lyric.starts_with(EXTEND_MARKER)
    }

    /// Split the lyric into the sung text and an optional bracketed phonetic hint
    pub fn lyric_and_hint(&self) -> (String, Option<String>) {
        split_phonetic_hint(&self.lyric)
    }

    /// Copy with a fresh identity and no derived state
    pub fn duplicate(&self) -> Note {
        let mut note = Note::new(self.tone, self.position, self.duration, &self.lyric);
        note.pitch = self.pitch.clone();
        note.vibrato = self.vibrato;
        note.note_expressions = self.note_expressions.clone();
        note.phoneme_expressions = self.phoneme_expressions.clone();
        note.phoneme_overrides = self.phoneme_overrides.clone();
        note
    }

    /// Default bend: a flat two-point curve around the note start
    pub fn reset_pitch(&mut self, duration_ms: f64) {
        self.pitch.data = vec![
            PitchPoint::new(-25.0, 0.0),
            PitchPoint::new(25f64.min(duration_ms / 2.0) as f32, 0.0),
        ];
    }

    pub fn phoneme_override(&self, index: usize) -> Option<&PhonemeOverride> {
        self.phoneme_overrides.iter().find(|o| o.index == index)
    }

    /// Get the override for a run index, creating an empty one when missing
    pub fn phoneme_override_mut(&mut self, index: usize) -> &mut PhonemeOverride {
        let pos = match self.phoneme_overrides.iter().position(|o| o.index == index) {
            Some(pos) => pos,
            None => {
                self.phoneme_overrides.push(PhonemeOverride::new(index));
                self.phoneme_overrides.len() - 1
            }
        };
        &mut self.phoneme_overrides[pos]
    }

    /// Drop overrides that no longer change anything
    pub fn prune_phoneme_overrides(&mut self) {
        self.phoneme_overrides.retain(|o| !o.is_empty());
    }

    pub fn note_expression(&self, abbr: &str) -> Option<f32> {
        self.note_expressions
            .iter()
            .find(|e| e.abbr == abbr)
            .map(|e| e.value)
    }

    pub fn phoneme_expression(&self, abbr: &str, index: usize) -> Option<f32> {
        self.phoneme_expressions
            .iter()
            .find(|e| e.abbr == abbr && e.index == Some(index))
            .map(|e| e.value)
    }

    /// Set or clear an expression override.
    ///
    /// `index` addresses a phoneme within the run; `None` targets the note.
    /// Values equal to the descriptor default remove the override.
    pub fn set_expression(&mut self, descriptor: &ExpressionDescriptor, index: Option<usize>, value: Option<f32>) {
        let list = match index {
            Some(_) => &mut self.phoneme_expressions,
            None => &mut self.note_expressions,
        };
        let existing = list
            .iter()
            .position(|e| e.abbr == descriptor.abbr && e.index == index);
        match value.map(|v| descriptor.clamp(v)) {
            Some(v) if v != descriptor.default_value => match existing {
                Some(pos) => list[pos].value = v,
                None => list.push(Expression::new(&descriptor.abbr, index, v)),
            },
            _ => {
                if let Some(pos) = existing {
                    list.remove(pos);
                }
            }
        }
    }

    /// Reset linkage before a validation pass.
    ///
    /// Phoneme ranges survive until phonemes are redistributed.
    pub(crate) fn clear_derived(&mut self) {
        self.prev = None;
        self.next = None;
        self.extends = None;
        self.extended_duration = self.duration;
        self.error = false;
        self.overlap_error = false;
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\" Pos:{} Dur:{} Tone:{}{}",
            self.lyric,
            self.position,
            self.duration,
            self.tone,
            if self.error { " Error" } else { "" }
        )
    }
}

/// Split `read[r iy d]` into (`read`, `Some("r iy d")`)
pub fn split_phonetic_hint(lyric: &str) -> (String, Option<String>) {
    let hint = PHONETIC_HINT
        .captures(lyric)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());
    let text = PHONETIC_HINT.replace(lyric, "").trim().to_string();
    (text, hint)
}
