//! Parts
//!
//! A part places content on a track: either notes and curves (voice) or an
//! audio clip (wave). Note positions inside a voice part are relative to
//! the part start.

use super::note::{Note, NoteId};
use super::phoneme::Phoneme;
use crate::curve::Curve;
use crate::models::expression::ExpressionDescriptor;
use crate::phonemizer::{PhonemizerNote, PhonemizerPhoneme};
use crate::utils::TimeAxis;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PART_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PartId(pub u64);

impl PartId {
    pub fn next() -> Self {
        PartId(NEXT_PART_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One phonemizer call remembered for reuse
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CachedRun {
    pub notes: Vec<PhonemizerNote>,
    pub prev: Option<PhonemizerNote>,
    pub next: Option<PhonemizerNote>,
    pub output: Vec<PhonemizerPhoneme>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VoicePart {
    #[serde(skip, default = "PartId::next")]
    pub id: PartId,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub track_no: usize,
    pub position: i32,
    pub duration: i32,
    /// Sorted by (position, id)
    pub notes: Vec<Note>,
    #[serde(default)]
    pub curves: Vec<Curve>,
    /// Derived by validation
    #[serde(skip)]
    pub phonemes: Vec<Phoneme>,
    #[serde(skip)]
    pub(crate) phonemizer_cache: Vec<CachedRun>,
}

impl VoicePart {
    pub fn new(track_no: usize, position: i32, duration: i32) -> Self {
        Self {
            id: PartId::next(),
            name: "New Part".to_string(),
            comment: String::new(),
            track_no,
            position,
            duration,
            notes: Vec::new(),
            curves: Vec::new(),
            phonemes: Vec::new(),
            phonemizer_cache: Vec::new(),
        }
    }

    pub fn end(&self) -> i32 {
        self.position + self.duration
    }

    pub fn note_index(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    /// Insert keeping (position, id) order; returns the new index
    pub fn insert_note(&mut self, note: Note) -> usize {
        let key = (note.position, note.id);
        let index = self.notes.partition_point(|n| (n.position, n.id) < key);
        self.notes.insert(index, note);
        index
    }

    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let index = self.note_index(id)?;
        Some(self.notes.remove(index))
    }

    /// Restore (position, id) order after positions changed
    pub fn sort_notes(&mut self) {
        self.notes.sort_by_key(|n| (n.position, n.id));
    }

    pub fn curve(&self, abbr: &str) -> Option<&Curve> {
        self.curves.iter().find(|c| c.abbr == abbr)
    }

    pub fn curve_mut(&mut self, abbr: &str) -> Option<&mut Curve> {
        self.curves.iter_mut().find(|c| c.abbr == abbr)
    }

    /// Get a curve, creating an empty one from the descriptor when missing
    pub fn curve_or_insert(&mut self, descriptor: &ExpressionDescriptor) -> &mut Curve {
        let pos = match self.curves.iter().position(|c| c.abbr == descriptor.abbr) {
            Some(pos) => pos,
            None => {
                self.curves.push(Curve::new(descriptor));
                self.curves.len() - 1
            }
        };
        &mut self.curves[pos]
    }

    /// Last note end rounded up to the next beat, measured from the part start
    pub fn min_duration(&self, axis: &TimeAxis) -> i32 {
        let last_end = self.notes.iter().map(Note::end).max().unwrap_or(1);
        axis.next_beat_after(self.position + last_end) - self.position
    }

    /// Phonemes sung by a note
    pub fn phonemes_of(&self, note_index: usize) -> &[Phoneme] {
        match self.notes.get(note_index) {
            Some(note) if note.phonemes.end <= self.phonemes.len() => &self.phonemes[note.phonemes.clone()],
            _ => &[],
        }
    }

    /// Absolute part-relative tick of a phoneme
    pub fn phoneme_tick(&self, phoneme: &Phoneme) -> i32 {
        self.notes
            .get(phoneme.parent)
            .map_or(phoneme.position, |n| n.position + phoneme.position)
    }

    /// Copy with fresh part and note identities
    pub fn duplicate(&self) -> VoicePart {
        let mut part = VoicePart::new(self.track_no, self.position, self.duration);
        part.name = self.name.clone();
        part.comment = self.comment.clone();
        part.notes = self.notes.iter().map(Note::duplicate).collect();
        part.sort_notes();
        part.curves = self.curves.clone();
        part
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WavePart {
    #[serde(skip, default = "PartId::next")]
    pub id: PartId,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub track_no: usize,
    pub position: i32,
    pub file_path: String,
    /// Length of the referenced audio
    pub file_duration_ms: f64,
    #[serde(default)]
    pub skip_ms: f64,
    #[serde(default)]
    pub trim_ms: f64,
    /// Derived from the audio length and the time axis
    #[serde(skip)]
    pub duration: i32,
}

impl WavePart {
    pub fn new(track_no: usize, position: i32, file_path: &str, file_duration_ms: f64) -> Self {
        let name = file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_path)
            .to_string();
        Self {
            id: PartId::next(),
            name,
            comment: String::new(),
            track_no,
            position,
            file_path: file_path.to_string(),
            file_duration_ms,
            skip_ms: 0.0,
            trim_ms: 0.0,
            duration: 0,
        }
    }

    /// Audible length in ticks at the part's position
    pub fn min_duration(&self, axis: &TimeAxis) -> i32 {
        let ms = (self.file_duration_ms - self.skip_ms - self.trim_ms).max(0.0);
        axis.ms_to_tick(ms).max(1)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Voice(VoicePart),
    Wave(WavePart),
}

impl Part {
    pub fn id(&self) -> PartId {
        match self {
            Part::Voice(p) => p.id,
            Part::Wave(p) => p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Part::Voice(p) => &p.name,
            Part::Wave(p) => &p.name,
        }
    }

    pub fn set_name(&mut self, name: String) {
        match self {
            Part::Voice(p) => p.name = name,
            Part::Wave(p) => p.name = name,
        }
    }

    pub fn track_no(&self) -> usize {
        match self {
            Part::Voice(p) => p.track_no,
            Part::Wave(p) => p.track_no,
        }
    }

    pub fn set_track_no(&mut self, track_no: usize) {
        match self {
            Part::Voice(p) => p.track_no = track_no,
            Part::Wave(p) => p.track_no = track_no,
        }
    }

    pub fn position(&self) -> i32 {
        match self {
            Part::Voice(p) => p.position,
            Part::Wave(p) => p.position,
        }
    }

    pub fn set_position(&mut self, position: i32) {
        match self {
            Part::Voice(p) => p.position = position,
            Part::Wave(p) => p.position = position,
        }
    }

    pub fn duration(&self) -> i32 {
        match self {
            Part::Voice(p) => p.duration,
            Part::Wave(p) => p.duration,
        }
    }

    pub fn set_duration(&mut self, duration: i32) {
        match self {
            Part::Voice(p) => p.duration = duration,
            Part::Wave(p) => p.duration = duration,
        }
    }

    pub fn end(&self) -> i32 {
        self.position() + self.duration()
    }

    pub fn min_duration(&self, axis: &TimeAxis) -> i32 {
        match self {
            Part::Voice(p) => p.min_duration(axis),
            Part::Wave(p) => p.min_duration(axis),
        }
    }

    pub fn as_voice(&self) -> Option<&VoicePart> {
        match self {
            Part::Voice(p) => Some(p),
            Part::Wave(_) => None,
        }
    }

    pub fn as_voice_mut(&mut self) -> Option<&mut VoicePart> {
        match self {
            Part::Voice(p) => Some(p),
            Part::Wave(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position_order() {
        let mut part = VoicePart::new(0, 0, 1920);
        part.insert_note(Note::new(60, 480, 480, "b"));
        part.insert_note(Note::new(60, 0, 480, "a"));
        part.insert_note(Note::new(60, 960, 480, "c"));
        let lyrics: Vec<&str> = part.notes.iter().map(|n| n.lyric.as_str()).collect();
        assert_eq!(lyrics, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_voice_min_duration_rounds_to_next_beat() {
        let axis = TimeAxis::default();
        let mut part = VoicePart::new(0, 0, 0);
        part.insert_note(Note::new(60, 0, 500, "a"));
        assert_eq!(part.min_duration(&axis), 960);
        part.notes.clear();
        assert_eq!(part.min_duration(&axis), 480);
    }

    #[test]
    fn test_wave_min_duration_from_audio_length() {
        let axis = TimeAxis::default();
        let mut part = WavePart::new(0, 0, "/audio/take1.wav", 1000.0);
        assert_eq!(part.name, "take1.wav");
        assert_eq!(part.min_duration(&axis), 960);
        part.skip_ms = 500.0;
        assert_eq!(part.min_duration(&axis), 480);
    }

    #[test]
    fn test_remove_note_by_id() {
        let mut part = VoicePart::new(0, 0, 1920);
        let note = Note::new(60, 0, 480, "a");
        let id = note.id;
        part.insert_note(note);
        assert!(part.remove_note(id).is_some());
        assert!(part.remove_note(id).is_none());
    }
}
