//! Document commands
//!
//! Every document mutation is a [`Command`]. Commands validate their targets
//! before touching anything, so a failing command leaves the project as it
//! was. Values that are needed to revert an edit are captured on execute.

use super::{EngineError, Result, ValidateOptions};
use crate::models::expression::{Expression, ExpressionDescriptor};
use crate::models::note::{Note, NoteId, MIN_NOTE_DURATION};
use crate::models::part::{Part, PartId, VoicePart};
use crate::models::phoneme::PhonemeOverride;
use crate::models::pitch::{Pitch, PitchPoint, PitchPointShape, Vibrato};
use crate::models::project::Project;
use crate::models::track::Track;
use crate::phonemizer::{Phonemizer, Renderer, Singer};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MIN_BPM: f64 = 10.0;
pub const MAX_BPM: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VibratoParam {
    Length,
    Period,
    Depth,
    FadeIn,
    FadeOut,
    Shift,
    Drift,
}

impl VibratoParam {
    pub fn apply(self, vibrato: &mut Vibrato, value: f32) {
        match self {
            VibratoParam::Length => vibrato.set_length(value),
            VibratoParam::Period => vibrato.set_period(value),
            VibratoParam::Depth => vibrato.set_depth(value),
            VibratoParam::FadeIn => vibrato.set_fade_in(value),
            VibratoParam::FadeOut => vibrato.set_fade_out(value),
            VibratoParam::Shift => vibrato.set_shift(value),
            VibratoParam::Drift => vibrato.set_drift(value),
        }
    }
}

/// One field of a phoneme override; `None` clears it
#[derive(Clone, Debug, PartialEq)]
pub enum OverrideValue {
    Alias(Option<String>),
    Offset(Option<i32>),
    PreutterDelta(Option<f32>),
    OverlapDelta(Option<f32>),
}

impl OverrideValue {
    fn apply(&self, o: &mut PhonemeOverride) {
        match self {
            OverrideValue::Alias(v) => o.phoneme = v.clone(),
            OverrideValue::Offset(v) => o.offset = *v,
            OverrideValue::PreutterDelta(v) => o.preutter_delta = *v,
            OverrideValue::OverlapDelta(v) => o.overlap_delta = *v,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackState {
    pub mute: bool,
    pub solo: bool,
    pub volume: f64,
    pub pan: f64,
}

/// Curve samples captured for undo
#[derive(Clone, Debug, PartialEq)]
pub struct CurveState {
    pub existed: bool,
    pub xs: Vec<i32>,
    pub ys: Vec<i32>,
}

impl CurveState {
    fn capture(part: &VoicePart, abbr: &str) -> Self {
        match part.curve(abbr) {
            Some(curve) => Self {
                existed: true,
                xs: curve.xs.clone(),
                ys: curve.ys.clone(),
            },
            None => Self {
                existed: false,
                xs: Vec::new(),
                ys: Vec::new(),
            },
        }
    }

    fn restore(&self, part: &mut VoicePart, descriptor: &ExpressionDescriptor) {
        if !self.existed {
            part.curves.retain(|c| c.abbr != descriptor.abbr);
            return;
        }
        let curve = part.curve_or_insert(descriptor);
        curve.xs = self.xs.clone();
        curve.ys = self.ys.clone();
    }
}

pub enum Command {
    // Project
    ChangeBpm { bpm: f64 },
    ChangeTimeSignature { beat_per_bar: i32, beat_unit: i32 },
    ConfigureExpressions { expressions: BTreeMap<String, ExpressionDescriptor> },

    // Track
    AddTrack { index: usize, track: Option<Box<Track>> },
    RemoveTrack { index: usize, track: Option<Box<Track>>, removed_parts: Vec<(usize, Part)> },
    MoveTrack { index: usize, up: bool },
    RenameTrack { index: usize, name: String },
    ChangeTrackColor { index: usize, color: String },
    /// `singer_name` travels with the singer so a missing placeholder survives undo
    ChangeSinger { index: usize, singer: Option<Arc<dyn Singer>>, singer_name: Option<String> },
    ChangePhonemizer { index: usize, phonemizer: Box<dyn Phonemizer> },
    ChangeRenderer { index: usize, renderer: Arc<dyn Renderer> },
    ChangeTrackState { index: usize, state: TrackState },

    // Part
    AddPart { id: PartId, part: Option<Box<Part>> },
    RemovePart { id: PartId, index: usize, part: Option<Box<Part>> },
    MovePart { id: PartId, position: i32, track_no: usize },
    ResizePart { id: PartId, duration: i32 },
    RenamePart { id: PartId, name: String },
    /// `id` is whichever part currently sits in the document
    ReplacePart { id: PartId, part: Box<Part> },

    // Note
    AddNotes { part: PartId, ids: Vec<NoteId>, notes: Vec<Note> },
    RemoveNotes { part: PartId, ids: Vec<NoteId>, notes: Vec<Note> },
    MoveNotes { part: PartId, ids: Vec<NoteId>, delta_position: i32, delta_tone: i32 },
    ResizeNotes { part: PartId, ids: Vec<NoteId>, delta: i32, applied: Vec<i32> },
    ChangeLyrics { part: PartId, ids: Vec<NoteId>, lyrics: Vec<String> },
    SetVibrato { part: PartId, ids: Vec<NoteId>, param: VibratoParam, value: f32, old: Vec<Vibrato> },
    SetNoteExpression {
        part: PartId,
        ids: Vec<NoteId>,
        abbr: String,
        values: Vec<Option<f32>>,
        old: Vec<Vec<Expression>>,
    },
    SetPhonemeExpression {
        part: PartId,
        ids: Vec<NoteId>,
        indexes: Vec<usize>,
        abbr: String,
        values: Vec<Option<f32>>,
        old: Vec<Vec<Expression>>,
    },
    ResetExpressions { part: PartId, ids: Vec<NoteId>, old: Vec<(Vec<Expression>, Vec<Expression>)> },
    ChangePhonemeOverrides {
        part: PartId,
        ids: Vec<NoteId>,
        indexes: Vec<usize>,
        values: Vec<OverrideValue>,
        old: Vec<Vec<PhonemeOverride>>,
    },
    ClearPhonemeTimings { part: PartId, ids: Vec<NoteId>, old: Vec<Vec<PhonemeOverride>> },

    // Pitch
    AddPitchPoint { part: PartId, note: NoteId, point: PitchPoint, index: Option<usize> },
    DeletePitchPoint { part: PartId, note: NoteId, index: usize, point: Option<PitchPoint> },
    MovePitchPoint { part: PartId, note: NoteId, index: usize, delta_x: f32, delta_y: f32, old: Option<PitchPoint> },
    ChangePitchPointShape { part: PartId, note: NoteId, index: usize, shape: PitchPointShape },
    SnapPitchPoint { part: PartId, note: NoteId },
    ResetPitchPoints { part: PartId, ids: Vec<NoteId>, old: Vec<Pitch> },
    SetPitches { part: PartId, ids: Vec<NoteId>, pitches: Vec<Pitch> },

    // Curve
    SetCurve {
        part: PartId,
        abbr: String,
        x: i32,
        y: i32,
        last_x: i32,
        last_y: i32,
        old: Option<CurveState>,
        new: Option<CurveState>,
    },
    MergedSetCurve { part: PartId, abbr: String, old: CurveState, new: CurveState },
    ClearCurve { part: PartId, abbr: String, old: Option<CurveState> },
    ReplaceCurve { part: PartId, abbr: String, xs: Vec<i32>, ys: Vec<i32> },
}

fn voice_mut(project: &mut Project, id: PartId) -> Result<&mut VoicePart> {
    match project.part_mut(id) {
        Some(Part::Voice(part)) => Ok(part),
        Some(Part::Wave(_)) => Err(EngineError::NotVoicePart(id)),
        None => Err(EngineError::PartNotFound(id)),
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(EngineError::LengthMismatch { what, expected, actual });
    }
    Ok(())
}

fn check_track(project: &Project, index: usize) -> Result<()> {
    if index >= project.tracks.len() {
        return Err(EngineError::TrackNotFound(index));
    }
    Ok(())
}

/// Resolve every id to its current index, failing before any mutation
fn note_indexes(part: &VoicePart, ids: &[NoteId]) -> Result<Vec<usize>> {
    ids.iter()
        .map(|&id| part.note_index(id).ok_or(EngineError::NoteNotFound(id, part.id)))
        .collect()
}

fn note_mut(part: &mut VoicePart, id: NoteId) -> Result<&mut Note> {
    let part_id = part.id;
    part.note_mut(id).ok_or(EngineError::NoteNotFound(id, part_id))
}

fn descriptor(project: &Project, abbr: &str) -> Result<ExpressionDescriptor> {
    project
        .expression(abbr)
        .cloned()
        .ok_or_else(|| EngineError::UnknownExpression(abbr.to_string()))
}

fn taken<T>(slot: &mut Option<T>, what: &str) -> Result<T> {
    slot.take()
        .ok_or_else(|| EngineError::Inconsistent(format!("{} already applied", what)))
}

fn swap_tracks(project: &mut Project, a: usize, b: usize) -> Result<()> {
    check_track(project, a)?;
    check_track(project, b)?;
    project.tracks.swap(a, b);
    for part in project.parts.iter_mut() {
        if part.track_no() == a {
            part.set_track_no(b);
        } else if part.track_no() == b {
            part.set_track_no(a);
        }
    }
    Ok(())
}

impl Command {
    pub fn change_bpm(bpm: f64) -> Self {
        Command::ChangeBpm {
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
        }
    }

    pub fn add_track(index: usize, track: Track) -> Self {
        Command::AddTrack {
            index,
            track: Some(Box::new(track)),
        }
    }

    pub fn change_singer(index: usize, singer: Option<Arc<dyn Singer>>) -> Self {
        Command::ChangeSinger {
            index,
            singer_name: singer.as_ref().map(|s| s.name().to_string()),
            singer,
        }
    }

    pub fn remove_track(index: usize) -> Self {
        Command::RemoveTrack {
            index,
            track: None,
            removed_parts: Vec::new(),
        }
    }

    pub fn add_part(part: Part) -> Self {
        Command::AddPart {
            id: part.id(),
            part: Some(Box::new(part)),
        }
    }

    pub fn remove_part(id: PartId) -> Self {
        Command::RemovePart { id, index: 0, part: None }
    }

    pub fn add_notes(part: PartId, notes: Vec<Note>) -> Self {
        Command::AddNotes {
            part,
            ids: notes.iter().map(|n| n.id).collect(),
            notes,
        }
    }

    pub fn remove_notes(part: PartId, ids: Vec<NoteId>) -> Self {
        Command::RemoveNotes {
            part,
            ids,
            notes: Vec::new(),
        }
    }

    pub fn move_notes(part: PartId, ids: Vec<NoteId>, delta_position: i32, delta_tone: i32) -> Self {
        Command::MoveNotes {
            part,
            ids,
            delta_position,
            delta_tone,
        }
    }

    pub fn resize_notes(part: PartId, ids: Vec<NoteId>, delta: i32) -> Self {
        Command::ResizeNotes {
            part,
            ids,
            delta,
            applied: Vec::new(),
        }
    }

    pub fn set_vibrato(part: PartId, ids: Vec<NoteId>, param: VibratoParam, value: f32) -> Self {
        Command::SetVibrato {
            part,
            ids,
            param,
            value,
            old: Vec::new(),
        }
    }

    pub fn set_note_expression(part: PartId, ids: Vec<NoteId>, abbr: &str, values: Vec<Option<f32>>) -> Self {
        Command::SetNoteExpression {
            part,
            ids,
            abbr: abbr.to_string(),
            values,
            old: Vec::new(),
        }
    }

    pub fn set_phoneme_expression(
        part: PartId,
        ids: Vec<NoteId>,
        indexes: Vec<usize>,
        abbr: &str,
        values: Vec<Option<f32>>,
    ) -> Self {
        Command::SetPhonemeExpression {
            part,
            ids,
            indexes,
            abbr: abbr.to_string(),
            values,
            old: Vec::new(),
        }
    }

    pub fn reset_expressions(part: PartId, ids: Vec<NoteId>) -> Self {
        Command::ResetExpressions {
            part,
            ids,
            old: Vec::new(),
        }
    }

    pub fn change_phoneme_overrides(
        part: PartId,
        ids: Vec<NoteId>,
        indexes: Vec<usize>,
        values: Vec<OverrideValue>,
    ) -> Self {
        Command::ChangePhonemeOverrides {
            part,
            ids,
            indexes,
            values,
            old: Vec::new(),
        }
    }

    pub fn clear_phoneme_timings(part: PartId, ids: Vec<NoteId>) -> Self {
        Command::ClearPhonemeTimings {
            part,
            ids,
            old: Vec::new(),
        }
    }

    pub fn add_pitch_point(part: PartId, note: NoteId, point: PitchPoint) -> Self {
        Command::AddPitchPoint {
            part,
            note,
            point,
            index: None,
        }
    }

    pub fn delete_pitch_point(part: PartId, note: NoteId, index: usize) -> Self {
        Command::DeletePitchPoint {
            part,
            note,
            index,
            point: None,
        }
    }

    pub fn move_pitch_point(part: PartId, note: NoteId, index: usize, delta_x: f32, delta_y: f32) -> Self {
        Command::MovePitchPoint {
            part,
            note,
            index,
            delta_x,
            delta_y,
            old: None,
        }
    }

    pub fn reset_pitch_points(part: PartId, ids: Vec<NoteId>) -> Self {
        Command::ResetPitchPoints {
            part,
            ids,
            old: Vec::new(),
        }
    }

    pub fn set_curve(part: PartId, abbr: &str, x: i32, y: i32, last_x: i32, last_y: i32) -> Self {
        Command::SetCurve {
            part,
            abbr: abbr.to_string(),
            x,
            y,
            last_x,
            last_y,
            old: None,
            new: None,
        }
    }

    pub fn clear_curve(part: PartId, abbr: &str) -> Self {
        Command::ClearCurve {
            part,
            abbr: abbr.to_string(),
            old: None,
        }
    }

    pub fn execute(&mut self, project: &mut Project) -> Result<()> {
        match self {
            Command::ChangeBpm { bpm } => {
                std::mem::swap(&mut project.bpm, bpm);
            }
            Command::ChangeTimeSignature { beat_per_bar, beat_unit } => {
                if *beat_per_bar <= 0 || *beat_unit <= 0 {
                    return Err(EngineError::InvalidTimeSignature {
                        beat_per_bar: *beat_per_bar,
                        beat_unit: *beat_unit,
                    });
                }
                std::mem::swap(&mut project.beat_per_bar, beat_per_bar);
                std::mem::swap(&mut project.beat_unit, beat_unit);
            }
            Command::ConfigureExpressions { expressions } => {
                std::mem::swap(&mut project.expressions, expressions);
                rebind_curves(project);
            }
            Command::AddTrack { index, track } => {
                if *index > project.tracks.len() {
                    return Err(EngineError::TrackNotFound(*index));
                }
                let mut track = taken(track, "add track")?;
                track.phonemizer.set_singer(track.singer.clone());
                project.tracks.insert(*index, *track);
                for part in project.parts.iter_mut() {
                    if part.track_no() >= *index {
                        part.set_track_no(part.track_no() + 1);
                    }
                }
            }
            Command::RemoveTrack { index, track, removed_parts } => {
                check_track(project, *index)?;
                let mut kept = Vec::with_capacity(project.parts.len());
                removed_parts.clear();
                for (i, part) in std::mem::take(&mut project.parts).into_iter().enumerate() {
                    if part.track_no() == *index {
                        removed_parts.push((i, part));
                    } else {
                        kept.push(part);
                    }
                }
                for part in kept.iter_mut() {
                    if part.track_no() > *index {
                        part.set_track_no(part.track_no() - 1);
                    }
                }
                project.parts = kept;
                *track = Some(Box::new(project.tracks.remove(*index)));
            }
            Command::MoveTrack { index, up } => {
                let target = if *up { index.checked_sub(1) } else { Some(*index + 1) };
                let target = target.ok_or(EngineError::TrackNotFound(*index))?;
                swap_tracks(project, *index, target)?;
            }
            Command::RenameTrack { index, name } => {
                check_track(project, *index)?;
                std::mem::swap(&mut project.tracks[*index].name, name);
            }
            Command::ChangeTrackColor { index, color } => {
                check_track(project, *index)?;
                std::mem::swap(&mut project.tracks[*index].color, color);
            }
            Command::ChangeSinger { index, singer, singer_name } => {
                check_track(project, *index)?;
                project.tracks[*index].swap_singer(singer, singer_name);
            }
            Command::ChangePhonemizer { index, phonemizer } => {
                check_track(project, *index)?;
                project.tracks[*index].swap_phonemizer(phonemizer);
            }
            Command::ChangeRenderer { index, renderer } => {
                check_track(project, *index)?;
                project.tracks[*index].swap_renderer(renderer);
            }
            Command::ChangeTrackState { index, state } => {
                check_track(project, *index)?;
                let track = &mut project.tracks[*index];
                std::mem::swap(&mut track.mute, &mut state.mute);
                std::mem::swap(&mut track.solo, &mut state.solo);
                std::mem::swap(&mut track.volume, &mut state.volume);
                std::mem::swap(&mut track.pan, &mut state.pan);
            }
            Command::AddPart { part, .. } => {
                let part = taken(part, "add part")?;
                check_track(project, part.track_no())?;
                project.parts.push(*part);
            }
            Command::RemovePart { id, index, part } => {
                let at = project.part_index(*id).ok_or(EngineError::PartNotFound(*id))?;
                *index = at;
                *part = Some(Box::new(project.parts.remove(at)));
            }
            Command::MovePart { id, position, track_no } => {
                check_track(project, *track_no)?;
                let part = project.part_mut(*id).ok_or(EngineError::PartNotFound(*id))?;
                let (old_position, old_track) = (part.position(), part.track_no());
                part.set_position(*position);
                part.set_track_no(*track_no);
                *position = old_position;
                *track_no = old_track;
            }
            Command::ResizePart { id, duration } => {
                let part = project.part_mut(*id).ok_or(EngineError::PartNotFound(*id))?;
                let old = part.duration();
                part.set_duration(*duration);
                *duration = old;
            }
            Command::RenamePart { id, name } => {
                let part = project.part_mut(*id).ok_or(EngineError::PartNotFound(*id))?;
                let old = part.name().to_string();
                part.set_name(std::mem::take(name));
                *name = old;
            }
            Command::ReplacePart { id, part } => {
                let at = project.part_index(*id).ok_or(EngineError::PartNotFound(*id))?;
                std::mem::swap(&mut project.parts[at], part.as_mut());
                *id = project.parts[at].id();
            }
            Command::AddNotes { part, ids, notes } => {
                let voice = voice_mut(project, *part)?;
                check_len("notes", ids.len(), notes.len())?;
                for note in notes.drain(..) {
                    voice.insert_note(note);
                }
            }
            Command::RemoveNotes { part, ids, notes } => {
                let voice = voice_mut(project, *part)?;
                note_indexes(voice, ids)?;
                notes.clear();
                for id in ids.iter() {
                    if let Some(note) = voice.remove_note(*id) {
                        notes.push(note);
                    }
                }
            }
            Command::MoveNotes { part, ids, delta_position, delta_tone } => {
                let voice = voice_mut(project, *part)?;
                for index in note_indexes(voice, ids)? {
                    voice.notes[index].position += *delta_position;
                    voice.notes[index].tone += *delta_tone;
                }
                voice.sort_notes();
            }
            Command::ResizeNotes { part, ids, delta, applied } => {
                let voice = voice_mut(project, *part)?;
                applied.clear();
                for index in note_indexes(voice, ids)? {
                    let note = &mut voice.notes[index];
                    let step = (*delta).max(MIN_NOTE_DURATION - note.duration);
                    note.duration += step;
                    applied.push(step);
                }
            }
            Command::ChangeLyrics { part, ids, lyrics } => {
                let voice = voice_mut(project, *part)?;
                check_len("lyrics", ids.len(), lyrics.len())?;
                for (index, lyric) in note_indexes(voice, ids)?.into_iter().zip(lyrics.iter_mut()) {
                    std::mem::swap(&mut voice.notes[index].lyric, lyric);
                }
            }
            Command::SetVibrato { part, ids, param, value, old } => {
                let voice = voice_mut(project, *part)?;
                old.clear();
                for index in note_indexes(voice, ids)? {
                    let vibrato = &mut voice.notes[index].vibrato;
                    old.push(*vibrato);
                    param.apply(vibrato, *value);
                }
            }
            Command::SetNoteExpression { part, ids, abbr, values, old } => {
                let descriptor = descriptor(project, abbr)?;
                let voice = voice_mut(project, *part)?;
                check_len("expression values", ids.len(), values.len())?;
                old.clear();
                for (index, value) in note_indexes(voice, ids)?.into_iter().zip(values.iter()) {
                    let note = &mut voice.notes[index];
                    old.push(note.note_expressions.clone());
                    note.set_expression(&descriptor, None, *value);
                }
            }
            Command::SetPhonemeExpression { part, ids, indexes, abbr, values, old } => {
                let descriptor = descriptor(project, abbr)?;
                let voice = voice_mut(project, *part)?;
                check_len("phoneme indexes", ids.len(), indexes.len())?;
                check_len("expression values", ids.len(), values.len())?;
                old.clear();
                let notes = note_indexes(voice, ids)?;
                for ((note_index, phoneme_index), value) in notes.into_iter().zip(indexes.iter()).zip(values.iter()) {
                    let note = &mut voice.notes[note_index];
                    old.push(note.phoneme_expressions.clone());
                    note.set_expression(&descriptor, Some(*phoneme_index), *value);
                }
            }
            Command::ResetExpressions { part, ids, old } => {
                let voice = voice_mut(project, *part)?;
                old.clear();
                for index in note_indexes(voice, ids)? {
                    let note = &mut voice.notes[index];
                    old.push((
                        std::mem::take(&mut note.note_expressions),
                        std::mem::take(&mut note.phoneme_expressions),
                    ));
                }
            }
            Command::ChangePhonemeOverrides { part, ids, indexes, values, old } => {
                let voice = voice_mut(project, *part)?;
                check_len("phoneme indexes", ids.len(), indexes.len())?;
                check_len("override values", ids.len(), values.len())?;
                old.clear();
                let notes = note_indexes(voice, ids)?;
                for ((note_index, phoneme_index), value) in notes.into_iter().zip(indexes.iter()).zip(values.iter()) {
                    let note = &mut voice.notes[note_index];
                    old.push(note.phoneme_overrides.clone());
                    value.apply(note.phoneme_override_mut(*phoneme_index));
                }
            }
            Command::ClearPhonemeTimings { part, ids, old } => {
                let voice = voice_mut(project, *part)?;
                old.clear();
                for index in note_indexes(voice, ids)? {
                    let note = &mut voice.notes[index];
                    old.push(note.phoneme_overrides.clone());
                    for o in note.phoneme_overrides.iter_mut() {
                        o.offset = None;
                        o.preutter_delta = None;
                        o.overlap_delta = None;
                    }
                    note.prune_phoneme_overrides();
                }
            }
            Command::AddPitchPoint { part, note, point, index } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                *index = Some(note.pitch.add_point(*point));
            }
            Command::DeletePitchPoint { part, note, index, point } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                if *index >= note.pitch.data.len() {
                    return Err(EngineError::IndexOutOfRange { what: "pitch point", index: *index });
                }
                *point = Some(note.pitch.data.remove(*index));
            }
            Command::MovePitchPoint { part, note, index, delta_x, delta_y, old } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                let point = note
                    .pitch
                    .data
                    .get_mut(*index)
                    .ok_or(EngineError::IndexOutOfRange { what: "pitch point", index: *index })?;
                *old = Some(*point);
                point.x += *delta_x;
                point.y += *delta_y;
            }
            Command::ChangePitchPointShape { part, note, index, shape } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                let point = note
                    .pitch
                    .data
                    .get_mut(*index)
                    .ok_or(EngineError::IndexOutOfRange { what: "pitch point", index: *index })?;
                std::mem::swap(&mut point.shape, shape);
            }
            Command::SnapPitchPoint { part, note } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                note.pitch.snap_first = !note.pitch.snap_first;
            }
            Command::ResetPitchPoints { part, ids, old } => {
                let axis = *project.time_axis();
                let voice = voice_mut(project, *part)?;
                old.clear();
                for index in note_indexes(voice, ids)? {
                    let note = &mut voice.notes[index];
                    old.push(note.pitch.clone());
                    note.reset_pitch(axis.tick_to_ms(note.duration as f64));
                }
            }
            Command::SetPitches { part, ids, pitches } => {
                let voice = voice_mut(project, *part)?;
                check_len("pitches", ids.len(), pitches.len())?;
                for (index, pitch) in note_indexes(voice, ids)?.into_iter().zip(pitches.iter_mut()) {
                    std::mem::swap(&mut voice.notes[index].pitch, pitch);
                }
            }
            Command::SetCurve { part, abbr, x, y, last_x, last_y, old, new } => {
                let descriptor = descriptor(project, abbr)?;
                let interval = project.curve_interval;
                let voice = voice_mut(project, *part)?;
                *old = Some(CurveState::capture(voice, abbr));
                let curve = voice.curve_or_insert(&descriptor);
                curve.interval = interval;
                curve.set(*x, *y, *last_x, *last_y);
                *new = Some(CurveState::capture(voice, abbr));
            }
            Command::MergedSetCurve { part, abbr, new, .. } => {
                let descriptor = descriptor(project, abbr)?;
                let voice = voice_mut(project, *part)?;
                new.restore(voice, &descriptor);
            }
            Command::ClearCurve { part, abbr, old } => {
                let voice = voice_mut(project, *part)?;
                *old = Some(CurveState::capture(voice, abbr));
                if let Some(curve) = voice.curve_mut(abbr) {
                    curve.clear();
                }
            }
            Command::ReplaceCurve { part, abbr, xs, ys } => {
                let descriptor = descriptor(project, abbr)?;
                let voice = voice_mut(project, *part)?;
                check_len("curve values", xs.len(), ys.len())?;
                let curve = voice.curve_or_insert(&descriptor);
                std::mem::swap(&mut curve.xs, xs);
                std::mem::swap(&mut curve.ys, ys);
            }
        }
        Ok(())
    }

    /// Exact inverse of [`Command::execute`]
    pub fn unexecute(&mut self, project: &mut Project) -> Result<()> {
        match self {
            Command::ChangeBpm { .. }
            | Command::ChangeTimeSignature { .. }
            | Command::ConfigureExpressions { .. }
            | Command::RenameTrack { .. }
            | Command::ChangeTrackColor { .. }
            | Command::ChangeSinger { .. }
            | Command::ChangePhonemizer { .. }
            | Command::ChangeRenderer { .. }
            | Command::ChangeTrackState { .. }
            | Command::MovePart { .. }
            | Command::ResizePart { .. }
            | Command::RenamePart { .. }
            | Command::ReplacePart { .. }
            | Command::ChangePitchPointShape { .. }
            | Command::SnapPitchPoint { .. }
            | Command::ReplaceCurve { .. } => {
                // Swap-based: applying again restores the previous value
                self.execute(project)?;
            }
            Command::ChangeLyrics { part, ids, lyrics } => {
                // Repeated ids swap back in reverse
                let voice = voice_mut(project, *part)?;
                for (index, lyric) in note_indexes(voice, ids)?.into_iter().zip(lyrics.iter_mut()).rev() {
                    std::mem::swap(&mut voice.notes[index].lyric, lyric);
                }
            }
            Command::SetPitches { part, ids, pitches } => {
                let voice = voice_mut(project, *part)?;
                for (index, pitch) in note_indexes(voice, ids)?.into_iter().zip(pitches.iter_mut()).rev() {
                    std::mem::swap(&mut voice.notes[index].pitch, pitch);
                }
            }
            Command::MoveTrack { index, up } => {
                let target = if *up { index.checked_sub(1) } else { Some(*index + 1) };
                let target = target.ok_or(EngineError::TrackNotFound(*index))?;
                swap_tracks(project, *index, target)?;
            }
            Command::AddTrack { index, track } => {
                check_track(project, *index)?;
                *track = Some(Box::new(project.tracks.remove(*index)));
                for part in project.parts.iter_mut() {
                    if part.track_no() > *index {
                        part.set_track_no(part.track_no() - 1);
                    }
                }
            }
            Command::RemoveTrack { index, track, removed_parts } => {
                let track = taken(track, "remove track")?;
                if *index > project.tracks.len() {
                    return Err(EngineError::TrackNotFound(*index));
                }
                project.tracks.insert(*index, *track);
                for part in project.parts.iter_mut() {
                    if part.track_no() >= *index {
                        part.set_track_no(part.track_no() + 1);
                    }
                }
                for (at, part) in removed_parts.drain(..) {
                    let at = at.min(project.parts.len());
                    project.parts.insert(at, part);
                }
            }
            Command::AddPart { id, part } => {
                let at = project.part_index(*id).ok_or(EngineError::PartNotFound(*id))?;
                *part = Some(Box::new(project.parts.remove(at)));
            }
            Command::RemovePart { index, part, .. } => {
                let part = taken(part, "remove part")?;
                let at = (*index).min(project.parts.len());
                project.parts.insert(at, *part);
            }
            Command::AddNotes { part, ids, notes } => {
                let voice = voice_mut(project, *part)?;
                note_indexes(voice, ids)?;
                notes.clear();
                for id in ids.iter() {
                    if let Some(note) = voice.remove_note(*id) {
                        notes.push(note);
                    }
                }
            }
            Command::RemoveNotes { part, notes, .. } => {
                let voice = voice_mut(project, *part)?;
                for note in notes.drain(..) {
                    voice.insert_note(note);
                }
            }
            Command::MoveNotes { part, ids, delta_position, delta_tone } => {
                let voice = voice_mut(project, *part)?;
                for index in note_indexes(voice, ids)? {
                    voice.notes[index].position -= *delta_position;
                    voice.notes[index].tone -= *delta_tone;
                }
                voice.sort_notes();
            }
            Command::ResizeNotes { part, ids, applied, .. } => {
                let voice = voice_mut(project, *part)?;
                for (index, step) in note_indexes(voice, ids)?.into_iter().zip(applied.iter()) {
                    voice.notes[index].duration -= *step;
                }
            }
            Command::SetVibrato { part, ids, old, .. } => {
                let voice = voice_mut(project, *part)?;
                for (index, vibrato) in note_indexes(voice, ids)?.into_iter().zip(old.iter()).rev() {
                    voice.notes[index].vibrato = *vibrato;
                }
            }
            Command::SetNoteExpression { part, ids, old, .. } => {
                let voice = voice_mut(project, *part)?;
                let notes = note_indexes(voice, ids)?;
                for (index, exps) in notes.into_iter().zip(old.drain(..)).rev() {
                    voice.notes[index].note_expressions = exps;
                }
            }
            Command::SetPhonemeExpression { part, ids, old, .. } => {
                let voice = voice_mut(project, *part)?;
                let notes = note_indexes(voice, ids)?;
                for (index, exps) in notes.into_iter().zip(old.drain(..)).rev() {
                    voice.notes[index].phoneme_expressions = exps;
                }
            }
            Command::ResetExpressions { part, ids, old } => {
                let voice = voice_mut(project, *part)?;
                let notes = note_indexes(voice, ids)?;
                for (index, (note_exps, phoneme_exps)) in notes.into_iter().zip(old.drain(..)).rev() {
                    voice.notes[index].note_expressions = note_exps;
                    voice.notes[index].phoneme_expressions = phoneme_exps;
                }
            }
            Command::ChangePhonemeOverrides { part, ids, old, .. }
            | Command::ClearPhonemeTimings { part, ids, old } => {
                let voice = voice_mut(project, *part)?;
                let notes = note_indexes(voice, ids)?;
                for (index, overrides) in notes.into_iter().zip(old.drain(..)).rev() {
                    voice.notes[index].phoneme_overrides = overrides;
                }
            }
            Command::AddPitchPoint { part, note, index, .. } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                let at = taken(index, "add pitch point")?;
                if at >= note.pitch.data.len() {
                    return Err(EngineError::IndexOutOfRange { what: "pitch point", index: at });
                }
                note.pitch.data.remove(at);
            }
            Command::DeletePitchPoint { part, note, index, point } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                let point = taken(point, "delete pitch point")?;
                let at = (*index).min(note.pitch.data.len());
                note.pitch.data.insert(at, point);
            }
            Command::MovePitchPoint { part, note, index, old, .. } => {
                let voice = voice_mut(project, *part)?;
                let note = note_mut(voice, *note)?;
                let old = taken(old, "move pitch point")?;
                let point = note
                    .pitch
                    .data
                    .get_mut(*index)
                    .ok_or(EngineError::IndexOutOfRange { what: "pitch point", index: *index })?;
                *point = old;
            }
            Command::ResetPitchPoints { part, ids, old } => {
                let voice = voice_mut(project, *part)?;
                let notes = note_indexes(voice, ids)?;
                for (index, pitch) in notes.into_iter().zip(old.drain(..)).rev() {
                    voice.notes[index].pitch = pitch;
                }
            }
            Command::SetCurve { part, abbr, old, .. }
            | Command::ClearCurve { part, abbr, old } => {
                let old = taken(old, "curve edit")?;
                let descriptor = descriptor(project, abbr)?;
                let voice = voice_mut(project, *part)?;
                old.restore(voice, &descriptor);
            }
            Command::MergedSetCurve { part, abbr, old, .. } => {
                let descriptor = descriptor(project, abbr)?;
                let voice = voice_mut(project, *part)?;
                old.restore(voice, &descriptor);
            }
        }
        Ok(())
    }

    /// Whether `next` can be folded into this command as one undo step
    pub fn can_merge(&self, next: &Command) -> bool {
        match (self, next) {
            (
                Command::SetCurve { part, abbr, new: Some(_), .. } | Command::MergedSetCurve { part, abbr, .. },
                Command::SetCurve {
                    part: next_part,
                    abbr: next_abbr,
                    new: Some(_),
                    ..
                },
            ) => part == next_part && abbr == next_abbr,
            _ => false,
        }
    }

    /// Fold `next` into this command. Both must already be executed.
    pub fn merge(self, next: Command) -> std::result::Result<Command, (Command, Command)> {
        match (self, next) {
            (
                Command::SetCurve { part, abbr, old: Some(old), .. } | Command::MergedSetCurve { part, abbr, old, .. },
                Command::SetCurve { new: Some(new), .. },
            ) => Ok(Command::MergedSetCurve { part, abbr, old, new }),
            (first, second) => Err((first, second)),
        }
    }

    /// Which parts of the document need revalidation after this command
    pub fn validate_options(&self) -> ValidateOptions {
        match self {
            Command::ChangeBpm { .. } | Command::ChangeTimeSignature { .. } => ValidateOptions::full(),
            Command::ConfigureExpressions { .. } => ValidateOptions::untimed(None),
            Command::AddTrack { .. }
            | Command::RemoveTrack { .. }
            | Command::MoveTrack { .. }
            | Command::ChangeSinger { .. }
            | Command::ChangePhonemizer { .. } => ValidateOptions::untimed(None),
            Command::RenameTrack { .. }
            | Command::ChangeTrackColor { .. }
            | Command::ChangeRenderer { .. }
            | Command::ChangeTrackState { .. } => ValidateOptions::untimed(None).without_phonemes(),
            Command::AddPart { id, .. }
            | Command::RemovePart { id, .. }
            | Command::ReplacePart { id, .. }
            | Command::MovePart { id, .. } => ValidateOptions::untimed(Some(*id)),
            Command::ResizePart { id, .. } | Command::RenamePart { id, .. } => {
                ValidateOptions::untimed(Some(*id)).without_phonemes()
            }
            Command::AddNotes { part, .. }
            | Command::RemoveNotes { part, .. }
            | Command::MoveNotes { part, .. }
            | Command::ResizeNotes { part, .. }
            | Command::ChangeLyrics { part, .. }
            | Command::SetPhonemeExpression { part, .. }
            | Command::ResetExpressions { part, .. } => ValidateOptions::untimed(Some(*part)),
            Command::ChangePhonemeOverrides { part, .. }
            | Command::ClearPhonemeTimings { part, .. }
            | Command::SetNoteExpression { part, .. } => ValidateOptions::untimed(Some(*part)).reuse_phonemizer(),
            Command::SetVibrato { part, .. }
            | Command::AddPitchPoint { part, .. }
            | Command::DeletePitchPoint { part, .. }
            | Command::MovePitchPoint { part, .. }
            | Command::ChangePitchPointShape { part, .. }
            | Command::SnapPitchPoint { part, .. }
            | Command::ResetPitchPoints { part, .. }
            | Command::SetPitches { part, .. }
            | Command::SetCurve { part, .. }
            | Command::MergedSetCurve { part, .. }
            | Command::ClearCurve { part, .. }
            | Command::ReplaceCurve { part, .. } => ValidateOptions::untimed(Some(*part)).without_phonemes(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Command::ChangeBpm { bpm } => format!("Change BPM ({})", bpm),
            Command::ChangeTimeSignature { beat_per_bar, beat_unit } => {
                format!("Change time signature ({}/{})", beat_per_bar, beat_unit)
            }
            Command::ConfigureExpressions { .. } => "Configure expressions".to_string(),
            Command::AddTrack { index, .. } => format!("Add track {}", index),
            Command::RemoveTrack { index, .. } => format!("Remove track {}", index),
            Command::MoveTrack { index, up } => {
                format!("Move track {} {}", index, if *up { "up" } else { "down" })
            }
            Command::RenameTrack { index, .. } => format!("Rename track {}", index),
            Command::ChangeTrackColor { index, .. } => format!("Change color of track {}", index),
            Command::ChangeSinger { index, .. } => format!("Change singer of track {}", index),
            Command::ChangePhonemizer { index, .. } => format!("Change phonemizer of track {}", index),
            Command::ChangeRenderer { index, .. } => format!("Change renderer of track {}", index),
            Command::ChangeTrackState { index, .. } => format!("Change settings of track {}", index),
            Command::AddPart { .. } => "Add part".to_string(),
            Command::RemovePart { .. } => "Remove part".to_string(),
            Command::MovePart { .. } => "Move part".to_string(),
            Command::ResizePart { .. } => "Resize part".to_string(),
            Command::RenamePart { .. } => "Rename part".to_string(),
            Command::ReplacePart { .. } => "Replace part".to_string(),
            Command::AddNotes { ids, .. } => format!("Add {} note(s)", ids.len()),
            Command::RemoveNotes { ids, .. } => format!("Remove {} note(s)", ids.len()),
            Command::MoveNotes { ids, .. } => format!("Move {} note(s)", ids.len()),
            Command::ResizeNotes { ids, .. } => format!("Resize {} note(s)", ids.len()),
            Command::ChangeLyrics { ids, .. } => format!("Change lyrics of {} note(s)", ids.len()),
            Command::SetVibrato { param, .. } => format!("Change vibrato {:?}", param),
            Command::SetNoteExpression { abbr, .. } => format!("Set note expression {}", abbr),
            Command::SetPhonemeExpression { abbr, .. } => format!("Set phoneme expression {}", abbr),
            Command::ResetExpressions { .. } => "Reset expressions".to_string(),
            Command::ChangePhonemeOverrides { .. } => "Change phoneme overrides".to_string(),
            Command::ClearPhonemeTimings { .. } => "Clear phoneme timings".to_string(),
            Command::AddPitchPoint { .. } => "Add pitch point".to_string(),
            Command::DeletePitchPoint { .. } => "Delete pitch point".to_string(),
            Command::MovePitchPoint { .. } => "Move pitch point".to_string(),
            Command::ChangePitchPointShape { .. } => "Change pitch point shape".to_string(),
            Command::SnapPitchPoint { .. } => "Toggle pitch snap".to_string(),
            Command::ResetPitchPoints { .. } => "Reset pitch points".to_string(),
            Command::SetPitches { .. } => "Set pitch points".to_string(),
            Command::SetCurve { abbr, .. } | Command::MergedSetCurve { abbr, .. } => format!("Edit curve {}", abbr),
            Command::ClearCurve { abbr, .. } => format!("Clear curve {}", abbr),
            Command::ReplaceCurve { abbr, .. } => format!("Replace curve {}", abbr),
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

fn rebind_curves(project: &mut Project) {
    let expressions = &project.expressions;
    for part in project.parts.iter_mut() {
        if let Part::Voice(voice) = part {
            for curve in voice.curves.iter_mut() {
                if let Some(descriptor) = expressions.get(&curve.abbr) {
                    curve.bind(descriptor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::expression::abbr;

    fn project_with_part() -> (Project, PartId) {
        let mut project = Project::default();
        project.tracks.push(Track::new("vocal"));
        let part = VoicePart::new(0, 0, 1920);
        let id = part.id;
        project.parts.push(Part::Voice(part));
        (project, id)
    }

    fn add_note(project: &mut Project, part: PartId, position: i32, lyric: &str) -> NoteId {
        let mut note = project.create_note(60, position, 480);
        note.lyric = lyric.to_string();
        let id = note.id;
        project.voice_part_mut(part).unwrap().insert_note(note);
        id
    }

    #[test]
    fn test_move_notes_round_trip() {
        let (mut project, part) = project_with_part();
        let a = add_note(&mut project, part, 0, "a");
        let b = add_note(&mut project, part, 480, "b");
        let mut cmd = Command::MoveNotes {
            part,
            ids: vec![a],
            delta_position: 960,
            delta_tone: 2,
        };
        cmd.execute(&mut project).unwrap();
        let voice = project.voice_part(part).unwrap();
        assert_eq!(voice.notes[0].id, b);
        assert_eq!(voice.notes[1].position, 960);
        assert_eq!(voice.notes[1].tone, 62);
        cmd.unexecute(&mut project).unwrap();
        let voice = project.voice_part(part).unwrap();
        assert_eq!(voice.notes[0].id, a);
        assert_eq!(voice.notes[0].position, 0);
        assert_eq!(voice.notes[0].tone, 60);
    }

    #[test]
    fn test_resize_never_goes_below_minimum() {
        let (mut project, part) = project_with_part();
        let a = add_note(&mut project, part, 0, "a");
        let mut cmd = Command::resize_notes(part, vec![a], -1000);
        cmd.execute(&mut project).unwrap();
        assert_eq!(project.voice_part(part).unwrap().notes[0].duration, MIN_NOTE_DURATION);
        cmd.unexecute(&mut project).unwrap();
        assert_eq!(project.voice_part(part).unwrap().notes[0].duration, 480);
    }

    #[test]
    fn test_mismatched_lyrics_rejected_without_mutation() {
        let (mut project, part) = project_with_part();
        let a = add_note(&mut project, part, 0, "a");
        let mut cmd = Command::ChangeLyrics {
            part,
            ids: vec![a],
            lyrics: vec!["x".to_string(), "y".to_string()],
        };
        let err = cmd.execute(&mut project).unwrap_err();
        assert!(matches!(err, EngineError::LengthMismatch { .. }));
        assert_eq!(project.voice_part(part).unwrap().notes[0].lyric, "a");
    }

    #[test]
    fn test_unknown_note_rejected() {
        let (mut project, part) = project_with_part();
        let a = add_note(&mut project, part, 0, "a");
        let ghost = NoteId::next();
        let mut cmd = Command::MoveNotes {
            part,
            ids: vec![a, ghost],
            delta_position: 10,
            delta_tone: 0,
        };
        assert_eq!(cmd.execute(&mut project), Err(EngineError::NoteNotFound(ghost, part)));
        assert_eq!(project.voice_part(part).unwrap().notes[0].position, 0);
    }

    #[test]
    fn test_phoneme_expression_restores_previous_list() {
        let (mut project, part) = project_with_part();
        let a = add_note(&mut project, part, 0, "a");
        let mut cmd = Command::set_phoneme_expression(part, vec![a, a], vec![0, 1], abbr::VEL, vec![Some(150.0), Some(50.0)]);
        cmd.execute(&mut project).unwrap();
        assert_eq!(project.voice_part(part).unwrap().notes[0].phoneme_expressions.len(), 2);
        cmd.unexecute(&mut project).unwrap();
        assert!(project.voice_part(part).unwrap().notes[0].phoneme_expressions.is_empty());
    }

    #[test]
    fn test_remove_track_restores_parts() {
        let (mut project, part) = project_with_part();
        project.tracks.push(Track::new("second"));
        let other = VoicePart::new(1, 0, 480);
        let other_id = other.id;
        project.parts.push(Part::Voice(other));
        let mut cmd = Command::remove_track(0);
        cmd.execute(&mut project).unwrap();
        assert_eq!(project.tracks.len(), 1);
        assert!(project.part(part).is_none());
        assert_eq!(project.part(other_id).map(Part::track_no), Some(0));
        cmd.unexecute(&mut project).unwrap();
        assert_eq!(project.tracks[0].name, "vocal");
        assert_eq!(project.part(part).map(Part::track_no), Some(0));
        assert_eq!(project.part(other_id).map(Part::track_no), Some(1));
        assert_eq!(project.part_index(part), Some(0));
    }

    #[test]
    fn test_curve_commands_merge() {
        let (mut project, part) = project_with_part();
        let mut first = Command::set_curve(part, abbr::PITD, 100, 80, 100, 0);
        first.execute(&mut project).unwrap();
        let mut second = Command::set_curve(part, abbr::PITD, 120, 40, 100, 80);
        second.execute(&mut project).unwrap();
        assert!(first.can_merge(&second));
        let mut merged = first.merge(second).unwrap();
        let final_xs = project.voice_part(part).unwrap().curve(abbr::PITD).unwrap().xs.clone();
        merged.unexecute(&mut project).unwrap();
        assert!(project.voice_part(part).unwrap().curve(abbr::PITD).is_none());
        merged.execute(&mut project).unwrap();
        assert_eq!(project.voice_part(part).unwrap().curve(abbr::PITD).unwrap().xs, final_xs);
    }

    #[test]
    fn test_repeated_ids_undo_to_original_values() {
        let (mut project, part) = project_with_part();
        let a = add_note(&mut project, part, 0, "a");
        let b = add_note(&mut project, part, 480, "b");
        Command::set_note_expression(part, vec![a], abbr::VOL, vec![Some(50.0)])
            .execute(&mut project)
            .unwrap();
        Command::add_pitch_point(part, a, PitchPoint::new(100.0, 40.0))
            .execute(&mut project)
            .unwrap();
        let original = project.voice_part(part).unwrap().notes[0].clone();

        let mut commands = vec![
            Command::reset_expressions(part, vec![a, a]),
            Command::set_vibrato(part, vec![a, b, a], VibratoParam::Depth, 80.0),
            Command::reset_pitch_points(part, vec![a, a]),
            Command::ChangeLyrics {
                part,
                ids: vec![a, a],
                lyrics: vec!["x".to_string(), "y".to_string()],
            },
        ];
        for cmd in commands.iter_mut() {
            cmd.execute(&mut project).unwrap();
        }
        let edited = &project.voice_part(part).unwrap().notes[0];
        assert_eq!(edited.note_expression(abbr::VOL), None);
        assert_eq!(edited.vibrato.depth(), 80.0);
        assert_eq!(edited.lyric, "y");

        for cmd in commands.iter_mut().rev() {
            cmd.unexecute(&mut project).unwrap();
        }
        let restored = &project.voice_part(part).unwrap().notes[0];
        assert_eq!(restored.note_expression(abbr::VOL), Some(50.0));
        assert_eq!(restored.vibrato, original.vibrato);
        assert_eq!(restored.pitch, original.pitch);
        assert_eq!(restored.lyric, "a");
    }

    #[test]
    fn test_change_singer_keeps_missing_singer_name() {
        let mut project = Project::default();
        let mut track = Track::new("vocal");
        track.singer_name = Some("Teto".to_string());
        project.tracks.push(track);
        assert!(!project.tracks[0].singer_loaded());

        let other: Arc<dyn Singer> = Arc::new(crate::phonemizer::OtoTableSinger::new("other"));
        let mut cmd = Command::change_singer(0, Some(other));
        cmd.execute(&mut project).unwrap();
        assert_eq!(project.tracks[0].singer_name.as_deref(), Some("other"));
        assert!(project.tracks[0].singer_loaded());

        cmd.unexecute(&mut project).unwrap();
        assert_eq!(project.tracks[0].singer_name.as_deref(), Some("Teto"));
        assert!(project.tracks[0].singer.is_none());

        cmd.execute(&mut project).unwrap();
        assert_eq!(project.tracks[0].singer_name.as_deref(), Some("other"));
    }

    #[test]
    fn test_time_signature_must_be_positive() {
        let mut project = Project::default();
        for (beat_per_bar, beat_unit) in [(0, 4), (3, 0), (-2, 8)] {
            let mut cmd = Command::ChangeTimeSignature { beat_per_bar, beat_unit };
            assert_eq!(
                cmd.execute(&mut project),
                Err(EngineError::InvalidTimeSignature { beat_per_bar, beat_unit })
            );
            assert_eq!((project.beat_per_bar, project.beat_unit), (4, 4));
        }
        let mut cmd = Command::ChangeTimeSignature { beat_per_bar: 3, beat_unit: 8 };
        cmd.execute(&mut project).unwrap();
        assert_eq!((project.beat_per_bar, project.beat_unit), (3, 8));
    }

    #[test]
    fn test_bpm_is_clamped() {
        let mut project = Project::default();
        let mut cmd = Command::change_bpm(5000.0);
        cmd.execute(&mut project).unwrap();
        assert_eq!(project.bpm, MAX_BPM);
        cmd.unexecute(&mut project).unwrap();
        assert_eq!(project.bpm, 120.0);
    }
}
