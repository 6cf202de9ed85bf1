//! Note-level batch edits

use super::{in_group, selected_indexes, voice_part, BatchEdit, Result};
use crate::document::Document;
use crate::models::note::NoteId;
use crate::models::part::PartId;
use crate::models::pitch::Vibrato;
use crate::undo::{Command, VibratoParam};

/// Ticks a tail note lasts, and the rest needed before one is added
const TAIL_DURATION: i32 = 120;

/// Append a short breath/tail note after every note followed by a rest
pub struct AddTailNote {
    pub lyric: String,
}

impl AddTailNote {
    pub fn new(lyric: &str) -> Self {
        Self {
            lyric: lyric.to_string(),
        }
    }
}

impl BatchEdit for AddTailNote {
    fn name(&self) -> &str {
        "Add tail note"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let voice = voice_part(doc, part)?;
        let mut tails = Vec::new();
        for i in selected_indexes(voice, selection) {
            let note = &voice.notes[i];
            let rest_follows = voice
                .notes
                .get(i + 1)
                .map_or(true, |next| next.position > note.end() + TAIL_DURATION);
            if note.lyric != self.lyric && rest_follows {
                let mut tail = doc.project().create_note(note.tone, note.end(), TAIL_DURATION);
                tail.lyric = self.lyric.clone();
                tails.push(tail);
            }
        }
        if tails.is_empty() {
            return Ok(());
        }
        in_group(doc, |doc| Ok(doc.execute(Command::add_notes(part, tails))?))
    }
}

pub struct Transpose {
    pub delta_tone: i32,
}

impl BatchEdit for Transpose {
    fn name(&self) -> &str {
        "Transpose"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let voice = voice_part(doc, part)?;
        let ids: Vec<NoteId> = selected_indexes(voice, selection)
            .into_iter()
            .map(|i| voice.notes[i].id)
            .collect();
        if ids.is_empty() || self.delta_tone == 0 {
            return Ok(());
        }
        in_group(doc, |doc| Ok(doc.execute(Command::move_notes(part, ids, 0, self.delta_tone))?))
    }
}

/// Snap note starts and ends to a tick grid
pub struct QuantizeNotes {
    pub quantize: i32,
}

impl BatchEdit for QuantizeNotes {
    fn name(&self) -> &str {
        "Quantize"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let grid = self.quantize.max(1);
        let snap = |tick: i32| ((tick as f64 / grid as f64).round() as i32) * grid;
        let voice = voice_part(doc, part)?;
        let mut commands = Vec::new();
        for i in selected_indexes(voice, selection) {
            let note = &voice.notes[i];
            let (position, end) = (snap(note.position), snap(note.end()));
            if position != note.position {
                commands.push(Command::move_notes(part, vec![note.id], position - note.position, 0));
            }
            if end - position != note.duration {
                commands.push(Command::resize_notes(part, vec![note.id], end - position - note.duration));
            }
        }
        if commands.is_empty() {
            return Ok(());
        }
        in_group(doc, |doc| {
            for command in commands {
                doc.execute(command)?;
            }
            Ok(())
        })
    }
}

pub struct ResetPitchBends;

impl BatchEdit for ResetPitchBends {
    fn name(&self) -> &str {
        "Reset pitch bends"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let voice = voice_part(doc, part)?;
        let ids: Vec<NoteId> = selected_indexes(voice, selection)
            .into_iter()
            .map(|i| voice.notes[i].id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        in_group(doc, |doc| Ok(doc.execute(Command::reset_pitch_points(part, ids))?))
    }
}

/// Drop note and phoneme expressions, then clear every curve of the part
pub struct ResetAllExpressions;

impl BatchEdit for ResetAllExpressions {
    fn name(&self) -> &str {
        "Reset all expressions"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let voice = voice_part(doc, part)?;
        let ids: Vec<NoteId> = selected_indexes(voice, selection)
            .into_iter()
            .map(|i| &voice.notes[i])
            .filter(|n| !n.note_expressions.is_empty() || !n.phoneme_expressions.is_empty())
            .map(|n| n.id)
            .collect();
        let curves: Vec<String> = voice.curves.iter().map(|c| c.abbr.clone()).collect();
        in_group(doc, |doc| {
            if !ids.is_empty() {
                doc.execute(Command::reset_expressions(part, ids))?;
            }
            for abbr in curves {
                doc.execute(Command::clear_curve(part, &abbr))?;
            }
            Ok(())
        })
    }
}

pub struct ClearVibratos;

impl BatchEdit for ClearVibratos {
    fn name(&self) -> &str {
        "Clear vibratos"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let voice = voice_part(doc, part)?;
        let ids: Vec<NoteId> = selected_indexes(voice, selection)
            .into_iter()
            .map(|i| &voice.notes[i])
            .filter(|n| n.vibrato.length() > 0.0)
            .map(|n| n.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        in_group(doc, |doc| {
            Ok(doc.execute(Command::set_vibrato(part, ids, VibratoParam::Length, 0.0))?)
        })
    }
}

/// Restore default vibrato parameters and switch the vibrato off
pub struct ResetVibratos;

impl BatchEdit for ResetVibratos {
    fn name(&self) -> &str {
        "Reset vibratos"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let voice = voice_part(doc, part)?;
        let ids: Vec<NoteId> = selected_indexes(voice, selection)
            .into_iter()
            .map(|i| voice.notes[i].id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        let defaults = Vibrato::default();
        let params = [
            (VibratoParam::Period, defaults.period()),
            (VibratoParam::Depth, defaults.depth()),
            (VibratoParam::FadeIn, defaults.fade_in()),
            (VibratoParam::FadeOut, defaults.fade_out()),
            (VibratoParam::Shift, defaults.shift()),
            (VibratoParam::Drift, defaults.drift()),
            (VibratoParam::Length, defaults.length()),
        ];
        in_group(doc, |doc| {
            for (param, value) in params {
                doc.execute(Command::set_vibrato(part, ids.clone(), param, value))?;
            }
            Ok(())
        })
    }
}

/// Remove offset and preutter/overlap adjustments from phoneme overrides
pub struct ClearTimings;

impl BatchEdit for ClearTimings {
    fn name(&self) -> &str {
        "Clear phoneme timings"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let voice = voice_part(doc, part)?;
        let ids: Vec<NoteId> = selected_indexes(voice, selection)
            .into_iter()
            .map(|i| &voice.notes[i])
            .filter(|n| {
                n.phoneme_overrides
                    .iter()
                    .any(|o| o.offset.is_some() || o.preutter_delta.is_some() || o.overlap_delta.is_some())
            })
            .map(|n| n.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        in_group(doc, |doc| Ok(doc.execute(Command::clear_phoneme_timings(part, ids))?))
    }
}
