//! Batch edits that read pitch back from the renderer

use super::task::CancelToken;
use super::{in_group, selected_indexes, unsupported, voice_part, BatchEdit, BatchEditError, Result};
use crate::bake::{bake_notes, bake_phrase, PitchSamples};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::models::expression::abbr;
use crate::models::note::NoteId;
use crate::models::part::{PartId, VoicePart};
use crate::models::pitch::Pitch;
use crate::phonemizer::Renderer;
use crate::undo::Command;
use crate::utils::TimeAxis;
use crate::validation::{render_phrases, RenderPhrase};
use std::collections::HashSet;
use std::sync::Arc;

/// Pitch points computed for a set of notes, ready to be applied
#[derive(Clone, Debug, PartialEq)]
pub struct BakeResult {
    pub ids: Vec<NoteId>,
    pub pitches: Vec<Pitch>,
    /// Part-relative tick span each note's points cover
    pub ranges: Vec<(i32, i32)>,
}

pub(crate) fn track_renderer(doc: &Document, part: PartId) -> Option<Arc<dyn Renderer>> {
    doc.project().track_of(part).map(|t| t.renderer.clone())
}

/// Renderer of the part's track, if it can render pitch
pub(crate) fn pitch_renderer(doc: &mut Document, part: PartId) -> Result<Arc<dyn Renderer>> {
    match track_renderer(doc, part) {
        Some(renderer) if renderer.supports_render_pitch() => Ok(renderer),
        Some(renderer) => Err(unsupported(doc, renderer.name(), "rendered pitch")),
        None => Err(unsupported(doc, "none", "rendered pitch")),
    }
}

fn selected_phrases(part: &VoicePart, selection: &[NoteId]) -> (Vec<RenderPhrase>, HashSet<usize>) {
    let selected: HashSet<usize> = selected_indexes(part, selection).into_iter().collect();
    let phrases = render_phrases(part)
        .into_iter()
        .filter(|phrase| phrase.notes.clone().any(|i| selected.contains(&i)))
        .collect();
    (phrases, selected)
}

/// Pitch of the part before any PITD deviation, in cents
fn base_pitch(part: &VoicePart, axis: &TimeAxis, tick: i32) -> f64 {
    let index = part.notes.partition_point(|n| n.position <= tick).saturating_sub(1);
    match part.notes.get(index) {
        Some(note) => {
            let x = axis.ms_between(note.position, tick) as f32;
            note.tone as f64 * 100.0 + note.pitch.evaluate(x) as f64
        }
        None => 0.0,
    }
}

/// Bake the selected notes of a part snapshot.
///
/// The cancel token is checked before each phrase.
pub fn bake_part(
    part: &VoicePart,
    selection: &[NoteId],
    renderer: &dyn Renderer,
    axis: &TimeAxis,
    config: &EngineConfig,
    cancel: Option<&CancelToken>,
) -> Result<BakeResult> {
    let (phrases, selected) = selected_phrases(part, selection);
    let mut result = BakeResult {
        ids: Vec::new(),
        pitches: Vec::new(),
        ranges: Vec::new(),
    };
    for phrase in phrases.iter() {
        if cancel.map_or(false, CancelToken::is_cancelled) {
            log::info!("Pitch bake cancelled");
            return Err(BatchEditError::Cancelled);
        }
        let rendered = match renderer.load_rendered_pitch(&phrase.request(part)) {
            Some(rendered) => rendered,
            None => continue,
        };
        let samples = match PitchSamples::from_rendered(&rendered, phrase.position, phrase.end, config.bake_frame_interval) {
            Some(samples) => samples,
            None => continue,
        };
        let notes = bake_notes(part, phrase);
        for baked in bake_phrase(&samples, &notes, axis, config.bake_tolerance_cents) {
            let index = phrase.notes.start + baked.note;
            if !selected.contains(&index) {
                continue;
            }
            result.ids.push(part.notes[index].id);
            result.pitches.push(Pitch {
                data: baked.points,
                snap_first: false,
            });
            result.ranges.push((baked.start_tick, baked.end_tick));
        }
    }
    Ok(result)
}

/// Write baked pitch points and zero PITD over the baked spans, in one group
pub fn apply_bake(doc: &mut Document, part: PartId, result: BakeResult) -> Result<()> {
    let voice = voice_part(doc, part)?;
    let mut ids = Vec::new();
    let mut pitches = Vec::new();
    let mut ranges = Vec::new();
    for ((id, pitch), range) in result.ids.into_iter().zip(result.pitches).zip(result.ranges) {
        // Notes removed since the snapshot are skipped
        if voice.note_index(id).is_some() {
            ids.push(id);
            pitches.push(pitch);
            ranges.push(range);
        }
    }
    if ids.is_empty() {
        return Ok(());
    }
    in_group(doc, |doc| {
        doc.execute(Command::SetPitches { part, ids, pitches })?;
        for (start, end) in ranges {
            doc.execute(Command::set_curve(part, abbr::PITD, start, 0, start, 0))?;
            doc.execute(Command::set_curve(part, abbr::PITD, end, 0, end, 0))?;
            doc.execute(Command::set_curve(part, abbr::PITD, start, 0, end, 0))?;
        }
        Ok(())
    })
}

/// Convert the renderer's pitch into the PITD curve
pub struct LoadRenderedPitch;

impl BatchEdit for LoadRenderedPitch {
    fn name(&self) -> &str {
        "Load rendered pitch"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let renderer = pitch_renderer(doc, part)?;
        let min_pitd = doc.project().expression(abbr::PITD).map_or(-1200.0, |d| d.min) as i32;
        let axis = *doc.project().time_axis();
        let voice = voice_part(doc, part)?;
        let (phrases, _) = selected_phrases(voice, selection);

        let mut commands = Vec::new();
        for phrase in phrases.iter() {
            let rendered = match renderer.load_rendered_pitch(&phrase.request(voice)) {
                Some(rendered) => rendered,
                None => continue,
            };
            let mut last: Option<(i32, i32)> = None;
            for (&x, &tone) in rendered.ticks.iter().zip(rendered.tones.iter()) {
                if tone < 0.0 {
                    continue;
                }
                let y = (tone * 100.0 - base_pitch(voice, &axis, x)) as i32;
                let (last_x, last_y) = last.unwrap_or((x, y));
                if y > min_pitd {
                    commands.push(Command::set_curve(part, abbr::PITD, x, y, last_x, last_y));
                }
                last = Some((x, y));
            }
        }
        in_group(doc, |doc| {
            for command in commands {
                doc.execute(command)?;
            }
            Ok(())
        })
    }
}

/// Replace note pitch points with a simplified copy of the rendered pitch
pub struct BakePitch;

impl BatchEdit for BakePitch {
    fn name(&self) -> &str {
        "Bake pitch"
    }

    fn run(&self, doc: &mut Document, part: PartId, selection: &[NoteId]) -> Result<()> {
        let renderer = pitch_renderer(doc, part)?;
        let axis = *doc.project().time_axis();
        let config = doc.config().clone();
        let voice = voice_part(doc, part)?;
        let result = bake_part(voice, selection, renderer.as_ref(), &axis, &config, None)?;
        apply_bake(doc, part, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::note::Note;

    #[test]
    fn test_base_pitch_uses_covering_note() {
        let axis = TimeAxis::default();
        let mut part = VoicePart::new(0, 0, 1920);
        part.insert_note(Note::new(60, 0, 480, "a"));
        part.insert_note(Note::new(64, 960, 480, "a"));
        assert_eq!(base_pitch(&part, &axis, 100), 6000.0);
        // A rest keeps the previous note's pitch
        assert_eq!(base_pitch(&part, &axis, 700), 6000.0);
        assert_eq!(base_pitch(&part, &axis, 1000), 6400.0);
    }
}
