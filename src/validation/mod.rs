//! Project validation
//!
//! Recomputes every derived field of the document after a change: the time
//! axis, note links and slur chains, phonemizer output, phoneme timing and
//! envelopes. Commands never touch derived data; they hand back the scope
//! of work they require through [`ValidateOptions`].

mod notes;
mod phonemes;
pub mod phrase;

pub use crate::undo::ValidateOptions;
pub use phonemes::{expression_value, resampler_flags};
pub use phrase::{render_phrases, RenderPhrase};

use crate::config::EngineConfig;
use crate::models::expression::ExpressionDescriptor;
use crate::models::part::{Part, VoicePart};
use crate::models::project::Project;
use crate::models::track::Track;
use crate::utils::TimeAxis;
use std::collections::BTreeMap;

/// Read-only inputs shared by every step of a validation pass
pub(crate) struct Context<'a> {
    pub axis: TimeAxis,
    pub expressions: &'a BTreeMap<String, ExpressionDescriptor>,
    pub config: &'a EngineConfig,
}

/// Validate the parts selected by `options`
pub fn validate_project(project: &mut Project, config: &EngineConfig, options: ValidateOptions) {
    if !options.skip_timing {
        project.rebuild_time_axis();
    }
    let axis = *project.time_axis();
    let Project {
        expressions,
        tracks,
        parts,
        ..
    } = project;
    let ctx = Context {
        axis,
        expressions,
        config,
    };

    for part in parts.iter_mut() {
        if options.part.map_or(false, |id| id != part.id()) {
            continue;
        }
        match part {
            Part::Wave(wave) => {
                wave.duration = wave.min_duration(&axis);
            }
            Part::Voice(voice) => {
                let track = tracks.get_mut(voice.track_no);
                if track.is_none() {
                    log::warn!("Part \"{}\" refers to missing track {}", voice.name, voice.track_no);
                }
                validate_voice_part(voice, track, &ctx, options);
            }
        }
    }
}

fn phonemes_consistent(part: &VoicePart) -> bool {
    part.notes.iter().enumerate().all(|(i, note)| {
        note.phonemes.end <= part.phonemes.len()
            && part.phonemes[note.phonemes.clone()].iter().all(|p| p.parent == i)
    })
}

pub(crate) fn validate_voice_part(
    part: &mut VoicePart,
    track: Option<&mut Track>,
    ctx: &Context<'_>,
    options: ValidateOptions,
) {
    notes::link_notes(part, ctx.config.min_note_duration);
    notes::snap_pitch(part);
    part.duration = part.duration.max(part.min_duration(&ctx.axis));

    let singer = track.as_ref().and_then(|t| t.singer.clone());
    if options.skip_phoneme && options.skip_phonemizer && phonemes_consistent(part) {
        let singer_missing = !singer.as_ref().map_or(false, |s| s.loaded());
        phonemes::refresh_note_errors(part, singer_missing);
        return;
    }

    let mut runs = notes::phonemize(part, track, ctx, options);
    notes::clamp_positions(&mut runs, ctx.config.min_phoneme_gap);
    notes::distribute(part, &runs);
    phonemes::link_phonemes(&mut part.phonemes);
    phonemes::validate_phonemes(part, singer, ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::note::Note;
    use crate::models::part::VoicePart;
    use crate::phonemizer::OtoTableSinger;
    use std::sync::Arc;

    fn project_with_singer() -> Project {
        let mut project = Project::new(&EngineConfig::default());
        let mut track = Track::new("Track 1");
        let singer = OtoTableSinger::new("test")
            .with_sample("a", 60.0, 20.0)
            .with_sample("ka", 80.0, 30.0)
            .with_sample("i", 40.0, 10.0);
        track.replace_singer(Some(Arc::new(singer)));
        project.tracks.push(track);
        let mut part = VoicePart::new(0, 0, 1920);
        part.insert_note(Note::new(60, 0, 480, "a"));
        part.insert_note(Note::new(62, 480, 480, "ka"));
        part.insert_note(Note::new(62, 960, 480, "+"));
        project.parts.push(Part::Voice(part));
        project
    }

    #[test]
    fn test_full_pass_resolves_samples() {
        let mut project = project_with_singer();
        validate_project(&mut project, &EngineConfig::default(), ValidateOptions::full());
        let part = project.voice_parts().next().expect("voice part");
        assert_eq!(part.phonemes.len(), 2);
        assert!(part.phonemes.iter().all(|p| !p.error));
        assert_eq!(part.phonemes[0].phoneme_mapped, "a");
        assert_eq!(part.notes[2].extends, Some(1));
        // "ka" runs through the extender
        assert_eq!(part.phonemes[1].duration, 960);
        assert!(part.notes[2].phonemes.is_empty());
    }

    #[test]
    fn test_abutting_phoneme_is_overlapped() {
        let mut project = project_with_singer();
        validate_project(&mut project, &EngineConfig::default(), ValidateOptions::full());
        let part = project.voice_parts().next().expect("voice part");
        let ka = &part.phonemes[1];
        assert!(ka.overlapped);
        assert_eq!(ka.preutter, 80.0);
        assert_eq!(part.phonemes[0].tail_intrude, 80.0);
        assert_eq!(part.phonemes[0].tail_overlap, 30.0);
    }

    #[test]
    fn test_missing_singer_marks_errors() {
        let mut project = project_with_singer();
        project.tracks[0].replace_singer(None);
        validate_project(&mut project, &EngineConfig::default(), ValidateOptions::full());
        let part = project.voice_parts().next().expect("voice part");
        assert!(part.notes.iter().all(|n| n.error));
        assert!(part.phonemes.iter().all(|p| p.error));
    }

    #[test]
    fn test_keep_path_leaves_phonemes() {
        let mut project = project_with_singer();
        let config = EngineConfig::default();
        validate_project(&mut project, &config, ValidateOptions::full());
        let before = project.voice_parts().next().expect("voice part").phonemes.clone();
        validate_project(&mut project, &config, ValidateOptions::untimed(None).without_phonemes());
        let after = &project.voice_parts().next().expect("voice part").phonemes;
        assert_eq!(&before, after);
    }

    #[test]
    fn test_missing_track_yields_no_phonemes() {
        let mut project = project_with_singer();
        project.tracks.clear();
        validate_project(&mut project, &EngineConfig::default(), ValidateOptions::full());
        let part = project.voice_parts().next().expect("voice part");
        assert!(part.phonemes.is_empty());
    }
}
