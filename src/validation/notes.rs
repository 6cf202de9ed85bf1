//! Note linkage and phonemization: pipeline steps 1 to 5

use super::{Context, ValidateOptions};
use crate::models::expression::abbr;
use crate::models::note::Note;
use crate::models::part::{CachedRun, VoicePart};
use crate::models::phoneme::Phoneme;
use crate::models::track::Track;
use crate::phonemizer::{PhonemeAttributes, PhonemizerNote, PhonemizerPhoneme};

/// Phonemizer output for one run, in absolute part ticks
#[derive(Debug, Clone, PartialEq)]
pub(super) struct RunPhoneme {
    pub alias: String,
    pub tick: i32,
    pub run_index: usize,
    pub has_phoneme_override: bool,
    pub has_offset_override: bool,
    pub preutter_delta: Option<f32>,
    pub overlap_delta: Option<f32>,
}

/// A head note and the notes slurred onto it
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Run {
    pub notes: Vec<usize>,
    pub end: i32,
    pub phonemes: Vec<RunPhoneme>,
}

/// Step 1: sort, link neighbours, detect overlaps and resolve slurs
pub(super) fn link_notes(part: &mut VoicePart, min_duration: i32) {
    part.sort_notes();
    let len = part.notes.len();
    for (i, note) in part.notes.iter_mut().enumerate() {
        note.duration = note.duration.max(min_duration);
        note.clear_derived();
        note.prev = i.checked_sub(1);
        note.next = if i + 1 < len { Some(i + 1) } else { None };
    }
    for i in 1..len {
        let prev_end = part.notes[i - 1].end();
        if prev_end > part.notes[i].position {
            part.notes[i].error = true;
            part.notes[i].overlap_error = true;
            continue;
        }
        if prev_end == part.notes[i].position && part.notes[i].is_extender() {
            // Chains point at their head, never at the direct predecessor
            let head = part.notes[i - 1].extends.unwrap_or(i - 1);
            part.notes[i].extends = Some(head);
            part.notes[head].extended_duration = part.notes[i].end() - part.notes[head].position;
        }
    }
}

/// Tie each snapping note's first pitch point to the step from an abutting predecessor
pub(super) fn snap_pitch(part: &mut VoicePart) {
    for i in 0..part.notes.len() {
        let step = match part.notes[i].prev {
            Some(p) if part.notes[p].end() == part.notes[i].position => {
                (part.notes[p].tone - part.notes[i].tone) * 100
            }
            _ => 0,
        };
        let note = &mut part.notes[i];
        if note.overlap_error || !note.pitch.snap_first {
            continue;
        }
        if let Some(first) = note.pitch.data.first_mut() {
            first.y = step as f32;
        }
    }
}

fn phonemizer_note(note: &Note, voice_colors: &[String]) -> PhonemizerNote {
    let (lyric, phonetic_hint) = note.lyric_and_hint();
    let mut attributes: Vec<PhonemeAttributes> = Vec::new();
    for exp in note.phoneme_expressions.iter() {
        let index = match exp.index {
            Some(index) => index,
            None => continue,
        };
        if ![abbr::VEL, abbr::ALT, abbr::CLR, abbr::SHFT].contains(&exp.abbr.as_str()) {
            continue;
        }
        let pos = match attributes.iter().position(|a| a.index == index) {
            Some(pos) => pos,
            None => {
                attributes.push(PhonemeAttributes {
                    index,
                    ..Default::default()
                });
                attributes.len() - 1
            }
        };
        let attr = &mut attributes[pos];
        match exp.abbr.as_str() {
            abbr::VEL => attr.consonant_stretch_ratio = Some(2f64.powf(1.0 - exp.value as f64 / 100.0)),
            abbr::ALT => attr.alternate = Some(exp.value as i32),
            abbr::CLR => {
                let option = exp.value as i64;
                if option >= 0 {
                    attr.voice_color = voice_colors.get(option as usize).cloned();
                }
            }
            _ => attr.tone_shift = exp.value as i32,
        }
    }
    PhonemizerNote {
        lyric,
        phonetic_hint,
        tone: note.tone,
        position: note.position,
        duration: note.duration,
        attributes,
    }
}

/// Previous context for a run: a slurred predecessor is replaced by its head
fn prev_context(notes: &[Note], head: usize, voice_colors: &[String]) -> Option<PhonemizerNote> {
    let prev = notes[head].prev?;
    Some(match notes[prev].extends {
        Some(prev_head) => {
            let mut context = phonemizer_note(&notes[prev_head], voice_colors);
            context.duration = notes[prev_head].extended_duration;
            context
        }
        None => phonemizer_note(&notes[prev], voice_colors),
    })
}

/// Steps 2 and 3: call the phonemizer once per run and apply overrides
pub(super) fn phonemize(
    part: &mut VoicePart,
    mut track: Option<&mut Track>,
    ctx: &Context<'_>,
    options: ValidateOptions,
) -> Vec<Run> {
    let voice_colors: Vec<String> = track
        .as_ref()
        .and_then(|t| t.singer.as_ref())
        .map(|s| s.voice_colors())
        .unwrap_or_default();
    if let Some(track) = track.as_deref_mut() {
        track
            .phonemizer
            .set_timing(ctx.axis.bpm, ctx.axis.beat_unit, ctx.axis.resolution);
    }
    let old_cache = std::mem::take(&mut part.phonemizer_cache);
    let mut runs = Vec::new();

    for head in 0..part.notes.len() {
        if part.notes[head].overlap_error || part.notes[head].extends.is_some() {
            continue;
        }
        let mut members = vec![head];
        while let Some(next) = part.notes[members[members.len() - 1]].next {
            if part.notes[next].extends != Some(head) {
                break;
            }
            members.push(next);
        }
        let last = members[members.len() - 1];
        let run_end = part.notes[last].end();

        let request: Vec<PhonemizerNote> = members
            .iter()
            .map(|&i| phonemizer_note(&part.notes[i], &voice_colors))
            .collect();
        let prev = prev_context(&part.notes, head, &voice_colors);
        let next = part.notes[last]
            .next
            .map(|n| phonemizer_note(&part.notes[n], &voice_colors));

        let output: Vec<PhonemizerPhoneme> = if request[0].lyric.is_empty() && request[0].phonetic_hint.is_none() {
            Vec::new()
        } else {
            let cached = if options.skip_phonemizer {
                old_cache
                    .iter()
                    .find(|c| c.notes == request && c.prev == prev && c.next == next)
                    .map(|c| c.output.clone())
            } else {
                None
            };
            match (cached, track.as_deref_mut()) {
                (Some(output), _) => output,
                (None, Some(track)) => match track.phonemizer.process(&request, prev.as_ref(), next.as_ref()) {
                    Ok(output) => output,
                    Err(e) => {
                        log::error!("Phonemizer error on \"{}\": {}", request[0].lyric, e);
                        vec![PhonemizerPhoneme::new("error", 0)]
                    }
                },
                (None, None) => Vec::new(),
            }
        };
        part.phonemizer_cache.push(CachedRun {
            notes: request,
            prev,
            next,
            output: output.clone(),
        });

        let head_note = &mut part.notes[head];
        head_note.prune_phoneme_overrides();
        let mut phonemes: Vec<RunPhoneme> = output
            .into_iter()
            .enumerate()
            .map(|(run_index, p)| RunPhoneme {
                alias: p.phoneme,
                tick: head_note.position + p.position,
                run_index,
                has_phoneme_override: false,
                has_offset_override: false,
                preutter_delta: None,
                overlap_delta: None,
            })
            .collect();
        for o in head_note.phoneme_overrides.iter() {
            let p = match phonemes.get_mut(o.index) {
                Some(p) => p,
                None => continue,
            };
            if let Some(alias) = o.phoneme.as_ref().filter(|a| !a.trim().is_empty()) {
                p.alias = alias.clone();
                p.has_phoneme_override = true;
            }
            if let Some(offset) = o.offset {
                p.tick += offset;
                p.has_offset_override = true;
            }
            p.preutter_delta = o.preutter_delta;
            p.overlap_delta = o.overlap_delta;
        }
        runs.push(Run {
            notes: members,
            end: run_end,
            phonemes,
        });
    }
    runs
}

/// Step 4: walk backwards so every phoneme starts at least `gap` ticks
/// before the next one and before the end of its run
pub(super) fn clamp_positions(runs: &mut [Run], gap: i32) {
    let mut limit = i32::MAX;
    for run in runs.iter_mut().rev() {
        let run_limit = run.end - gap;
        for p in run.phonemes.iter_mut().rev() {
            p.tick = p.tick.min(limit.min(run_limit));
            limit = p.tick - gap;
        }
    }
}

/// Step 5: hand each phoneme to the note whose span contains it
pub(super) fn distribute(part: &mut VoicePart, runs: &[Run]) {
    part.phonemes.clear();
    for note in part.notes.iter_mut() {
        note.phonemes = 0..0;
        note.phoneme_offset = 0;
    }
    for run in runs {
        let mut idx = 0;
        for &note_index in run.notes.iter() {
            let (position, end) = (part.notes[note_index].position, part.notes[note_index].end());
            let start = part.phonemes.len();
            part.notes[note_index].phoneme_offset = idx;
            let mut in_note = 0;
            while idx < run.phonemes.len() && run.phonemes[idx].tick < end {
                let rp = &run.phonemes[idx];
                let mut phoneme = Phoneme::new(note_index, in_note, rp.run_index, rp.tick - position, rp.alias.clone());
                phoneme.has_phoneme_override = rp.has_phoneme_override;
                phoneme.has_offset_override = rp.has_offset_override;
                phoneme.preutter_delta = rp.preutter_delta;
                phoneme.overlap_delta = rp.overlap_delta;
                part.phonemes.push(phoneme);
                idx += 1;
                in_note += 1;
            }
            part.notes[note_index].phonemes = start..part.phonemes.len();
        }
    }
    // Notes without phonemes get an empty range at their place in the sequence
    let mut cursor = 0;
    for note in part.notes.iter_mut() {
        if note.phonemes.is_empty() {
            note.phonemes = cursor..cursor;
        } else {
            cursor = note.phonemes.end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part_with(notes: &[(i32, i32, &str)]) -> VoicePart {
        let mut part = VoicePart::new(0, 0, 1920);
        for &(position, duration, lyric) in notes {
            part.insert_note(Note::new(60, position, duration, lyric));
        }
        part
    }

    fn run_phoneme(tick: i32, run_index: usize) -> RunPhoneme {
        RunPhoneme {
            alias: "a".to_string(),
            tick,
            run_index,
            has_phoneme_override: false,
            has_offset_override: false,
            preutter_delta: None,
            overlap_delta: None,
        }
    }

    #[test]
    fn test_extends_points_at_head() {
        let mut part = part_with(&[(0, 480, "la"), (480, 480, "+"), (960, 480, "+")]);
        link_notes(&mut part, 1);
        assert_eq!(part.notes[1].extends, Some(0));
        assert_eq!(part.notes[2].extends, Some(0));
        assert_eq!(part.notes[0].extended_duration, 1440);
    }

    #[test]
    fn test_gap_breaks_slur() {
        let mut part = part_with(&[(0, 480, "la"), (500, 480, "+")]);
        link_notes(&mut part, 1);
        assert_eq!(part.notes[1].extends, None);
    }

    #[test]
    fn test_overlap_is_flagged() {
        let mut part = part_with(&[(0, 480, "la"), (240, 480, "li")]);
        link_notes(&mut part, 1);
        assert!(part.notes[1].overlap_error);
        assert!(part.notes[1].error);
        assert!(!part.notes[0].error);
    }

    #[test]
    fn test_snap_first_uses_tone_step() {
        let mut part = VoicePart::new(0, 0, 1920);
        let mut a = Note::new(62, 0, 480, "a");
        a.reset_pitch(500.0);
        let mut b = Note::new(60, 480, 480, "b");
        b.reset_pitch(500.0);
        part.insert_note(a);
        part.insert_note(b);
        link_notes(&mut part, 1);
        snap_pitch(&mut part);
        assert_eq!(part.notes[0].pitch.data[0].y, 0.0);
        assert_eq!(part.notes[1].pitch.data[0].y, 200.0);
    }

    #[test]
    fn test_clamp_keeps_gap_across_runs() {
        let mut runs = vec![
            Run {
                notes: vec![0],
                end: 480,
                phonemes: vec![run_phoneme(0, 0), run_phoneme(475, 1)],
            },
            Run {
                notes: vec![1],
                end: 960,
                phonemes: vec![run_phoneme(420, 0), run_phoneme(480, 1)],
            },
        ];
        clamp_positions(&mut runs, 10);
        assert_eq!(runs[0].phonemes[1].tick, 410);
        assert_eq!(runs[1].phonemes[0].tick, 420);
    }

    #[test]
    fn test_distribute_by_cumulative_end() {
        let mut part = part_with(&[(0, 480, "la"), (480, 480, "+")]);
        link_notes(&mut part, 1);
        let runs = vec![Run {
            notes: vec![0, 1],
            end: 960,
            phonemes: vec![run_phoneme(-30, 0), run_phoneme(0, 1), run_phoneme(600, 2)],
        }];
        distribute(&mut part, &runs);
        assert_eq!(part.notes[0].phonemes, 0..2);
        assert_eq!(part.notes[1].phonemes, 2..3);
        assert_eq!(part.notes[1].phoneme_offset, 2);
        assert_eq!(part.phonemes[2].position, 120);
        assert_eq!(part.phonemes[2].index, 0);
        assert_eq!(part.phonemes[2].run_index, 2);
    }
}
