//! Phoneme linkage, sample resolution, timing and envelopes: steps 6 and 7

use super::Context;
use crate::models::expression::{abbr, ExpressionDescriptor, ExpressionType};
use crate::models::note::Note;
use crate::models::part::VoicePart;
use crate::models::phoneme::{Envelope, EnvelopePoint, Phoneme};
use crate::phonemizer::Singer;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Step 6: chain every phoneme in the part, across note boundaries
pub(super) fn link_phonemes(phonemes: &mut [Phoneme]) {
    let len = phonemes.len();
    for (i, phoneme) in phonemes.iter_mut().enumerate() {
        phoneme.prev = i.checked_sub(1);
        phoneme.next = if i + 1 < len { Some(i + 1) } else { None };
    }
}

/// Effective value of an expression for a phoneme: the head note's
/// override at the phoneme's run index, or the descriptor default
pub fn expression_value(
    notes: &[Note],
    phoneme: &Phoneme,
    abbr: &str,
    expressions: &BTreeMap<String, ExpressionDescriptor>,
) -> f32 {
    let head = notes[phoneme.parent].extends.unwrap_or(phoneme.parent);
    notes[head]
        .phoneme_expression(abbr, phoneme.run_index)
        .unwrap_or_else(|| expressions.get(abbr).map_or(0.0, |d| d.default_value))
}

/// Resampler flag string for a validated phoneme
pub fn resampler_flags(part: &VoicePart, phoneme: usize, expressions: &BTreeMap<String, ExpressionDescriptor>) -> String {
    let phoneme = match part.phonemes.get(phoneme) {
        Some(phoneme) => phoneme,
        None => return String::new(),
    };
    let mut flags = String::new();
    for descriptor in expressions.values() {
        match descriptor.kind {
            ExpressionType::Numerical => {
                if let Some(flag) = descriptor.flag.as_deref().filter(|f| !f.is_empty()) {
                    let value = expression_value(&part.notes, phoneme, &descriptor.abbr, expressions) as i32;
                    flags.push_str(flag);
                    flags.push_str(&value.to_string());
                }
            }
            ExpressionType::Options if descriptor.is_flag => {
                let value = expression_value(&part.notes, phoneme, &descriptor.abbr, expressions) as usize;
                if let Some(option) = descriptor.options.get(value) {
                    flags.push_str(option);
                }
            }
            _ => {}
        }
    }
    flags
}

fn envelope(phoneme: &Phoneme, notes: &[Note], ctx: &Context<'_>) -> Envelope {
    let vol = expression_value(notes, phoneme, abbr::VOL, ctx.expressions);
    let atk = expression_value(notes, phoneme, abbr::ATK, ctx.expressions);
    let dec = expression_value(notes, phoneme, abbr::DEC, ctx.expressions);

    let p0 = -phoneme.preutter;
    let p1 = p0 + phoneme.overlap.max(5.0);
    let p2 = p1.max(0.0);
    let mut p3 = ctx.axis.tick_to_ms(phoneme.duration as f64) as f32 - phoneme.tail_intrude;
    let p4 = p3 + phoneme.tail_overlap;
    if p3 == p4 {
        p3 = p2.max(p3 - 25.0);
    }
    Envelope {
        data: [
            EnvelopePoint { x: p0, y: 0.0 },
            EnvelopePoint { x: p1, y: atk * vol / 100.0 },
            EnvelopePoint { x: p2, y: vol },
            EnvelopePoint {
                x: p3,
                y: vol * (1.0 - dec / 100.0),
            },
            EnvelopePoint { x: p4, y: 0.0 },
        ],
    }
}

/// Step 7: duration, sample lookup, preutter/overlap correction and envelope
/// for every phoneme, then fold phoneme errors into their notes
pub(super) fn validate_phonemes(part: &mut VoicePart, singer: Option<Arc<dyn Singer>>, ctx: &Context<'_>) {
    let singer = singer.filter(|s| s.loaded());
    let VoicePart { notes, phonemes, .. } = &mut *part;
    if singer.is_none() {
        for note in notes.iter_mut() {
            note.error = true;
        }
    }
    let note_errors: Vec<bool> = notes.iter().map(|n| n.error).collect();
    let ticks: Vec<i32> = phonemes
        .iter()
        .map(|p| notes[p.parent].position + p.position)
        .collect();

    for i in 0..phonemes.len() {
        let (before, rest) = phonemes.split_at_mut(i);
        let phoneme = &mut rest[0];
        let note = &notes[phoneme.parent];
        phoneme.error = note_errors[phoneme.parent];

        // Duration runs to the end of the slur chain, capped by the next phoneme
        let mut duration = match note.extends {
            Some(head) => notes[head].extended_end() - note.position - phoneme.position,
            None => note.extended_duration - phoneme.position,
        };
        if let Some(next) = phoneme.next {
            duration = duration.min(ticks[next] - ticks[i]);
        }
        phoneme.duration = duration;
        if duration <= 0 {
            phoneme.error = true;
        }

        phoneme.phoneme_mapped.clear();
        phoneme.sample = None;
        phoneme.preutter = 0.0;
        phoneme.overlap = 0.0;
        phoneme.overlapped = false;
        phoneme.tail_intrude = 0.0;
        phoneme.tail_overlap = 0.0;
        if phoneme.error {
            continue;
        }
        let sample = match singer.as_ref().and_then(|s| s.try_get_sample(&phoneme.phoneme, note.tone)) {
            Some(sample) => sample,
            None => {
                log::debug!("Unresolved alias \"{}\" at tone {}", phoneme.phoneme, note.tone);
                phoneme.error = true;
                continue;
            }
        };
        phoneme.phoneme_mapped = sample.alias.clone();

        let vel = expression_value(notes, phoneme, abbr::VEL, ctx.expressions);
        let stretch = 2f32.powf(1.0 - vel / 100.0);
        phoneme.overlap = (sample.overlap_ms + phoneme.overlap_delta.unwrap_or(0.0)) * stretch;
        phoneme.preutter = (sample.preutter_ms + phoneme.preutter_delta.unwrap_or(0.0)) * stretch;
        phoneme.sample = Some(sample);

        if let Some(prev) = phoneme.prev.and_then(|p| before.get_mut(p)).filter(|p| !p.error) {
            let prev_index = i - 1;
            let gap_ms = ctx.axis.ms_between(ticks[prev_index] + prev.duration, ticks[i]) as f32;
            let mut max_preutter = phoneme.preutter;
            if gap_ms <= 0.0 {
                // No room: borrow part of the previous phoneme
                phoneme.overlapped = true;
                let ratio = if phoneme.preutter_delta.is_none() {
                    ctx.config.zero_gap_preutter_ratio
                } else {
                    ctx.config.zero_gap_preutter_ratio_with_delta
                };
                max_preutter = ctx.axis.tick_to_ms(prev.duration as f64) as f32 * ratio;
            } else if gap_ms < phoneme.preutter {
                max_preutter = gap_ms;
            }
            if phoneme.preutter > max_preutter {
                let ratio = max_preutter / phoneme.preutter;
                phoneme.preutter = max_preutter;
                phoneme.overlap *= ratio;
            }
            phoneme.preutter = phoneme.preutter.max(0.0);
            if phoneme.overlapped {
                prev.tail_intrude = phoneme.preutter.max(phoneme.preutter - phoneme.overlap);
                prev.tail_overlap = phoneme.overlap.max(0.0);
            } else {
                prev.tail_intrude = 0.0;
                prev.tail_overlap = 0.0;
            }
            prev.envelope = envelope(prev, notes, ctx);
        }
        phoneme.envelope = envelope(phoneme, notes, ctx);
    }

    refresh_note_errors(part, false);
}

/// Recompute note error flags from overlap, phoneme errors and an optional missing singer
pub(super) fn refresh_note_errors(part: &mut VoicePart, singer_missing: bool) {
    let VoicePart { notes, phonemes, .. } = &mut *part;
    for note in notes.iter_mut() {
        let phoneme_error = phonemes
            .get(note.phonemes.clone())
            .map_or(false, |ps| ps.iter().any(|p| p.error));
        note.error = note.error || note.overlap_error || singer_missing || phoneme_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::utils::TimeAxis;

    #[test]
    fn test_flags_follow_descriptor_order() {
        let mut expressions = BTreeMap::new();
        let mut gen = ExpressionDescriptor::numerical("gender", "gen", -100.0, 100.0, 0.0);
        gen.flag = Some("g".to_string());
        expressions.insert(gen.abbr.clone(), gen);
        let mut bre = ExpressionDescriptor::numerical("breath", "bre", 0.0, 100.0, 0.0);
        bre.flag = Some("B".to_string());
        expressions.insert(bre.abbr.clone(), bre);

        let mut part = VoicePart::new(0, 0, 480);
        let mut note = Note::new(60, 0, 480, "a");
        note.set_expression(&expressions["gen"].clone(), Some(0), Some(-20.0));
        part.insert_note(note);
        part.notes[0].phonemes = 0..1;
        part.phonemes.push(Phoneme::new(0, 0, 0, 0, "a".to_string()));
        assert_eq!(resampler_flags(&part, 0, &expressions), "B0g-20");
    }

    #[test]
    fn test_envelope_shape() {
        let config = EngineConfig::default();
        let expressions: BTreeMap<String, ExpressionDescriptor> = crate::config::default_expressions()
            .into_iter()
            .map(|d| (d.abbr.clone(), d))
            .collect();
        let ctx = Context {
            axis: TimeAxis::default(),
            expressions: &expressions,
            config: &config,
        };
        let notes = vec![Note::new(60, 0, 480, "a")];
        let mut phoneme = Phoneme::new(0, 0, 0, 0, "a".to_string());
        phoneme.duration = 480;
        phoneme.preutter = 60.0;
        phoneme.overlap = 20.0;
        let env = envelope(&phoneme, &notes, &ctx);
        let xs: Vec<f32> = env.data.iter().map(|p| p.x).collect();
        for (x, expected) in xs.iter().zip([-60.0, -40.0, 0.0, 475.0, 500.0]) {
            assert!((x - expected).abs() < 1e-3, "{:?}", xs);
        }
        assert_eq!(env.data[2].y, 100.0);
    }
}
