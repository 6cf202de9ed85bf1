//! Pitch baking
//!
//! Turns a densely sampled pitch curve (one value every few ticks, in
//! absolute cents) back into a handful of shaped pitch points per note.
//! Samples are reduced with a shape-aware Douglas-Peucker pass that keeps
//! note boundaries and vowel onsets, then shared between neighbouring notes
//! at the point where the curve crosses the next note's steady pitch.

use crate::models::part::VoicePart;
use crate::models::pitch::{PitchPoint, PitchPointShape};
use crate::phonemizer::RenderedPitch;
use crate::utils::music_math::{interpolate_shape, linear};
use crate::utils::TimeAxis;
use crate::validation::RenderPhrase;

/// Midpoint ratios that decide the easing of a segment
const EASE_OUT_RATIO: f64 = 0.67;
const EASE_IN_RATIO: f64 = 0.33;

#[derive(Clone, Debug, PartialEq)]
pub struct BakeNote {
    /// Part-relative start tick
    pub position: i32,
    pub end: i32,
    pub tone: i32,
    /// Part-relative tick where the vowel starts
    pub vowel: i32,
}

/// Uniformly sampled pitch of one phrase
#[derive(Clone, Debug, PartialEq)]
pub struct PitchSamples {
    /// Tick of the first sample
    pub start: i32,
    pub interval: i32,
    /// Absolute pitch in cents (tone * 100)
    pub values: Vec<f64>,
}

impl PitchSamples {
    pub fn tick(&self, index: usize) -> i32 {
        self.start + index as i32 * self.interval
    }

    /// Index of the sample closest to `tick`, clamped to the sampled range
    pub fn index_of(&self, tick: i32) -> usize {
        if self.values.is_empty() {
            return 0;
        }
        let interval = self.interval.max(1) as f64;
        let index = ((tick - self.start) as f64 / interval).round().max(0.0) as usize;
        index.min(self.values.len() - 1)
    }

    /// Resample a renderer's pitch output over `[position, end)`
    pub fn from_rendered(rendered: &RenderedPitch, position: i32, end: i32, interval: i32) -> Option<Self> {
        if rendered.ticks.is_empty() || rendered.ticks.len() != rendered.tones.len() {
            return None;
        }
        let interval = interval.max(1);
        let mut values = Vec::new();
        let mut tick = position;
        let mut cursor = 0;
        while tick < end {
            while cursor + 1 < rendered.ticks.len() && rendered.ticks[cursor + 1] <= tick {
                cursor += 1;
            }
            let tone = match rendered.ticks.get(cursor + 1) {
                Some(&next_tick) if rendered.ticks[cursor] <= tick => linear(
                    rendered.ticks[cursor] as f64,
                    next_tick as f64,
                    rendered.tones[cursor],
                    rendered.tones[cursor + 1],
                    tick as f64,
                ),
                _ if tick < rendered.ticks[0] => rendered.tones[0],
                _ => rendered.tones[cursor],
            };
            values.push(tone * 100.0);
            tick += interval;
        }
        Some(Self {
            start: position,
            interval,
            values,
        })
    }
}

/// Pitch points for one note, plus the tick span they cover
#[derive(Clone, Debug, PartialEq)]
pub struct BakedNote {
    pub note: usize,
    pub start_tick: i32,
    pub end_tick: i32,
    pub points: Vec<PitchPoint>,
}

/// Notes of a validated phrase as bake input
pub fn bake_notes(part: &VoicePart, phrase: &RenderPhrase) -> Vec<BakeNote> {
    phrase
        .notes
        .clone()
        .map(|i| {
            let note = &part.notes[i];
            let vowel = part
                .phonemes_of(i)
                .iter()
                .find(|p| p.position >= 0)
                .map_or(note.position, |p| note.position + p.position);
            BakeNote {
                position: note.position,
                end: note.end(),
                tone: note.tone,
                vowel,
            }
        })
        .collect()
}

fn infer_shape(values: &[f64], lo: usize, hi: usize) -> PitchPointShape {
    let span = values[hi] - values[lo];
    if hi - lo < 2 || span.abs() < f64::EPSILON {
        return PitchPointShape::Linear;
    }
    let ratio = (values[(lo + hi) / 2] - values[lo]) / span;
    if ratio > EASE_OUT_RATIO {
        PitchPointShape::SineOut
    } else if ratio < EASE_IN_RATIO {
        PitchPointShape::SineIn
    } else {
        PitchPointShape::Linear
    }
}

/// Shape-aware Douglas-Peucker over `values[lo..=hi]`.
///
/// Returns kept indexes with the shape of the segment leaving each of them.
fn simplify_segment(values: &[f64], lo: usize, hi: usize, tolerance: f64, out: &mut Vec<(usize, PitchPointShape)>) {
    let mut stack = vec![(lo, hi)];
    while let Some((lo, hi)) = stack.pop() {
        let shape = infer_shape(values, lo, hi);
        let mut worst = (0.0, lo);
        for i in lo + 1..hi {
            let expected = interpolate_shape(lo as f64, hi as f64, values[lo], values[hi], i as f64, shape);
            let deviation = (values[i] - expected).abs();
            if deviation > worst.0 {
                worst = (deviation, i);
            }
        }
        if worst.0 > tolerance {
            // Right half first so the left half pops first
            stack.push((worst.1, hi));
            stack.push((lo, worst.1));
        } else {
            out.push((lo, shape));
        }
    }
}

/// Reduce samples to shaped key indexes, never dropping `forced` ones
pub fn simplify(values: &[f64], forced: &[usize], tolerance: f64) -> Vec<(usize, PitchPointShape)> {
    if values.is_empty() {
        return Vec::new();
    }
    let last = values.len() - 1;
    let mut anchors: Vec<usize> = forced.iter().copied().filter(|&i| i <= last).collect();
    anchors.push(0);
    anchors.push(last);
    anchors.sort_unstable();
    anchors.dedup();

    let mut kept = Vec::new();
    for pair in anchors.windows(2) {
        simplify_segment(values, pair[0], pair[1], tolerance, &mut kept);
    }
    kept.push((last, PitchPointShape::Linear));
    kept
}

/// Position in `kept` of the sample shared by a note and its successor
fn boundary(kept: &[(usize, PitchPointShape)], values: &[f64], from: usize, entry: usize, steady: f64) -> usize {
    let window: Vec<usize> = (0..kept.len())
        .filter(|&k| kept[k].0 >= from && kept[k].0 <= entry)
        .collect();
    let first = match window.first() {
        Some(&first) => first,
        None => return kept.partition_point(|&(i, _)| i < entry).min(kept.len() - 1),
    };
    // Last crossing of the next note's steady pitch before its entry
    for &k in window.iter().rev() {
        if k == first {
            break;
        }
        let before = values[kept[k - 1].0] - steady;
        let here = values[kept[k].0] - steady;
        if before == 0.0 || before.signum() != here.signum() {
            return k;
        }
    }
    window
        .iter()
        .copied()
        .min_by(|&a, &b| {
            let da = (values[kept[a].0] - steady).abs();
            let db = (values[kept[b].0] - steady).abs();
            da.total_cmp(&db)
        })
        .unwrap_or(first)
}

/// Bake one phrase into per-note pitch points.
///
/// X values are milliseconds from each note start, Y values cents from the
/// note tone. Neighbouring notes share their boundary sample.
pub fn bake_phrase(samples: &PitchSamples, notes: &[BakeNote], axis: &TimeAxis, tolerance: f64) -> Vec<BakedNote> {
    if samples.values.len() < 2 || notes.is_empty() {
        return Vec::new();
    }
    let values = &samples.values;
    let mut forced = Vec::new();
    for note in notes {
        forced.push(samples.index_of(note.position));
        forced.push(samples.index_of(note.vowel));
    }
    let kept = simplify(values, &forced, tolerance);

    let mut bounds = vec![0];
    for pair in notes.windows(2) {
        let from = samples.index_of(pair[0].vowel);
        let entry = samples.index_of(pair[1].position);
        let steady = pair[1].tone as f64 * 100.0;
        let b = boundary(&kept, values, from, entry, steady).max(bounds[bounds.len() - 1]);
        bounds.push(b);
    }
    bounds.push(kept.len() - 1);

    notes
        .iter()
        .enumerate()
        .map(|(n, note)| {
            let range = bounds[n]..=bounds[n + 1];
            let points = kept[range]
                .iter()
                .map(|&(i, shape)| {
                    let x = axis.ms_between(note.position, samples.tick(i)) as f32;
                    let y = (values[i] - note.tone as f64 * 100.0) as f32;
                    PitchPoint::with_shape(x, y, shape)
                })
                .collect();
            BakedNote {
                note: n,
                start_tick: samples.tick(kept[bounds[n]].0),
                end_tick: samples.tick(kept[bounds[n + 1]].0),
                points,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_then_step() -> PitchSamples {
        // 6000 cents for 20 samples, a linear glide over 4 samples, then 6200
        let mut values = vec![6000.0; 20];
        for i in 1..=4 {
            values.push(6000.0 + 50.0 * i as f64);
        }
        values.extend(std::iter::repeat(6200.0).take(20));
        PitchSamples {
            start: 0,
            interval: 5,
            values,
        }
    }

    #[test]
    fn test_flat_curve_keeps_only_anchors() {
        let kept = simplify(&[6000.0; 50], &[], 10.0);
        assert_eq!(kept.iter().map(|k| k.0).collect::<Vec<_>>(), vec![0, 49]);
    }

    #[test]
    fn test_forced_points_survive() {
        let kept = simplify(&[6000.0; 50], &[10, 30], 10.0);
        assert_eq!(kept.iter().map(|k| k.0).collect::<Vec<_>>(), vec![0, 10, 30, 49]);
    }

    #[test]
    fn test_shape_inference() {
        let ease_out: Vec<f64> = (0..=10).map(|i| (i as f64 / 10.0 * std::f64::consts::FRAC_PI_2).sin() * 100.0).collect();
        assert_eq!(infer_shape(&ease_out, 0, 10), PitchPointShape::SineOut);
        let ease_in: Vec<f64> = ease_out.iter().rev().map(|v| 100.0 - v).collect();
        assert_eq!(infer_shape(&ease_in, 0, 10), PitchPointShape::SineIn);
        let line: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        assert_eq!(infer_shape(&line, 0, 10), PitchPointShape::Linear);
    }

    #[test]
    fn test_sine_segment_is_not_split() {
        // A clean ease-out glide stays one segment under the shaped reference
        let values: Vec<f64> = (0..=40)
            .map(|i| 6000.0 + (i as f64 / 40.0 * std::f64::consts::FRAC_PI_2).sin() * 200.0)
            .collect();
        let kept = simplify(&values, &[], 1.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].1, PitchPointShape::SineOut);
    }

    #[test]
    fn test_two_notes_share_boundary() {
        let samples = flat_then_step();
        let notes = vec![
            BakeNote {
                position: 0,
                end: 110,
                tone: 60,
                vowel: 0,
            },
            BakeNote {
                position: 110,
                end: 220,
                tone: 62,
                vowel: 110,
            },
        ];
        let axis = TimeAxis::default();
        let baked = bake_phrase(&samples, &notes, &axis, 10.0);
        assert_eq!(baked.len(), 2);
        assert_eq!(baked[0].end_tick, baked[1].start_tick);
        // The first note ends on a sample that the second note starts from
        let first_last = baked[0].points.last().unwrap();
        let second_first = baked[1].points.first().unwrap();
        assert!((first_last.y - (second_first.y + 200.0)).abs() < 1e-3);
        // Steady regions sit on the note tones
        assert!(baked[0].points[0].y.abs() < 1e-3);
        assert!(baked[1].points.last().unwrap().y.abs() < 1e-3);
    }

    #[test]
    fn test_resample_rendered_pitch() {
        let rendered = RenderedPitch {
            ticks: vec![0, 100],
            tones: vec![60.0, 61.0],
        };
        let samples = PitchSamples::from_rendered(&rendered, 0, 120, 50).unwrap();
        assert_eq!(samples.values, vec![6000.0, 6050.0, 6100.0]);
    }
}
