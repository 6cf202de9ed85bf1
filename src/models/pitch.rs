//! Note pitch bends and vibrato
//!
//! Pitch points are local to their note: X is milliseconds from the note
//! start and Y is a cents offset from the note's nominal tone.

use crate::utils::music_math::interpolate_shape;
use serde::{Deserialize, Serialize};

/// Interpolation shape from a pitch point to the next one
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PitchPointShape {
    #[default]
    #[serde(rename = "io")]
    SineInOut,
    #[serde(rename = "l")]
    Linear,
    #[serde(rename = "i")]
    SineIn,
    #[serde(rename = "o")]
    SineOut,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PitchPoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub shape: PitchPointShape,
}

impl PitchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            shape: PitchPointShape::SineInOut,
        }
    }

    pub fn with_shape(x: f32, y: f32, shape: PitchPointShape) -> Self {
        Self { x, y, shape }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Pitch {
    pub data: Vec<PitchPoint>,
    /// Tie the first point's Y to the tone step from an abutting previous note
    pub snap_first: bool,
}

impl Default for Pitch {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            snap_first: true,
        }
    }
}

impl Pitch {
    /// Insert a point keeping the list ordered by X
    pub fn add_point(&mut self, point: PitchPoint) -> usize {
        let index = self.data.partition_point(|p| p.x <= point.x);
        self.data.insert(index, point);
        index
    }

    /// Evaluate the bend in cents at `x_ms` from the note start
    pub fn evaluate(&self, x_ms: f32) -> f32 {
        let (first, last) = match (self.data.first(), self.data.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if x_ms <= first.x {
            return first.y;
        }
        if x_ms >= last.x {
            return last.y;
        }
        let right = self.data.partition_point(|p| p.x <= x_ms);
        let p0 = self.data[right - 1];
        let p1 = self.data[right];
        interpolate_shape(
            p0.x as f64,
            p1.x as f64,
            p0.y as f64,
            p1.y as f64,
            x_ms as f64,
            p0.shape,
        ) as f32
    }

    /// Move every point at or after `offset_ms` into a new pitch, shifted to start at zero
    pub fn split(&mut self, offset_ms: f32) -> Pitch {
        let at = self.data.partition_point(|p| p.x < offset_ms);
        let mut tail: Vec<PitchPoint> = self.data.split_off(at);
        for point in tail.iter_mut() {
            point.x -= offset_ms;
        }
        Pitch {
            data: tail,
            snap_first: true,
        }
    }
}

/// Vibrato parameters, each clamped to its valid range on assignment
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Vibrato {
    /// Percentage of note length
    length: f32,
    /// Milliseconds
    period: f32,
    /// Cents
    depth: f32,
    /// Percentage of vibrato length
    #[serde(rename = "in")]
    fade_in: f32,
    /// Percentage of vibrato length
    #[serde(rename = "out")]
    fade_out: f32,
    /// Percentage of period
    shift: f32,
    drift: f32,
}

impl Default for Vibrato {
    fn default() -> Self {
        Self {
            length: 0.0,
            period: 175.0,
            depth: 25.0,
            fade_in: 10.0,
            fade_out: 10.0,
            shift: 0.0,
            drift: 0.0,
        }
    }
}

impl Vibrato {
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn period(&self) -> f32 {
        self.period
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn fade_in(&self) -> f32 {
        self.fade_in
    }

    pub fn fade_out(&self) -> f32 {
        self.fade_out
    }

    pub fn shift(&self) -> f32 {
        self.shift
    }

    pub fn drift(&self) -> f32 {
        self.drift
    }

    pub fn set_length(&mut self, value: f32) {
        self.length = value.clamp(0.0, 100.0);
    }

    pub fn set_period(&mut self, value: f32) {
        self.period = value.clamp(5.0, 500.0);
    }

    pub fn set_depth(&mut self, value: f32) {
        self.depth = value.clamp(5.0, 200.0);
    }

    pub fn set_fade_in(&mut self, value: f32) {
        self.fade_in = value.clamp(0.0, 100.0);
        self.fade_out = self.fade_out.min(100.0 - self.fade_in);
    }

    pub fn set_fade_out(&mut self, value: f32) {
        self.fade_out = value.clamp(0.0, 100.0);
        self.fade_in = self.fade_in.min(100.0 - self.fade_out);
    }

    pub fn set_shift(&mut self, value: f32) {
        self.shift = value.clamp(0.0, 100.0);
    }

    pub fn set_drift(&mut self, value: f32) {
        self.drift = value.clamp(-100.0, 100.0);
    }

    /// Normalized note position where the vibrato begins
    pub fn normalized_start(&self) -> f32 {
        1.0 - self.length / 100.0
    }

    /// Vibrato offset in cents at normalized note position `n_pos`.
    ///
    /// `n_period` is the period expressed as a fraction of the note length.
    pub fn evaluate(&self, n_pos: f32, n_period: f32) -> f32 {
        let n_start = self.normalized_start();
        let n_in = self.length / 100.0 * self.fade_in / 100.0;
        let n_out = self.length / 100.0 * self.fade_out / 100.0;
        if n_pos < n_start || n_period <= 0.0 {
            return 0.0;
        }
        let t = (n_pos - n_start) / n_period + self.shift / 100.0;
        let mut y = (2.0 * std::f32::consts::PI * t).sin() * self.depth;
        if n_pos < n_start + n_in {
            y *= (n_pos - n_start) / n_in;
        } else if n_pos > 1.0 - n_out {
            y *= (1.0 - n_pos) / n_out;
        }
        y + self.drift / 100.0 * self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_point_keeps_order() {
        let mut pitch = Pitch::default();
        pitch.add_point(PitchPoint::new(25.0, 0.0));
        let index = pitch.add_point(PitchPoint::new(-25.0, 0.0));
        assert_eq!(index, 0);
        assert_eq!(pitch.data[1].x, 25.0);
    }

    #[test]
    fn test_evaluate_between_points() {
        let mut pitch = Pitch::default();
        pitch.add_point(PitchPoint::with_shape(0.0, -100.0, PitchPointShape::Linear));
        pitch.add_point(PitchPoint::new(100.0, 0.0));
        assert_eq!(pitch.evaluate(50.0), -50.0);
        assert_eq!(pitch.evaluate(-10.0), -100.0);
        assert_eq!(pitch.evaluate(500.0), 0.0);
    }

    #[test]
    fn test_split_moves_tail() {
        let mut pitch = Pitch::default();
        pitch.add_point(PitchPoint::new(0.0, 0.0));
        pitch.add_point(PitchPoint::new(300.0, 50.0));
        let tail = pitch.split(200.0);
        assert_eq!(pitch.data.len(), 1);
        assert_eq!(tail.data[0].x, 100.0);
    }

    #[test]
    fn test_vibrato_fades_are_bounded() {
        let mut vibrato = Vibrato::default();
        vibrato.set_fade_in(80.0);
        vibrato.set_fade_out(50.0);
        assert_eq!(vibrato.fade_out(), 50.0);
        assert_eq!(vibrato.fade_in(), 50.0);
        vibrato.set_period(1.0);
        assert_eq!(vibrato.period(), 5.0);
    }

    #[test]
    fn test_vibrato_silent_before_start() {
        let mut vibrato = Vibrato::default();
        vibrato.set_length(50.0);
        assert_eq!(vibrato.evaluate(0.25, 0.1), 0.0);
        assert!(vibrato.evaluate(0.8, 0.1).abs() <= vibrato.depth());
    }
}
