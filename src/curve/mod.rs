//! Curve store
//!
//! Sparse per-tick expression values. Samples are kept as two parallel
//! vectors sorted by tick; values between samples are linearly interpolated
//! and anything outside the stored range reads as the descriptor default.
//! Edits snap to a fixed tick interval.

use crate::models::expression::ExpressionDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default tick grid for curve edits
pub const CURVE_INTERVAL: i32 = 5;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Curve {
    pub abbr: String,
    pub xs: Vec<i32>,
    pub ys: Vec<i32>,
    /// Descriptor bounds, rebound after load
    #[serde(skip)]
    pub min: f32,
    #[serde(skip)]
    pub max: f32,
    #[serde(skip)]
    pub default_value: i32,
    #[serde(skip, default = "default_interval")]
    pub interval: i32,
}

fn default_interval() -> i32 {
    CURVE_INTERVAL
}

impl Curve {
    pub fn new(descriptor: &ExpressionDescriptor) -> Self {
        let mut curve = Self {
            abbr: descriptor.abbr.clone(),
            xs: Vec::new(),
            ys: Vec::new(),
            min: 0.0,
            max: 0.0,
            default_value: 0,
            interval: CURVE_INTERVAL,
        };
        curve.bind(descriptor);
        curve
    }

    pub fn with_interval(mut self, interval: i32) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Attach descriptor bounds, e.g. after deserialization
    pub fn bind(&mut self, descriptor: &ExpressionDescriptor) {
        self.min = descriptor.min;
        self.max = descriptor.max;
        self.default_value = descriptor.default_value.round() as i32;
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty() || self.ys.iter().all(|&y| y == self.default_value)
    }

    /// Value at `x`: exact sample, linear interpolation between neighbours,
    /// or the default outside the stored range
    pub fn sample(&self, x: i32) -> i32 {
        match self.xs.binary_search(&x) {
            Ok(idx) => self.ys[idx],
            Err(idx) if idx > 0 && idx < self.xs.len() => {
                let (x0, x1) = (self.xs[idx - 1] as f64, self.xs[idx] as f64);
                let (y0, y1) = (self.ys[idx - 1] as f64, self.ys[idx] as f64);
                crate::utils::music_math::linear(x0, x1, y0, y1, x as f64).round() as i32
            }
            Err(_) => self.default_value,
        }
    }

    /// Whether the curve reads `default` across `[x0, x1]`
    pub fn is_empty_between(&self, x0: i32, x1: i32, default: i32) -> bool {
        if self.sample(x0) != default || self.sample(x1) != default {
            return false;
        }
        let start = self.xs.partition_point(|&x| x < x0);
        self.xs[start..]
            .iter()
            .zip(&self.ys[start..])
            .take_while(|(&x, _)| x <= x1)
            .all(|(_, &y)| y == default)
    }

    fn snap(&self, x: i32) -> i32 {
        let interval = self.interval.max(1);
        ((x as f64) / interval as f64).round() as i32 * interval
    }

    fn insert(&mut self, x: i32, y: i32) {
        match self.xs.binary_search(&x) {
            Ok(idx) => self.ys[idx] = y,
            Err(idx) => {
                self.xs.insert(idx, x);
                self.ys.insert(idx, y);
            }
        }
    }

    /// Apply one step of a drag gesture from (`last_x`, `last_y`) to (`x`, `y`).
    ///
    /// Both ends snap to the interval grid. Samples strictly between them are
    /// removed and the neighbour one interval beyond the new point is pinned
    /// to its previous value.
    pub fn set(&mut self, x: i32, y: i32, last_x: i32, _last_y: i32) {
        let x = self.snap(x);
        let last_x = self.snap(last_x);
        let interval = self.interval.max(1);
        if x == last_x {
            let left = self.sample(x - interval);
            let right = self.sample(x + interval);
            self.insert(x - interval, left);
            self.insert(x, y);
            self.insert(x + interval, right);
        } else if x < last_x {
            let left = self.sample(x - interval);
            self.delete_between_exclusive(x, last_x);
            self.insert(x - interval, left);
            self.insert(x, y);
        } else {
            let right = self.sample(x + interval);
            self.delete_between_exclusive(last_x, x);
            self.insert(x, y);
            self.insert(x + interval, right);
        }
    }

    /// Remove samples with `x0 < x < x1`
    pub fn delete_between_exclusive(&mut self, x0: i32, x1: i32) {
        let left = self.xs.partition_point(|&x| x <= x0);
        let right = self.xs.partition_point(|&x| x < x1);
        if right > left {
            self.xs.drain(left..right);
            self.ys.drain(left..right);
        }
    }

    pub fn clear(&mut self) {
        self.xs.clear();
        self.ys.clear();
    }

    /// Tolerance used by [`Curve::simplify`]
    pub fn simplify_tolerance(&self) -> f64 {
        (5.0f64).min(((self.max - self.min) as f64 * 0.005).abs())
    }

    /// Douglas-Peucker reduction keeping the first and last sample
    pub fn simplify(&mut self) {
        if self.xs.len() < 3 {
            return;
        }
        let tolerance = self.simplify_tolerance();
        let last = self.xs.len() - 1;
        let mut keep = vec![false; self.xs.len()];
        keep[0] = true;
        keep[last] = true;
        let mut stack = vec![(0usize, last)];
        while let Some((first, last)) = stack.pop() {
            let mut max_dist = 0.0;
            let mut max_idx = None;
            for idx in first + 1..last {
                let dist = perpendicular_distance(
                    (self.xs[first], self.ys[first]),
                    (self.xs[last], self.ys[last]),
                    (self.xs[idx], self.ys[idx]),
                );
                if dist > max_dist {
                    max_dist = dist;
                    max_idx = Some(idx);
                }
            }
            if let Some(idx) = max_idx {
                if max_dist > tolerance {
                    keep[idx] = true;
                    stack.push((first, idx));
                    stack.push((idx, last));
                }
            }
        }
        let (xs, ys): (Vec<i32>, Vec<i32>) = self
            .xs
            .iter()
            .zip(&self.ys)
            .zip(&keep)
            .filter(|(_, &k)| k)
            .map(|((&x, &y), _)| (x, y))
            .unzip();
        self.xs = xs;
        self.ys = ys;
    }

    /// Union same-abbreviation curves from several lists.
    ///
    /// Samples at equal ticks resolve to the later list's value.
    pub fn merge_curves(lists: &[&[Curve]]) -> Vec<Curve> {
        let mut merged: Vec<(Curve, BTreeMap<i32, i32>)> = Vec::new();
        for curves in lists {
            for curve in curves.iter() {
                let slot = match merged.iter().position(|(c, _)| c.abbr == curve.abbr) {
                    Some(pos) => pos,
                    None => {
                        merged.push((curve.clone(), BTreeMap::new()));
                        merged.len() - 1
                    }
                };
                merged[slot]
                    .1
                    .extend(curve.xs.iter().copied().zip(curve.ys.iter().copied()));
            }
        }
        merged
            .into_iter()
            .map(|(mut curve, samples)| {
                curve.xs = samples.keys().copied().collect();
                curve.ys = samples.values().copied().collect();
                curve
            })
            .collect()
    }
}

/// Distance from `p` to the line through `a` and `b`
pub fn perpendicular_distance(a: (i32, i32), b: (i32, i32), p: (i32, i32)) -> f64 {
    let (ax, ay) = (a.0 as f64, a.1 as f64);
    let (bx, by) = (b.0 as f64, b.1 as f64);
    let (px, py) = (p.0 as f64, p.1 as f64);
    let length = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
    if length == 0.0 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }
    ((bx - ax) * (ay - py) - (ax - px) * (by - ay)).abs() / length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ExpressionDescriptor {
        ExpressionDescriptor::curve("pitch deviation", "pitd", -1200.0, 1200.0, 0.0)
    }

    fn curve_with(points: &[(i32, i32)]) -> Curve {
        let mut curve = Curve::new(&descriptor());
        for &(x, y) in points {
            curve.insert(x, y);
        }
        curve
    }

    #[test]
    fn test_sample_interpolates_and_defaults() {
        let curve = curve_with(&[(0, 0), (100, 50), (200, 0)]);
        assert_eq!(curve.sample(50), 25);
        assert_eq!(curve.sample(100), 50);
        assert_eq!(curve.sample(-10), 0);
        assert_eq!(curve.sample(500), 0);
        assert!(!curve.is_empty_between(0, 200, 0));
        assert!(curve.is_empty_between(300, 400, 0));
    }

    #[test]
    fn test_point_set_pins_neighbours() {
        let mut curve = Curve::new(&descriptor());
        curve.set(100, 80, 100, 0);
        assert_eq!(curve.xs, vec![95, 100, 105]);
        assert_eq!(curve.ys, vec![0, 80, 0]);
    }

    #[test]
    fn test_drag_snaps_and_clears_span() {
        let mut curve = curve_with(&[(0, 10), (20, 10), (40, 10), (60, 10)]);
        curve.set(52, 30, 3, 10);
        // 3 snaps to 5, 52 snaps to 50; samples at 20 and 40 are removed
        assert_eq!(curve.xs, vec![0, 50, 55, 60]);
        assert_eq!(curve.sample(50), 30);
        assert_eq!(curve.sample(55), 10);
    }

    #[test]
    fn test_delete_between_is_exclusive() {
        let mut curve = curve_with(&[(0, 1), (5, 2), (10, 3), (15, 4)]);
        curve.delete_between_exclusive(0, 15);
        assert_eq!(curve.xs, vec![0, 15]);
    }

    #[test]
    fn test_simplify_drops_collinear_points() {
        let points: Vec<(i32, i32)> = (0..=20).map(|i| (i * 5, i * 10)).collect();
        let mut curve = curve_with(&points);
        curve.simplify();
        assert_eq!(curve.xs, vec![0, 100]);
        assert_eq!(curve.ys, vec![0, 200]);
    }

    #[test]
    fn test_simplify_keeps_peaks() {
        let mut curve = curve_with(&[(0, 0), (5, 1), (10, 300), (15, 1), (20, 0)]);
        curve.simplify();
        assert!(curve.xs.contains(&10));
        assert_eq!(curve.xs.first(), Some(&0));
        assert_eq!(curve.xs.last(), Some(&20));
    }

    #[test]
    fn test_simplify_stays_within_tolerance_of_freehand_stroke() {
        // A wavy stroke with a few ticks of hand jitter
        let points: Vec<(i32, i32)> = (0..400)
            .map(|i| {
                let wave = 300.0 * (i as f64 * 0.07).sin();
                let jitter = (i * 37 % 11) as f64 - 5.0;
                (i * 5, (wave + jitter).round() as i32)
            })
            .collect();
        let mut curve = curve_with(&points);
        let tolerance = curve.simplify_tolerance();
        curve.simplify();

        assert!(curve.len() < points.len());
        assert_eq!(curve.xs.first(), Some(&0));
        assert_eq!(curve.xs.last(), Some(&(399 * 5)));
        for &(x, y) in points.iter() {
            let right = curve.xs.partition_point(|&kx| kx < x).min(curve.len() - 1);
            let left = if curve.xs[right] == x { right } else { right - 1 };
            let dist = perpendicular_distance(
                (curve.xs[left], curve.ys[left]),
                (curve.xs[right], curve.ys[right]),
                (x, y),
            );
            assert!(dist <= tolerance + 1e-9, "sample ({}, {}) is {} away", x, y, dist);
        }
    }

    #[test]
    fn test_merge_unions_samples() {
        let a = vec![curve_with(&[(0, 1), (10, 2)])];
        let b = vec![curve_with(&[(5, 7), (10, 9)])];
        let merged = Curve::merge_curves(&[&a, &b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].xs, vec![0, 5, 10]);
        assert_eq!(merged[0].ys, vec![1, 7, 9]);
    }
}
