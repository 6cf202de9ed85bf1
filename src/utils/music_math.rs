//! Shared music math
//!
//! Easing curves used to interpolate pitch points and rebuild them from
//! rendered pitch.

use crate::models::pitch::PitchPointShape;

// Segments narrower than this collapse onto their end value.
const EPSILON: f64 = 0.001;

pub fn linear(x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> f64 {
    if x1 - x0 < EPSILON {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

pub fn sin_easing_in_out(x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> f64 {
    if x1 - x0 < EPSILON {
        return y1;
    }
    y0 + (y1 - y0) * (1.0 - ((x - x0) / (x1 - x0) * std::f64::consts::PI).cos()) / 2.0
}

pub fn sin_easing_in(x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> f64 {
    if x1 - x0 < EPSILON {
        return y1;
    }
    y0 + (y1 - y0) * (1.0 - ((x - x0) / (x1 - x0) * std::f64::consts::FRAC_PI_2).cos())
}

pub fn sin_easing_out(x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> f64 {
    if x1 - x0 < EPSILON {
        return y1;
    }
    y0 + (y1 - y0) * ((x - x0) / (x1 - x0) * std::f64::consts::FRAC_PI_2).sin()
}

/// Interpolate between two pitch points using the shape of the left point
pub fn interpolate_shape(
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    x: f64,
    shape: PitchPointShape,
) -> f64 {
    match shape {
        PitchPointShape::SineInOut => sin_easing_in_out(x0, x1, y0, y1, x),
        PitchPointShape::SineIn => sin_easing_in(x0, x1, y0, y1, x),
        PitchPointShape::SineOut => sin_easing_out(x0, x1, y0, y1, x),
        PitchPointShape::Linear => linear(x0, x1, y0, y1, x),
    }
}

/// Inverse of [`interpolate_shape`]: find x for a given y on the segment
pub fn interpolate_shape_x(
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    y: f64,
    shape: PitchPointShape,
) -> f64 {
    let pi = std::f64::consts::PI;
    match shape {
        PitchPointShape::SineInOut => (1.0 - (y - y0) * 2.0 / (y1 - y0)).acos() / pi * (x1 - x0) + x0,
        PitchPointShape::SineIn => (1.0 - (y - y0) / (y1 - y0)).acos() / pi * 2.0 * (x1 - x0) + x0,
        PitchPointShape::SineOut => ((y - y0) / (y1 - y0)).asin() / pi * 2.0 * (x1 - x0) + x0,
        PitchPointShape::Linear => (y - y0) / (y1 - y0) * (x1 - x0) + x0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        for shape in [
            PitchPointShape::SineInOut,
            PitchPointShape::SineIn,
            PitchPointShape::SineOut,
            PitchPointShape::Linear,
        ] {
            assert!((interpolate_shape(0.0, 10.0, 0.0, 100.0, 0.0, shape)).abs() < 1e-9);
            assert!((interpolate_shape(0.0, 10.0, 0.0, 100.0, 10.0, shape) - 100.0).abs() < 1e-9);
        }
        // Midpoint placement distinguishes the shapes.
        assert!(interpolate_shape(0.0, 10.0, 0.0, 100.0, 5.0, PitchPointShape::SineIn) < 33.0);
        assert!(interpolate_shape(0.0, 10.0, 0.0, 100.0, 5.0, PitchPointShape::SineOut) > 67.0);
    }

    #[test]
    fn test_shape_inverse() {
        let y = interpolate_shape(0.0, 10.0, 0.0, 100.0, 3.0, PitchPointShape::SineOut);
        let x = interpolate_shape_x(0.0, 10.0, 0.0, 100.0, y, PitchPointShape::SineOut);
        assert!((x - 3.0).abs() < 1e-6);
    }
}
