//! Spectral Angle Mapping.
//!
//! The spectral angle between a pixel `p` and a reference `r` is
//! `θ = arccos(p·r / (‖p‖ ‖r‖))`, limited to `[0, π/2]`. It ignores overall
//! brightness, so a shaded pixel still matches its mineral.

use std::f64::consts::FRAC_PI_2;

use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Angle in radians between two spectra, in `[0, π/2]`.
///
/// Returns `π/2` when either spectrum has zero norm.
pub fn spectral_angle(pixel: ArrayView1<'_, f64>, reference: ArrayView1<'_, f64>) -> f64 {
    let norms = pixel.dot(&pixel).sqrt() * reference.dot(&reference).sqrt();
    if norms == 0.0 {
        return FRAC_PI_2;
    }
    (pixel.dot(&reference) / norms).clamp(0.0, 1.0).acos()
}

/// Map an angle onto `[0, 1]`, 1 being identical direction.
pub fn similarity(angle: f64) -> f64 {
    1.0 - angle / FRAC_PI_2
}

/// Whether a pixel carries no measurement.
///
/// True when every value is zero, any value is non-finite, or any value
/// equals `ignore`.
pub fn is_nodata(pixel: ArrayView1<'_, f32>, ignore: Option<f64>) -> bool {
    let mut all_zero = true;
    for &value in pixel {
        if !value.is_finite() || ignore.is_some_and(|i| f64::from(value) == i) {
            return true;
        }
        all_zero &= value == 0.0;
    }
    all_zero
}

/// Best reference for a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Index into the matcher's references
    pub index: usize,
    /// Spectral angle in radians
    pub angle: f64,
}

impl Match {
    pub fn similarity(&self) -> f64 {
        similarity(self.angle)
    }
}

/// Nearest-angle search over a fixed set of references.
///
/// References are normalized once, so each pixel costs one dot product per
/// reference.
#[derive(Debug, Clone)]
pub struct AngleMatcher {
    /// One unit-length reference per row
    units: Array2<f64>,
}

impl AngleMatcher {
    /// Build a matcher. References must be non-zero and of equal length.
    pub fn new<'a, I>(references: I, bands: usize) -> Self
    where
        I: IntoIterator<Item = ArrayView1<'a, f64>>,
    {
        let rows: Vec<Array1<f64>> = references
            .into_iter()
            .map(|r| {
                let norm = r.dot(&r).sqrt();
                r.mapv(|v| v / norm)
            })
            .collect();
        let mut units = Array2::zeros((rows.len(), bands));
        for (mut dst, src) in units.axis_iter_mut(Axis(0)).zip(&rows) {
            dst.assign(src);
        }
        Self { units }
    }

    /// Number of references.
    pub fn len(&self) -> usize {
        self.units.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.units.nrows() == 0
    }

    /// Reference with the smallest angle to `pixel`; ties go to the lowest
    /// index. `None` for a zero-norm pixel or an empty matcher.
    pub fn best(&self, pixel: ArrayView1<'_, f32>) -> Option<Match> {
        let pixel = pixel.mapv(f64::from);
        let norm = pixel.dot(&pixel).sqrt();
        if norm == 0.0 {
            return None;
        }

        let mut best: Option<Match> = None;
        for (index, unit) in self.units.outer_iter().enumerate() {
            let angle = (unit.dot(&pixel) / norm).clamp(0.0, 1.0).acos();
            if best.is_none_or(|b| angle < b.angle) {
                best = Some(Match { index, angle });
            }
        }
        best
    }
}
