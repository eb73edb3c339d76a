//! 8-bit PNG previews of RGB rasters.

use std::path::Path;

use image::{ImageFormat, RgbImage};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_STRETCH_HIGH, DEFAULT_STRETCH_LOW};
use crate::error::{Error, Result};
use crate::rgb::compose::RgbRaster;

/// Percentile window mapped linearly onto 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewStretch {
    /// Lower percentile (0-100), mapped to 0
    pub low: f64,
    /// Upper percentile (0-100), mapped to 255
    pub high: f64,
}

impl Default for PreviewStretch {
    fn default() -> Self {
        Self {
            low: DEFAULT_STRETCH_LOW,
            high: DEFAULT_STRETCH_HIGH,
        }
    }
}

impl PreviewStretch {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let stretch = Self { low, high };
        stretch.validate()?;
        Ok(stretch)
    }

    /// Require `0 <= low < high <= 100`.
    pub fn validate(&self) -> Result<()> {
        if (0.0..=100.0).contains(&self.low)
            && (0.0..=100.0).contains(&self.high)
            && self.low < self.high
        {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "stretch percentiles must satisfy 0 <= low < high <= 100, got {}..{}",
                self.low, self.high
            )))
        }
    }
}

impl RgbRaster {
    /// Render a corrected, contrast-stretched 8-bit image.
    ///
    /// Each band is multiplied by its correction factor, then the stretch
    /// percentiles are computed over valid pixels only. Nodata pixels are
    /// black.
    pub fn to_preview(&self, stretch: &PreviewStretch) -> Result<RgbImage> {
        stretch.validate()?;
        let (rows, cols, _) = self.data().dim();
        let width = u32::try_from(cols)
            .map_err(|_| Error::InvalidConfig(format!("{} columns is too wide for PNG", cols)))?;
        let height = u32::try_from(rows)
            .map_err(|_| Error::InvalidConfig(format!("{} rows is too tall for PNG", rows)))?;

        let ignore = self.metadata().get_f64("data ignore value");
        let valid: Vec<bool> = self
            .data()
            .lanes(Axis(2))
            .into_iter()
            .map(|px| {
                let mut all_zero = true;
                for &v in px {
                    if !v.is_finite() || ignore.is_some_and(|i| f64::from(v) == i) {
                        return false;
                    }
                    all_zero &= v == 0.0;
                }
                !all_zero
            })
            .collect();

        let mut pixels = vec![0u8; rows * cols * 3];
        for (channel, spec) in self.sensor().table().bands().iter().enumerate() {
            let band: Vec<f64> = self
                .data()
                .index_axis(Axis(2), channel)
                .iter()
                .map(|&v| f64::from(v) * spec.correction)
                .collect();

            let mut sorted: Vec<f64> = band
                .iter()
                .zip(&valid)
                .filter(|(_, ok)| **ok)
                .map(|(v, _)| *v)
                .collect();
            if sorted.is_empty() {
                continue;
            }
            sorted.sort_by(f64::total_cmp);
            let lo = percentile(&sorted, stretch.low);
            let hi = percentile(&sorted, stretch.high);
            let range = (hi - lo).max(f64::EPSILON);

            for (i, &v) in band.iter().enumerate() {
                if valid[i] {
                    pixels[i * 3 + channel] = (((v - lo) / range).clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::InvalidConfig("preview buffer size mismatch".to_string()))
    }

    /// Render and save a PNG preview.
    pub fn write_png(&self, path: &Path, stretch: &PreviewStretch) -> Result<()> {
        let preview = self.to_preview(stretch)?;
        preview.save_with_format(path, ImageFormat::Png)?;
        log::info!("Wrote preview {:?}", path);
        Ok(())
    }
}

/// Nearest-rank percentile of sorted, non-empty values.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
