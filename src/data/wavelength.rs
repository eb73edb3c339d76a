//! Wavelength axis shared by image bands and library spectra.

use crate::constants::AXIS_TOLERANCE_NM;
use crate::data::Metadata;

/// Ordered band-center wavelengths in nanometers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WavelengthAxis {
    centers: Vec<f64>,
}

impl WavelengthAxis {
    /// Create an axis from centers already expressed in nanometers.
    pub fn new(centers: Vec<f64>) -> Self {
        Self { centers }
    }

    /// Create an axis from raw values and an ENVI `wavelength units` string.
    ///
    /// Micrometer values are converted to nanometers. When no unit is given,
    /// values that all lie below 30 are taken to be micrometers, since no
    /// supported sensor has a band center below 30 nm.
    pub fn from_units(values: Vec<f64>, units: Option<&str>) -> Self {
        let micrometers = match units.map(|u| u.trim().to_lowercase()) {
            Some(u) if u.starts_with("micro") || u == "um" || u == "µm" => true,
            Some(u) if u.starts_with("nano") || u == "nm" => false,
            _ => !values.is_empty() && values.iter().all(|v| *v < 30.0),
        };

        if micrometers {
            log::debug!("Converting {} wavelengths from micrometers", values.len());
            Self::new(values.into_iter().map(|v| v * 1000.0).collect())
        } else {
            Self::new(values)
        }
    }

    /// Read the `wavelength` and `wavelength units` fields of a header.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let values = metadata.get_f64_list("wavelength")?;
        Some(Self::from_units(
            values,
            metadata.get_scalar("wavelength units"),
        ))
    }

    /// Number of bands.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Whether the axis has no bands.
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Band centers in nanometers.
    pub fn as_slice(&self) -> &[f64] {
        &self.centers
    }

    /// Center of one band.
    pub fn get(&self, band: usize) -> Option<f64> {
        self.centers.get(band).copied()
    }

    /// First band whose center differs from `other`, or the shorter length
    /// when the axes have different sizes. `None` means the axes match.
    pub fn first_mismatch(&self, other: &WavelengthAxis) -> Option<usize> {
        if let Some(i) = self
            .centers
            .iter()
            .zip(&other.centers)
            .position(|(a, b)| (a - b).abs() > AXIS_TOLERANCE_NM)
        {
            return Some(i);
        }
        (self.len() != other.len()).then(|| self.len().min(other.len()))
    }

    /// Whether two axes describe the same bands in the same order.
    pub fn is_compatible(&self, other: &WavelengthAxis) -> bool {
        self.first_mismatch(other).is_none()
    }

    /// Smallest and largest band centers.
    pub fn range(&self) -> Option<(f64, f64)> {
        let first = *self.centers.first()?;
        Some(
            self.centers
                .iter()
                .fold((first, first), |(lo, hi), &c| (lo.min(c), hi.max(c))),
        )
    }
}
