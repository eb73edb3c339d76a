//! Reference spectral libraries.
//!
//! A [`SpectralLibrary`] is an ordered list of named reference spectra on one
//! wavelength axis. Libraries are validated on construction, so any library
//! that exists is non-empty, rectangular and free of duplicate names.

mod csv_table;
mod envi_sli;

use std::collections::HashSet;
use std::path::Path;

use ndarray::{Array1, ArrayView1};

use crate::constants::NO_DATA_CLASS_NAME;
use crate::data::{WavelengthAxis, is_list_safe};
use crate::error::{Error, Result};

pub use csv_table::read_csv_library;
pub use envi_sli::{read_sli, write_sli};

/// One named reference spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSpectrum {
    name: String,
    values: Array1<f64>,
}

impl ReferenceSpectrum {
    /// Create a spectrum.
    pub fn new(name: impl Into<String>, values: impl Into<Array1<f64>>) -> Self {
        Self {
            name: name.into(),
            values: values.into(),
        }
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reflectance values, one per band.
    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.values.dot(&self.values).sqrt()
    }
}

/// Immutable, validated collection of reference spectra.
#[derive(Debug, Clone)]
pub struct SpectralLibrary {
    wavelengths: WavelengthAxis,
    entries: Vec<ReferenceSpectrum>,
}

impl SpectralLibrary {
    /// Build a library, rejecting anything the classifier cannot use.
    pub fn new(wavelengths: WavelengthAxis, entries: Vec<ReferenceSpectrum>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::invalid_library("library contains no spectra"));
        }
        if wavelengths.is_empty() {
            return Err(Error::invalid_library("library has no wavelength axis"));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.values.len() != wavelengths.len() {
                return Err(Error::invalid_library(format!(
                    "'{}' has {} values but the axis has {} bands",
                    entry.name,
                    entry.values.len(),
                    wavelengths.len()
                )));
            }
            if !is_list_safe(&entry.name) {
                return Err(Error::invalid_library(format!(
                    "class name '{}' is empty, padded or contains ',', '{{' or '}}'",
                    entry.name
                )));
            }
            if entry.name == NO_DATA_CLASS_NAME {
                return Err(Error::invalid_library(format!(
                    "'{}' is a reserved class name",
                    NO_DATA_CLASS_NAME
                )));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::invalid_library(format!(
                    "duplicate class name '{}'",
                    entry.name
                )));
            }
            if entry.values.iter().any(|v| !v.is_finite()) {
                return Err(Error::invalid_library(format!(
                    "'{}' contains non-finite values",
                    entry.name
                )));
            }
            if entry.norm() == 0.0 {
                return Err(Error::invalid_library(format!(
                    "'{}' is an all-zero spectrum",
                    entry.name
                )));
            }
        }

        Ok(Self {
            wavelengths,
            entries,
        })
    }

    /// Open a library file, choosing the parser by extension.
    ///
    /// `.csv` is read as a spectral table; anything else as an ENVI
    /// spectral library (`.sli` or its `.hdr`).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_csv = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        let library = if is_csv {
            read_csv_library(path)?
        } else {
            read_sli(path)?
        };
        log::info!(
            "Loaded {} reference spectra over {} bands from {:?}",
            library.len(),
            library.wavelengths.len(),
            path
        );
        Ok(library)
    }

    /// Number of spectra.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed library; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared wavelength axis.
    pub fn wavelengths(&self) -> &WavelengthAxis {
        &self.wavelengths
    }

    /// Spectra in library order.
    pub fn entries(&self) -> &[ReferenceSpectrum] {
        &self.entries
    }

    /// Class names in library order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name())
    }

    /// Look up a spectrum by name.
    pub fn get(&self, name: &str) -> Option<&ReferenceSpectrum> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Linearly interpolate every spectrum onto `target`.
    ///
    /// Target bands outside the library's range take the nearest endpoint
    /// value. The library axis must be strictly increasing.
    pub fn resampled_to(&self, target: &WavelengthAxis) -> Result<Self> {
        let source = self.wavelengths.as_slice();
        if source.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::invalid_library(
                "wavelengths must be strictly increasing to resample",
            ));
        }
        if target.is_empty() {
            return Err(Error::BandMismatch {
                expected: source.len(),
                found: 0,
                detail: "image has no wavelength axis".to_string(),
            });
        }

        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let values: Vec<f64> = target
                    .as_slice()
                    .iter()
                    .map(|&nm| interpolate(source, entry.values.view(), nm))
                    .collect();
                ReferenceSpectrum::new(entry.name.clone(), values)
            })
            .collect();

        log::info!(
            "Resampled {} spectra from {} to {} bands",
            self.len(),
            source.len(),
            target.len()
        );
        Self::new(target.clone(), entries)
    }
}

fn interpolate(axis: &[f64], values: ArrayView1<'_, f64>, nm: f64) -> f64 {
    let last = axis.len() - 1;
    if nm <= axis[0] {
        return values[0];
    }
    if nm >= axis[last] {
        return values[last];
    }
    // axis[hi - 1] < nm <= axis[hi]
    let hi = axis.partition_point(|&x| x < nm);
    let lo = hi - 1;
    let t = (nm - axis[lo]) / (axis[hi] - axis[lo]);
    values[lo] + t * (values[hi] - values[lo])
}
