//! Raster cube abstraction used by the classifier and the RGB composer.
//!
//! The core never touches a file format directly: it reads through
//! [`RasterCube`], which exposes dimensions, the wavelength axis, pass-through
//! metadata and row tiles of pixel spectra. [`MemoryCube`] backs `.npy` input
//! and test fixtures; `EnviImage` backs ENVI files.

use std::ops::Range;

use ndarray::{Array1, Array3, Axis, Slice};

use crate::data::{Metadata, WavelengthAxis};
use crate::error::{Error, Result};

/// Spatial and spectral dimensions of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeShape {
    /// Number of image lines
    pub rows: usize,
    /// Number of samples per line
    pub cols: usize,
    /// Number of spectral bands
    pub bands: usize,
}

impl CubeShape {
    /// Create a shape.
    pub fn new(rows: usize, cols: usize, bands: usize) -> Self {
        Self { rows, cols, bands }
    }

    /// Number of pixels in one band.
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }
}

/// Read access to a multi-band raster.
pub trait RasterCube {
    /// Dimensions of the cube.
    fn shape(&self) -> CubeShape;

    /// Band-center wavelengths. Empty when the source does not declare them.
    fn wavelengths(&self) -> &WavelengthAxis;

    /// Pass-through header fields (map info, sensor type, ignore value...).
    fn metadata(&self) -> &Metadata;

    /// Identifier used for sensor detection, normally the file name.
    fn source_name(&self) -> &str;

    /// Read a block of whole rows as a `(rows, cols, bands)` array.
    fn read_rows(&self, rows: Range<usize>) -> Result<Array3<f32>>;

    /// Spectrum of a single pixel.
    fn spectrum(&self, row: usize, col: usize) -> Result<Array1<f32>> {
        let shape = self.shape();
        if row >= shape.rows || col >= shape.cols {
            return Err(Error::InvalidConfig(format!(
                "pixel ({}, {}) outside {}x{} raster",
                row, col, shape.rows, shape.cols
            )));
        }
        let tile = self.read_rows(row..row + 1)?;
        Ok(tile.index_axis_move(Axis(0), 0).index_axis_move(Axis(0), col))
    }

    /// Value marking invalid samples (`data ignore value`), if declared.
    fn nodata_value(&self) -> Option<f64> {
        self.metadata().get_f64("data ignore value")
    }
}

/// Cube held entirely in memory as a `(rows, cols, bands)` array.
#[derive(Debug, Clone)]
pub struct MemoryCube {
    data: Array3<f32>,
    wavelengths: WavelengthAxis,
    metadata: Metadata,
    name: String,
}

impl MemoryCube {
    /// Wrap an array. The axis must be empty or have one entry per band.
    pub fn new(data: Array3<f32>, wavelengths: WavelengthAxis) -> Result<Self> {
        let bands = data.dim().2;
        if !wavelengths.is_empty() && wavelengths.len() != bands {
            return Err(Error::BandMismatch {
                expected: wavelengths.len(),
                found: bands,
                detail: "wavelength list does not match the band count".to_string(),
            });
        }
        Ok(Self {
            data,
            wavelengths,
            metadata: Metadata::new(),
            name: String::from("memory"),
        })
    }

    /// Attach header-style metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the name used for sensor detection.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Underlying array.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }
}

impl RasterCube for MemoryCube {
    fn shape(&self) -> CubeShape {
        let (rows, cols, bands) = self.data.dim();
        CubeShape::new(rows, cols, bands)
    }

    fn wavelengths(&self) -> &WavelengthAxis {
        &self.wavelengths
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<Array3<f32>> {
        let total = self.data.dim().0;
        if rows.start > rows.end || rows.end > total {
            return Err(Error::InvalidConfig(format!(
                "row range {:?} outside raster of {} rows",
                rows, total
            )));
        }
        Ok(self.data.slice_axis(Axis(0), Slice::from(rows)).to_owned())
    }
}
