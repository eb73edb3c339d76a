//! Error types for classification, compaction and RGB composition.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by the hvclass library.
#[derive(Error, Debug)]
pub enum Error {
    /// Reference library is empty, inconsistent or otherwise unusable
    #[error("Invalid spectral library: {reason}")]
    InvalidLibrary {
        /// What is wrong with the library
        reason: String,
    },

    /// Image and library wavelength axes disagree
    #[error("Band mismatch: library has {expected} bands, image has {found} ({detail})")]
    BandMismatch {
        /// Band count of the reference library
        expected: usize,
        /// Band count of the image
        found: usize,
        /// Where the axes first differ
        detail: String,
    },

    /// Requested class subset matches nothing in the library
    #[error("None of the requested classes exist in the library: {requested:?}")]
    EmptySubset {
        /// The class names that were asked for
        requested: Vec<String>,
    },

    /// Sensor family could not be determined for an RGB conversion
    #[error("Unknown sensor family for '{source_name}'")]
    UnknownSensor {
        /// File name or identifier of the offending image
        source_name: String,
    },

    /// Image lacks a band the sensor table points at
    #[error("{sensor} band {band} requested but the image only has {available} bands")]
    MissingBand {
        /// Display name of the sensor family
        sensor: &'static str,
        /// Zero-based band index from the sensor table
        band: usize,
        /// Number of bands in the image
        available: usize,
    },

    /// Classified raster contains an id with no catalog entry
    #[error("Class id {id} is outside the catalog of {classes} classes")]
    InvalidClassId {
        /// The offending pixel value
        id: u16,
        /// Catalog length
        classes: usize,
    },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Run was aborted through its cancel token
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O failure, always tagged with the file involved
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed or incomplete ENVI header
    #[error("Invalid ENVI header {path:?}: {message}")]
    InvalidHeader {
        /// Header file
        path: PathBuf,
        /// Description of the problem
        message: String,
    },

    /// No registered loader accepts the file
    #[error("Unsupported raster format: {path:?} (supported extensions: {supported})")]
    UnsupportedFormat {
        /// The file that could not be opened
        path: PathBuf,
        /// Registered extensions, comma separated
        supported: String,
    },

    /// NumPy array could not be decoded
    #[error("NumPy error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// CSV spectral table could not be parsed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// PNG preview encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON sidecar could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Array shape did not match the declared raster layout
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    /// Create an invalid library error with a reason.
    pub fn invalid_library(reason: impl Into<String>) -> Self {
        Self::InvalidLibrary {
            reason: reason.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach a path to a bare `std::io::Result`.
pub(crate) trait IoResultExt<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
