//! hvclass - mineral classification for airborne hyperspectral imagery
//!
//! Matches every pixel of an AVIRIS-NG or AVIRIS-Classic scene against a
//! reference spectral library by spectral angle, compacts the resulting
//! class rasters and extracts true-color composites.
//!
//! The three operations are [`classify::classify_image`],
//! [`compact::filter_classes`] and [`rgb::to_rgb`]. Each takes a
//! [`RunContext`] carrying tile size, worker count, cancellation and
//! progress reporting.

pub mod classified;
pub mod classify;
pub mod compact;
pub mod config;
pub mod constants;
pub mod context;
pub mod data;
pub mod envi;
pub mod error;
pub mod library;
pub mod rgb;

pub use classified::ClassifiedRaster;
pub use classify::{ClassCatalog, ClassificationConfig, classify_file, classify_image};
pub use compact::{FilterSummary, filter_classes, filter_classes_file};
pub use config::AppConfig;
pub use context::{CancelToken, RunContext};
pub use data::{LoaderRegistry, MemoryCube, RasterCube, WavelengthAxis};
pub use error::{Error, Result};
pub use library::{ReferenceSpectrum, SpectralLibrary};
pub use rgb::{PreviewStretch, RgbRaster, SensorFamily, to_rgb, to_rgb_file};
