//! Raster cube access for hyperspectral images.
//!
//! This module provides:
//! - `RasterCube`: the read interface the classifier and RGB composer use
//! - `MemoryCube`: an in-memory cube for `.npy` input and fixtures
//! - `Metadata` and `WavelengthAxis`: header fields and band centers
//! - `LoaderRegistry`: format detection over the built-in loaders
//!
//! ## Adding New Formats
//!
//! 1. Create a new loader in `loaders/` implementing `CubeLoader`
//! 2. Register it in `LoaderRegistry::new()`

mod cube;
mod loader;
pub mod loaders;
mod metadata;
mod wavelength;

pub use cube::{CubeShape, MemoryCube, RasterCube};
pub use loader::{CubeLoader, LoaderRegistry};
pub use metadata::{Metadata, format_list, is_list_safe, parse_list};
pub use wavelength::WavelengthAxis;
