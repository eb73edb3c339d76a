//! Built-in raster cube loaders.
//!
//! This module contains implementations of the `CubeLoader` trait
//! for the supported input formats.

mod envi_loader;
mod npy_loader;

pub use envi_loader::EnviLoader;
pub use npy_loader::NpyLoader;
