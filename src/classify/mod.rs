//! Mineral classification by Spectral Angle Mapping.
//!
//! Each pixel is assigned the reference spectrum with the smallest spectral
//! angle. Pixel id 0 is always "No data": nodata pixels, and pixels whose
//! best similarity falls below the optional threshold.

pub mod angle;
mod catalog;
mod classifier;
mod colors;

pub use catalog::{ClassCatalog, ClassEntry};
pub use classifier::{ClassificationConfig, classify_file, classify_image};
pub use colors::{NO_DATA_COLOR, generate_palette};
