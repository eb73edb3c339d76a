//! Global constants for hvclass

/// Name of the sentinel class at catalog index 0
pub const NO_DATA_CLASS_NAME: &str = "No data";

/// Prefix of the `description` header field written on every output raster
pub const DESCRIPTION_PREFIX: &str = "HVCLASS";

/// Crate version embedded in output descriptions
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffix identifying a mineral classification product
pub const CLASSIFIED_DESCRIPTION_SUFFIX: &str = "mineral classified image.";

/// Suffix identifying a visible-light product
pub const RGB_DESCRIPTION_SUFFIX: &str = "visible-light image.";

/// ENVI `file type` for classification rasters
pub const FILE_TYPE_CLASSIFICATION: &str = "ENVI Classification";

/// ENVI `file type` for ordinary rasters
pub const FILE_TYPE_STANDARD: &str = "ENVI Standard";

/// ENVI `file type` for spectral libraries
pub const FILE_TYPE_SPECTRAL_LIBRARY: &str = "ENVI Spectral Library";

/// Maximum distance (nm) between band centers considered the same band
pub const AXIS_TOLERANCE_NM: f64 = 0.01;

/// Default number of raster rows read and classified per tile
pub const DEFAULT_TILE_ROWS: usize = 64;

/// Default lower percentile for preview contrast stretch
pub const DEFAULT_STRETCH_LOW: f64 = 2.0;

/// Default upper percentile for preview contrast stretch
pub const DEFAULT_STRETCH_HIGH: f64 = 98.0;

/// Suffix appended to output files while they are being written
pub const PARTIAL_SUFFIX: &str = "partial";

/// Header fields carrying spatial reference, copied verbatim to outputs
pub const MAP_REFERENCE_KEYS: &[&str] = &["map info", "coordinate system string"];

/// Format the description header for a product.
pub fn description(suffix: &str) -> String {
    format!("{} {} {}", DESCRIPTION_PREFIX, VERSION, suffix)
}
