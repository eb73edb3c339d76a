//! Visible-light previews from hyperspectral scenes.
//!
//! The sensor family is detected once per image; its table fixes which
//! source bands become red, green and blue and which band metadata is
//! written alongside them.

mod compose;
mod preview;
mod sensor;

pub use compose::{RgbRaster, to_rgb, to_rgb_file};
pub use preview::PreviewStretch;
pub use sensor::{BandSpec, SensorFamily, SensorTable};
