//! ENVI raster support: header text, tiled reading and atomic writing.
//!
//! An ENVI raster is a plain-text header (`name.hdr`) next to a headerless
//! binary file (`name.img`, `name.sli`, ...). Spectral libraries use the same
//! container with one line per spectrum.

pub mod header;
mod reader;
mod writer;

pub use header::{
    ByteOrder, DataType, Interleave, RasterLayout, format_header, parse_header, read_header,
};
pub use reader::{EnviImage, resolve_pair};
pub(crate) use reader::read_samples;
pub use writer::EnviWriter;
