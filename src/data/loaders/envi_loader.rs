//! Loader for ENVI header/data pairs.

use std::io::Read;
use std::path::Path;

use crate::data::RasterCube;
use crate::data::loader::CubeLoader;
use crate::envi::{EnviImage, resolve_pair};
use crate::error::Result;

/// Loader for ENVI rasters.
///
/// Accepts either the `.hdr` or the data file; the other half is located
/// next to it.
pub struct EnviLoader;

impl EnviLoader {
    /// First line of every ENVI header.
    const MAGIC: &'static [u8] = b"ENVI";
}

impl CubeLoader for EnviLoader {
    fn id(&self) -> &'static str {
        "envi"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hdr", "img", "dat", "raw", "bsq", "bil", "bip"]
    }

    fn can_load(&self, path: &Path) -> bool {
        let Ok((header, _)) = resolve_pair(path) else {
            return false;
        };
        let mut head = [0u8; 4];
        std::fs::File::open(header)
            .and_then(|mut f| f.read_exact(&mut head))
            .is_ok_and(|()| head == Self::MAGIC)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RasterCube>> {
        Ok(Box::new(EnviImage::open(path)?))
    }

    fn priority(&self) -> i32 {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_metadata() {
        let loader = EnviLoader;
        assert_eq!(loader.id(), "envi");
        assert!(loader.extensions().contains(&"hdr"));
    }

    #[test]
    fn test_detects_header_magic() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("scene");
        std::fs::write(&data, [0u8; 4]).unwrap();
        std::fs::write(
            dir.path().join("scene.hdr"),
            "ENVI\nsamples = 2\nlines = 1\nbands = 1\ndata type = 1\n",
        )
        .unwrap();

        let loader = EnviLoader;
        assert!(loader.can_load(&data));
        let cube = loader.open(&data).unwrap();
        assert_eq!(cube.shape().cols, 2);
    }

    #[test]
    fn test_rejects_non_envi() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("other.hdr");
        std::fs::write(&header, "NOT ENVI").unwrap();
        std::fs::write(dir.path().join("other.img"), [0u8; 1]).unwrap();
        assert!(!EnviLoader.can_load(&header));
    }
}
