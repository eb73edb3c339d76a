//! Trait-based raster cube loading.
//!
//! New input formats are added by implementing [`CubeLoader`] and
//! registering the loader in [`LoaderRegistry::new`].
//!
//! ## Supported Formats
//!
//! - **ENVI**: `.hdr` header plus raw BSQ/BIL/BIP data file
//! - **NumPy Arrays**: `.npy` files with a `(rows, cols, bands)` array
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hvclass::data::LoaderRegistry;
//!
//! let registry = LoaderRegistry::new();
//! let cube = registry.open(Path::new("scene.hdr"))?;
//! ```

use std::path::Path;

use crate::data::RasterCube;
use crate::error::{Error, Result};

/// Trait for raster cube format loaders.
pub trait CubeLoader: Send + Sync {
    /// Unique identifier for this loader (e.g., "envi", "npy").
    fn id(&self) -> &'static str;

    /// File extensions this loader handles (lowercase, without dots).
    fn extensions(&self) -> &'static [&'static str];

    /// Check whether this loader can handle the file, by content.
    ///
    /// Used when the extension is unknown or ambiguous.
    fn can_load(&self, path: &Path) -> bool;

    /// Open the file as a raster cube.
    fn open(&self, path: &Path) -> Result<Box<dyn RasterCube>>;

    /// Priority for format detection (higher = checked first).
    fn priority(&self) -> i32 {
        0
    }
}

/// Registry of available cube loaders.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn CubeLoader>>,
}

impl LoaderRegistry {
    /// Create a new registry with all built-in loaders.
    pub fn new() -> Self {
        let mut registry = Self {
            loaders: Vec::new(),
        };

        registry.register(Box::new(super::loaders::EnviLoader));
        registry.register(Box::new(super::loaders::NpyLoader));

        registry
    }

    /// Register a new loader.
    pub fn register(&mut self, loader: Box<dyn CubeLoader>) {
        self.loaders.push(loader);
        self.loaders.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// All supported file extensions.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = self
            .loaders
            .iter()
            .flat_map(|l| l.extensions().iter().copied())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    fn loaders_for_extension(&self, ext: &str) -> Vec<&dyn CubeLoader> {
        let ext_lower = ext.to_lowercase();
        self.loaders
            .iter()
            .filter(|l| l.extensions().iter().any(|e| *e == ext_lower))
            .map(|l| l.as_ref())
            .collect()
    }

    /// Open a cube, choosing the loader by extension, then by content.
    ///
    /// When a loader claims the extension but fails, its error is returned
    /// unless another loader succeeds.
    pub fn open(&self, path: &Path) -> Result<Box<dyn RasterCube>> {
        let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
        let mut first_error = None;

        if let Some(ext) = &extension {
            for loader in self.loaders_for_extension(ext) {
                match loader.open(path) {
                    Ok(cube) => {
                        log::debug!("Opened {:?} with {} loader (by extension)", path, loader.id());
                        return Ok(cube);
                    }
                    Err(e) => {
                        log::trace!("Loader {} failed: {}", loader.id(), e);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        for loader in &self.loaders {
            if !loader.can_load(path) {
                continue;
            }
            match loader.open(path) {
                Ok(cube) => {
                    log::debug!("Opened {:?} with {} loader (by detection)", path, loader.id());
                    return Ok(cube);
                }
                Err(e) => {
                    log::trace!("Detected loader {} failed: {}", loader.id(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
            supported: self.supported_extensions().join(", "),
        }))
    }

}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        let extensions = LoaderRegistry::new().supported_extensions();
        assert!(extensions.contains(&"hdr"));
        assert!(extensions.contains(&"img"));
        assert!(extensions.contains(&"npy"));
    }

    #[test]
    fn test_unknown_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let result = LoaderRegistry::new().open(&path);
        match result {
            Err(Error::UnsupportedFormat { supported, .. }) => {
                assert!(supported.contains("hdr"));
                assert!(supported.contains("npy"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("notes.pdf opened as a cube"),
        }
    }
}
