//! Loader for NumPy `.npy` cubes.
//!
//! Supports hyperspectral cubes exported from Python tooling. Wavelengths can
//! be supplied in a sidecar JSON file next to the array.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, Ix3};
use ndarray_npy::ReadNpyExt;

use crate::data::loader::CubeLoader;
use crate::data::{MemoryCube, RasterCube, WavelengthAxis};
use crate::error::{Error, IoResultExt, Result};

/// Loader for NumPy `.npy` files.
///
/// **Expected array shapes**:
/// - 3D `(rows, cols, bands)`: channels-last cube
/// - 2D `(rows, cols)`: single band
///
/// Supported data types: `f32`, `f64`, `u16`, `i16`. Values are kept as-is
/// (reflectance is not rescaled).
///
/// Band centers are read from `<stem>.wavelengths.json`, a JSON array of
/// nanometer values, when that file exists.
pub struct NpyLoader;

impl NpyLoader {
    /// NumPy magic bytes: \x93NUMPY
    const MAGIC: &'static [u8] = &[0x93, b'N', b'U', b'M', b'P', b'Y'];

    /// Sidecar holding the wavelength axis.
    pub fn sidecar_path(path: &Path) -> PathBuf {
        path.with_extension("wavelengths.json")
    }

    fn read_wavelengths(path: &Path) -> Result<WavelengthAxis> {
        let sidecar = Self::sidecar_path(path);
        if !sidecar.is_file() {
            log::debug!("NpyLoader: no wavelength sidecar at {:?}", sidecar);
            return Ok(WavelengthAxis::default());
        }
        let text = std::fs::read_to_string(&sidecar).with_path(&sidecar)?;
        let centers: Vec<f64> = serde_json::from_str(&text)?;
        Ok(WavelengthAxis::new(centers))
    }

    /// Convert an array of any supported dtype into a cube.
    fn array_to_cube<T>(array: ArrayD<T>, wavelengths: WavelengthAxis) -> Result<MemoryCube>
    where
        T: NumericConvert + Copy,
    {
        let shape = array.shape().to_vec();
        log::debug!("NpyLoader: array shape = {:?}", shape);

        let array = array.mapv(|v| v.to_sample());
        let cube = match shape.len() {
            2 => array.into_shape_with_order((shape[0], shape[1], 1))?,
            3 => array.into_dimensionality::<Ix3>()?,
            n => {
                return Err(Error::InvalidConfig(format!(
                    "unsupported array dimensions: {} (expected 2 or 3)",
                    n
                )));
            }
        };

        let (rows, cols, bands) = cube.dim();
        log::info!(
            "NpyLoader: loaded {}x{} with {} bands",
            rows,
            cols,
            bands
        );
        MemoryCube::new(cube, wavelengths)
    }

    fn load_bytes(data: &[u8], wavelengths: WavelengthAxis) -> Result<MemoryCube> {
        let mut cursor = Cursor::new(data);

        // f32 is most common for reflectance products
        if let Ok(array) = ArrayD::<f32>::read_npy(&mut cursor) {
            return Self::array_to_cube(array, wavelengths);
        }

        cursor.set_position(0);
        if let Ok(array) = ArrayD::<f64>::read_npy(&mut cursor) {
            return Self::array_to_cube(array, wavelengths);
        }

        // Scaled integer reflectance (e.g. x10000)
        cursor.set_position(0);
        if let Ok(array) = ArrayD::<i16>::read_npy(&mut cursor) {
            return Self::array_to_cube(array, wavelengths);
        }

        cursor.set_position(0);
        let array = ArrayD::<u16>::read_npy(&mut cursor)?;
        Self::array_to_cube(array, wavelengths)
    }
}

impl CubeLoader for NpyLoader {
    fn id(&self) -> &'static str {
        "npy"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["npy"]
    }

    fn can_load(&self, path: &Path) -> bool {
        let mut head = [0u8; 6];
        std::fs::File::open(path)
            .and_then(|mut f| f.read_exact(&mut head))
            .is_ok_and(|()| head == Self::MAGIC)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn RasterCube>> {
        let data = std::fs::read(path).with_path(path)?;
        let wavelengths = Self::read_wavelengths(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cube = Self::load_bytes(&data, wavelengths)?.with_name(name);
        Ok(Box::new(cube))
    }

    fn priority(&self) -> i32 {
        10
    }
}

/// Conversion of stored samples to the `f32` working type.
trait NumericConvert {
    fn to_sample(self) -> f32;
}

impl NumericConvert for f32 {
    fn to_sample(self) -> f32 {
        self
    }
}

impl NumericConvert for f64 {
    fn to_sample(self) -> f32 {
        self as f32
    }
}

impl NumericConvert for u16 {
    fn to_sample(self) -> f32 {
        f32::from(self)
    }
}

impl NumericConvert for i16 {
    fn to_sample(self) -> f32 {
        f32::from(self)
    }
}
