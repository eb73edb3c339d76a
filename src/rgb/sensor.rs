//! Supported imaging spectrometers and their visible-light band tables.

use std::fmt;
use std::path::Path;

use crate::data::RasterCube;
use crate::error::{Error, Result};

/// Instrument that produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorFamily {
    /// AVIRIS Next Generation, ~5 nm sampling
    AvirisNg,
    /// AVIRIS Classic, ~10 nm sampling
    AvirisClassic,
}

/// One source band of a true-color composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSpec {
    /// Band index in the source image (0-based)
    pub band: usize,
    /// Band center in nanometers
    pub wavelength: f64,
    /// Full width at half maximum in nanometers
    pub fwhm: f64,
    /// Radiometric correction multiplier
    pub correction: f64,
    /// Bad-band flag, 1 = good
    pub bbl: u8,
    /// Smoothing factor
    pub smoothing: f64,
}

/// Red, green and blue source bands for one sensor family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorTable {
    pub red: BandSpec,
    pub green: BandSpec,
    pub blue: BandSpec,
}

impl SensorTable {
    /// Bands in output order: red, green, blue.
    pub fn bands(&self) -> [&BandSpec; 3] {
        [&self.red, &self.green, &self.blue]
    }

    /// Minimum number of bands a source image needs.
    pub fn required_bands(&self) -> usize {
        self.red.band.max(self.green.band).max(self.blue.band) + 1
    }
}

const AVIRIS_NG: SensorTable = SensorTable {
    red: BandSpec {
        band: 61,
        wavelength: 682.43,
        fwhm: 5.56,
        correction: 1.0,
        bbl: 1,
        smoothing: 1.0,
    },
    green: BandSpec {
        band: 31,
        wavelength: 532.15,
        fwhm: 5.55,
        correction: 1.0,
        bbl: 1,
        smoothing: 1.0,
    },
    blue: BandSpec {
        band: 19,
        wavelength: 472.04,
        fwhm: 5.55,
        correction: 1.0,
        bbl: 1,
        smoothing: 1.0,
    },
};

const AVIRIS_CLASSIC: SensorTable = SensorTable {
    red: BandSpec {
        band: 34,
        wavelength: 679.9,
        fwhm: 10.09,
        correction: 0.9983,
        bbl: 1,
        smoothing: 1.0,
    },
    green: BandSpec {
        band: 17,
        wavelength: 529.0,
        fwhm: 9.96,
        correction: 1.0026,
        bbl: 1,
        smoothing: 1.0,
    },
    blue: BandSpec {
        band: 11,
        wavelength: 471.4,
        fwhm: 9.85,
        correction: 1.0047,
        bbl: 1,
        smoothing: 1.0,
    },
};

/// File name prefixes; `#` stands for a decimal digit.
const NG_NAME_PATTERN: &str = "ang########t######";
const CLASSIC_NAME_PATTERN: &str = "f######t##p##r##";

impl SensorFamily {
    /// Every supported family.
    pub const ALL: [SensorFamily; 2] = [SensorFamily::AvirisNg, SensorFamily::AvirisClassic];

    /// Name written to the `sensor type` header field.
    pub fn name(self) -> &'static str {
        match self {
            SensorFamily::AvirisNg => "AVIRIS-NG",
            SensorFamily::AvirisClassic => "AVIRIS-Classic",
        }
    }

    /// Visible-light band table.
    pub fn table(self) -> &'static SensorTable {
        match self {
            SensorFamily::AvirisNg => &AVIRIS_NG,
            SensorFamily::AvirisClassic => &AVIRIS_CLASSIC,
        }
    }

    /// Parse a `sensor type` header value.
    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "avirisng" | "angaviris" => Some(SensorFamily::AvirisNg),
            "aviris" | "avirisc" | "avirisclassic" => Some(SensorFamily::AvirisClassic),
            _ => None,
        }
    }

    /// Recognize the flight-line naming convention of each family.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())?;
        if has_prefix_pattern(&file_name, NG_NAME_PATTERN) {
            Some(SensorFamily::AvirisNg)
        } else if has_prefix_pattern(&file_name, CLASSIC_NAME_PATTERN) {
            Some(SensorFamily::AvirisClassic)
        } else {
            None
        }
    }

    /// Determine the family of an image: `sensor type` header first, then
    /// the file name.
    pub fn detect(image: &dyn RasterCube) -> Result<Self> {
        if let Some(value) = image.metadata().get_scalar("sensor type") {
            match Self::parse(value) {
                Some(family) => {
                    log::debug!("Sensor {} from header", family);
                    return Ok(family);
                }
                None => log::warn!("Unrecognized sensor type '{}'", value),
            }
        }
        let family = Self::from_file_name(image.source_name()).ok_or_else(|| {
            Error::UnknownSensor {
                source_name: image.source_name().to_string(),
            }
        })?;
        log::debug!("Sensor {} from file name", family);
        Ok(family)
    }
}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn has_prefix_pattern(name: &str, pattern: &str) -> bool {
    name.len() >= pattern.len()
        && name
            .bytes()
            .zip(pattern.bytes())
            .all(|(c, p)| if p == b'#' { c.is_ascii_digit() } else { c == p })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryCube, Metadata, WavelengthAxis};
    use ndarray::Array3;

    fn cube(name: &str, sensor_type: Option<&str>) -> MemoryCube {
        let mut meta = Metadata::new();
        if let Some(value) = sensor_type {
            meta.set("sensor type", value);
        }
        MemoryCube::new(Array3::zeros((1, 1, 1)), WavelengthAxis::default())
            .unwrap()
            .with_metadata(meta)
            .with_name(name)
    }

    #[test]
    fn test_file_name_detection() {
        assert_eq!(
            SensorFamily::from_file_name("ang20150422t163638_corr_v1e_img.hdr"),
            Some(SensorFamily::AvirisNg)
        );
        assert_eq!(
            SensorFamily::from_file_name("/data/f080702t01p00r08rdn_c_sc01_ort_img.hdr"),
            Some(SensorFamily::AvirisClassic)
        );
        assert_eq!(SensorFamily::from_file_name("ang2015_short.hdr"), None);
        assert_eq!(SensorFamily::from_file_name("scene.hdr"), None);
    }

    #[test]
    fn test_header_takes_precedence() {
        let image = cube("ang20150422t163638_img.hdr", Some("AVIRIS-Classic"));
        assert_eq!(
            SensorFamily::detect(&image).unwrap(),
            SensorFamily::AvirisClassic
        );
    }

    #[test]
    fn test_unrecognized_header_falls_back_to_name() {
        let image = cube("f080702t01p00r08rdn.hdr", Some("Hyperion"));
        assert_eq!(
            SensorFamily::detect(&image).unwrap(),
            SensorFamily::AvirisClassic
        );
    }

    #[test]
    fn test_unknown_sensor() {
        let image = cube("scene.hdr", None);
        assert!(matches!(
            SensorFamily::detect(&image),
            Err(Error::UnknownSensor { .. })
        ));
    }

    #[test]
    fn test_tables_are_disjoint_and_ordered() {
        for family in SensorFamily::ALL {
            let table = family.table();
            let [r, g, b] = table.bands();
            assert!(r.wavelength > g.wavelength && g.wavelength > b.wavelength);
            assert!(table.required_bands() > r.band);
            assert_eq!(SensorFamily::parse(family.name()), Some(family));
        }
        assert_ne!(
            SensorFamily::AvirisNg.table().red.band,
            SensorFamily::AvirisClassic.table().red.band
        );
    }
}
