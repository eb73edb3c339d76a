//! ENVI spectral library (`.sli`) reading and writing.
//!
//! A spectral library is an ENVI raster with one band where each line is a
//! spectrum and each sample a wavelength. Class names live in the
//! `spectra names` header field.

use std::fs::File;
use std::path::Path;

use crate::constants::{FILE_TYPE_SPECTRAL_LIBRARY, description};
use crate::data::{Metadata, WavelengthAxis};
use crate::envi::{DataType, EnviWriter, RasterLayout, read_header, read_samples, resolve_pair};
use crate::error::{Error, IoResultExt, Result};
use crate::library::{ReferenceSpectrum, SpectralLibrary};

/// Read an ENVI spectral library from its header or `.sli` file.
pub fn read_sli(path: &Path) -> Result<SpectralLibrary> {
    let (header_path, data_path) = resolve_pair(path)?;
    let metadata = read_header(&header_path)?;
    let layout = RasterLayout::from_metadata(&metadata, &header_path)?;

    match metadata.get_scalar("file type") {
        Some(kind) if kind.eq_ignore_ascii_case(FILE_TYPE_SPECTRAL_LIBRARY) => {}
        other => log::warn!(
            "{:?} has file type {:?}, reading it as a spectral library",
            header_path,
            other
        ),
    }
    if layout.bands != 1 {
        return Err(Error::invalid_library(format!(
            "{:?} has {} bands, a spectral library has exactly one",
            header_path, layout.bands
        )));
    }

    let names = metadata
        .get_list("spectra names")
        .ok_or_else(|| Error::invalid_library("missing 'spectra names'"))?;
    if names.len() != layout.lines {
        return Err(Error::invalid_library(format!(
            "{} spectra names for {} spectra",
            names.len(),
            layout.lines
        )));
    }

    let wavelengths = WavelengthAxis::from_metadata(&metadata)
        .ok_or_else(|| Error::invalid_library("missing or non-numeric 'wavelength' list"))?;

    let mut file = File::open(&data_path).with_path(&data_path)?;
    let samples = read_samples(&mut file, &data_path, &layout, 0, layout.sample_count())?;

    let entries = names
        .into_iter()
        .zip(samples.chunks_exact(layout.samples))
        .map(|(name, values)| ReferenceSpectrum::new(name, values.to_vec()))
        .collect();

    SpectralLibrary::new(wavelengths, entries)
}

/// Write a library as `<stem>.sli` + `<stem>.hdr` (float32, nanometers).
pub fn write_sli(path: &Path, library: &SpectralLibrary) -> Result<()> {
    let points = library.wavelengths().len();
    let layout = RasterLayout::new(points, library.len(), 1, DataType::F32);

    let mut metadata = Metadata::new();
    metadata.set("description", format!("{{{}}}", description("spectral library.")));
    metadata.set("file type", FILE_TYPE_SPECTRAL_LIBRARY);
    metadata.set("wavelength units", "Nanometers");
    metadata.set_list("spectra names", library.names());
    metadata.set_list("wavelength", library.wavelengths().as_slice());

    let mut data = Vec::with_capacity(layout.sample_count() * DataType::F32.size());
    for entry in library.entries() {
        for &value in entry.values() {
            DataType::F32.encode_le(value, &mut data);
        }
    }

    EnviWriter::with_data_extension(path, "sli").write(&metadata, &layout, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_library() -> SpectralLibrary {
        SpectralLibrary::new(
            WavelengthAxis::new(vec![450.0, 550.0, 650.0, 750.0]),
            vec![
                ReferenceSpectrum::new("Alunite", vec![0.25, 0.5, 0.75, 1.0]),
                ReferenceSpectrum::new("Calcite", vec![1.0, 0.75, 0.5, 0.25]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minerals.sli");
        let library = sample_library();
        write_sli(&path, &library).unwrap();

        let loaded = read_sli(&path).unwrap();
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["Alunite", "Calcite"]);
        assert_eq!(loaded.wavelengths(), library.wavelengths());
        assert_eq!(
            loaded.entries()[1].values().to_vec(),
            vec![1.0, 0.75, 0.5, 0.25]
        );

        // Opening via the header works as well.
        let via_header = SpectralLibrary::open(dir.path().join("minerals.hdr")).unwrap();
        assert_eq!(via_header.len(), 2);
    }

    #[test]
    fn test_micrometer_library() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = Vec::new();
        for v in [0.1, 0.2, 0.3] {
            DataType::F32.encode_le(v, &mut data);
        }
        std::fs::write(dir.path().join("lib.sli"), data).unwrap();
        std::fs::write(
            dir.path().join("lib.hdr"),
            "ENVI\nsamples = 3\nlines = 1\nbands = 1\ndata type = 4\n\
             file type = ENVI Spectral Library\nwavelength units = Micrometers\n\
             wavelength = {0.5, 1.0, 1.5}\nspectra names = {Gypsum}\n",
        )
        .unwrap();

        let library = read_sli(&dir.path().join("lib.sli")).unwrap();
        assert_eq!(library.wavelengths().as_slice(), &[500.0, 1000.0, 1500.0]);
    }

    #[test]
    fn test_name_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.sli"), [0u8; 6]).unwrap();
        std::fs::write(
            dir.path().join("lib.hdr"),
            "ENVI\nsamples = 3\nlines = 1\nbands = 1\ndata type = 2\n\
             wavelength = {500, 600, 700}\nspectra names = {A, B}\n",
        )
        .unwrap();
        let result = read_sli(&dir.path().join("lib.hdr"));
        assert!(matches!(result, Err(Error::InvalidLibrary { .. })));
    }
}
