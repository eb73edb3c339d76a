//! Spectral libraries stored as CSV tables.
//!
//! The first column holds wavelengths, every further column one spectrum:
//!
//! ```text
//! wavelength,Alunite,Kaolinite
//! 450,0.21,0.34
//! 550,0.25,0.39
//! ```
//!
//! A first column header containing `um` or `micro` marks micrometer values.

use std::fs::File;
use std::path::Path;

use crate::data::WavelengthAxis;
use crate::error::{Error, IoResultExt, Result};
use crate::library::{ReferenceSpectrum, SpectralLibrary};

/// Read a CSV spectral table.
pub fn read_csv_library(path: &Path) -> Result<SpectralLibrary> {
    let file = File::open(path).with_path(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let Some(axis_header) = headers.get(0) else {
        return Err(Error::invalid_library("CSV library has no header row"));
    };
    let units = axis_units(axis_header);
    let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut wavelengths = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let mut fields = record.iter().map(|field| {
            field.parse::<f64>().map_err(|_| {
                Error::invalid_library(format!("row {}: '{}' is not a number", row + 2, field))
            })
        });
        if let Some(wavelength) = fields.next() {
            wavelengths.push(wavelength?);
        }
        for (column, value) in columns.iter_mut().zip(fields) {
            column.push(value?);
        }
    }

    let entries = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| ReferenceSpectrum::new(name, values))
        .collect();

    SpectralLibrary::new(WavelengthAxis::from_units(wavelengths, units), entries)
}

fn axis_units(header: &str) -> Option<&'static str> {
    let lower = header.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens
        .iter()
        .any(|t| t.starts_with("micro") || *t == "um" || *t == "µm")
    {
        Some("micrometers")
    } else if tokens.iter().any(|t| t.starts_with("nano") || *t == "nm") {
        Some("nanometers")
    } else {
        None
    }
}
