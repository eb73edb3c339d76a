//! File-backed ENVI raster access.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::data::{CubeShape, Metadata, RasterCube, WavelengthAxis};
use crate::envi::header::{Interleave, RasterLayout, read_header};
use crate::error::{Error, IoResultExt, Result};

/// Data file extensions tried, in order, next to a header.
const DATA_EXTENSIONS: &[&str] = &["img", "dat", "raw", "bsq", "bil", "bip", "sli"];

/// Find the header and data file of an ENVI pair from either half.
///
/// Accepts `name.hdr`, `name.img.hdr`, `name.img` or an extensionless data
/// file. The data file must exist; the header must exist.
pub fn resolve_pair(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let is_header = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("hdr"));

    if is_header {
        // name.img.hdr -> name.img
        let stripped = path.with_extension("");
        if stripped.extension().is_some() && stripped.is_file() {
            return Ok((path.to_path_buf(), stripped));
        }
        for ext in DATA_EXTENSIONS {
            let candidate = path.with_extension(ext);
            if candidate.is_file() {
                return Ok((path.to_path_buf(), candidate));
            }
        }
        if stripped.is_file() {
            return Ok((path.to_path_buf(), stripped));
        }
        return Err(Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no data file next to header"),
        ));
    }

    let candidates = [path.with_extension("hdr"), append_extension(path, "hdr")];
    for header in candidates {
        if header.is_file() {
            return Ok((header, path.to_path_buf()));
        }
    }
    Err(Error::io(
        path,
        std::io::Error::new(std::io::ErrorKind::NotFound, "no ENVI header next to data file"),
    ))
}

/// `name.img` -> `name.img.<ext>`
pub(crate) fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Read `count` consecutive samples starting at sample index `first`.
pub(crate) fn read_samples(
    file: &mut File,
    path: &Path,
    layout: &RasterLayout,
    first: usize,
    count: usize,
) -> Result<Vec<f64>> {
    let size = layout.data_type.size();
    let offset = layout.header_offset + (first * size) as u64;
    file.seek(SeekFrom::Start(offset)).with_path(path)?;
    let mut bytes = vec![0u8; count * size];
    file.read_exact(&mut bytes).with_path(path)?;
    Ok(bytes
        .chunks_exact(size)
        .map(|chunk| layout.data_type.decode(chunk, layout.byte_order))
        .collect())
}

/// An ENVI image opened for tiled reading.
///
/// Only the header is parsed on open; pixel data is read on demand, one row
/// tile at a time, so cubes larger than memory can be processed.
#[derive(Debug, Clone)]
pub struct EnviImage {
    header_path: PathBuf,
    data_path: PathBuf,
    layout: RasterLayout,
    metadata: Metadata,
    wavelengths: WavelengthAxis,
    name: String,
}

impl EnviImage {
    /// Open an image from its header or data file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (header_path, data_path) = resolve_pair(path.as_ref())?;
        let metadata = read_header(&header_path)?;
        let layout = RasterLayout::from_metadata(&metadata, &header_path)?;

        let actual = std::fs::metadata(&data_path).with_path(&data_path)?.len();
        if actual < layout.data_size() {
            return Err(Error::invalid_header(
                &header_path,
                format!(
                    "data file holds {} bytes but the header describes {}",
                    actual,
                    layout.data_size()
                ),
            ));
        }

        let wavelengths = match WavelengthAxis::from_metadata(&metadata) {
            Some(axis) if axis.len() == layout.bands => axis,
            Some(axis) => {
                log::warn!(
                    "{:?}: {} wavelengths for {} bands, ignoring wavelength list",
                    header_path,
                    axis.len(),
                    layout.bands
                );
                WavelengthAxis::default()
            }
            None => WavelengthAxis::default(),
        };

        let name = header_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::debug!(
            "Opened {:?}: {}x{}x{} {:?} {:?}",
            header_path,
            layout.lines,
            layout.samples,
            layout.bands,
            layout.data_type,
            layout.interleave
        );

        Ok(Self {
            header_path,
            data_path,
            layout,
            metadata,
            wavelengths,
            name,
        })
    }

    /// Binary layout from the header.
    pub fn layout(&self) -> &RasterLayout {
        &self.layout
    }

    /// Path of the header file.
    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    /// Path of the binary data file.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}

impl RasterCube for EnviImage {
    fn shape(&self) -> CubeShape {
        CubeShape::new(self.layout.lines, self.layout.samples, self.layout.bands)
    }

    fn wavelengths(&self) -> &WavelengthAxis {
        &self.wavelengths
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn read_rows(&self, rows: Range<usize>) -> Result<Array3<f32>> {
        let RasterLayout {
            samples: cols,
            lines,
            bands,
            ..
        } = self.layout;
        if rows.start > rows.end || rows.end > lines {
            return Err(Error::InvalidConfig(format!(
                "row range {:?} outside raster of {} rows",
                rows, lines
            )));
        }

        let n = rows.len();
        let path = self.data_path.as_path();
        let mut file = File::open(path).with_path(path)?;
        let mut out = Array3::<f32>::zeros((n, cols, bands));

        match self.layout.interleave {
            Interleave::Bip => {
                let values =
                    read_samples(&mut file, path, &self.layout, rows.start * cols * bands, n * cols * bands)?;
                for (slot, v) in out.iter_mut().zip(values) {
                    *slot = v as f32;
                }
            }
            Interleave::Bil => {
                let values =
                    read_samples(&mut file, path, &self.layout, rows.start * bands * cols, n * bands * cols)?;
                for (i, v) in values.into_iter().enumerate() {
                    let r = i / (bands * cols);
                    let b = (i / cols) % bands;
                    let c = i % cols;
                    out[[r, c, b]] = v as f32;
                }
            }
            Interleave::Bsq => {
                for b in 0..bands {
                    let first = b * lines * cols + rows.start * cols;
                    let values = read_samples(&mut file, path, &self.layout, first, n * cols)?;
                    for (i, v) in values.into_iter().enumerate() {
                        out[[i / cols, i % cols, b]] = v as f32;
                    }
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envi::header::{ByteOrder, DataType, format_header};

    /// Value stored at (row, col, band) in every fixture.
    fn value(r: usize, c: usize, b: usize) -> f64 {
        (r * 100 + c * 10 + b) as f64
    }

    fn write_fixture(dir: &Path, interleave: Interleave, order: ByteOrder) -> PathBuf {
        let (rows, cols, bands) = (3, 4, 2);
        let mut bytes = Vec::new();
        let mut push = |v: f64| {
            let v = v as i16;
            match order {
                ByteOrder::Little => bytes.extend_from_slice(&v.to_le_bytes()),
                ByteOrder::Big => bytes.extend_from_slice(&v.to_be_bytes()),
            }
        };
        match interleave {
            Interleave::Bsq => {
                for b in 0..bands {
                    for r in 0..rows {
                        for c in 0..cols {
                            push(value(r, c, b));
                        }
                    }
                }
            }
            Interleave::Bil => {
                for r in 0..rows {
                    for b in 0..bands {
                        for c in 0..cols {
                            push(value(r, c, b));
                        }
                    }
                }
            }
            Interleave::Bip => {
                for r in 0..rows {
                    for c in 0..cols {
                        for b in 0..bands {
                            push(value(r, c, b));
                        }
                    }
                }
            }
        }

        let mut meta = Metadata::new();
        let mut layout = RasterLayout::new(cols, rows, bands, DataType::I16);
        layout.interleave = interleave;
        layout.byte_order = order;
        layout.apply_to(&mut meta);
        meta.set("wavelength", "{500.0, 600.0}");

        let header = dir.join(format!("cube_{}.hdr", interleave.as_str()));
        std::fs::write(&header, format_header(&meta)).unwrap();
        std::fs::write(header.with_extension("img"), bytes).unwrap();
        header
    }

    #[test]
    fn test_all_interleaves_agree() {
        let dir = tempfile::tempdir().unwrap();
        for interleave in [Interleave::Bsq, Interleave::Bil, Interleave::Bip] {
            let header = write_fixture(dir.path(), interleave, ByteOrder::Little);
            let image = EnviImage::open(&header).unwrap();
            assert_eq!(image.shape(), CubeShape::new(3, 4, 2));
            let tile = image.read_rows(1..3).unwrap();
            for r in 0..2 {
                for c in 0..4 {
                    for b in 0..2 {
                        assert_eq!(
                            f64::from(tile[[r, c, b]]),
                            value(r + 1, c, b),
                            "{:?} at ({}, {}, {})",
                            interleave,
                            r,
                            c,
                            b
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_big_endian() {
        let dir = tempfile::tempdir().unwrap();
        let header = write_fixture(dir.path(), Interleave::Bip, ByteOrder::Big);
        let image = EnviImage::open(&header).unwrap();
        assert_eq!(image.spectrum(2, 3).unwrap().to_vec(), vec![230.0, 231.0]);
    }

    #[test]
    fn test_open_from_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let header = write_fixture(dir.path(), Interleave::Bsq, ByteOrder::Little);
        let image = EnviImage::open(header.with_extension("img")).unwrap();
        assert_eq!(image.header_path(), header.as_path());
        assert_eq!(image.wavelengths().as_slice(), &[500.0, 600.0]);
    }

    #[test]
    fn test_truncated_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let header = write_fixture(dir.path(), Interleave::Bsq, ByteOrder::Little);
        std::fs::write(header.with_extension("img"), [0u8; 4]).unwrap();
        assert!(matches!(
            EnviImage::open(&header),
            Err(Error::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EnviImage::open("/nonexistent/cube.hdr").unwrap_err();
        match err {
            Error::Io { path, .. } => assert!(path.ends_with("cube.hdr")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
