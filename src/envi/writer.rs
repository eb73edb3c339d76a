//! ENVI output with all-or-nothing semantics.
//!
//! Both halves of the pair are first written under `<name>.partial` and only
//! renamed into place once complete, header first. If the data file then
//! cannot be moved, the previous header is put back, so a failed rewrite
//! leaves an existing pair as it was.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::constants::PARTIAL_SUFFIX;
use crate::data::Metadata;
use crate::envi::header::{RasterLayout, format_header};
use crate::envi::reader::append_extension;
use crate::error::{Error, IoResultExt, Result};

/// Writes an ENVI header and data file pair.
#[derive(Debug, Clone)]
pub struct EnviWriter {
    header_path: PathBuf,
    data_path: PathBuf,
}

impl EnviWriter {
    /// Target `name.hdr` + `name.img` from either path (or a bare stem).
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::with_data_extension(path, "img")
    }

    /// Like [`EnviWriter::new`] with a custom data extension (e.g. `sli`).
    pub fn with_data_extension(path: &Path, ext: &str) -> Self {
        Self {
            header_path: path.with_extension("hdr"),
            data_path: path.with_extension(ext),
        }
    }

    /// Target an explicit header and data file, e.g. to rewrite an existing
    /// pair in place.
    pub fn for_pair(header_path: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            header_path: header_path.into(),
            data_path: data_path.into(),
        }
    }

    /// Header destination.
    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    /// Data destination.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Write `data` (already encoded per `layout`) and its header.
    ///
    /// Layout fields in `metadata` are overwritten from `layout`.
    pub fn write(&self, metadata: &Metadata, layout: &RasterLayout, data: &[u8]) -> Result<()> {
        let expected = layout.data_size() - layout.header_offset;
        if data.len() as u64 != expected {
            return Err(Error::InvalidConfig(format!(
                "encoded raster is {} bytes, layout requires {}",
                data.len(),
                expected
            )));
        }

        let mut header = metadata.clone();
        layout.apply_to(&mut header);

        let data_tmp = append_extension(&self.data_path, PARTIAL_SUFFIX);
        let header_tmp = append_extension(&self.header_path, PARTIAL_SUFFIX);

        let result = write_file(&data_tmp, data)
            .and_then(|()| write_file(&header_tmp, format_header(&header).as_bytes()))
            .and_then(|()| self.commit(&data_tmp, &header_tmp));

        if result.is_err() {
            // Cleanup failures are ignored; the write error is returned.
            let _ = std::fs::remove_file(&data_tmp);
            let _ = std::fs::remove_file(&header_tmp);
        } else {
            log::info!("Wrote {:?}", self.header_path);
        }
        result
    }

    /// Move both partial files into place, restoring the previous header
    /// (or its absence) when the data file cannot follow.
    fn commit(&self, data_tmp: &Path, header_tmp: &Path) -> Result<()> {
        let previous = match std::fs::read(&self.header_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(&self.header_path, e)),
        };

        std::fs::rename(header_tmp, &self.header_path).with_path(&self.header_path)?;
        if let Err(e) = std::fs::rename(data_tmp, &self.data_path) {
            let restored = match previous {
                Some(bytes) => std::fs::write(&self.header_path, bytes),
                None => std::fs::remove_file(&self.header_path),
            };
            if let Err(restore) = restored {
                log::error!("Could not restore {:?}: {}", self.header_path, restore);
            }
            return Err(Error::io(&self.data_path, e));
        }
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path).with_path(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).with_path(path)?;
    writer.flush().with_path(path)?;
    writer
        .into_inner()
        .map_err(|e| Error::io(path, e.into_error()))?
        .sync_all()
        .with_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RasterCube;
    use crate::envi::header::DataType;
    use crate::envi::reader::EnviImage;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let writer = EnviWriter::new(dir.path().join("out.hdr"));
        let layout = RasterLayout::new(2, 2, 1, DataType::U8);
        let mut meta = Metadata::new();
        meta.set("description", "{test}");

        writer.write(&meta, &layout, &[1, 2, 3, 4]).unwrap();

        let image = EnviImage::open(writer.header_path()).unwrap();
        assert_eq!(image.metadata().get("description"), Some("{test}"));
        let tile = image.read_rows(0..2).unwrap();
        assert_eq!(tile.iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_no_partial_files_left() {
        let dir = tempfile::tempdir().unwrap();
        let writer = EnviWriter::new(dir.path().join("out"));
        let layout = RasterLayout::new(1, 1, 1, DataType::U8);
        writer.write(&Metadata::new(), &layout, &[7]).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".partial")));
        assert!(writer.data_path().is_file());
    }

    #[test]
    fn test_size_mismatch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = EnviWriter::new(dir.path().join("out.hdr"));
        let layout = RasterLayout::new(2, 2, 1, DataType::U8);
        assert!(writer.write(&Metadata::new(), &layout, &[1, 2]).is_err());
        assert!(!writer.header_path().exists());
        assert!(!writer.data_path().exists());
    }

    #[test]
    fn test_failed_data_move_restores_header() {
        let dir = tempfile::tempdir().unwrap();
        let header_path = dir.path().join("classes.hdr");
        let data_path = dir.path().join("classes.img");
        std::fs::write(&header_path, "ENVI\nsamples = 1\n").unwrap();
        // A non-empty directory cannot be replaced by a file.
        std::fs::create_dir(&data_path).unwrap();
        std::fs::write(data_path.join("keep"), b"x").unwrap();

        let writer = EnviWriter::for_pair(&header_path, &data_path);
        let layout = RasterLayout::new(1, 1, 1, DataType::U8);
        let err = writer.write(&Metadata::new(), &layout, &[3]).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));

        assert_eq!(
            std::fs::read_to_string(&header_path).unwrap(),
            "ENVI\nsamples = 1\n"
        );
        assert!(data_path.join("keep").is_file());
        assert!(!append_extension(&data_path, PARTIAL_SUFFIX).exists());
        assert!(!append_extension(&header_path, PARTIAL_SUFFIX).exists());
    }

    #[test]
    fn test_failed_first_write_leaves_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let header_path = dir.path().join("fresh.hdr");
        let data_path = dir.path().join("fresh.img");
        std::fs::create_dir(&data_path).unwrap();
        std::fs::write(data_path.join("keep"), b"x").unwrap();

        let writer = EnviWriter::for_pair(&header_path, &data_path);
        let layout = RasterLayout::new(1, 1, 1, DataType::U8);
        assert!(writer.write(&Metadata::new(), &layout, &[3]).is_err());
        assert!(!header_path.exists());
    }

    #[test]
    fn test_unwritable_target_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let writer = EnviWriter::new(dir.path().join("missing_dir").join("out.hdr"));
        let layout = RasterLayout::new(1, 1, 1, DataType::U8);
        let err = writer.write(&Metadata::new(), &layout, &[1]).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!writer.header_path().exists());
    }
}
