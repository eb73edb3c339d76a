//! Classified rasters: a class id per pixel plus the catalog naming the ids.

use std::path::Path;

use ndarray::{Array2, Axis};

use crate::classify::ClassCatalog;
use crate::data::{Metadata, RasterCube};
use crate::envi::{DataType, EnviImage, EnviWriter, RasterLayout};
use crate::error::{Error, Result};

/// Class id raster with its catalog and header fields.
///
/// Every pixel id indexes into the catalog, and the `classes`,
/// `class names` and `class lookup` fields always mirror the catalog.
#[derive(Debug, Clone)]
pub struct ClassifiedRaster {
    ids: Array2<u16>,
    catalog: ClassCatalog,
    metadata: Metadata,
}

impl ClassifiedRaster {
    /// Pair ids with a catalog, checking every id.
    pub fn new(ids: Array2<u16>, catalog: ClassCatalog, mut metadata: Metadata) -> Result<Self> {
        validate_ids(&ids, &catalog)?;
        catalog.apply_to(&mut metadata);
        Ok(Self {
            ids,
            catalog,
            metadata,
        })
    }

    /// Load a classification written by [`ClassifiedRaster::write_envi`] or
    /// any single-band ENVI classification file.
    pub fn read_envi(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_envi(&EnviImage::open(path)?)
    }

    /// Build from an opened ENVI image.
    pub fn from_envi(image: &EnviImage) -> Result<Self> {
        let shape = image.shape();
        if shape.bands != 1 {
            return Err(Error::invalid_header(
                image.header_path(),
                format!("classification must have one band, found {}", shape.bands),
            ));
        }
        let catalog = ClassCatalog::from_metadata(image.metadata(), image.header_path())?;

        let values = image.read_rows(0..shape.rows)?;
        let mut ids = Array2::<u16>::zeros((shape.rows, shape.cols));
        for (id, &value) in ids.iter_mut().zip(values.index_axis(Axis(2), 0)) {
            *id = to_class_id(value).ok_or_else(|| {
                Error::invalid_header(
                    image.header_path(),
                    format!("pixel value {} is not a class id", value),
                )
            })?;
        }

        log::debug!(
            "Read {}x{} classification with {} classes",
            shape.rows,
            shape.cols,
            catalog.len()
        );
        Self::new(ids, catalog, image.metadata().clone())
    }

    /// Write `<stem>.hdr` + `<stem>.img`.
    pub fn write_envi(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_with(&EnviWriter::new(path))
    }

    /// Write through an explicit writer.
    pub fn write_with(&self, writer: &EnviWriter) -> Result<()> {
        let (rows, cols) = self.ids.dim();
        let data_type = if self.catalog.len() <= 256 {
            DataType::U8
        } else {
            DataType::U16
        };
        let layout = RasterLayout::new(cols, rows, 1, data_type);

        let mut data = Vec::with_capacity(rows * cols * data_type.size());
        for &id in &self.ids {
            data_type.encode_le(f64::from(id), &mut data);
        }
        writer.write(&self.metadata, &layout, &data)
    }

    /// Class id per pixel, `(rows, cols)`.
    pub fn ids(&self) -> &Array2<u16> {
        &self.ids
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn rows(&self) -> usize {
        self.ids.nrows()
    }

    pub fn cols(&self) -> usize {
        self.ids.ncols()
    }

    /// Class name of one pixel.
    pub fn class_name_at(&self, row: usize, col: usize) -> Option<&str> {
        let id = *self.ids.get((row, col))?;
        self.catalog.name(id)
    }

    /// Pixel count per catalog id.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.catalog.len()];
        for &id in &self.ids {
            counts[usize::from(id)] += 1;
        }
        counts
    }

    /// Ids used by at least one pixel, ascending.
    pub fn distinct_ids(&self) -> Vec<u16> {
        self.class_counts()
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id as u16)
            .collect()
    }

    /// Replace ids and catalog together, resyncing the class fields.
    pub(crate) fn replace(&mut self, ids: Array2<u16>, catalog: ClassCatalog) -> Result<()> {
        validate_ids(&ids, &catalog)?;
        catalog.apply_to(&mut self.metadata);
        self.ids = ids;
        self.catalog = catalog;
        Ok(())
    }
}

fn validate_ids(ids: &Array2<u16>, catalog: &ClassCatalog) -> Result<()> {
    match ids.iter().find(|&&id| usize::from(id) >= catalog.len()) {
        Some(&id) => Err(Error::InvalidClassId {
            id,
            classes: catalog.len(),
        }),
        None => Ok(()),
    }
}

fn to_class_id(value: f32) -> Option<u16> {
    let in_range = (0.0..=f32::from(u16::MAX)).contains(&value) && value.fract() == 0.0;
    in_range.then_some(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FILE_TYPE_CLASSIFICATION, NO_DATA_CLASS_NAME};
    use ndarray::array;

    fn raster() -> ClassifiedRaster {
        let catalog = ClassCatalog::from_names([NO_DATA_CLASS_NAME, "A", "B"]).unwrap();
        let mut meta = Metadata::new();
        meta.set("file type", FILE_TYPE_CLASSIFICATION);
        meta.set("map info", "{UTM, 1, 1, 10, 20, 1, 1, 13, North, WGS-84}");
        ClassifiedRaster::new(array![[0, 1, 1], [2, 2, 0]], catalog, meta).unwrap()
    }

    #[test]
    fn test_out_of_range_id() {
        let catalog = ClassCatalog::from_names([NO_DATA_CLASS_NAME, "A"]).unwrap();
        let result = ClassifiedRaster::new(array![[0, 2]], catalog, Metadata::new());
        assert!(matches!(
            result,
            Err(Error::InvalidClassId { id: 2, classes: 2 })
        ));
    }

    #[test]
    fn test_counts_and_names() {
        let raster = raster();
        assert_eq!(raster.class_counts(), vec![2, 2, 2]);
        assert_eq!(raster.distinct_ids(), vec![0, 1, 2]);
        assert_eq!(raster.class_name_at(1, 0), Some("B"));
        assert_eq!(raster.class_name_at(5, 5), None);
        assert_eq!(raster.metadata().get("classes"), Some("3"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.hdr");
        let raster = raster();
        raster.write_envi(&path).unwrap();

        let loaded = ClassifiedRaster::read_envi(&path).unwrap();
        assert_eq!(loaded.ids(), raster.ids());
        assert_eq!(loaded.catalog(), raster.catalog());
        assert_eq!(loaded.metadata().get("map info"), raster.metadata().get("map info"));
        assert_eq!(loaded.metadata().get("data type"), Some("1"));
    }

    #[test]
    fn test_wide_catalog_uses_u16() {
        let names: Vec<String> = std::iter::once(NO_DATA_CLASS_NAME.to_string())
            .chain((1..300).map(|i| format!("Class{}", i)))
            .collect();
        let catalog = ClassCatalog::from_names(names).unwrap();
        let raster = ClassifiedRaster::new(array![[0, 299]], catalog, Metadata::new()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide");
        raster.write_envi(&path).unwrap();
        let loaded = ClassifiedRaster::read_envi(dir.path().join("wide.hdr")).unwrap();
        assert_eq!(loaded.metadata().get("data type"), Some("12"));
        assert_eq!(loaded.class_name_at(0, 1), Some("Class299"));
    }

    #[test]
    fn test_non_integer_pixel_rejected() {
        assert_eq!(to_class_id(3.0), Some(3));
        assert_eq!(to_class_id(2.5), None);
        assert_eq!(to_class_id(-1.0), None);
        assert_eq!(to_class_id(f32::NAN), None);
    }
}
