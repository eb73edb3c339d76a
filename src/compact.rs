//! Removal of unused classes from a classified raster.
//!
//! Compaction keeps only the classes some pixel uses, in their original
//! order, and renumbers pixel ids to be contiguous. "No data" is treated like
//! any other class: it stays only if at least one pixel is nodata.

use std::path::Path;

use crate::classified::ClassifiedRaster;
use crate::envi::{EnviImage, EnviWriter};
use crate::error::Result;

/// What a compaction pass changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSummary {
    /// Catalog length before compaction
    pub classes_before: usize,
    /// Catalog length after compaction
    pub classes_after: usize,
    /// Names of the classes that were dropped
    pub removed: Vec<String>,
}

/// Compact `raster` in place.
///
/// Running it twice changes nothing the second time.
pub fn filter_classes(raster: &mut ClassifiedRaster) -> Result<FilterSummary> {
    let catalog = raster.catalog();
    let kept = raster.distinct_ids();

    let mut remap = vec![0u16; catalog.len()];
    for (new_id, &old_id) in kept.iter().enumerate() {
        // new_id < kept.len() <= catalog.len(), which fits u16 ids
        remap[usize::from(old_id)] = new_id as u16;
    }
    let removed: Vec<String> = catalog
        .entries()
        .iter()
        .enumerate()
        .filter(|(id, _)| !kept.iter().any(|&k| usize::from(k) == *id))
        .map(|(_, entry)| entry.name.clone())
        .collect();

    let summary = FilterSummary {
        classes_before: catalog.len(),
        classes_after: kept.len(),
        removed,
    };

    if summary.removed.is_empty() {
        log::debug!("All {} classes in use, nothing to compact", summary.classes_before);
        return Ok(summary);
    }

    let new_catalog = catalog.select(&kept);
    let ids = raster.ids().mapv(|id| remap[usize::from(id)]);
    raster.replace(ids, new_catalog)?;

    log::info!(
        "Compacted classes {} -> {}",
        summary.classes_before,
        summary.classes_after
    );
    Ok(summary)
}

/// Compact an ENVI classification file in place.
///
/// The pair is rewritten through [`EnviWriter`], so a failed write leaves the
/// original header and data in place.
pub fn filter_classes_file(path: &Path) -> Result<FilterSummary> {
    let image = EnviImage::open(path)?;
    let mut raster = ClassifiedRaster::from_envi(&image)?;
    let summary = filter_classes(&mut raster)?;
    if summary.classes_after != summary.classes_before {
        raster.write_with(&EnviWriter::for_pair(image.header_path(), image.data_path()))?;
    }
    Ok(summary)
}
