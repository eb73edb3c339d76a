//! Per-pixel mineral classification.

use std::collections::BTreeSet;
use std::path::Path;

use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::classified::ClassifiedRaster;
use crate::classify::angle::{AngleMatcher, is_nodata};
use crate::classify::catalog::ClassCatalog;
use crate::constants::{
    CLASSIFIED_DESCRIPTION_SUFFIX, FILE_TYPE_CLASSIFICATION, MAP_REFERENCE_KEYS, description,
};
use crate::context::RunContext;
use crate::data::{LoaderRegistry, Metadata, RasterCube};
use crate::error::{Error, Result};
use crate::library::SpectralLibrary;

/// Options for one classification run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationConfig {
    /// Minimum similarity in `[0, 1]`; weaker matches become "No data".
    pub threshold: Option<f64>,
    /// Restrict candidates to these library entries.
    pub class_names: Option<BTreeSet<String>>,
    /// Interpolate the library onto the image axis when they differ.
    pub resample_library: bool,
}

impl ClassificationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_class_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_resample_library(mut self, resample: bool) -> Self {
        self.resample_library = resample;
        self
    }

    /// Reject a threshold outside `[0, 1]` (or NaN).
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self
            .threshold
            .filter(|t| !(0.0..=1.0).contains(t))
        {
            return Err(Error::InvalidConfig(format!(
                "threshold must lie in [0, 1], got {}",
                t
            )));
        }
        Ok(())
    }
}

/// Classify every pixel of `image` against `library`.
///
/// Rows are processed tile by tile; within a tile, rows are classified in
/// parallel on the context's worker pool.
pub fn classify_image(
    image: &dyn RasterCube,
    library: &SpectralLibrary,
    config: &ClassificationConfig,
    ctx: &RunContext,
) -> Result<ClassifiedRaster> {
    config.validate()?;
    let library = align_library(image, library, config)?;
    let (catalog, selected) = ClassCatalog::for_library(&library, config.class_names.as_ref())?;

    let shape = image.shape();
    let entries = library.entries();
    let matcher = AngleMatcher::new(selected.iter().map(|&i| entries[i].values()), shape.bands);
    let nodata = image.nodata_value();
    let threshold = config.threshold;

    log::info!(
        "Classifying {}x{} pixels against {} classes",
        shape.rows,
        shape.cols,
        matcher.len()
    );

    let pool = ctx.worker_pool()?;
    let mut ids = Vec::with_capacity(shape.pixel_count());

    for rows in ctx.tiles(shape.rows) {
        ctx.check_cancelled()?;
        let tile = image.read_rows(rows.clone())?;

        let mut tile_ids = vec![0u16; rows.len() * shape.cols];
        if shape.cols > 0 {
            pool.install(|| {
                tile_ids
                    .par_chunks_mut(shape.cols)
                    .enumerate()
                    .for_each(|(r, out)| {
                        let row = tile.index_axis(Axis(0), r);
                        for (id, pixel) in out.iter_mut().zip(row.outer_iter()) {
                            *id = classify_pixel(pixel, &matcher, threshold, nodata);
                        }
                    });
            });
        }
        ids.extend_from_slice(&tile_ids);

        log::debug!("Classified rows {:?}", rows);
        ctx.report(rows.end, shape.rows);
    }

    let ids = Array2::from_shape_vec((shape.rows, shape.cols), ids)?;
    let metadata = classified_metadata(image.metadata());
    ClassifiedRaster::new(ids, catalog, metadata)
}

/// Open `input`, classify it and write an ENVI classification to `output`.
pub fn classify_file(
    input: &Path,
    output: &Path,
    library: &SpectralLibrary,
    config: &ClassificationConfig,
    ctx: &RunContext,
) -> Result<ClassifiedRaster> {
    let image = LoaderRegistry::new().open(input)?;
    let classified = classify_image(image.as_ref(), library, config, ctx)?;
    classified.write_envi(output)?;
    Ok(classified)
}

fn classify_pixel(
    pixel: ArrayView1<'_, f32>,
    matcher: &AngleMatcher,
    threshold: Option<f64>,
    nodata: Option<f64>,
) -> u16 {
    if is_nodata(pixel, nodata) {
        return 0;
    }
    match matcher.best(pixel) {
        // Catalog size is bounded by 16-bit ids, so index + 1 fits.
        Some(m) if threshold.is_none_or(|t| m.similarity() >= t) => (m.index + 1) as u16,
        _ => 0,
    }
}

/// Use the library as-is when the axes agree, otherwise resample it or fail.
fn align_library(
    image: &dyn RasterCube,
    library: &SpectralLibrary,
    config: &ClassificationConfig,
) -> Result<SpectralLibrary> {
    let bands = image.shape().bands;
    let image_axis = image.wavelengths();
    let library_axis = library.wavelengths();

    if image_axis.is_empty() {
        if bands == library_axis.len() {
            log::warn!(
                "{} declares no wavelengths; matching library bands by position",
                image.source_name()
            );
            return Ok(library.clone());
        }
        return Err(Error::BandMismatch {
            expected: library_axis.len(),
            found: bands,
            detail: "image declares no wavelengths".to_string(),
        });
    }

    let Some(band) = library_axis.first_mismatch(image_axis) else {
        return Ok(library.clone());
    };

    if config.resample_library {
        return library.resampled_to(image_axis);
    }

    let detail = match (library_axis.get(band), image_axis.get(band)) {
        (Some(lib_nm), Some(img_nm)) => format!(
            "band {} is {} nm in the library and {} nm in the image",
            band, lib_nm, img_nm
        ),
        _ => "band counts differ".to_string(),
    };
    Err(Error::BandMismatch {
        expected: library_axis.len(),
        found: image_axis.len(),
        detail,
    })
}

fn classified_metadata(source: &Metadata) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.set(
        "description",
        format!("{{{}}}", description(CLASSIFIED_DESCRIPTION_SUFFIX)),
    );
    metadata.set("file type", FILE_TYPE_CLASSIFICATION);
    metadata.copy_from(source, MAP_REFERENCE_KEYS);
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NO_DATA_CLASS_NAME;
    use crate::context::CancelToken;
    use crate::data::{MemoryCube, WavelengthAxis};
    use crate::library::ReferenceSpectrum;
    use ndarray::Array3;

    fn axis() -> WavelengthAxis {
        WavelengthAxis::new(vec![450.0, 550.0, 650.0, 750.0])
    }

    fn library() -> SpectralLibrary {
        SpectralLibrary::new(
            axis(),
            vec![
                ReferenceSpectrum::new("Alunite", vec![0.9, 0.1, 0.1, 0.1]),
                ReferenceSpectrum::new("Kaolinite", vec![0.1, 0.9, 0.1, 0.1]),
                ReferenceSpectrum::new("Calcite", vec![0.1, 0.1, 0.9, 0.1]),
            ],
        )
        .unwrap()
    }

    /// 3x4 scene: row 0 copies the references, row 1 is a scaled mix,
    /// row 2 contains nodata pixels.
    fn scene() -> MemoryCube {
        let pixels = [
            [0.9, 0.1, 0.1, 0.1],
            [0.1, 0.9, 0.1, 0.1],
            [0.1, 0.1, 0.9, 0.1],
            [0.45, 0.05, 0.05, 0.05],
            [0.3, 0.3, 0.1, 0.1],
            [0.1, 0.1, 0.1, 0.9],
            [0.0, 0.2, 0.0, 0.0],
            [0.2, 0.2, 0.6, 0.1],
            [0.0, 0.0, 0.0, 0.0],
            [f32::NAN, 0.1, 0.1, 0.1],
            [-9999.0, 0.1, 0.1, 0.1],
            [0.1, 0.8, 0.2, 0.1],
        ];
        let data = Array3::from_shape_fn((3, 4, 4), |(r, c, b)| pixels[r * 4 + c][b]);
        let mut meta = Metadata::new();
        meta.set("data ignore value", "-9999");
        meta.set("map info", "{UTM, 1, 1, 500000, 4000000, 1, 1, 13, North, WGS-84}");
        MemoryCube::new(data, axis())
            .unwrap()
            .with_metadata(meta)
            .with_name("scene")
    }

    fn classify(config: &ClassificationConfig) -> Result<ClassifiedRaster> {
        classify_image(&scene(), &library(), config, &RunContext::new().with_tile_rows(2))
    }

    #[test]
    fn test_exact_references_match() {
        let result = classify(&ClassificationConfig::new()).unwrap();
        let ids = result.ids();
        assert_eq!(result.class_name_at(0, 0), Some("Alunite"));
        assert_eq!(result.class_name_at(0, 1), Some("Kaolinite"));
        assert_eq!(result.class_name_at(0, 2), Some("Calcite"));
        // Brightness does not matter.
        assert_eq!(ids[[1, 0]], 1);
        // Nodata pixels: all zero, NaN, ignore value.
        assert_eq!(ids[[2, 0]], 0);
        assert_eq!(ids[[2, 1]], 0);
        assert_eq!(ids[[2, 2]], 0);
        assert_eq!(ids[[2, 3]], 2);
    }

    #[test]
    fn test_catalog_and_metadata() {
        let result = classify(&ClassificationConfig::new()).unwrap();
        assert_eq!(
            result.catalog().names().collect::<Vec<_>>(),
            vec![NO_DATA_CLASS_NAME, "Alunite", "Kaolinite", "Calcite"]
        );
        let meta = result.metadata();
        assert_eq!(meta.get("classes"), Some("4"));
        assert_eq!(meta.get("file type"), Some(FILE_TYPE_CLASSIFICATION));
        assert!(meta.get("description").unwrap().contains("mineral classified image."));
        assert_eq!(
            meta.get("map info"),
            Some("{UTM, 1, 1, 500000, 4000000, 1, 1, 13, North, WGS-84}")
        );
    }

    #[test]
    fn test_every_id_is_valid() {
        let result = classify(&ClassificationConfig::new()).unwrap();
        let classes = result.catalog().len();
        assert!(result.ids().iter().all(|&id| usize::from(id) < classes));
    }

    #[test]
    fn test_threshold_only_gates() {
        let open = classify(&ClassificationConfig::new()).unwrap();
        let mut previous = open.ids().clone();
        for threshold in [0.5, 0.75, 0.9, 0.99] {
            let gated = classify(&ClassificationConfig::new().with_threshold(threshold)).unwrap();
            for ((&g, &o), &p) in gated.ids().iter().zip(open.ids()).zip(&previous) {
                assert!(g == o || g == 0);
                // Raising the threshold never revives a pixel.
                assert!(g == p || g == 0);
            }
            previous = gated.ids().clone();
        }
    }

    #[test]
    fn test_threshold_rejects_weak_match() {
        // 45 degrees from both axes: similarity 0.5.
        let data = Array3::from_shape_vec((1, 1, 2), vec![1.0f32, 1.0]).unwrap();
        let axis = WavelengthAxis::new(vec![500.0, 600.0]);
        let image = MemoryCube::new(data, axis.clone()).unwrap();
        let library = SpectralLibrary::new(
            axis,
            vec![
                ReferenceSpectrum::new("X", vec![1.0, 0.0]),
                ReferenceSpectrum::new("Y", vec![0.0, 1.0]),
            ],
        )
        .unwrap();

        let ctx = RunContext::new();
        let strict = ClassificationConfig::new().with_threshold(0.99);
        let result = classify_image(&image, &library, &strict, &ctx).unwrap();
        assert_eq!(result.ids()[[0, 0]], 0);

        let loose = ClassificationConfig::new().with_threshold(0.4);
        let result = classify_image(&image, &library, &loose, &ctx).unwrap();
        // Tie goes to the first class.
        assert_eq!(result.class_name_at(0, 0), Some("X"));
    }

    #[test]
    fn test_subset_restricts_candidates() {
        let config = ClassificationConfig::new().with_class_names(["Calcite", "Kaolinite"]);
        let result = classify(&config).unwrap();
        assert_eq!(
            result.catalog().names().collect::<Vec<_>>(),
            vec![NO_DATA_CLASS_NAME, "Kaolinite", "Calcite"]
        );
        assert_eq!(result.class_name_at(0, 1), Some("Kaolinite"));
        assert_eq!(result.class_name_at(0, 2), Some("Calcite"));
        // Alunite pixel must pick one of the allowed classes.
        assert_ne!(result.class_name_at(0, 0), Some("Alunite"));
    }

    #[test]
    fn test_empty_subset() {
        let config = ClassificationConfig::new().with_class_names(["Gypsum"]);
        assert!(matches!(classify(&config), Err(Error::EmptySubset { .. })));
    }

    #[test]
    fn test_invalid_threshold() {
        for t in [-0.1, 1.5, f64::NAN] {
            let config = ClassificationConfig::new().with_threshold(t);
            assert!(matches!(classify(&config), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_band_mismatch() {
        let other = SpectralLibrary::new(
            WavelengthAxis::new(vec![450.0, 550.0, 650.0]),
            vec![ReferenceSpectrum::new("A", vec![1.0, 1.0, 1.0])],
        )
        .unwrap();
        let result = classify_image(
            &scene(),
            &other,
            &ClassificationConfig::new(),
            &RunContext::new(),
        );
        assert!(matches!(result, Err(Error::BandMismatch { expected: 3, found: 4, .. })));
    }

    #[test]
    fn test_resampled_library() {
        let coarse = SpectralLibrary::new(
            WavelengthAxis::new(vec![400.0, 600.0, 800.0]),
            vec![
                ReferenceSpectrum::new("Red", vec![0.1, 0.1, 0.9]),
                ReferenceSpectrum::new("Blue", vec![0.9, 0.1, 0.1]),
            ],
        )
        .unwrap();
        let strict = ClassificationConfig::new();
        let result = classify_image(&scene(), &coarse, &strict, &RunContext::new());
        assert!(matches!(result, Err(Error::BandMismatch { .. })));

        let resample = ClassificationConfig::new().with_resample_library(true);
        let result = classify_image(&scene(), &coarse, &resample, &RunContext::new()).unwrap();
        assert_eq!(result.class_name_at(0, 0), Some("Blue"));
        assert_eq!(result.class_name_at(1, 0), Some("Blue"));
        // Strong last band resembles the long-wavelength reference.
        assert_eq!(result.class_name_at(1, 1), Some("Red"));
    }

    #[test]
    fn test_parallel_matches_single_thread() {
        let config = ClassificationConfig::new().with_threshold(0.6);
        let single = classify_image(
            &scene(),
            &library(),
            &config,
            &RunContext::new().with_threads(1).with_tile_rows(1),
        )
        .unwrap();
        let parallel = classify_image(
            &scene(),
            &library(),
            &config,
            &RunContext::new().with_threads(4),
        )
        .unwrap();
        assert_eq!(single.ids(), parallel.ids());
    }

    #[test]
    fn test_cancelled_before_first_tile() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = RunContext::new().with_cancel_token(token);
        let result = classify_image(&scene(), &library(), &ClassificationConfig::new(), &ctx);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_progress_reaches_total() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = RunContext::new()
            .with_tile_rows(2)
            .with_progress(move |done, total| sink.lock().unwrap().push((done, total)));
        classify_image(&scene(), &library(), &ClassificationConfig::new(), &ctx).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(2, 3), (3, 3)]);
    }
}
