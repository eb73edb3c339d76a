//! True-color composites from three sensor-specific bands.

use std::path::Path;

use ndarray::{Array3, Axis, Slice};

use crate::constants::{
    FILE_TYPE_STANDARD, MAP_REFERENCE_KEYS, RGB_DESCRIPTION_SUFFIX, description,
};
use crate::context::RunContext;
use crate::data::{LoaderRegistry, Metadata, RasterCube};
use crate::envi::{DataType, EnviWriter, Interleave, RasterLayout};
use crate::error::{Error, Result};
use crate::rgb::sensor::SensorFamily;

/// Three-band visible-light raster, `(rows, cols, 3)` in red, green, blue
/// order. Values are copied verbatim from the source bands.
#[derive(Debug, Clone)]
pub struct RgbRaster {
    data: Array3<f32>,
    sensor: SensorFamily,
    metadata: Metadata,
}

impl RgbRaster {
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn sensor(&self) -> SensorFamily {
        self.sensor
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    /// Write `<stem>.hdr` + `<stem>.img` as float32 BIP.
    pub fn write_envi(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut layout = RasterLayout::new(self.cols(), self.rows(), 3, DataType::F32);
        layout.interleave = Interleave::Bip;

        let mut data = Vec::with_capacity(self.data.len() * DataType::F32.size());
        for &value in &self.data {
            data.extend_from_slice(&value.to_le_bytes());
        }
        EnviWriter::new(path).write(&self.metadata, &layout, &data)
    }
}

/// Extract the red, green and blue bands of `image`.
pub fn to_rgb(image: &dyn RasterCube, ctx: &RunContext) -> Result<RgbRaster> {
    let sensor = SensorFamily::detect(image)?;
    let table = sensor.table();
    let shape = image.shape();

    if shape.bands < table.required_bands() {
        let band = table
            .bands()
            .iter()
            .map(|b| b.band)
            .find(|&b| b >= shape.bands)
            .unwrap_or(shape.bands);
        return Err(Error::MissingBand {
            sensor: sensor.name(),
            band,
            available: shape.bands,
        });
    }

    log::info!(
        "Composing {} RGB from bands {}, {}, {}",
        sensor,
        table.red.band,
        table.green.band,
        table.blue.band
    );

    let mut data = Array3::<f32>::zeros((shape.rows, shape.cols, 3));
    for rows in ctx.tiles(shape.rows) {
        ctx.check_cancelled()?;
        let tile = image.read_rows(rows.clone())?;
        let mut out = data.slice_axis_mut(Axis(0), Slice::from(rows.clone()));
        for (channel, spec) in table.bands().iter().enumerate() {
            out.index_axis_mut(Axis(2), channel)
                .assign(&tile.index_axis(Axis(2), spec.band));
        }
        ctx.report(rows.end, shape.rows);
    }

    Ok(RgbRaster {
        data,
        sensor,
        metadata: rgb_metadata(sensor, image.metadata()),
    })
}

/// Open `input`, compose its RGB bands and write them to `output`.
pub fn to_rgb_file(input: &Path, output: &Path, ctx: &RunContext) -> Result<RgbRaster> {
    let image = LoaderRegistry::new().open(input)?;
    let rgb = to_rgb(image.as_ref(), ctx)?;
    rgb.write_envi(output)?;
    Ok(rgb)
}

fn rgb_metadata(sensor: SensorFamily, source: &Metadata) -> Metadata {
    let bands = sensor.table().bands();
    let mut metadata = Metadata::new();
    metadata.set(
        "description",
        format!("{{{}}}", description(RGB_DESCRIPTION_SUFFIX)),
    );
    metadata.set("file type", FILE_TYPE_STANDARD);
    metadata.set("sensor type", sensor.name());
    metadata.set_list("band names", ["Red", "Green", "Blue"]);
    metadata.set_list("default bands", [1, 2, 3]);
    metadata.set("wavelength units", "Nanometers");
    metadata.set_list("wavelength", bands.iter().map(|b| format!("{:.2}", b.wavelength)));
    metadata.set_list("fwhm", bands.iter().map(|b| format!("{:.2}", b.fwhm)));
    metadata.set_list("bbl", bands.iter().map(|b| b.bbl));
    metadata.set_list(
        "correction factors",
        bands.iter().map(|b| format!("{:.4}", b.correction)),
    );
    metadata.set_list(
        "smoothing factors",
        bands.iter().map(|b| format!("{:.4}", b.smoothing)),
    );
    metadata.copy_from(source, MAP_REFERENCE_KEYS);
    metadata.copy_from(source, &["data ignore value"]);
    metadata
}
