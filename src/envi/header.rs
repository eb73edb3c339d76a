//! ENVI header parsing and formatting, plus the binary layout it describes.

use std::path::Path;

use crate::data::Metadata;
use crate::error::{Error, IoResultExt, Result};

/// Sample encoding declared by the `data type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 1: unsigned byte
    U8,
    /// 2: signed 16-bit integer
    I16,
    /// 3: signed 32-bit integer
    I32,
    /// 4: 32-bit float
    F32,
    /// 5: 64-bit float
    F64,
    /// 12: unsigned 16-bit integer
    U16,
}

impl DataType {
    /// Parse an ENVI type code.
    pub fn from_code(code: usize) -> Option<Self> {
        match code {
            1 => Some(DataType::U8),
            2 => Some(DataType::I16),
            3 => Some(DataType::I32),
            4 => Some(DataType::F32),
            5 => Some(DataType::F64),
            12 => Some(DataType::U16),
            _ => None,
        }
    }

    /// ENVI type code.
    pub fn code(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::I16 => 2,
            DataType::I32 => 3,
            DataType::F32 => 4,
            DataType::F64 => 5,
            DataType::U16 => 12,
        }
    }

    /// Bytes per sample.
    pub fn size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    /// Decode one sample. `bytes` must hold exactly `self.size()` bytes.
    pub fn decode(self, bytes: &[u8], order: ByteOrder) -> f64 {
        macro_rules! read {
            ($ty:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&bytes[..$n]);
                match order {
                    ByteOrder::Little => <$ty>::from_le_bytes(buf),
                    ByteOrder::Big => <$ty>::from_be_bytes(buf),
                }
            }};
        }
        match self {
            DataType::U8 => f64::from(bytes[0]),
            DataType::I16 => f64::from(read!(i16, 2)),
            DataType::U16 => f64::from(read!(u16, 2)),
            DataType::I32 => f64::from(read!(i32, 4)),
            DataType::F32 => f64::from(read!(f32, 4)),
            DataType::F64 => read!(f64, 8),
        }
    }

    /// Append one little-endian sample, saturating integer types.
    pub fn encode_le(self, value: f64, out: &mut Vec<u8>) {
        match self {
            DataType::U8 => out.push(value.round().clamp(0.0, 255.0) as u8),
            DataType::I16 => out.extend_from_slice(&(value.round() as i16).to_le_bytes()),
            DataType::U16 => out.extend_from_slice(&(value.round() as u16).to_le_bytes()),
            DataType::I32 => out.extend_from_slice(&(value.round() as i32).to_le_bytes()),
            DataType::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            DataType::F64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Arrangement of bands within the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// Band sequential
    Bsq,
    /// Band interleaved by line
    Bil,
    /// Band interleaved by pixel
    Bip,
}

impl Interleave {
    /// Parse the `interleave` field.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "bsq" => Some(Interleave::Bsq),
            "bil" => Some(Interleave::Bil),
            "bip" => Some(Interleave::Bip),
            _ => None,
        }
    }

    /// Header spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Interleave::Bsq => "bsq",
            Interleave::Bil => "bil",
            Interleave::Bip => "bip",
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// 0: least significant byte first
    Little,
    /// 1: most significant byte first
    Big,
}

/// Everything needed to locate a sample in an ENVI data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterLayout {
    /// `samples`: columns per line
    pub samples: usize,
    /// `lines`: number of rows
    pub lines: usize,
    /// `bands`
    pub bands: usize,
    /// `data type`
    pub data_type: DataType,
    /// `interleave`
    pub interleave: Interleave,
    /// `byte order`
    pub byte_order: ByteOrder,
    /// `header offset`: bytes to skip at the start of the data file
    pub header_offset: u64,
}

impl RasterLayout {
    /// Little-endian BSQ layout for writing.
    pub fn new(samples: usize, lines: usize, bands: usize, data_type: DataType) -> Self {
        Self {
            samples,
            lines,
            bands,
            data_type,
            interleave: Interleave::Bsq,
            byte_order: ByteOrder::Little,
            header_offset: 0,
        }
    }

    /// Read the layout fields of a parsed header.
    pub fn from_metadata(metadata: &Metadata, path: &Path) -> Result<Self> {
        let required = |key: &str| {
            metadata
                .get_usize(key)
                .ok_or_else(|| Error::invalid_header(path, format!("missing or invalid '{}'", key)))
        };

        let samples = required("samples")?;
        let lines = required("lines")?;
        let bands = metadata.get_usize("bands").unwrap_or(1);
        let code = required("data type")?;
        let data_type = DataType::from_code(code)
            .ok_or_else(|| Error::invalid_header(path, format!("unsupported data type {}", code)))?;
        let interleave = match metadata.get_scalar("interleave") {
            Some(value) => Interleave::parse(value).ok_or_else(|| {
                Error::invalid_header(path, format!("unknown interleave '{}'", value))
            })?,
            None => Interleave::Bsq,
        };
        let byte_order = match metadata.get_usize("byte order").unwrap_or(0) {
            0 => ByteOrder::Little,
            1 => ByteOrder::Big,
            other => {
                return Err(Error::invalid_header(
                    path,
                    format!("invalid byte order {}", other),
                ));
            }
        };
        let header_offset = metadata.get_usize("header offset").unwrap_or(0) as u64;

        Ok(Self {
            samples,
            lines,
            bands,
            data_type,
            interleave,
            byte_order,
            header_offset,
        })
    }

    /// Write the layout fields into a header, replacing existing values.
    pub fn apply_to(&self, metadata: &mut Metadata) {
        metadata.set("samples", self.samples.to_string());
        metadata.set("lines", self.lines.to_string());
        metadata.set("bands", self.bands.to_string());
        metadata.set("header offset", self.header_offset.to_string());
        metadata.set("data type", self.data_type.code().to_string());
        metadata.set("interleave", self.interleave.as_str());
        let order = match self.byte_order {
            ByteOrder::Little => "0",
            ByteOrder::Big => "1",
        };
        metadata.set("byte order", order);
    }

    /// Total number of samples in the data file.
    pub fn sample_count(&self) -> usize {
        self.samples * self.lines * self.bands
    }

    /// Expected data file size in bytes.
    pub fn data_size(&self) -> u64 {
        self.header_offset + (self.sample_count() * self.data_type.size()) as u64
    }
}

/// Parse header text. The first non-empty line must be `ENVI`.
///
/// Values in braces may span several lines; line breaks inside them are
/// folded into single spaces.
pub fn parse_header(text: &str, path: &Path) -> Result<Metadata> {
    let mut lines = text.lines();
    let magic = lines.by_ref().map(str::trim).find(|l| !l.is_empty());
    if magic != Some("ENVI") {
        return Err(Error::invalid_header(path, "file does not start with 'ENVI'"));
    }

    let mut metadata = Metadata::new();
    let mut pending: Option<(String, String)> = None;

    for line in lines {
        if let Some((key, mut value)) = pending.take() {
            value.push(' ');
            value.push_str(line.trim());
            if value.contains('}') {
                metadata.set(&key, normalize_braced(&value));
            } else {
                pending = Some((key, value));
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            log::trace!("Ignoring header line without '=': {}", trimmed);
            continue;
        };
        let key = key.trim().to_string();
        let value = value.trim().to_string();

        if value.starts_with('{') && !value.contains('}') {
            pending = Some((key, value));
        } else if value.starts_with('{') {
            metadata.set(&key, normalize_braced(&value));
        } else {
            metadata.set(&key, value);
        }
    }

    if let Some((key, _)) = pending {
        return Err(Error::invalid_header(
            path,
            format!("unterminated '{{' in field '{}'", key),
        ));
    }

    Ok(metadata)
}

/// Collapse runs of whitespace inside a braced value.
fn normalize_braced(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render metadata as header text.
pub fn format_header(metadata: &Metadata) -> String {
    let mut out = String::from("ENVI\n");
    for (key, value) in metadata.iter() {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Read and parse a header file.
pub fn read_header(path: &Path) -> Result<Metadata> {
    let text = std::fs::read_to_string(path).with_path(path)?;
    parse_header(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ENVI
description = {
  AVIRIS-NG subset}
samples = 10
lines   = 11
bands   = 3
header offset = 0
file type = ENVI Standard
data type = 4
interleave = bil
byte order = 0
map info = { UTM , 1.000 , 1.000 , 724522.127 , 4074620.759 , 1.1e+00 , 1.1e+00 , 13 , North , WGS-84 , units=Meters }
wavelength units = Nanometers
wavelength = {
 376.86, 381.87,
 386.88 }
";

    #[test]
    fn test_parse_layout() {
        let path = Path::new("sample.hdr");
        let meta = parse_header(SAMPLE, path).unwrap();
        let layout = RasterLayout::from_metadata(&meta, path).unwrap();
        assert_eq!(layout.samples, 10);
        assert_eq!(layout.lines, 11);
        assert_eq!(layout.bands, 3);
        assert_eq!(layout.data_type, DataType::F32);
        assert_eq!(layout.interleave, Interleave::Bil);
        assert_eq!(layout.byte_order, ByteOrder::Little);
        assert_eq!(layout.data_size(), 10 * 11 * 3 * 4);
    }

    #[test]
    fn test_multiline_values_are_folded() {
        let meta = parse_header(SAMPLE, Path::new("sample.hdr")).unwrap();
        assert_eq!(meta.get("description"), Some("{ AVIRIS-NG subset}"));
        assert_eq!(
            meta.get_f64_list("wavelength").unwrap(),
            vec![376.86, 381.87, 386.88]
        );
    }

    #[test]
    fn test_single_line_map_info_kept() {
        let meta = parse_header(SAMPLE, Path::new("sample.hdr")).unwrap();
        let map_info = meta.get("map info").unwrap();
        assert!(map_info.starts_with("{ UTM"));
        assert!(map_info.ends_with("units=Meters }"));
    }

    #[test]
    fn test_missing_magic() {
        let result = parse_header("samples = 1\n", Path::new("bad.hdr"));
        assert!(matches!(result, Err(Error::InvalidHeader { .. })));
    }

    #[test]
    fn test_unterminated_brace() {
        let result = parse_header("ENVI\nwavelength = {1, 2,\n3\n", Path::new("bad.hdr"));
        assert!(matches!(result, Err(Error::InvalidHeader { .. })));
    }

    #[test]
    fn test_missing_required_field() {
        let path = Path::new("bad.hdr");
        let meta = parse_header("ENVI\nsamples = 2\nlines = 2\n", path).unwrap();
        assert!(RasterLayout::from_metadata(&meta, path).is_err());
    }

    #[test]
    fn test_format_round_trip() {
        let path = Path::new("sample.hdr");
        let meta = parse_header(SAMPLE, path).unwrap();
        let reparsed = parse_header(&format_header(&meta), path).unwrap();
        assert_eq!(meta, reparsed);
    }

    #[test]
    fn test_decode_byte_orders() {
        let le = 513i16.to_le_bytes();
        let be = 513i16.to_be_bytes();
        assert_eq!(DataType::I16.decode(&le, ByteOrder::Little), 513.0);
        assert_eq!(DataType::I16.decode(&be, ByteOrder::Big), 513.0);
        assert_eq!(DataType::U8.decode(&[200], ByteOrder::Big), 200.0);
    }

    #[test]
    fn test_encode_u16() {
        let mut out = Vec::new();
        DataType::U16.encode_le(300.0, &mut out);
        assert_eq!(out, 300u16.to_le_bytes());
    }
}
