//! Ordered key/value metadata attached to rasters.
//!
//! Keys follow ENVI conventions: case-insensitive, stored lowercase, with
//! list values kept in their braced text form (`{a, b, c}`). Values that are
//! copied between rasters (such as `map info`) therefore round-trip verbatim.

use std::fmt::Display;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// Insertion-ordered raster metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value of a field, exactly as stored.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a field, replacing an existing value in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = normalize_key(key);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set a field to a braced list.
    pub fn set_list<I, T>(&mut self, key: &str, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        self.set(key, format_list(items));
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let key = normalize_key(key);
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Field value with surrounding braces stripped.
    pub fn get_scalar(&self, key: &str) -> Option<&str> {
        self.get(key).map(strip_braces)
    }

    /// Parse a field as an unsigned integer.
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_scalar(key)?.parse().ok()
    }

    /// Parse a field as a float.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get_scalar(key)?.parse().ok()
    }

    /// Split a braced list into trimmed items.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(parse_list)
    }

    /// Parse a braced list of floats. Returns `None` if any item is not numeric.
    pub fn get_f64_list(&self, key: &str) -> Option<Vec<f64>> {
        self.get_list(key)?
            .iter()
            .map(|s| s.parse::<f64>().ok())
            .collect()
    }

    /// Copy selected fields from another metadata block when present.
    pub fn copy_from(&mut self, other: &Metadata, keys: &[&str]) {
        for key in keys {
            if let Some(value) = other.get(key) {
                self.set(key, value);
            }
        }
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn strip_braces(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed)
        .trim()
}

/// Split `{a, b, c}` (or a bare `a, b, c`) into items.
pub fn parse_list(value: &str) -> Vec<String> {
    let inner = strip_braces(value);
    if inner.is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|s| s.trim().to_string()).collect()
}

/// Whether `item` survives a trip through a braced list unchanged:
/// non-empty, no surrounding whitespace and no `,`, `{` or `}`.
pub fn is_list_safe(item: &str) -> bool {
    !item.is_empty() && item.trim() == item && !item.contains([',', '{', '}'])
}

/// Join items into `{a, b, c}`.
pub fn format_list<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let joined = items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut meta = Metadata::new();
        meta.set("Map Info", "{UTM, 1, 1}");
        assert_eq!(meta.get("map info"), Some("{UTM, 1, 1}"));
        assert_eq!(meta.get("MAP INFO"), Some("{UTM, 1, 1}"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut meta = Metadata::new();
        meta.set("samples", "10");
        meta.set("lines", "5");
        meta.set("samples", "12");
        let keys: Vec<_> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["samples", "lines"]);
        assert_eq!(meta.get_usize("samples"), Some(12));
    }

    #[test]
    fn test_list_round_trip() {
        let mut meta = Metadata::new();
        meta.set_list("class names", ["No data", "Alunite", "Kaolinite"]);
        assert_eq!(meta.get("class names"), Some("{No data, Alunite, Kaolinite}"));
        assert_eq!(
            meta.get_list("class names").unwrap(),
            vec!["No data", "Alunite", "Kaolinite"]
        );
    }

    #[test]
    fn test_float_list() {
        let mut meta = Metadata::new();
        meta.set("wavelength", "{ 400.5,500 ,600.25 }");
        assert_eq!(meta.get_f64_list("wavelength").unwrap(), vec![400.5, 500.0, 600.25]);

        meta.set("wavelength", "{400, abc}");
        assert!(meta.get_f64_list("wavelength").is_none());
    }

    #[test]
    fn test_empty_list() {
        assert!(parse_list("{}").is_empty());
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn test_list_safe_items() {
        assert!(is_list_safe("Alunite"));
        assert!(is_list_safe("Kaolinite (wxl)"));
        assert!(!is_list_safe("Alunite, Na"));
        assert!(!is_list_safe("{Jarosite}"));
        assert!(!is_list_safe(" Calcite"));
        assert!(!is_list_safe(""));
    }

    #[test]
    fn test_remove() {
        let mut meta = Metadata::new();
        meta.set("bands", "3");
        assert_eq!(meta.remove("BANDS").as_deref(), Some("3"));
        assert!(meta.is_empty());
    }
}
