//! Class catalog: the id → class name table stored with every classified
//! raster.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::classify::colors::{NO_DATA_COLOR, generate_palette};
use crate::constants::NO_DATA_CLASS_NAME;
use crate::data::{Metadata, is_list_safe};
use crate::error::{Error, Result};
use crate::library::SpectralLibrary;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    /// Class name
    pub name: String,
    /// `class lookup` color
    pub color: [u8; 3],
}

/// Ordered, duplicate-free list of classes indexed by class id.
///
/// Catalogs built by the classifier always start with `"No data"` at id 0.
/// A compacted catalog keeps `"No data"` only when some pixel uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
    entries: Vec<ClassEntry>,
}

impl ClassCatalog {
    /// Build a catalog from explicit entries.
    pub fn new(entries: Vec<ClassEntry>) -> Result<Self> {
        if entries.len() > usize::from(u16::MAX) + 1 {
            return Err(Error::InvalidConfig(format!(
                "{} classes do not fit 16-bit class ids",
                entries.len()
            )));
        }
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !is_list_safe(&entry.name) {
                return Err(Error::InvalidConfig(format!(
                    "class name '{}' cannot be stored in a header list",
                    entry.name
                )));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate class name '{}'",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Build a catalog from names, assigning default lookup colors.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let classes = names.iter().filter(|n| *n != NO_DATA_CLASS_NAME).count();
        let mut palette = generate_palette(classes).into_iter();
        let entries = names
            .into_iter()
            .map(|name| {
                let color = if name == NO_DATA_CLASS_NAME {
                    NO_DATA_COLOR
                } else {
                    palette.next().unwrap_or(NO_DATA_COLOR)
                };
                ClassEntry { name, color }
            })
            .collect();
        Self::new(entries)
    }

    /// Catalog for a classification run: `"No data"` followed by the eligible
    /// library entries in library order.
    ///
    /// Returns the catalog together with the library index of each class
    /// `1..len`.
    pub fn for_library(
        library: &SpectralLibrary,
        subset: Option<&BTreeSet<String>>,
    ) -> Result<(Self, Vec<usize>)> {
        let selected: Vec<usize> = match subset {
            None => (0..library.len()).collect(),
            Some(wanted) => {
                for name in wanted {
                    if library.get(name).is_none() {
                        log::warn!("Class '{}' is not in the library, ignoring it", name);
                    }
                }
                library
                    .names()
                    .enumerate()
                    .filter(|(_, name)| wanted.contains(*name))
                    .map(|(i, _)| i)
                    .collect()
            }
        };

        if selected.is_empty() {
            return Err(Error::EmptySubset {
                requested: subset
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default(),
            });
        }

        let entries = library.entries();
        let names = std::iter::once(NO_DATA_CLASS_NAME)
            .chain(selected.iter().map(|&i| entries[i].name()));
        Ok((Self::from_names(names)?, selected))
    }

    /// Number of classes, including `"No data"` when present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ClassEntry] {
        &self.entries
    }

    /// Class names in id order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Name of class `id`.
    pub fn name(&self, id: u16) -> Option<&str> {
        self.entries.get(usize::from(id)).map(|e| e.name.as_str())
    }

    /// Lookup color of class `id`.
    pub fn color(&self, id: u16) -> Option<[u8; 3]> {
        self.entries.get(usize::from(id)).map(|e| e.color)
    }

    /// Id of `"No data"`, if the catalog has it.
    pub fn no_data_id(&self) -> Option<u16> {
        self.entries
            .iter()
            .position(|e| e.name == NO_DATA_CLASS_NAME)
            .and_then(|i| u16::try_from(i).ok())
    }

    pub fn has_no_data(&self) -> bool {
        self.no_data_id().is_some()
    }

    /// Sub-catalog of the given ids, in the order given.
    ///
    /// Ids must be valid for this catalog.
    pub(crate) fn select(&self, ids: &[u16]) -> Self {
        Self {
            entries: ids
                .iter()
                .filter_map(|&id| self.entries.get(usize::from(id)).cloned())
                .collect(),
        }
    }

    /// Write `classes`, `class names` and `class lookup` into a header.
    pub fn apply_to(&self, metadata: &mut Metadata) {
        metadata.set("classes", self.len().to_string());
        metadata.set_list("class names", self.names());
        metadata.set_list(
            "class lookup",
            self.entries.iter().flat_map(|e| e.color),
        );
    }

    /// Read the class fields of a classification header.
    ///
    /// A missing or malformed `class lookup` is replaced by default colors.
    pub fn from_metadata(metadata: &Metadata, path: &Path) -> Result<Self> {
        let names = metadata
            .get_list("class names")
            .ok_or_else(|| Error::invalid_header(path, "missing 'class names'"))?;
        if let Some(classes) = metadata
            .get_usize("classes")
            .filter(|&classes| classes != names.len())
        {
            return Err(Error::invalid_header(
                path,
                format!("'classes' is {} but {} names are listed", classes, names.len()),
            ));
        }

        let lookup: Option<Vec<u8>> = metadata
            .get_list("class lookup")
            .and_then(|items| items.iter().map(|s| s.parse().ok()).collect());

        match lookup {
            Some(lookup) if lookup.len() == names.len() * 3 => {
                let entries = names
                    .into_iter()
                    .zip(lookup.chunks_exact(3))
                    .map(|(name, rgb)| ClassEntry {
                        name,
                        color: [rgb[0], rgb[1], rgb[2]],
                    })
                    .collect();
                Self::new(entries)
            }
            _ => {
                log::debug!("{:?}: no usable 'class lookup', using default colors", path);
                Self::from_names(names)
            }
        }
    }
}
