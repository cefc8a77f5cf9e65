//! Resolved library records and marker filtering.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One shared library from a binary's dependency closure.
///
/// Equality covers every field, so two records for the same file name that
/// resolve to different places (or carry different metadata) are distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRecord {
    /// File name the library is keyed by, e.g. `libfoo.so.1`.
    pub name: String,
    pub soname: Option<String>,
    /// Path as found by the loader search, before following symlinks.
    pub path: Option<PathBuf>,
    /// Fully dereferenced path. `None` when the library could not be found.
    pub realpath: Option<PathBuf>,
    pub platform: Option<String>,
    pub needed: Vec<String>,
}

impl LibraryRecord {
    /// Record with only a resolved path set.
    pub fn new(name: impl Into<String>, realpath: impl Into<PathBuf>) -> Self {
        let realpath = realpath.into();
        Self {
            name: name.into(),
            soname: None,
            path: Some(realpath.clone()),
            realpath: Some(realpath),
            platform: None,
            needed: Vec::new(),
        }
    }
}

/// Library name to record, for one binary or merged across several.
pub type LibraryMap = BTreeMap<String, LibraryRecord>;

/// Produces the full dependency closure of a binary.
pub trait DependencyResolver {
    fn resolve(&self, binary: &Path) -> Result<LibraryMap>;
}

/// Keep only libraries whose resolved path contains `marker`.
///
/// Unresolved libraries never match.
#[must_use = "filtered libraries should be processed"]
pub fn filter_by_marker(libs: LibraryMap, marker: &str) -> LibraryMap {
    libs.into_iter()
        .filter(|(_, record)| {
            record
                .realpath
                .as_deref()
                .is_some_and(|p| p.to_string_lossy().contains(marker))
        })
        .collect()
}
