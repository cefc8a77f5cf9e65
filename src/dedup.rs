//! Merging per-binary library maps.

use crate::error::{CopyLibsError, Result};
use crate::record::LibraryMap;

/// Merge library maps in order into one set keyed by library name.
///
/// The first occurrence of a name wins. A later occurrence must be equal to
/// it, otherwise the merge fails with `ConflictingLibraryVersion`.
pub fn unique_libraries<I>(maps: I) -> Result<LibraryMap>
where
    I: IntoIterator<Item = LibraryMap>,
{
    let mut unique = LibraryMap::new();

    for map in maps {
        for (name, record) in map {
            match unique.get(&name) {
                Some(existing) if *existing != record => {
                    return Err(CopyLibsError::ConflictingLibraryVersion {
                        name,
                        existing: Box::new(existing.clone()),
                        incoming: Box::new(record),
                    });
                }
                Some(_) => {}
                None => {
                    unique.insert(name, record);
                }
            }
        }
    }

    Ok(unique)
}
