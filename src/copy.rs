//! Copying resolved libraries into the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{CopyLibsError, Result};
use crate::record::LibraryMap;

/// What a copy pass wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: Vec<PathBuf>,
    pub total_bytes: u64,
}

/// Create the output directory (with parents) if it is missing.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(CopyLibsError::OutputDir {
            path: dir.to_path_buf(),
            message: "exists but is not a directory".to_string(),
        });
    }
    fs::create_dir_all(dir).map_err(|e| CopyLibsError::OutputDir {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;
    debug!("Created output directory {}", dir.display());
    Ok(())
}

/// Copy every library's resolved file to `dest/<name>`.
///
/// Symlinks are followed and existing files are overwritten. Stops at the
/// first failure; files already copied are left in place.
pub fn copy_libraries(dest: &Path, libs: &LibraryMap) -> Result<CopyReport> {
    let mut report = CopyReport::default();

    for (name, record) in libs {
        let dest_path = dest.join(name);
        let src = record.realpath.as_deref().ok_or_else(|| CopyLibsError::FileCopy {
            source_path: PathBuf::from(name),
            dest: dest_path.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "library has no resolved path",
            ),
        })?;

        let bytes = fs::copy(src, &dest_path).map_err(|e| CopyLibsError::FileCopy {
            source_path: src.to_path_buf(),
            dest: dest_path.clone(),
            source: e,
        })?;
        debug!("Copied {} -> {} ({} bytes)", src.display(), dest_path.display(), bytes);

        report.total_bytes += bytes;
        report.copied.push(dest_path);
    }

    Ok(report)
}
