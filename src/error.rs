//! Error types for library collection and copying.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::LibraryRecord;

/// Everything that can abort a run. None of these are recovered from.
#[derive(Error, Debug)]
pub enum CopyLibsError {
    #[error("auditwheel is not available: {0}")]
    DependencyUnavailable(String),

    #[error("unsupported auditwheel version: {0}")]
    UnsupportedToolVersion(String),

    #[error("failed to analyze {}: {message}", binary.display())]
    BinaryAnalysis { binary: PathBuf, message: String },

    #[error("{name} exists more than once with different information {incoming:?} and {existing:?}")]
    ConflictingLibraryVersion {
        name: String,
        existing: Box<LibraryRecord>,
        incoming: Box<LibraryRecord>,
    },

    #[error("failed to copy {} to {}", source_path.display(), dest.display())]
    FileCopy {
        source_path: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid output directory {}: {message}", path.display())]
    OutputDir { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, CopyLibsError>;
