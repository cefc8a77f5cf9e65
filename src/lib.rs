//! Copy vendor-built shared libraries into a container staging directory.
//!
//! Dependency closures come from auditwheel's lddtree, run through a Python
//! interpreter. Libraries whose resolved path contains a marker (by default
//! `conan`) are merged across all binaries and copied out flat, keyed by
//! library file name.

mod analyze;
mod copy;
mod dedup;
mod error;
mod pipeline;
mod record;
#[cfg(test)]
mod testutil;
mod version;

pub use analyze::{AuditwheelResolver, ResolverStrategy, MODERN_API_VERSION};
pub use copy::{copy_libraries, ensure_output_dir, CopyReport};
pub use dedup::unique_libraries;
pub use error::{CopyLibsError, Result};
pub use pipeline::{collect_libraries, detect_resolver, run, Config, DEFAULT_MARKER};
pub use record::{filter_by_marker, DependencyResolver, LibraryMap, LibraryRecord};
pub use version::{probe_auditwheel_version, ToolVersion};
