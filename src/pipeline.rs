//! End-to-end run: resolve, filter, merge, copy.

use std::path::{Path, PathBuf};

use log::info;

use crate::analyze::{AuditwheelResolver, ResolverStrategy};
use crate::copy::{copy_libraries, ensure_output_dir, CopyReport};
use crate::dedup::unique_libraries;
use crate::error::Result;
use crate::record::{filter_by_marker, DependencyResolver, LibraryMap};
use crate::version::{probe_auditwheel_version, ToolVersion};

/// Default path marker for libraries built by Conan.
pub const DEFAULT_MARKER: &str = "conan";

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub binaries: Vec<PathBuf>,
    pub marker: String,
    pub dest: PathBuf,
}

/// Probe the installed auditwheel and build a resolver for its API.
pub fn detect_resolver(python: &str) -> Result<AuditwheelResolver> {
    let raw = probe_auditwheel_version(python)?;
    let version = ToolVersion::parse(&raw)?;
    let strategy = ResolverStrategy::for_version(&version);
    info!("Using auditwheel {} via {}()", version, strategy);
    Ok(AuditwheelResolver::new(python, strategy))
}

/// Marker-matching libraries of every binary, merged without conflicts.
pub fn collect_libraries<R, P>(resolver: &R, binaries: &[P], marker: &str) -> Result<LibraryMap>
where
    R: DependencyResolver + ?Sized,
    P: AsRef<Path>,
{
    let mut per_binary = Vec::with_capacity(binaries.len());
    for binary in binaries {
        let binary = binary.as_ref();
        let libs = filter_by_marker(resolver.resolve(binary)?, marker);
        info!(
            "{}: {} librar{} under '{}'",
            binary.display(),
            libs.len(),
            if libs.len() == 1 { "y" } else { "ies" },
            marker
        );
        per_binary.push(libs);
    }
    unique_libraries(per_binary)
}

/// Collect the libraries for `config.binaries` and copy them to `config.dest`.
///
/// Nothing is copied unless every binary resolved and merged cleanly.
pub fn run<R>(config: &Config, resolver: &R) -> Result<CopyReport>
where
    R: DependencyResolver + ?Sized,
{
    let libs = collect_libraries(resolver, config.binaries.as_slice(), &config.marker)?;
    ensure_output_dir(&config.dest)?;
    let report = copy_libraries(&config.dest, &libs)?;
    info!(
        "Copied {} libraries ({} bytes) to {}",
        report.copied.len(),
        report.total_bytes,
        config.dest.display()
    );
    Ok(report)
}
