//! Dependency closure extraction through auditwheel's lddtree.
//!
//! auditwheel changed its lddtree API in 6.4.0: older releases return a plain
//! dict from `lddtree()` with library info under `libs`, newer ones return a
//! `DynamicExecutable` from `ldd()` exposing a `libraries` property. Each
//! shape has its own strategy; the installed version picks one up front.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use serde::Deserialize;

use crate::error::{CopyLibsError, Result};
use crate::record::{DependencyResolver, LibraryMap, LibraryRecord};
use crate::version::{last_line, ToolVersion};

/// First auditwheel release with the `ldd()` / `DynamicExecutable` API.
pub const MODERN_API_VERSION: (u64, u64, u64) = (6, 4, 0);

const LEGACY_SCRIPT: &str = r#"
import json, sys
from auditwheel.lddtree import lddtree
tree = lddtree(sys.argv[1])
libs = {}
for name, info in tree["libs"].items():
    libs[name] = {
        "realpath": info.get("realpath"),
        "path": info.get("path"),
        "needed": list(info.get("needed") or []),
    }
json.dump({"libs": libs}, sys.stdout)
"#;

const MODERN_SCRIPT: &str = r#"
import json, sys
from auditwheel.lddtree import ldd
def opt(v):
    return None if v is None else str(v)
libs = {}
for name, info in ldd(sys.argv[1]).libraries.items():
    libs[name] = {
        "soname": info.soname,
        "path": opt(info.path),
        "realpath": opt(info.realpath),
        "platform": opt(getattr(info, "platform", None)),
        "needed": list(info.needed or []),
    }
json.dump({"libraries": libs}, sys.stdout)
"#;

/// Which auditwheel API shape to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStrategy {
    /// `lddtree(binary)["libs"]`, auditwheel < 6.4.0.
    Legacy,
    /// `ldd(binary).libraries`, auditwheel >= 6.4.0.
    Modern,
}

impl ResolverStrategy {
    /// Pick the strategy for an installed auditwheel version.
    pub fn for_version(version: &ToolVersion) -> Self {
        let (major, minor, patch) = MODERN_API_VERSION;
        if *version < ToolVersion::new(major, minor, patch) {
            ResolverStrategy::Legacy
        } else {
            ResolverStrategy::Modern
        }
    }

    fn script(self) -> &'static str {
        match self {
            ResolverStrategy::Legacy => LEGACY_SCRIPT,
            ResolverStrategy::Modern => MODERN_SCRIPT,
        }
    }

    /// Top-level key of this strategy's JSON payload.
    fn payload_key(self) -> &'static str {
        match self {
            ResolverStrategy::Legacy => "libs",
            ResolverStrategy::Modern => "libraries",
        }
    }

    /// Whether `json` starts with this strategy's top-level key.
    fn owns_payload(self, json: &str) -> bool {
        json.trim_start()
            .strip_prefix('{')
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix('"'))
            .and_then(|rest| rest.strip_prefix(self.payload_key()))
            .is_some_and(|rest| rest.starts_with('"'))
    }

    /// Decode the JSON emitted by this strategy's script for `binary`.
    ///
    /// A payload of the other shape is rejected with `UnsupportedToolVersion`:
    /// the strategy does not match the installed auditwheel. A payload of the
    /// right shape that still fails to decode (e.g. a non UTF-8 library path
    /// written as a lone surrogate escape) is a `BinaryAnalysis` error.
    pub fn decode(self, binary: &Path, json: &str) -> Result<LibraryMap> {
        let owned = self.owns_payload(json);
        let fail = |e: serde_json::Error| {
            if owned {
                CopyLibsError::BinaryAnalysis {
                    binary: binary.to_path_buf(),
                    message: format!("cannot decode auditwheel {} output: {}", self, e),
                }
            } else {
                CopyLibsError::UnsupportedToolVersion(format!(
                    "{} output does not match the installed auditwheel: {}",
                    self, e
                ))
            }
        };

        let libs: LibraryMap = match self {
            ResolverStrategy::Legacy => {
                let tree: LegacyTree = serde_json::from_str(json).map_err(fail)?;
                tree.libs
                    .into_iter()
                    .map(|(name, info)| {
                        let record = LibraryRecord {
                            name: name.clone(),
                            soname: None,
                            path: info.path,
                            realpath: info.realpath,
                            platform: None,
                            needed: info.needed,
                        };
                        (name, record)
                    })
                    .collect()
            }
            ResolverStrategy::Modern => {
                let exe: DynamicExecutable = serde_json::from_str(json).map_err(fail)?;
                exe.libraries
                    .into_iter()
                    .map(|(name, info)| {
                        let record = LibraryRecord {
                            name: name.clone(),
                            soname: Some(info.soname),
                            path: info.path,
                            realpath: info.realpath,
                            platform: info.platform,
                            needed: info.needed,
                        };
                        (name, record)
                    })
                    .collect()
            }
        };
        Ok(libs)
    }
}

impl fmt::Display for ResolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverStrategy::Legacy => write!(f, "lddtree"),
            ResolverStrategy::Modern => write!(f, "ldd"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyTree {
    libs: HashMap<String, LegacyLibrary>,
}

#[derive(Debug, Deserialize)]
struct LegacyLibrary {
    realpath: Option<PathBuf>,
    path: Option<PathBuf>,
    #[serde(default)]
    needed: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DynamicExecutable {
    libraries: HashMap<String, DynamicLibrary>,
}

#[derive(Debug, Deserialize)]
struct DynamicLibrary {
    soname: String,
    path: Option<PathBuf>,
    realpath: Option<PathBuf>,
    platform: Option<String>,
    #[serde(default)]
    needed: Vec<String>,
}

/// Resolves binaries by running auditwheel in a Python interpreter.
#[derive(Debug, Clone)]
pub struct AuditwheelResolver {
    python: String,
    strategy: ResolverStrategy,
}

impl AuditwheelResolver {
    pub fn new(python: impl Into<String>, strategy: ResolverStrategy) -> Self {
        Self {
            python: python.into(),
            strategy,
        }
    }

    pub fn strategy(&self) -> ResolverStrategy {
        self.strategy
    }
}

impl DependencyResolver for AuditwheelResolver {
    /// Full dependency closure of `binary`.
    ///
    /// # Errors
    ///
    /// Returns `BinaryAnalysis` if the file does not exist or auditwheel
    /// raises while analyzing it.
    fn resolve(&self, binary: &Path) -> Result<LibraryMap> {
        // Check file exists first for a clear error message
        if !binary.exists() {
            return Err(CopyLibsError::BinaryAnalysis {
                binary: binary.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }

        debug!("Running auditwheel {} on {}", self.strategy, binary.display());
        let output = Command::new(&self.python)
            .args(["-c", self.strategy.script()])
            .arg(binary)
            .output()
            .map_err(|e| {
                CopyLibsError::DependencyUnavailable(format!("cannot run {}: {}", self.python, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CopyLibsError::BinaryAnalysis {
                binary: binary.to_path_buf(),
                message: last_line(&stderr)
                    .unwrap_or("auditwheel exited with an error")
                    .to_string(),
            });
        }

        self.strategy
            .decode(binary, &String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fake_python, spawn_lock};
    use tempfile::TempDir;

    const LEGACY_JSON: &str = r#"{"libs": {
        "libc.so.6": {"realpath": "/usr/lib64/libc.so.6", "path": "/lib64/libc.so.6", "needed": []},
        "libfmt.so.10": {"realpath": "/home/ci/.conan2/p/fmt/lib/libfmt.so.10.1.0",
                         "path": "/home/ci/.conan2/p/fmt/lib/libfmt.so.10", "needed": ["libc.so.6"]},
        "libgone.so": {"realpath": null, "path": null, "needed": []}
    }}"#;

    const MODERN_JSON: &str = r#"{"libraries": {
        "libfmt.so.10": {"soname": "libfmt.so.10", "path": "/c/conan/libfmt.so.10",
                         "realpath": "/c/conan/libfmt.so.10.1.0", "platform": "x86_64", "needed": []}
    }}"#;

    #[test]
    fn test_strategy_threshold() {
        let pick = |v: &str| ResolverStrategy::for_version(&ToolVersion::parse(v).unwrap());
        assert_eq!(pick("5.4.0"), ResolverStrategy::Legacy);
        assert_eq!(pick("6.3.99"), ResolverStrategy::Legacy);
        assert_eq!(pick("6.4.0"), ResolverStrategy::Modern);
        assert_eq!(pick("6.4"), ResolverStrategy::Modern);
        assert_eq!(pick("10.0.0"), ResolverStrategy::Modern);
    }

    #[test]
    fn test_decode_legacy() {
        let libs = ResolverStrategy::Legacy.decode(Path::new("bin"), LEGACY_JSON).unwrap();
        assert_eq!(libs.len(), 3);
        let fmt = &libs["libfmt.so.10"];
        assert_eq!(fmt.name, "libfmt.so.10");
        assert_eq!(
            fmt.realpath.as_deref(),
            Some(Path::new("/home/ci/.conan2/p/fmt/lib/libfmt.so.10.1.0"))
        );
        assert_eq!(fmt.needed, vec!["libc.so.6"]);
        assert!(libs["libgone.so"].realpath.is_none());
    }

    #[test]
    fn test_decode_modern() {
        let libs = ResolverStrategy::Modern.decode(Path::new("bin"), MODERN_JSON).unwrap();
        let fmt = &libs["libfmt.so.10"];
        assert_eq!(fmt.soname.as_deref(), Some("libfmt.so.10"));
        assert_eq!(fmt.platform.as_deref(), Some("x86_64"));
        assert_eq!(fmt.path.as_deref(), Some(Path::new("/c/conan/libfmt.so.10")));
    }

    #[test]
    fn test_decode_wrong_shape() {
        assert!(matches!(
            ResolverStrategy::Legacy.decode(Path::new("bin"), MODERN_JSON),
            Err(CopyLibsError::UnsupportedToolVersion(_))
        ));
        assert!(matches!(
            ResolverStrategy::Modern.decode(Path::new("bin"), LEGACY_JSON),
            Err(CopyLibsError::UnsupportedToolVersion(_))
        ));
    }

    #[test]
    fn test_resolve_nonexistent_binary() {
        let resolver = AuditwheelResolver::new("python3", ResolverStrategy::Modern);
        let err = resolver
            .resolve(Path::new("/nonexistent/path/to/binary"))
            .unwrap_err();
        assert!(matches!(err, CopyLibsError::BinaryAnalysis { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_decode_bad_path_is_analysis_error() {
        // Python writes undecodable path bytes as lone surrogate escapes.
        let json = r#"{"libraries": {"libx.so": {"soname": "libx.so", "path": null,
            "realpath": "/conan/\udcff.so", "platform": null, "needed": []}}}"#;
        let err = ResolverStrategy::Modern
            .decode(Path::new("bin/app"), json)
            .unwrap_err();
        match err {
            CopyLibsError::BinaryAnalysis { binary, .. } => {
                assert_eq!(binary, Path::new("bin/app"));
            }
            other => panic!("expected BinaryAnalysis, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_is_version_mismatch() {
        assert!(matches!(
            ResolverStrategy::Legacy.decode(Path::new("bin"), "not json"),
            Err(CopyLibsError::UnsupportedToolVersion(_))
        ));
    }

    #[test]
    fn test_resolve_through_interpreter() {
        let temp = TempDir::new().unwrap();
        let _guard = spawn_lock();
        let python = fake_python(
            temp.path(),
            &format!("cat <<'EOF'\n{}\nEOF", MODERN_JSON),
        );

        let resolver = AuditwheelResolver::new(python.to_str().unwrap(), ResolverStrategy::Modern);
        let libs = resolver.resolve(&python).unwrap();
        assert_eq!(libs.keys().collect::<Vec<_>>(), vec!["libfmt.so.10"]);
        assert_eq!(
            libs["libfmt.so.10"].realpath.as_deref(),
            Some(Path::new("/c/conan/libfmt.so.10.1.0"))
        );
    }

    #[test]
    fn test_resolve_legacy_through_interpreter() {
        let temp = TempDir::new().unwrap();
        let _guard = spawn_lock();
        let python = fake_python(
            temp.path(),
            &format!("cat <<'EOF'\n{}\nEOF", LEGACY_JSON),
        );

        let resolver = AuditwheelResolver::new(python.to_str().unwrap(), ResolverStrategy::Legacy);
        assert_eq!(resolver.strategy(), ResolverStrategy::Legacy);
        assert_eq!(resolver.resolve(&python).unwrap().len(), 3);
    }

    #[test]
    fn test_resolve_failure_reports_exception() {
        let temp = TempDir::new().unwrap();
        let _guard = spawn_lock();
        let python = fake_python(
            temp.path(),
            "echo 'Traceback (most recent call last):' >&2\n\
             echo 'ValueError: bad elf' >&2\n\
             exit 1",
        );

        let resolver = AuditwheelResolver::new(python.to_str().unwrap(), ResolverStrategy::Modern);
        match resolver.resolve(&python) {
            Err(CopyLibsError::BinaryAnalysis { binary, message }) => {
                assert_eq!(binary, python);
                assert_eq!(message, "ValueError: bad elf");
            }
            other => panic!("expected BinaryAnalysis, got {:?}", other),
        }
    }
}
