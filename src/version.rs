//! auditwheel version detection and comparison.

use std::cmp::Ordering;
use std::fmt;
use std::process::Command;

use log::debug;

use crate::error::{CopyLibsError, Result};

const PROBE_SCRIPT: &str = r#"
import sys
from importlib.util import find_spec
from importlib.metadata import version
if find_spec("auditwheel") is None:
    sys.stderr.write("auditwheel is not installed!\n")
    sys.exit(3)
print(version("auditwheel"))
"#;

/// Numeric release version (`major.minor.patch`, extra components kept).
///
/// Pre/post-release suffixes are ignored: `6.4.0.post1` and `7.0.0rc1` compare
/// as `6.4.0.0` and `7.0.0`.
#[derive(Debug, Clone, Eq)]
pub struct ToolVersion {
    parts: Vec<u64>,
}

impl ToolVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            parts: vec![major, minor, patch],
        }
    }

    /// Parse a version string as reported by `importlib.metadata`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut parts = Vec::new();

        for component in raw.split('.') {
            let digits: String = component.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            let value = digits
                .parse::<u64>()
                .map_err(|_| CopyLibsError::UnsupportedToolVersion(raw.to_string()))?;
            parts.push(value);
            // "0rc1" ends the release segment
            if digits.len() != component.len() {
                break;
            }
        }

        if parts.is_empty() {
            return Err(CopyLibsError::UnsupportedToolVersion(format!(
                "cannot parse version {:?}",
                raw
            )));
        }
        Ok(Self { parts })
    }

    fn part(&self, idx: usize) -> u64 {
        self.parts.get(idx).copied().unwrap_or(0)
    }
}

impl PartialEq for ToolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for ToolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.part(i).cmp(&other.part(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ToolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        write!(f, "{}", joined.join("."))
    }
}

/// Ask `python` which auditwheel version is installed.
///
/// # Errors
///
/// Returns `DependencyUnavailable` if the interpreter cannot be started or
/// auditwheel is not importable.
pub fn probe_auditwheel_version(python: &str) -> Result<String> {
    debug!("Probing auditwheel version with {}", python);

    let output = Command::new(python)
        .args(["-c", PROBE_SCRIPT])
        .output()
        .map_err(|e| {
            CopyLibsError::DependencyUnavailable(format!("cannot run {}: {}", python, e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CopyLibsError::DependencyUnavailable(
            last_line(&stderr).unwrap_or("probe failed").to_string(),
        ));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if version.is_empty() {
        return Err(CopyLibsError::UnsupportedToolVersion(
            "empty version string".to_string(),
        ));
    }
    Ok(version)
}

/// Last non-empty line, which for a Python traceback is the exception itself.
pub(crate) fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}
