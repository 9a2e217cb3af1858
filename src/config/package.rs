//! Python package specifiers and system package names.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;

fn pin_pattern() -> &'static Regex {
    static PIN: OnceLock<Regex> = OnceLock::new();
    PIN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)==([A-Za-z0-9][A-Za-z0-9.+!_-]*)$")
            .expect("pin pattern is a valid regex")
    })
}

/// A pinned Python package, `name==version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonPackage {
    pub name: String,
    pub version: String,
}

impl PythonPackage {
    /// Parse a `name==version` specifier.
    pub fn parse(specifier: &str) -> Result<Self, ConfigError> {
        let caps = pin_pattern()
            .captures(specifier.trim())
            .ok_or_else(|| ConfigError::InvalidPythonPackage(specifier.to_string()))?;
        Ok(Self {
            name: caps[1].to_string(),
            version: caps[2].to_string(),
        })
    }

    /// Package name in PEP 503 normalised form, for table lookups.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Returns a copy whose local version label is `label`, replacing any
    /// label already present (`1.5.1+cu101` becomes `1.5.1+cpu`).
    pub fn with_local_version(&self, label: &str) -> Self {
        let public = self
            .version
            .split_once('+')
            .map_or(self.version.as_str(), |(public, _)| public);
        Self {
            name: self.name.clone(),
            version: format!("{}+{}", public, label),
        }
    }
}

impl fmt::Display for PythonPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// Lowercase a package name and collapse runs of `-`, `_` and `.` into `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}

/// Validate a system package name to prevent command injection.
///
/// Package names must only contain alphanumeric characters, hyphens, underscores,
/// periods, colons (for architecture qualifiers), equals signs (for version pins)
/// and plus signs. Shell metacharacters are rejected.
pub fn is_valid_system_package(package: &str) -> bool {
    if package.is_empty() {
        return false;
    }
    package
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '='))
}
