//! Parsing of the `model` entry point reference.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The user's model implementation, e.g. `infer.py:Model`.
///
/// The file part may be a path (`models/infer.py`) or a dotted module
/// (`models.infer`); both resolve to the importable module `models.infer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    module: String,
    class: String,
}

impl EntryPoint {
    /// Importable Python module, e.g. `infer`.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Class name within the module, e.g. `Model`.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The import line the wrapper scripts use.
    pub fn import_statement(&self) -> String {
        format!("from {} import {}", self.module, self.class)
    }
}

impl FromStr for EntryPoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidEntryPoint(s.to_string());

        let (file, class) = s.trim().split_once(':').ok_or_else(invalid)?;
        let file = file.strip_prefix("./").unwrap_or(file);
        let file = file.strip_suffix(".py").unwrap_or(file);
        let module = file.replace('/', ".");

        if !module.split('.').all(is_identifier) || !is_identifier(class) {
            return Err(invalid());
        }

        Ok(Self {
            module,
            class: class.to_string(),
        })
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.class)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
