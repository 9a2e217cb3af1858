//! The `cog.yaml` build configuration model.
//!
//! A [`BuildConfig`] is loaded from YAML, then validated and completed once
//! with [`BuildConfig::validate_and_complete`]. After that the Dockerfile
//! generator treats it as read-only, well-formed input.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::entry_point::EntryPoint;
use crate::config::package::{is_valid_system_package, PythonPackage};
use crate::error::ConfigError;

/// Python version used when the configuration does not name one.
pub const DEFAULT_PYTHON_VERSION: &str = "3.8";

fn python_version_pattern() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| {
        Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("python version pattern is a valid regex")
    })
}

/// Defaults applied to a configuration during completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDefaults {
    /// Python version installed when `environment.python_version` is absent.
    pub python_version: String,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            python_version: DEFAULT_PYTHON_VERSION.to_string(),
        }
    }
}

/// Build environment: interpreter version and dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Python version, e.g. "3.8" (latest patch) or "3.8.10".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    /// Path to a requirements file, relative to the build context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_requirements: Option<String>,
    /// Pinned `name==version` Python packages, installed in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub python_packages: Vec<String>,
    /// OS packages installed with apt-get, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_packages: Vec<String>,
}

/// A model-serving build configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Entry point reference, e.g. `infer.py:Model`.
    #[serde(rename = "model", default)]
    pub entry_point: String,
    #[serde(default)]
    pub environment: Environment,
}

impl BuildConfig {
    /// Create a configuration for the given entry point with an empty environment.
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            environment: Environment::default(),
        }
    }

    /// Parse a configuration from YAML text. The result is not yet validated.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read, parse, validate and complete a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.validate_and_complete()?;
        debug!(path = %path.display(), entry_point = %config.entry_point, "Loaded build configuration");
        Ok(config)
    }

    /// Validate every field and fill in defaults.
    pub fn validate_and_complete(&mut self) -> Result<(), ConfigError> {
        self.validate_and_complete_with(&ConfigDefaults::default())
    }

    /// Validate every field and fill in the given defaults.
    pub fn validate_and_complete_with(&mut self, defaults: &ConfigDefaults) -> Result<(), ConfigError> {
        if self.entry_point.trim().is_empty() {
            return Err(ConfigError::MissingField("model".to_string()));
        }
        self.entry_point()?;

        let env = &mut self.environment;
        let version = env
            .python_version
            .get_or_insert_with(|| defaults.python_version.clone());
        if !python_version_pattern().is_match(version) {
            return Err(ConfigError::InvalidPythonVersion(version.clone()));
        }

        if let Some(requirements) = &env.python_requirements {
            if requirements.trim().is_empty() || requirements.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidField {
                    field: "environment.python_requirements".to_string(),
                    value: requirements.clone(),
                });
            }
        }

        for spec in &env.python_packages {
            PythonPackage::parse(spec)?;
        }

        if let Some(bad) = env
            .system_packages
            .iter()
            .find(|p| !is_valid_system_package(p))
        {
            return Err(ConfigError::InvalidSystemPackage(bad.clone()));
        }

        Ok(())
    }

    /// The parsed entry point.
    pub fn entry_point(&self) -> Result<EntryPoint, ConfigError> {
        self.entry_point.parse()
    }

    /// Python version to install; the default if the configuration was never completed.
    pub fn python_version(&self) -> &str {
        self.environment
            .python_version
            .as_deref()
            .unwrap_or(DEFAULT_PYTHON_VERSION)
    }

    pub fn python_requirements(&self) -> Option<&str> {
        self.environment.python_requirements.as_deref()
    }

    pub fn python_packages(&self) -> &[String] {
        &self.environment.python_packages
    }

    pub fn system_packages(&self) -> &[String] {
        &self.environment.system_packages
    }
}
