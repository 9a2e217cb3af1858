//! Error types for cog-forge operations.
//!
//! Defines the error types for each stage of Dockerfile synthesis:
//! - Configuration loading, validation and completion
//! - Loading the embedded runtime library
//! - Dockerfile generation (base-image resolution, text emission and
//!   defensive input checks)

use thiserror::Error;

/// Errors that can occur while loading or validating a build configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid entry point '{0}': expected '<file>.py:<Class>' or '<module>:<Class>'")]
    InvalidEntryPoint(String),

    #[error("Invalid Python package '{0}': expected '<name>==<version>'")]
    InvalidPythonPackage(String),

    #[error("Invalid system package name '{0}'")]
    InvalidSystemPackage(String),

    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidField { field: String, value: String },

    #[error("Invalid Python version '{0}'")]
    InvalidPythonVersion(String),

    #[error("Unsupported architecture '{0}': must be 'cpu' or 'gpu'")]
    UnsupportedArchitecture(String),

    #[error("Invalid compatibility table: {0}")]
    InvalidCompatibilityTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while loading the runtime library blob.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Runtime library not found at '{0}'")]
    NotFound(String),

    #[error("Runtime library at '{0}' is empty")]
    Empty(String),

    #[error("Failed to read runtime library '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during Dockerfile generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Failed to render {step}: {source}")]
    Template {
        step: String,
        #[source]
        source: tera::Error,
    },

    #[error("Failed to resolve base image: {0}")]
    BaseImage(#[source] ConfigError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
