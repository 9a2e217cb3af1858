//! cog-forge: Dockerfile synthesis for machine-learning model serving.
//!
//! This library turns a `cog.yaml` build configuration into a reproducible
//! Dockerfile for CPU or GPU images that serve the model over HTTP, a Redis
//! queue worker, and the AI Platform prediction protocol.

pub mod cli;
pub mod config;
pub mod docker;
pub mod error;

// Re-export commonly used types
pub use config::BuildConfig;
pub use docker::{Architecture, CompatibilityTable, DockerfileGenerator, RuntimeLibrary};
pub use error::{ConfigError, GenerateError, ResourceError};
