//! Build configuration for model-serving images.
//!
//! This module loads `cog.yaml`, validates it, and completes it with defaults
//! so the Dockerfile generator can consume it without re-checking syntax.

pub mod entry_point;
pub mod model;
pub mod package;

pub use entry_point::EntryPoint;
pub use model::{BuildConfig, ConfigDefaults, Environment, DEFAULT_PYTHON_VERSION};
pub use package::{is_valid_system_package, normalize_name, PythonPackage};
