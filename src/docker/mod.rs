//! Dockerfile synthesis for model-serving images.
//!
//! This module turns a validated [`BuildConfig`](crate::config::BuildConfig)
//! and a target [`Architecture`] into Dockerfile text: base image resolution
//! against the accelerated-library compatibility table, installer blocks,
//! the embedded runtime library, and the serving wrapper scripts.

pub mod arch;
pub mod compat;
pub mod generator;
pub mod install;
pub mod runtime;
pub mod scripts;
pub mod templates;

pub use arch::Architecture;
pub use compat::{
    AcceleratedLibrary, CompatibilityRule, CompatibilityTable, CudaImage, CPU_BASE_IMAGE,
    PYTORCH_STABLE_WHEELS,
};
pub use generator::{generate, DockerfileGenerator};
pub use install::{
    install_python, install_python_packages, install_runtime, install_system_packages,
    packages_for_arch, PipIndexArgs,
};
pub use runtime::{RuntimeLibrary, RUNTIME_DEPENDENCIES, RUNTIME_INSTALL_DIR};
pub use scripts::{emit_server_script, emit_server_scripts, ServeMode, CODE_DIR};
