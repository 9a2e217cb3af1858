//! Command-line interface for cog-forge.
//!
//! Provides commands for generating Dockerfiles and inspecting base image
//! resolution.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
