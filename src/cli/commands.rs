//! CLI command definitions for cog-forge.
//!
//! This module loads the build configuration, the runtime library and the
//! optional compatibility table, then writes the generated Dockerfile.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::config::{BuildConfig, PythonPackage};
use crate::docker::{Architecture, CompatibilityTable, DockerfileGenerator, RuntimeLibrary};

/// Default configuration file name.
const DEFAULT_CONFIG: &str = "cog.yaml";

/// Dockerfile generator for model-serving images.
#[derive(Parser)]
#[command(name = "cog-forge")]
#[command(about = "Generate Dockerfiles that serve machine-learning models")]
#[command(version)]
#[command(
    long_about = "cog-forge reads a cog.yaml build configuration and writes a Dockerfile for a CPU or GPU image.\n\nThe image serves the model over HTTP, as a Redis queue worker, and as an AI Platform prediction server.\n\nExample usage:\n  cog-forge dockerfile --config cog.yaml --arch gpu --runtime-lib ./cog.py --output Dockerfile"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a Dockerfile for a build configuration.
    #[command(alias = "gen")]
    Dockerfile(DockerfileArgs),

    /// Print the base image a build configuration resolves to.
    BaseImage(BaseImageArgs),
}

/// Arguments for `cog-forge dockerfile`.
#[derive(Parser, Debug)]
pub struct DockerfileArgs {
    /// Path to the build configuration.
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Target architecture: cpu or gpu.
    #[arg(short = 'a', long, default_value = "cpu")]
    pub arch: String,

    /// Runtime library embedded into the image.
    #[arg(long, env = "COG_RUNTIME_LIB")]
    pub runtime_lib: PathBuf,

    /// YAML compatibility table replacing the built-in one.
    #[arg(long)]
    pub compat_table: Option<PathBuf>,

    /// Write the Dockerfile here instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Output JSON with the architecture, base image and Dockerfile.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `cog-forge base-image`.
#[derive(Parser, Debug)]
pub struct BaseImageArgs {
    /// Path to the build configuration.
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Target architecture: cpu or gpu.
    #[arg(short = 'a', long, default_value = "gpu")]
    pub arch: String,

    /// YAML compatibility table replacing the built-in one.
    #[arg(long)]
    pub compat_table: Option<PathBuf>,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// JSON output of `cog-forge dockerfile --json`.
#[derive(Debug, Serialize)]
struct DockerfileSummary<'a> {
    arch: Architecture,
    base_image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dockerfile: Option<&'a str>,
}

/// Parse CLI arguments and return the Cli struct.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli())
}

/// Run the CLI with the parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Dockerfile(args) => run_dockerfile_command(args),
        Commands::BaseImage(args) => run_base_image_command(args),
    }
}

fn load_table(path: Option<&Path>) -> anyhow::Result<CompatibilityTable> {
    match path {
        Some(path) => CompatibilityTable::load(path)
            .with_context(|| format!("Failed to load compatibility table {}", path.display())),
        None => Ok(CompatibilityTable::builtin()),
    }
}

fn load_config(path: &Path) -> anyhow::Result<BuildConfig> {
    BuildConfig::load(path)
        .with_context(|| format!("Failed to load build configuration {}", path.display()))
}

fn run_dockerfile_command(args: DockerfileArgs) -> anyhow::Result<()> {
    let runtime = RuntimeLibrary::load(&args.runtime_lib).context("Failed to load runtime library")?;
    let config = load_config(&args.config)?;
    let table = load_table(args.compat_table.as_deref())?;

    let generator = DockerfileGenerator::for_arch(&config, &args.arch, &runtime)?
        .with_compatibility_table(&table);
    let base_image = generator.base_image()?;
    let dockerfile = generator
        .generate()
        .with_context(|| format!("Failed to generate {} Dockerfile", args.arch))?;

    if let Some(output) = &args.output {
        fs::write(output, &dockerfile)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!(
            output = %output.display(),
            arch = %generator.arch(),
            base_image = %base_image,
            "Wrote Dockerfile"
        );
    }

    if args.json {
        let summary = DockerfileSummary {
            arch: generator.arch(),
            base_image: &base_image,
            dockerfile: Some(&dockerfile),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if args.output.is_none() {
        write_dockerfile(&mut std::io::stdout().lock(), &dockerfile)?;
    }

    Ok(())
}

/// Write the document exactly as generated, without a trailing newline.
fn write_dockerfile(out: &mut impl Write, dockerfile: &str) -> anyhow::Result<()> {
    out.write_all(dockerfile.as_bytes())
        .context("Failed to write Dockerfile to stdout")?;
    out.flush()?;
    Ok(())
}

fn run_base_image_command(args: BaseImageArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let table = load_table(args.compat_table.as_deref())?;

    let arch: Architecture = args.arch.parse()?;
    let packages = config
        .python_packages()
        .iter()
        .map(|spec| PythonPackage::parse(spec))
        .collect::<Result<Vec<_>, _>>()?;
    let base_image = table.resolve_base_image(arch, &packages);

    if args.json {
        let summary = DockerfileSummary {
            arch,
            base_image: &base_image,
            dockerfile: None,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", base_image);
    }

    Ok(())
}
