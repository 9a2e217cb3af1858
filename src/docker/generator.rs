//! Dockerfile assembly.
//!
//! The generator resolves the base image once, then concatenates the
//! installer blocks in a fixed order. Output depends only on the
//! configuration, the architecture, the compatibility table and the runtime
//! library; generating twice yields identical text.

use std::sync::OnceLock;

use tera::Context;
use tracing::debug;

use crate::config::{BuildConfig, PythonPackage};
use crate::docker::arch::Architecture;
use crate::docker::compat::CompatibilityTable;
use crate::docker::install::{
    install_python, install_python_packages, install_runtime, install_system_packages,
};
use crate::docker::runtime::RuntimeLibrary;
use crate::docker::scripts::{emit_server_scripts, ServeMode, CODE_DIR};
use crate::docker::templates;
use crate::error::GenerateError;

fn builtin_table() -> &'static CompatibilityTable {
    static TABLE: OnceLock<CompatibilityTable> = OnceLock::new();
    TABLE.get_or_init(CompatibilityTable::builtin)
}

/// Generates the Dockerfile for one configuration and architecture.
#[derive(Debug, Clone)]
pub struct DockerfileGenerator<'a> {
    config: &'a BuildConfig,
    arch: Architecture,
    runtime: &'a RuntimeLibrary,
    table: &'a CompatibilityTable,
}

impl<'a> DockerfileGenerator<'a> {
    /// Create a generator using the built-in compatibility table.
    pub fn new(config: &'a BuildConfig, arch: Architecture, runtime: &'a RuntimeLibrary) -> Self {
        Self {
            config,
            arch,
            runtime,
            table: builtin_table(),
        }
    }

    /// Create a generator from an architecture name (`cpu` or `gpu`).
    pub fn for_arch(
        config: &'a BuildConfig,
        arch: &str,
        runtime: &'a RuntimeLibrary,
    ) -> Result<Self, GenerateError> {
        Ok(Self::new(config, arch.parse()?, runtime))
    }

    /// Use `table` instead of the built-in compatibility table.
    pub fn with_compatibility_table(mut self, table: &'a CompatibilityTable) -> Self {
        self.table = table;
        self
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    fn python_packages(&self) -> Result<Vec<PythonPackage>, GenerateError> {
        self.config
            .python_packages()
            .iter()
            .map(|spec| PythonPackage::parse(spec).map_err(GenerateError::BaseImage))
            .collect()
    }

    /// The base image reference this configuration resolves to.
    pub fn base_image(&self) -> Result<String, GenerateError> {
        let packages = self.python_packages()?;
        Ok(self.table.resolve_base_image(self.arch, &packages))
    }

    /// Generate the full Dockerfile text.
    pub fn generate(&self) -> Result<String, GenerateError> {
        let entry_point = self.config.entry_point()?;
        let packages = self.python_packages()?;
        let base_image = self.table.resolve_base_image(self.arch, &packages);
        debug!(arch = %self.arch, base_image = %base_image, "Resolved base image");

        let mut blocks = Vec::new();

        let mut context = Context::new();
        context.insert("image", &base_image);
        blocks.push(templates::render("base image", templates::FROM, &context)?);
        blocks.push(templates::ENVIRONMENT.to_string());

        blocks.push(install_python(self.config.python_version())?);

        if let Some(block) = install_system_packages(self.config.system_packages())? {
            blocks.push(block);
        }
        if let Some(block) = install_python_packages(
            self.config.python_requirements(),
            &packages,
            self.arch,
            self.table,
        )? {
            blocks.push(block);
        }

        blocks.push(install_runtime(self.runtime)?);

        let mut context = Context::new();
        context.insert("code_dir", CODE_DIR);
        blocks.push(templates::render("code copy", templates::COPY_CODE, &context)?);
        blocks.push(String::new());

        blocks.push(emit_server_scripts(&entry_point)?);

        context.insert("command", ServeMode::Http.script_path());
        blocks.push(templates::render("epilogue", templates::EPILOGUE, &context)?);

        let dockerfile = blocks.join("\n");
        debug!(arch = %self.arch, bytes = dockerfile.len(), "Generated Dockerfile");
        Ok(dockerfile)
    }
}

/// Generate a Dockerfile with the built-in compatibility table.
pub fn generate(
    config: &BuildConfig,
    arch: Architecture,
    runtime: &RuntimeLibrary,
) -> Result<String, GenerateError> {
    DockerfileGenerator::new(config, arch, runtime).generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn runtime() -> RuntimeLibrary {
        RuntimeLibrary::from_bytes(b"print('cog')\n".to_vec())
    }

    fn config(yaml: &str) -> BuildConfig {
        let mut config = BuildConfig::from_yaml(yaml).unwrap();
        config.validate_and_complete().unwrap();
        config
    }

    #[test]
    fn test_generate_minimal_structure() {
        let config = config("model: infer.py:Model\n");
        let lib = runtime();
        let dockerfile = generate(&config, Architecture::Cpu, &lib).unwrap();

        assert!(dockerfile.starts_with("FROM ubuntu:20.04\nENV DEBIAN_FRONTEND=noninteractive\n"));
        assert!(dockerfile.contains("RUN ### --> Installing Python 3.8\n"));
        assert!(!dockerfile.contains("Installing system packages"));
        assert!(!dockerfile.contains("apt-get update -qq"));
        assert!(!dockerfile.contains("Installing Python packages"));
        assert!(!dockerfile.contains("Installing Python requirements"));
        assert!(dockerfile.contains("RUN ### --> Copying code\nCOPY . /code\n\nRUN echo "));
        assert!(dockerfile.ends_with("\nWORKDIR /code\nCMD /usr/bin/cog-http-server"));
    }

    #[test]
    fn test_block_order() {
        let config = config(
            "model: infer.py:Model\nenvironment:\n  python_requirements: r.txt\n  python_packages: [numpy==1.19.5]\n  system_packages: [ffmpeg]\n",
        );
        let lib = runtime();
        let dockerfile = generate(&config, Architecture::Gpu, &lib).unwrap();

        let order = [
            "FROM ",
            "ENV DEBIAN_FRONTEND",
            "Installing Python prerequisites",
            "Installing system packages",
            "Installing Python requirements",
            "Installing Python packages",
            "Installing Cog",
            "Copying code",
            "/usr/bin/cog-http-server\nRUN chmod",
            "WORKDIR /code",
            "CMD /usr/bin/cog-http-server",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|marker| dockerfile.find(marker).unwrap_or_else(|| panic!("missing {marker}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    }

    #[test]
    fn test_python_packages_without_system_packages() {
        let config = config("model: infer.py:Model\nenvironment:\n  python_packages: [pandas==1.2.0.12]\n");
        let lib = runtime();
        let dockerfile = generate(&config, Architecture::Cpu, &lib).unwrap();

        assert!(!dockerfile.contains("Installing system packages"));
        assert!(dockerfile.contains(
            "pyenv install-latest --print \"3.8\")\nRUN ### --> Installing Python packages\nRUN pip install   pandas==1.2.0.12\nRUN ### --> Installing Cog"
        ));
    }

    #[test]
    fn test_unknown_architecture_is_a_config_error() {
        let config = config("model: infer.py:Model\n");
        let lib = runtime();
        let result = DockerfileGenerator::for_arch(&config, "tpu", &lib);
        assert!(matches!(
            result,
            Err(GenerateError::Config(ConfigError::UnsupportedArchitecture(_)))
        ));
    }

    #[test]
    fn test_malformed_entry_point_is_a_config_error() {
        let config = BuildConfig::new("not-an-entry-point");
        let lib = runtime();
        assert!(matches!(
            generate(&config, Architecture::Cpu, &lib),
            Err(GenerateError::Config(ConfigError::InvalidEntryPoint(_)))
        ));
    }

    #[test]
    fn test_unpinned_package_fails_base_image_resolution() {
        let mut config = BuildConfig::new("infer.py:Model");
        config.environment.python_packages = vec!["torch>=1.5".to_string()];
        let lib = runtime();

        let generator = DockerfileGenerator::new(&config, Architecture::Gpu, &lib);
        assert!(matches!(
            generator.base_image(),
            Err(GenerateError::BaseImage(ConfigError::InvalidPythonPackage(_)))
        ));
        let err = generator.generate().unwrap_err();
        assert!(matches!(err, GenerateError::BaseImage(_)));
        assert!(err.to_string().starts_with("Failed to resolve base image: "));
    }

    #[test]
    fn test_custom_compatibility_table() {
        let table = CompatibilityTable::from_yaml(
            r#"
cpu_image: ubuntu:22.04
default_gpu_image: { cuda: "11.8.0", cudnn: "8", ubuntu: "22.04" }
"#,
        )
        .unwrap();
        let config = config("model: infer.py:Model\nenvironment:\n  python_packages: [torch==1.5.1]\n");
        let lib = runtime();

        let cpu = DockerfileGenerator::new(&config, Architecture::Cpu, &lib)
            .with_compatibility_table(&table);
        assert_eq!(cpu.base_image().unwrap(), "ubuntu:22.04");
        // torch is not an accelerated library in this table, so no rewrite.
        assert!(cpu.generate().unwrap().contains("RUN pip install   torch==1.5.1\n"));

        let gpu = DockerfileGenerator::new(&config, Architecture::Gpu, &lib)
            .with_compatibility_table(&table);
        assert_eq!(
            gpu.base_image().unwrap(),
            "nvidia/cuda:11.8.0-cudnn8-devel-ubuntu22.04"
        );
    }
}
