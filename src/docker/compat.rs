//! Accelerated-library compatibility table and base image resolution.
//!
//! Accelerated numeric libraries ship wheels compiled against a specific
//! CUDA/cuDNN ABI, so the GPU base image must be picked from the pinned
//! library version at generation time. The table is plain data: the built-in
//! one covers known-good pairings and operators can load a fuller matrix
//! from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{normalize_name, PythonPackage};
use crate::docker::arch::Architecture;
use crate::error::ConfigError;

/// Base image for CPU builds.
pub const CPU_BASE_IMAGE: &str = "ubuntu:20.04";

/// Wheel index for PyTorch CPU/GPU builds.
pub const PYTORCH_STABLE_WHEELS: &str = "https://download.pytorch.org/whl/torch_stable.html";

/// Local version label selecting CPU-only wheels.
pub const CPU_LOCAL_VERSION: &str = "cpu";

/// A CUDA/cuDNN/Ubuntu combination published as an `nvidia/cuda` devel image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CudaImage {
    pub cuda: String,
    pub cudnn: String,
    pub ubuntu: String,
}

impl CudaImage {
    pub fn new(cuda: &str, cudnn: &str, ubuntu: &str) -> Self {
        Self {
            cuda: cuda.to_string(),
            cudnn: cudnn.to_string(),
            ubuntu: ubuntu.to_string(),
        }
    }

    /// Fully-qualified image reference.
    pub fn reference(&self) -> String {
        format!(
            "nvidia/cuda:{}-cudnn{}-devel-ubuntu{}",
            self.cuda, self.cudnn, self.ubuntu
        )
    }
}

/// A library that publishes separate CPU and GPU wheels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratedLibrary {
    pub name: String,
    /// Local version label appended on CPU builds, e.g. `cpu` for `1.5.1+cpu`.
    #[serde(default = "default_cpu_local_version")]
    pub cpu_local_version: String,
    /// Page passed to `pip install -f` on CPU builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_find_links: Option<String>,
    /// Index passed to `pip install --extra-index-url` on CPU builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_extra_index_url: Option<String>,
}

fn default_cpu_local_version() -> String {
    CPU_LOCAL_VERSION.to_string()
}

impl AcceleratedLibrary {
    fn pytorch(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cpu_local_version: default_cpu_local_version(),
            cpu_find_links: Some(PYTORCH_STABLE_WHEELS.to_string()),
            cpu_extra_index_url: None,
        }
    }
}

/// One row of the table: an exact library version and the image it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub library: String,
    pub version: String,
    pub image: CudaImage,
}

impl CompatibilityRule {
    fn matches(&self, package: &PythonPackage) -> bool {
        package.normalized_name() == normalize_name(&self.library) && package.version == self.version
    }
}

/// Mapping from accelerated-library versions to base images.
///
/// Rules are checked in order; the first rule matched by any pinned package
/// wins, and `default_gpu_image` applies when none match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityTable {
    #[serde(default = "default_cpu_image")]
    pub cpu_image: String,
    pub default_gpu_image: CudaImage,
    #[serde(default)]
    pub libraries: Vec<AcceleratedLibrary>,
    #[serde(default)]
    pub rules: Vec<CompatibilityRule>,
}

fn default_cpu_image() -> String {
    CPU_BASE_IMAGE.to_string()
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CompatibilityTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        let torch_1_5 = CudaImage::new("10.2", "8", "18.04");
        Self {
            cpu_image: default_cpu_image(),
            default_gpu_image: CudaImage::new("11.0", "8", "16.04"),
            libraries: vec![
                AcceleratedLibrary::pytorch("torch"),
                AcceleratedLibrary::pytorch("torchvision"),
                AcceleratedLibrary::pytorch("torchaudio"),
            ],
            rules: vec![
                CompatibilityRule {
                    library: "torch".to_string(),
                    version: "1.5.1".to_string(),
                    image: torch_1_5.clone(),
                },
                CompatibilityRule {
                    library: "torchvision".to_string(),
                    version: "0.6.1".to_string(),
                    image: torch_1_5,
                },
            ],
        }
    }

    /// Parse and validate a table from YAML.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let table: Self = serde_yaml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    /// Read, parse and validate a table file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_yaml(&content)?;
        debug!(
            path = %path.display(),
            libraries = table.libraries.len(),
            rules = table.rules.len(),
            "Loaded compatibility table"
        );
        Ok(table)
    }

    /// Check that every field is non-empty and every rule names a known library.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidCompatibilityTable(msg));

        if self.cpu_image.trim().is_empty() {
            return invalid("cpu_image is empty".to_string());
        }
        validate_image(&self.default_gpu_image, "default_gpu_image")?;

        for lib in &self.libraries {
            if lib.name.trim().is_empty() || lib.cpu_local_version.trim().is_empty() {
                return invalid(format!("library entry '{}' is incomplete", lib.name));
            }
        }

        for rule in &self.rules {
            if self.library(&rule.library).is_none() {
                return invalid(format!(
                    "rule for {}=={} names a library not listed in 'libraries'",
                    rule.library, rule.version
                ));
            }
            if rule.version.trim().is_empty() {
                return invalid(format!("rule for {} has an empty version", rule.library));
            }
            validate_image(&rule.image, &format!("{}=={}", rule.library, rule.version))?;
        }

        Ok(())
    }

    /// Look up an accelerated library by (normalised) name.
    pub fn library(&self, name: &str) -> Option<&AcceleratedLibrary> {
        let name = normalize_name(name);
        self.libraries
            .iter()
            .find(|lib| normalize_name(&lib.name) == name)
    }

    /// The first rule matched by any of `packages`, in rule order.
    pub fn matching_rule(&self, packages: &[PythonPackage]) -> Option<&CompatibilityRule> {
        self.rules
            .iter()
            .find(|rule| packages.iter().any(|pkg| rule.matches(pkg)))
    }

    /// Resolve the base image reference for an architecture and package set.
    pub fn resolve_base_image(&self, arch: Architecture, packages: &[PythonPackage]) -> String {
        match arch {
            Architecture::Cpu => self.cpu_image.clone(),
            Architecture::Gpu => match self.matching_rule(packages) {
                Some(rule) => {
                    debug!(
                        library = %rule.library,
                        version = %rule.version,
                        cuda = %rule.image.cuda,
                        "Selected GPU base image from compatibility table"
                    );
                    rule.image.reference()
                }
                None => self.default_gpu_image.reference(),
            },
        }
    }
}

fn validate_image(image: &CudaImage, what: &str) -> Result<(), ConfigError> {
    if image.cuda.trim().is_empty() || image.cudnn.trim().is_empty() || image.ubuntu.trim().is_empty() {
        return Err(ConfigError::InvalidCompatibilityTable(format!(
            "image for {} must set cuda, cudnn and ubuntu",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkgs(specs: &[&str]) -> Vec<PythonPackage> {
        specs.iter().map(|s| PythonPackage::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_cpu_always_uses_ubuntu() {
        let table = CompatibilityTable::builtin();
        assert_eq!(table.resolve_base_image(Architecture::Cpu, &[]), "ubuntu:20.04");
        assert_eq!(
            table.resolve_base_image(Architecture::Cpu, &pkgs(&["torch==1.5.1"])),
            "ubuntu:20.04"
        );
    }

    #[test]
    fn test_gpu_default_image() {
        let table = CompatibilityTable::builtin();
        assert_eq!(
            table.resolve_base_image(Architecture::Gpu, &[]),
            "nvidia/cuda:11.0-cudnn8-devel-ubuntu16.04"
        );
        assert_eq!(
            table.resolve_base_image(Architecture::Gpu, &pkgs(&["pandas==1.2.0.12"])),
            "nvidia/cuda:11.0-cudnn8-devel-ubuntu16.04"
        );
    }

    #[test]
    fn test_gpu_image_for_known_torch_version() {
        let table = CompatibilityTable::builtin();
        assert_eq!(
            table.resolve_base_image(
                Architecture::Gpu,
                &pkgs(&["pandas==1.2.0.12", "torch==1.5.1"])
            ),
            "nvidia/cuda:10.2-cudnn8-devel-ubuntu18.04"
        );
        assert_eq!(
            table.resolve_base_image(Architecture::Gpu, &pkgs(&["Torch==1.5.1"])),
            "nvidia/cuda:10.2-cudnn8-devel-ubuntu18.04"
        );
    }

    #[test]
    fn test_unknown_torch_version_falls_back_to_default() {
        let table = CompatibilityTable::builtin();
        assert_eq!(
            table.resolve_base_image(Architecture::Gpu, &pkgs(&["torch==0.4.0"])),
            "nvidia/cuda:11.0-cudnn8-devel-ubuntu16.04"
        );
    }

    #[test]
    fn test_rule_order_decides_between_matches() {
        let yaml = r#"
default_gpu_image: { cuda: "11.0", cudnn: "8", ubuntu: "16.04" }
libraries:
  - name: torch
    cpu_find_links: https://download.pytorch.org/whl/torch_stable.html
  - name: tensorflow
rules:
  - library: tensorflow
    version: "2.4.0"
    image: { cuda: "11.0", cudnn: "8", ubuntu: "18.04" }
  - library: torch
    version: "1.7.1"
    image: { cuda: "11.0", cudnn: "8", ubuntu: "20.04" }
"#;
        let table = CompatibilityTable::from_yaml(yaml).unwrap();
        assert_eq!(table.cpu_image, "ubuntu:20.04");
        assert_eq!(table.library("tensorflow").unwrap().cpu_local_version, "cpu");

        let packages = pkgs(&["torch==1.7.1", "tensorflow==2.4.0"]);
        assert_eq!(
            table.resolve_base_image(Architecture::Gpu, &packages),
            "nvidia/cuda:11.0-cudnn8-devel-ubuntu18.04"
        );
    }

    #[test]
    fn test_table_validation() {
        let unknown_library = r#"
default_gpu_image: { cuda: "11.0", cudnn: "8", ubuntu: "16.04" }
rules:
  - library: torch
    version: "1.5.1"
    image: { cuda: "10.2", cudnn: "8", ubuntu: "18.04" }
"#;
        assert!(matches!(
            CompatibilityTable::from_yaml(unknown_library),
            Err(ConfigError::InvalidCompatibilityTable(_))
        ));

        let empty_cuda = r#"
default_gpu_image: { cuda: "", cudnn: "8", ubuntu: "16.04" }
"#;
        assert!(matches!(
            CompatibilityTable::from_yaml(empty_cuda),
            Err(ConfigError::InvalidCompatibilityTable(_))
        ));

        assert!(CompatibilityTable::builtin().validate().is_ok());
    }

    #[test]
    fn test_load_table_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compat.yaml");
        let yaml = serde_yaml::to_string(&CompatibilityTable::builtin()).unwrap();
        std::fs::write(&path, yaml).unwrap();

        let table = CompatibilityTable::load(&path).unwrap();
        assert_eq!(table, CompatibilityTable::builtin());
    }
}
