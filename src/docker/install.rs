//! Installer blocks: Python toolchain, system packages, Python packages and
//! the serving runtime.
//!
//! Each emitter returns one block of Dockerfile text without a trailing
//! newline. Emitters for optional steps return `None` when there is nothing
//! to install, so the document never contains an argument-less install.

use tera::Context;
use tracing::debug;

use crate::config::PythonPackage;
use crate::docker::arch::Architecture;
use crate::docker::compat::CompatibilityTable;
use crate::docker::runtime::{
    RuntimeLibrary, RUNTIME_DEPENDENCIES, RUNTIME_FILE_NAME, RUNTIME_INSTALL_DIR,
};
use crate::docker::templates;
use crate::error::GenerateError;

/// Install the requested interpreter through pyenv. Identical for every architecture.
pub fn install_python(version: &str) -> Result<String, GenerateError> {
    let mut context = Context::new();
    context.insert("version", version);
    templates::render("python toolchain", templates::PYTHON_TOOLCHAIN, &context)
}

/// Install OS packages in the given order, or nothing if there are none.
pub fn install_system_packages(packages: &[String]) -> Result<Option<String>, GenerateError> {
    if packages.is_empty() {
        return Ok(None);
    }
    let mut context = Context::new();
    context.insert("packages", &packages.join(" "));
    templates::render("system packages", templates::SYSTEM_PACKAGES, &context).map(Some)
}

/// Extra pip arguments needed to reach CPU builds of accelerated libraries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipIndexArgs {
    pub find_links: Vec<String>,
    pub extra_index_urls: Vec<String>,
}

impl PipIndexArgs {
    fn add_find_links(&mut self, url: &str) {
        if !self.find_links.iter().any(|u| u == url) {
            self.find_links.push(url.to_string());
        }
    }

    fn add_extra_index_url(&mut self, url: &str) {
        if !self.extra_index_urls.iter().any(|u| u == url) {
            self.extra_index_urls.push(url.to_string());
        }
    }

    /// `-f <url> ` per find-links page.
    pub fn find_links_flags(&self) -> String {
        self.find_links.iter().map(|u| format!("-f {} ", u)).collect()
    }

    /// `--extra-index-url <url> ` per extra index.
    pub fn extra_index_flags(&self) -> String {
        self.extra_index_urls
            .iter()
            .map(|u| format!("--extra-index-url {} ", u))
            .collect()
    }
}

/// Rewrite pinned packages for `arch`.
///
/// On CPU, accelerated libraries get their CPU local version label and
/// contribute their wheel index to the returned arguments. On GPU, packages
/// pass through unchanged and no index arguments are added. Order is kept.
pub fn packages_for_arch(
    packages: &[PythonPackage],
    arch: Architecture,
    table: &CompatibilityTable,
) -> (Vec<PythonPackage>, PipIndexArgs) {
    let mut index_args = PipIndexArgs::default();
    if arch == Architecture::Gpu {
        return (packages.to_vec(), index_args);
    }

    let rewritten = packages
        .iter()
        .map(|pkg| match table.library(&pkg.name) {
            Some(lib) => {
                if let Some(url) = &lib.cpu_find_links {
                    index_args.add_find_links(url);
                }
                if let Some(url) = &lib.cpu_extra_index_url {
                    index_args.add_extra_index_url(url);
                }
                let cpu = pkg.with_local_version(&lib.cpu_local_version);
                debug!(from = %pkg, to = %cpu, "Rewrote accelerated package for CPU");
                cpu
            }
            None => pkg.clone(),
        })
        .collect();

    (rewritten, index_args)
}

/// Install the requirements file (if any), then the pinned packages (if any).
pub fn install_python_packages(
    requirements: Option<&str>,
    packages: &[PythonPackage],
    arch: Architecture,
    table: &CompatibilityTable,
) -> Result<Option<String>, GenerateError> {
    let mut blocks = Vec::new();

    if let Some(requirements) = requirements {
        let mut context = Context::new();
        context.insert("requirements", requirements);
        blocks.push(templates::render(
            "python requirements",
            templates::PYTHON_REQUIREMENTS,
            &context,
        )?);
    }

    if !packages.is_empty() {
        let (packages, index_args) = packages_for_arch(packages, arch, table);
        let specifiers: Vec<String> = packages.iter().map(ToString::to_string).collect();

        let mut context = Context::new();
        context.insert("find_links", &index_args.find_links_flags());
        context.insert("extra_index_urls", &index_args.extra_index_flags());
        context.insert("packages", &specifiers.join(" "));
        blocks.push(templates::render(
            "python packages",
            templates::PYTHON_PACKAGES,
            &context,
        )?);
    }

    if blocks.is_empty() {
        Ok(None)
    } else {
        Ok(Some(blocks.join("\n")))
    }
}

/// Install the serving dependencies and write the runtime library into the image.
pub fn install_runtime(library: &RuntimeLibrary) -> Result<String, GenerateError> {
    let mut context = Context::new();
    context.insert("dependencies", &RUNTIME_DEPENDENCIES.join(" "));
    context.insert("install_dir", RUNTIME_INSTALL_DIR);
    context.insert("file_name", RUNTIME_FILE_NAME);
    context.insert("library_b64", library.base64());
    templates::render("runtime library", templates::RUNTIME_LIBRARY, &context)
}
