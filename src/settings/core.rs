//! Core Settings struct and accessors.

use super::{Arch, InstallerOptions};
use std::path::{Path, PathBuf};

/// Main settings for one installer build target.
///
/// Central configuration for the orchestrator, constructed via
/// [`super::SettingsBuilder`]. Contains application metadata, the validated
/// installer options, and the directories the build reads from and writes
/// to.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Application metadata.
    package: PackageSettings,

    /// Validated installer options.
    installer: InstallerOptions,

    /// Architectures requested for this target, in request order.
    archs: Vec<Arch>,

    /// Directory containing license files, images, and custom resources.
    build_resources_dir: PathBuf,

    /// Output directory for artifacts. Append-only: one file per artifact,
    /// never mutated in place by another build.
    output_dir: PathBuf,

    /// Command template used to sign binaries (`%1` replaced by the path).
    ///
    /// None means signing is not configured and is a no-op.
    sign_command: Option<String>,

    /// Command prefix used to run Windows binaries through a VM when the
    /// emulation layer is unavailable or fails.
    vm_command: Option<String>,

    /// Verbose build diagnostics. Explicit field, not ambient state.
    debug_logging: bool,
}

/// Application metadata carried into the generated installer.
#[derive(Clone, Debug, Default)]
pub struct PackageSettings {
    /// Human-readable product name.
    pub product_name: String,
    /// Reverse-domain application identifier (e.g. `com.example.app`).
    pub app_id: String,
    /// Version string.
    pub version: String,
    /// Short description shown in the uninstall registry entry.
    pub description: String,
    /// Company/publisher name.
    pub company_name: Option<String>,
}

impl Settings {
    pub(super) fn new(
        package: PackageSettings,
        installer: InstallerOptions,
        archs: Vec<Arch>,
        build_resources_dir: PathBuf,
        output_dir: PathBuf,
        sign_command: Option<String>,
        vm_command: Option<String>,
        debug_logging: bool,
    ) -> Self {
        Self {
            package,
            installer,
            archs,
            build_resources_dir,
            output_dir,
            sign_command,
            vm_command,
            debug_logging,
        }
    }

    /// Returns the product name.
    pub fn product_name(&self) -> &str {
        &self.package.product_name
    }

    /// Returns the application identifier.
    pub fn app_id(&self) -> &str {
        &self.package.app_id
    }

    /// Returns the version string.
    pub fn version(&self) -> &str {
        &self.package.version
    }

    /// Returns the package description.
    pub fn description(&self) -> &str {
        &self.package.description
    }

    /// Returns the company name, if configured.
    pub fn company_name(&self) -> Option<&str> {
        self.package.company_name.as_deref()
    }

    /// Returns the product name with filesystem-hostile characters
    /// replaced, for use in file names and registry-safe defines.
    pub fn app_package_name(&self) -> String {
        self.package
            .product_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
                c => c,
            })
            .collect()
    }

    /// Returns the validated installer options.
    pub fn installer(&self) -> &InstallerOptions {
        &self.installer
    }

    /// Returns the requested architectures in request order.
    pub fn archs(&self) -> &[Arch] {
        &self.archs
    }

    /// Returns the build resources directory.
    pub fn build_resources_dir(&self) -> &Path {
        &self.build_resources_dir
    }

    /// Returns the artifact output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the sign command template, if signing is configured.
    pub fn sign_command(&self) -> Option<&str> {
        self.sign_command.as_deref()
    }

    /// Returns the VM command prefix for the materialization fallback.
    pub fn vm_command(&self) -> Option<&str> {
        self.vm_command.as_deref()
    }

    /// Returns whether verbose build diagnostics are enabled.
    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }
}

#[cfg(test)]
mod tests {
    use super::super::SettingsBuilder;
    use super::*;

    #[test]
    fn app_package_name_strips_hostile_characters() {
        let settings = SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "My App: The \"Sequel\"".into(),
                app_id: "com.example.sequel".into(),
                version: "1.0.0".into(),
                description: "test".into(),
                company_name: None,
            })
            .archs(vec![Arch::X64])
            .output_dir("dist")
            .build()
            .unwrap();
        assert_eq!(settings.app_package_name(), "My App- The -Sequel-");
    }
}
