//! Builder for constructing [`Settings`].

use super::core::PackageSettings;
use super::raw::RawInstallerOptions;
use super::{Arch, InstallerOptions, Settings};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Fluent builder for [`Settings`].
///
/// Installer options can be supplied either already validated
/// ([`SettingsBuilder::installer_options`]) or as a raw document
/// ([`SettingsBuilder::raw_installer_options`]), in which case validation
/// happens in [`SettingsBuilder::build`], so configuration errors surface
/// before anything touches the filesystem.
///
/// # Examples
///
/// ```
/// use setupforge::settings::{Arch, PackageSettings, SettingsBuilder};
///
/// # fn example() -> setupforge::Result<()> {
/// let settings = SettingsBuilder::new()
///     .package_settings(PackageSettings {
///         product_name: "My App".into(),
///         app_id: "com.example.myapp".into(),
///         version: "1.2.3".into(),
///         description: "My application".into(),
///         company_name: None,
///     })
///     .archs(vec![Arch::X64, Arch::Arm64])
///     .output_dir("dist")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    package: Option<PackageSettings>,
    installer: Option<InstallerOptions>,
    raw_installer: Option<RawInstallerOptions>,
    archs: Vec<Arch>,
    build_resources_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    sign_command: Option<String>,
    vm_command: Option<String>,
    debug_logging: bool,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the application metadata. Required.
    pub fn package_settings(mut self, package: PackageSettings) -> Self {
        self.package = Some(package);
        self
    }

    /// Sets already-validated installer options.
    pub fn installer_options(mut self, options: InstallerOptions) -> Self {
        self.installer = Some(options);
        self
    }

    /// Sets raw installer options to be validated during `build()`.
    pub fn raw_installer_options(mut self, raw: RawInstallerOptions) -> Self {
        self.raw_installer = Some(raw);
        self
    }

    /// Sets the requested architectures. Required, at least one.
    pub fn archs(mut self, archs: Vec<Arch>) -> Self {
        self.archs = archs;
        self
    }

    /// Sets the build resources directory. Defaults to `build`.
    pub fn build_resources_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.build_resources_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the artifact output directory. Required.
    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the sign command template (`%1` replaced by the binary path).
    pub fn sign_command(mut self, command: impl Into<String>) -> Self {
        self.sign_command = Some(command.into());
        self
    }

    /// Sets the VM command prefix for uninstaller materialization fallback.
    pub fn vm_command(mut self, command: impl Into<String>) -> Self {
        self.vm_command = Some(command.into());
        self
    }

    /// Enables verbose build diagnostics.
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Validates and builds the [`Settings`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] when required fields are missing,
    /// no architecture is requested, or raw installer options fail
    /// validation.
    pub fn build(self) -> Result<Settings> {
        let package = self.package.ok_or_else(|| missing("packageSettings"))?;
        if package.app_id.is_empty() {
            return Err(Error::InvalidConfiguration {
                option: "appId".into(),
                reason: "must not be empty; the installer GUID is derived from it".into(),
            });
        }
        if self.archs.is_empty() {
            return Err(missing("archs"));
        }

        let installer = match (self.installer, self.raw_installer) {
            (Some(options), _) => options,
            (None, Some(raw)) => raw.validate()?,
            (None, None) => RawInstallerOptions::default().validate()?,
        };

        let output_dir = self.output_dir.ok_or_else(|| missing("outputDir"))?;

        Ok(Settings::new(
            package,
            installer,
            self.archs,
            self.build_resources_dir.unwrap_or_else(|| "build".into()),
            output_dir,
            self.sign_command,
            self.vm_command,
            self.debug_logging,
        ))
    }
}

fn missing(option: &str) -> Error {
    Error::InvalidConfiguration {
        option: option.to_string(),
        reason: "required but not set".to_string(),
    }
}
