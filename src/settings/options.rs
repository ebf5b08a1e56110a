//! Typed installer option model.
//!
//! The raw configuration document is a flat map of booleans and paths (see
//! [`super::raw`]). Validation converts it into the types here, so that an
//! assisted-only option can never coexist with one-click mode once the
//! orchestrator is running.

use std::path::PathBuf;

/// Installer interaction mode.
///
/// Each variant carries only the options valid for that mode, so invalid
/// flag combinations are unrepresentable after validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstallerMode {
    /// No user choices; install starts immediately.
    OneClick(OneClickOptions),
    /// Wizard with directory choice, license page, and elevation prompts.
    Assisted(AssistedOptions),
    /// No installation at all; the artifact runs in place.
    Portable,
}

impl InstallerMode {
    /// Returns true for the one-click variant.
    pub fn is_one_click(&self) -> bool {
        matches!(self, InstallerMode::OneClick(_))
    }
}

/// Options valid only under [`InstallerMode::OneClick`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OneClickOptions {
    /// Launch the application when the installer finishes.
    pub run_after_finish: bool,
    /// Remove per-user application data during uninstall.
    pub delete_app_data_on_uninstall: bool,
}

impl Default for OneClickOptions {
    fn default() -> Self {
        Self {
            run_after_finish: true,
            delete_app_data_on_uninstall: false,
        }
    }
}

/// Options valid only under [`InstallerMode::Assisted`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AssistedOptions {
    /// Allow the installer to request elevation when needed.
    pub allow_elevation: bool,
    /// Show the installation-directory page.
    pub allow_to_change_installation_directory: bool,
    /// Skip the default uninstaller welcome page.
    pub remove_default_uninstall_welcome_page: bool,
}

/// How the installer delivers the application payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryKind {
    /// Payload archives are embedded in the installer binary.
    SelfContained,
    /// Thin installer; payloads are fetched at install time.
    Web,
}

/// Compression passed to the script compiler's `SetCompressor` command.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression - development only.
    None,
    /// zlib - fast, moderate ratio.
    Zlib,
    /// bzip2 - smaller than zlib.
    Bzip2,
    /// LZMA - smallest output (default).
    #[default]
    Lzma,
}

impl Compression {
    /// The value for the `SetCompressor` script command.
    pub fn command_value(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zlib => "zlib",
            Compression::Bzip2 => "bzip2",
            Compression::Lzma => "lzma",
        }
    }
}

/// One file-extension registration handled by the generated installer.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize)]
pub struct FileAssociation {
    /// Extension without the leading dot (e.g. `"log"`).
    pub ext: String,
    /// Display description for the file type.
    #[serde(default)]
    pub description: Option<String>,
    /// Custom icon resource; embedded once even when shared across
    /// extensions.
    #[serde(default)]
    pub icon: Option<PathBuf>,
}

/// Fully validated installer options.
///
/// Produced by [`super::raw::RawInstallerOptions::validate`]; never
/// constructed from unchecked input.
#[derive(Clone, Debug)]
pub struct InstallerOptions {
    /// Interaction mode with mode-scoped sub-options.
    pub mode: InstallerMode,
    /// Self-contained vs web (thin) delivery.
    pub delivery: DeliveryKind,
    /// Per-machine install (requires elevation at install time).
    pub per_machine: bool,
    /// An elevation helper binary is packaged alongside the app.
    pub pack_elevation_helper: bool,
    /// Explicit installer GUID; derived from the app id when absent.
    pub guid: Option<String>,
    /// Unicode script build (selects the plugin ABI).
    pub unicode: bool,
    /// Escalate compiler warnings to errors.
    pub warnings_as_errors: bool,
    /// Payload/installer compression.
    pub compression: Compression,
    /// Explicit license file; otherwise resolved from build resources.
    pub license: Option<PathBuf>,
    /// Assisted-mode header bitmap override.
    pub header_image: Option<PathBuf>,
    /// One-click header icon override.
    pub header_icon: Option<PathBuf>,
    /// Welcome/finish sidebar bitmap override.
    pub sidebar_image: Option<PathBuf>,
    /// Installer UI languages (locale codes such as `en_US`).
    pub languages: Vec<String>,
    /// File-extension registrations.
    pub file_associations: Vec<FileAssociation>,
    /// Artifact name pattern; `${name}`, `${version}` and `${arch}` are
    /// substituted.
    pub artifact_name: Option<String>,
    /// Build one artifact spanning all requested architectures.
    pub universal: bool,
}
