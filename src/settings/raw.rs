//! Raw (unvalidated) installer option document.
//!
//! This is the serde surface for configuration files. It intentionally
//! mirrors the flat key space users write; [`RawInstallerOptions::validate`]
//! turns it into the typed model and rejects contradictory combinations
//! before any subprocess is spawned.

use super::options::{
    AssistedOptions, Compression, DeliveryKind, FileAssociation, InstallerMode, InstallerOptions,
    OneClickOptions,
};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// Flat installer options as they appear in the configuration document.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawInstallerOptions {
    /// One-click mode (default). Set to false for the assisted wizard.
    #[serde(default = "default_true")]
    pub one_click: bool,

    /// Install for all users instead of the current user.
    #[serde(default)]
    pub per_machine: bool,

    /// Portable build: no installation, no uninstaller.
    #[serde(default)]
    pub portable: bool,

    /// Web (thin) installer: payloads downloaded at install time.
    #[serde(default)]
    pub web: bool,

    /// Assisted-only: allow elevation requests.
    #[serde(default)]
    pub allow_elevation: Option<bool>,

    /// Assisted-only: show the installation-directory page.
    #[serde(default)]
    pub allow_to_change_installation_directory: Option<bool>,

    /// Assisted-only: skip the uninstaller welcome page.
    #[serde(default)]
    pub remove_default_uninstall_welcome_page: Option<bool>,

    /// One-click only: launch the app when the installer finishes.
    #[serde(default)]
    pub run_after_finish: Option<bool>,

    /// One-click only: remove app data during uninstall.
    #[serde(default)]
    pub delete_app_data_on_uninstall: Option<bool>,

    /// An elevation helper binary is packaged with the app.
    #[serde(default)]
    pub pack_elevation_helper: bool,

    /// Explicit installer GUID. Derived deterministically when absent.
    #[serde(default)]
    pub guid: Option<String>,

    /// Unicode build (default). ANSI builds select the other plugin ABI.
    #[serde(default = "default_true")]
    pub unicode: bool,

    /// Escalate compiler warnings to errors (default).
    #[serde(default = "default_true")]
    pub warnings_as_errors: bool,

    /// Installer compression algorithm.
    #[serde(default)]
    pub compression: Compression,

    /// Explicit license file path.
    #[serde(default)]
    pub license: Option<PathBuf>,

    /// Assisted-mode header bitmap.
    #[serde(default)]
    pub header_image: Option<PathBuf>,

    /// One-click header icon.
    #[serde(default)]
    pub header_icon: Option<PathBuf>,

    /// Welcome/finish sidebar bitmap.
    #[serde(default)]
    pub sidebar_image: Option<PathBuf>,

    /// Installer UI languages (locale codes such as `en_US`).
    #[serde(default)]
    pub languages: Vec<String>,

    /// File-extension registrations.
    #[serde(default)]
    pub file_associations: Vec<FileAssociation>,

    /// Artifact name pattern.
    #[serde(default)]
    pub artifact_name: Option<String>,

    /// Build one universal artifact spanning all requested architectures.
    #[serde(default)]
    pub universal: bool,
}

impl Default for RawInstallerOptions {
    fn default() -> Self {
        // serde defaults and struct defaults must agree; route through an
        // empty document so there is a single source of truth.
        serde_json::from_str("{}").expect("empty options document is valid")
    }
}

impl RawInstallerOptions {
    /// Validates the flat document into the typed option model.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] naming the offending option when an
    /// assisted-only option is set under one-click mode, a one-click-only
    /// option is set under assisted mode, or portable is combined with
    /// either mode's sub-options.
    pub fn validate(&self) -> Result<InstallerOptions> {
        let mode = self.resolve_mode()?;

        let delivery = if self.web {
            if matches!(mode, InstallerMode::Portable) {
                return Err(invalid("web", "a portable build cannot be a web installer"));
            }
            DeliveryKind::Web
        } else {
            DeliveryKind::SelfContained
        };

        Ok(InstallerOptions {
            mode,
            delivery,
            per_machine: self.per_machine,
            pack_elevation_helper: self.pack_elevation_helper,
            guid: self.guid.clone(),
            unicode: self.unicode,
            warnings_as_errors: self.warnings_as_errors,
            compression: self.compression,
            license: self.license.clone(),
            header_image: self.header_image.clone(),
            header_icon: self.header_icon.clone(),
            sidebar_image: self.sidebar_image.clone(),
            languages: self.languages.clone(),
            file_associations: self.file_associations.clone(),
            artifact_name: self.artifact_name.clone(),
            universal: self.universal,
        })
    }

    fn resolve_mode(&self) -> Result<InstallerMode> {
        if self.portable {
            self.reject_assisted_only("portable")?;
            self.reject_one_click_only("portable")?;
            return Ok(InstallerMode::Portable);
        }

        if self.one_click {
            self.reject_assisted_only("one-click")?;
            let defaults = OneClickOptions::default();
            Ok(InstallerMode::OneClick(OneClickOptions {
                run_after_finish: self.run_after_finish.unwrap_or(defaults.run_after_finish),
                delete_app_data_on_uninstall: self
                    .delete_app_data_on_uninstall
                    .unwrap_or(defaults.delete_app_data_on_uninstall),
            }))
        } else {
            self.reject_one_click_only("assisted")?;
            Ok(InstallerMode::Assisted(AssistedOptions {
                allow_elevation: self.allow_elevation.unwrap_or(true),
                allow_to_change_installation_directory: self
                    .allow_to_change_installation_directory
                    .unwrap_or(false),
                remove_default_uninstall_welcome_page: self
                    .remove_default_uninstall_welcome_page
                    .unwrap_or(false),
            }))
        }
    }

    fn reject_assisted_only(&self, mode: &str) -> Result<()> {
        let set = [
            ("allowElevation", self.allow_elevation.is_some()),
            (
                "allowToChangeInstallationDirectory",
                self.allow_to_change_installation_directory.is_some(),
            ),
            (
                "removeDefaultUninstallWelcomePage",
                self.remove_default_uninstall_welcome_page.is_some(),
            ),
        ];
        reject_options(&set, mode, "assisted")
    }

    fn reject_one_click_only(&self, mode: &str) -> Result<()> {
        let set = [
            ("runAfterFinish", self.run_after_finish.is_some()),
            (
                "deleteAppDataOnUninstall",
                self.delete_app_data_on_uninstall.is_some(),
            ),
        ];
        reject_options(&set, mode, "one-click")
    }
}

fn reject_options(set: &[(&str, bool)], active_mode: &str, owning_mode: &str) -> Result<()> {
    for (option, is_set) in set {
        if *is_set {
            return Err(invalid(
                option,
                &format!("only valid for {owning_mode} installers, but mode is {active_mode}"),
            ));
        }
    }
    Ok(())
}

fn invalid(option: &str, reason: &str) -> Error {
    Error::InvalidConfiguration {
        option: option.to_string(),
        reason: reason.to_string(),
    }
}
