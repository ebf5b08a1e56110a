//! Signing collaborator.
//!
//! Runs the configured sign command over a binary path and returns once the
//! binary is signed in place. Unconfigured signing is a no-op; a failure is
//! a build failure carrying the signer output verbatim.

use crate::error::{Error, Result};
use crate::settings::Settings;
use std::path::Path;
use tokio::process::Command;

/// Signs `path` in place using the configured command template.
///
/// `%1` in the template is replaced with the quoted binary path. The
/// command runs through the platform shell so existing signtool /
/// osslsigncode one-liners work unchanged.
pub async fn sign_file(settings: &Settings, path: &Path) -> Result<()> {
    let Some(template) = settings.sign_command() else {
        log::debug!("signing not configured; skipping {}", path.display());
        return Ok(());
    };

    let command_line = template.replace("%1", &format!("\"{}\"", path.display()));
    log::info!("signing {}", path.display());

    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let output = Command::new(shell)
        .arg(flag)
        .arg(&command_line)
        .output()
        .await
        .map_err(|e| Error::ExecFailed {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::SignFailed {
            path: path.to_path_buf(),
            output: text,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Arch, PackageSettings, SettingsBuilder};

    fn settings(sign_command: Option<&str>) -> Settings {
        let mut builder = SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "S".into(),
                app_id: "com.example.s".into(),
                version: "1.0.0".into(),
                description: "s".into(),
                company_name: None,
            })
            .archs(vec![Arch::X64])
            .output_dir("dist");
        if let Some(command) = sign_command {
            builder = builder.sign_command(command);
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn unconfigured_signing_is_a_no_op() {
        let settings = settings(None);
        sign_file(&settings, Path::new("/nonexistent.exe"))
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_signer_surfaces_its_output() {
        let settings = settings(Some("echo broken signer for %1 >&2; false"));
        let err = sign_file(&settings, Path::new("/tmp/app.exe"))
            .await
            .unwrap_err();
        match err {
            Error::SignFailed { output, .. } => assert!(output.contains("broken signer")),
            other => panic!("expected SignFailed, got {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_signer_returns_ok() {
        let settings = settings(Some("true"));
        sign_file(&settings, Path::new("/tmp/app.exe")).await.unwrap();
    }
}
