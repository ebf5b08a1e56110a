//! License-page selection.

use super::Fragment;
use crate::error::Result;
use crate::settings::Settings;
use std::path::PathBuf;

/// Resolves the license file and emits the license-page insertion.
///
/// Resolution order: explicit option, then a per-language
/// `license_<lang>.txt` for the first configured locale, then plain
/// `license.txt` / `license.rtf` in the build resources directory. When
/// nothing resolves the fragment is empty and the installer simply has no
/// license page.
pub(super) async fn license_fragment(settings: &Settings) -> Result<Fragment> {
    let Some(path) = resolve_license(settings).await else {
        return Ok(Fragment::empty());
    };

    let mut fragment = Fragment::empty();
    fragment.push_line(&format!("!insertmacro MUI_PAGE_LICENSE \"{}\"", path.display()));
    Ok(fragment)
}

async fn resolve_license(settings: &Settings) -> Option<PathBuf> {
    if let Some(explicit) = &settings.installer().license {
        return Some(explicit.clone());
    }

    let resources = settings.build_resources_dir();
    let mut candidates = Vec::new();
    for locale in &settings.installer().languages {
        let short = locale.split(['_', '-']).next().unwrap_or(locale);
        candidates.push(resources.join(format!("license_{short}.txt")));
    }
    candidates.push(resources.join("license.txt"));
    candidates.push(resources.join("license.rtf"));

    for candidate in candidates {
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Arch, PackageSettings, RawInstallerOptions, SettingsBuilder};

    fn settings(dir: &std::path::Path, options_json: &str) -> Settings {
        let raw: RawInstallerOptions = serde_json::from_str(options_json).unwrap();
        SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "L".into(),
                app_id: "com.example.l".into(),
                version: "1.0.0".into(),
                description: "l".into(),
                company_name: None,
            })
            .archs(vec![Arch::X64])
            .build_resources_dir(dir)
            .output_dir(dir.join("dist"))
            .raw_installer_options(raw)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn per_language_license_wins_over_plain() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("license_de.txt"), "de").unwrap();
        std::fs::write(dir.path().join("license.txt"), "en").unwrap();
        let settings = settings(dir.path(), r#"{"languages": ["de_DE"]}"#);
        let fragment = license_fragment(&settings).await.unwrap();
        assert!(fragment.script.contains("license_de.txt"));
    }

    #[tokio::test]
    async fn missing_license_yields_empty_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), "{}");
        let fragment = license_fragment(&settings).await.unwrap();
        assert!(fragment.script.is_empty());
    }
}
