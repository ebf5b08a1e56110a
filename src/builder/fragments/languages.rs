//! Message-catalog (language) inclusion.

use super::Fragment;
use crate::error::Result;
use crate::settings::Settings;

/// Locale prefix to compiler language-file name.
///
/// Unknown locales fall back to English rather than failing the build; the
/// generated installer is still usable, just not localized.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("de", "German"),
    ("fr", "French"),
    ("es", "Spanish"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("zh", "SimpChinese"),
];

pub(super) async fn language_fragment(settings: &Settings) -> Result<Fragment> {
    let mut fragment = Fragment::empty();
    let mut seen = Vec::new();

    let configured = &settings.installer().languages;
    let locales: Vec<&str> = if configured.is_empty() {
        vec!["en_US"]
    } else {
        configured.iter().map(String::as_str).collect()
    };

    // First language becomes the installer default; order is preserved.
    for locale in locales {
        let name = language_name(locale);
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);
        fragment.push_line(&format!("!insertmacro MUI_LANGUAGE \"{name}\""));
    }
    Ok(fragment)
}

fn language_name(locale: &str) -> &'static str {
    let short = locale.split(['_', '-']).next().unwrap_or(locale);
    LANGUAGE_NAMES
        .iter()
        .find(|(prefix, _)| *prefix == short)
        .map_or("English", |(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Arch, PackageSettings, RawInstallerOptions, SettingsBuilder};

    fn settings(languages_json: &str) -> Settings {
        let raw: RawInstallerOptions =
            serde_json::from_str(&format!(r#"{{"languages": {languages_json}}}"#)).unwrap();
        SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "Lang".into(),
                app_id: "com.example.lang".into(),
                version: "1.0.0".into(),
                description: "lang".into(),
                company_name: None,
            })
            .archs(vec![Arch::X64])
            .output_dir("dist")
            .raw_installer_options(raw)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn emits_one_insertion_per_locale_in_order() {
        let fragment = language_fragment(&settings(r#"["de_DE", "fr_FR"]"#))
            .await
            .unwrap();
        let german = fragment.script.find("German").unwrap();
        let french = fragment.script.find("French").unwrap();
        assert!(german < french);
    }

    #[tokio::test]
    async fn duplicate_and_unknown_locales_collapse() {
        let fragment = language_fragment(&settings(r#"["xx_XX", "en_GB", "en_US"]"#))
            .await
            .unwrap();
        assert_eq!(fragment.script.matches("English").count(), 1);
    }

    #[tokio::test]
    async fn defaults_to_english() {
        let fragment = language_fragment(&settings("[]")).await.unwrap();
        assert!(fragment.script.contains("MUI_LANGUAGE \"English\""));
    }
}
