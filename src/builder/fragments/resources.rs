//! Header and sidebar resource lookup.
//!
//! One-click installers use a window icon; assisted installers use the
//! wizard header bitmap. Both fall back to conventional file names in the
//! build resources directory when no explicit path is configured.

use super::Fragment;
use crate::builder::symbols::DefineValue;
use crate::error::Result;
use crate::settings::Settings;
use std::path::{Path, PathBuf};

pub(super) async fn resources_fragment(settings: &Settings) -> Result<Fragment> {
    let options = settings.installer();
    let resources = settings.build_resources_dir();
    let mut fragment = Fragment::empty();

    if options.mode.is_one_click() {
        if let Some(icon) =
            resolve(options.header_icon.as_deref(), resources, "installerHeaderIcon.ico").await
        {
            define(&mut fragment, "HEADER_ICO", &icon);
        }
    } else if let Some(header) =
        resolve(options.header_image.as_deref(), resources, "installerHeader.bmp").await
    {
        fragment.defines.push(("MUI_HEADERIMAGE".into(), DefineValue::Flag));
        define(&mut fragment, "MUI_HEADERIMAGE_BITMAP", &header);
    }

    if let Some(sidebar) =
        resolve(options.sidebar_image.as_deref(), resources, "installerSidebar.bmp").await
    {
        define(&mut fragment, "MUI_WELCOMEFINISHPAGE_BITMAP", &sidebar);
        define(&mut fragment, "MUI_UNWELCOMEFINISHPAGE_BITMAP", &sidebar);
    }

    Ok(fragment)
}

fn define(fragment: &mut Fragment, name: &str, path: &Path) {
    fragment
        .defines
        .push((name.to_string(), DefineValue::Value(path.display().to_string())));
}

async fn resolve(explicit: Option<&Path>, resources: &Path, default_name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let candidate = resources.join(default_name);
    if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Arch, PackageSettings, RawInstallerOptions, SettingsBuilder};

    fn settings(dir: &std::path::Path, options_json: &str) -> Settings {
        let raw: RawInstallerOptions = serde_json::from_str(options_json).unwrap();
        SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "R".into(),
                app_id: "com.example.r".into(),
                version: "1.0.0".into(),
                description: "r".into(),
                company_name: None,
            })
            .archs(vec![Arch::X64])
            .build_resources_dir(dir)
            .output_dir(dir.join("dist"))
            .raw_installer_options(raw)
            .build()
            .unwrap()
    }

    fn has_define(fragment: &Fragment, name: &str) -> bool {
        fragment.defines.iter().any(|(n, _)| n == name)
    }

    #[tokio::test]
    async fn one_click_uses_header_icon_not_header_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("installerHeaderIcon.ico"), b"ico").unwrap();
        std::fs::write(dir.path().join("installerHeader.bmp"), b"bmp").unwrap();
        let settings = settings(dir.path(), r#"{"oneClick": true}"#);
        let fragment = resources_fragment(&settings).await.unwrap();
        assert!(has_define(&fragment, "HEADER_ICO"));
        assert!(!has_define(&fragment, "MUI_HEADERIMAGE_BITMAP"));
    }

    #[tokio::test]
    async fn assisted_uses_header_image_with_flag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("installerHeader.bmp"), b"bmp").unwrap();
        let settings = settings(dir.path(), r#"{"oneClick": false}"#);
        let fragment = resources_fragment(&settings).await.unwrap();
        assert!(has_define(&fragment, "MUI_HEADERIMAGE"));
        assert!(has_define(&fragment, "MUI_HEADERIMAGE_BITMAP"));
    }

    #[tokio::test]
    async fn sidebar_feeds_both_install_and_uninstall_pages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("installerSidebar.bmp"), b"bmp").unwrap();
        let settings = settings(dir.path(), "{}");
        let fragment = resources_fragment(&settings).await.unwrap();
        assert!(has_define(&fragment, "MUI_WELCOMEFINISHPAGE_BITMAP"));
        assert!(has_define(&fragment, "MUI_UNWELCOMEFINISHPAGE_BITMAP"));
    }
}
