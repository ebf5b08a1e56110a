//! File-association registration fragments.

use super::Fragment;
use crate::settings::Settings;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which side of the association lifecycle the fragment serves.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssociationVariant {
    /// Installer: register extensions, embed custom icons.
    Register,
    /// Uninstaller: remove the registrations.
    Unregister,
}

/// Emits one macro invocation per (extension, icon) pair.
///
/// A custom icon shared by several extensions is embedded exactly once;
/// later extensions reference the already-embedded file.
pub(super) fn association_fragment(settings: &Settings, variant: AssociationVariant) -> Fragment {
    let associations = &settings.installer().file_associations;
    if associations.is_empty() {
        return Fragment::empty();
    }

    let mut fragment = Fragment::empty();
    let mut embedded_icons: BTreeMap<PathBuf, String> = BTreeMap::new();

    for association in associations {
        let prog_id = format!("{}.{}", settings.app_package_name(), association.ext);
        match variant {
            AssociationVariant::Register => {
                let description = association
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{} file", association.ext));
                let icon = association.icon.as_ref().map(|icon_path| {
                    let next_index = embedded_icons.len();
                    embedded_icons
                        .entry(icon_path.clone())
                        .or_insert_with(|| {
                            let ext = icon_path
                                .extension()
                                .and_then(|e| e.to_str())
                                .unwrap_or("ico");
                            let name = format!("assoc-{next_index}.{ext}");
                            fragment
                                .embedded_files
                                .push((Some(format!("$INSTDIR\\resources\\{name}")), icon_path.clone()));
                            name
                        })
                        .clone()
                });
                let icon_arg = icon
                    .map(|name| format!("$INSTDIR\\resources\\{name}"))
                    .unwrap_or_else(|| format!("$INSTDIR\\{}.exe,0", settings.app_package_name()));
                fragment.push_line(&format!(
                    "!insertmacro APP_ASSOCIATE \"{}\" \"{prog_id}\" \"{description}\" \"{icon_arg}\"",
                    association.ext
                ));
            }
            AssociationVariant::Unregister => {
                fragment.push_line(&format!(
                    "!insertmacro APP_UNASSOCIATE \"{}\" \"{prog_id}\"",
                    association.ext
                ));
            }
        }
    }

    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Arch, PackageSettings, RawInstallerOptions, SettingsBuilder};

    fn settings(associations_json: &str) -> Settings {
        let raw: RawInstallerOptions =
            serde_json::from_str(&format!(r#"{{"fileAssociations": {associations_json}}}"#))
                .unwrap();
        SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "Assoc".into(),
                app_id: "com.example.assoc".into(),
                version: "1.0.0".into(),
                description: "assoc".into(),
                company_name: None,
            })
            .archs(vec![Arch::X64])
            .output_dir("dist")
            .raw_installer_options(raw)
            .build()
            .unwrap()
    }

    #[test]
    fn shared_icon_is_embedded_once() {
        let settings = settings(
            r#"[
                {"ext": "log", "icon": "icons/shared.ico"},
                {"ext": "trace", "icon": "icons/shared.ico"},
                {"ext": "txt"}
            ]"#,
        );
        let fragment = association_fragment(&settings, AssociationVariant::Register);
        assert_eq!(fragment.embedded_files.len(), 1);
        // Both extensions reference the single embedded icon.
        assert_eq!(fragment.script.matches("assoc-0.ico").count(), 2);
        // The icon-less extension falls back to the app executable.
        assert!(fragment.script.contains("Assoc.exe,0"));
    }

    #[test]
    fn unregister_variant_emits_no_embeds() {
        let settings = settings(r#"[{"ext": "log", "icon": "icons/shared.ico"}]"#);
        let fragment = association_fragment(&settings, AssociationVariant::Unregister);
        assert!(fragment.embedded_files.is_empty());
        assert!(fragment.script.contains("APP_UNASSOCIATE \"log\" \"Assoc.log\""));
    }

    #[test]
    fn no_associations_yield_empty_fragment() {
        let fragment = association_fragment(&settings("[]"), AssociationVariant::Register);
        assert!(fragment.script.is_empty());
    }
}
