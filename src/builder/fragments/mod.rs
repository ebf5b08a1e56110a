//! Script fragment providers.
//!
//! Each provider is a pure function of (settings, filesystem lookups) that
//! returns an independent [`Fragment`]. Providers have no data dependency
//! on each other and run concurrently purely to hide filesystem latency;
//! each writes a disjoint set of symbol keys, and the orchestrator merges
//! the results after the join.

mod associations;
mod languages;
mod license;
mod resources;

pub use associations::AssociationVariant;

use crate::builder::script::ScriptGenerator;
use crate::builder::symbols::{DefineValue, SymbolTable};
use crate::error::{Error, Result};
use crate::settings::Settings;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// A composable chunk of installer script contributed by one provider.
#[derive(Clone, Debug, Default)]
pub struct Fragment {
    /// Script lines, emitted inside a named macro block.
    pub script: String,
    /// Defines merged into the symbol table (disjoint per provider).
    pub defines: Vec<(String, DefineValue)>,
    /// Files embedded into the artifact: (rename, source path).
    pub embedded_files: Vec<(Option<String>, PathBuf)>,
}

impl Fragment {
    /// An empty fragment contributing nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    fn push_line(&mut self, line: &str) {
        self.script.push_str(line);
        self.script.push('\n');
    }

    /// Merges this fragment into the script (as a macro named `name`) and
    /// the symbol table.
    pub fn merge_into(
        self,
        macro_name: &str,
        script: &mut ScriptGenerator,
        symbols: &mut SymbolTable,
    ) -> Result<()> {
        for (name, value) in self.defines {
            match value {
                DefineValue::Flag => symbols.define_flag(name)?,
                DefineValue::Value(v) => symbols.define(name, v)?,
            }
        }
        let mut body = ScriptGenerator::new();
        for (rename, path) in &self.embedded_files {
            body.embed_file(rename.as_deref(), path);
        }
        body.set_template(self.script);
        script.add_macro(macro_name, body);
        Ok(())
    }
}

/// All fragments for one build unit, gathered concurrently.
#[derive(Debug)]
pub struct Fragments {
    /// License-page selection.
    pub license: Fragment,
    /// Header/sidebar image and icon resources.
    pub resources: Fragment,
    /// Message-catalog (language) inclusion.
    pub languages: Fragment,
    /// File-association registration (installer variant).
    pub register_associations: Fragment,
    /// File-association unregistration (uninstaller variant).
    pub unregister_associations: Fragment,
}

/// Runs all providers and joins their results.
///
/// The providers share no mutable state; `cancel` is checked before the
/// fan-out and after the join so a cancelled build never reaches script
/// assembly.
pub async fn gather(settings: &Settings, cancel: &CancellationToken) -> Result<Fragments> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let (license, resources, languages) = tokio::join!(
        license::license_fragment(settings),
        resources::resources_fragment(settings),
        languages::language_fragment(settings),
    );

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    Ok(Fragments {
        license: license?,
        resources: resources?,
        languages: languages?,
        register_associations: associations::association_fragment(
            settings,
            AssociationVariant::Register,
        ),
        unregister_associations: associations::association_fragment(
            settings,
            AssociationVariant::Unregister,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Arch, PackageSettings, SettingsBuilder};

    fn test_settings(resources_dir: &std::path::Path) -> Settings {
        SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "Frag App".into(),
                app_id: "com.example.frag".into(),
                version: "1.0.0".into(),
                description: "fragments".into(),
                company_name: None,
            })
            .archs(vec![Arch::X64])
            .build_resources_dir(resources_dir)
            .output_dir(resources_dir.join("dist"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn gather_joins_all_providers() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let fragments = gather(&settings, &CancellationToken::new()).await.unwrap();
        // No resources on disk and no associations configured: everything
        // degrades to empty fragments rather than failing.
        assert!(fragments.license.script.is_empty());
        assert!(fragments.register_associations.script.is_empty());
        assert!(!fragments.languages.script.is_empty());
    }

    #[tokio::test]
    async fn gather_respects_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            gather(&settings, &cancel).await,
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn merge_into_emits_macro_and_defines() {
        let mut fragment = Fragment::empty();
        fragment.push_line("!insertmacro MUI_LANGUAGE \"English\"");
        fragment
            .defines
            .push(("HEADER_ICO".into(), DefineValue::Value("a.ico".into())));
        let mut script = ScriptGenerator::new();
        let mut symbols = SymbolTable::new();
        fragment
            .merge_into("languageFiles", &mut script, &mut symbols)
            .unwrap();
        assert!(symbols.contains_define("HEADER_ICO"));
        let text = script.build();
        assert!(text.contains("!macro languageFiles"));
        assert!(text.contains("!insertmacro MUI_LANGUAGE \"English\""));
    }
}
