//! Installer script composition.
//!
//! Accumulates include directives, plugin-directory declarations,
//! compile-time flags, file-embed instructions, and named macro blocks, and
//! serializes them into the concatenation the external compiler expects.
//! Declaration order is preserved: later includes may redefine symbols used
//! earlier, and macros must be emitted before any `!insertmacro` in the
//! trailing template text.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Plugin ABI of the compiler build the plugin directory targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PluginAbi {
    /// ANSI compiler build.
    Ansi,
    /// Unicode compiler build.
    Unicode,
}

impl PluginAbi {
    fn directive_switch(self) -> &'static str {
        match self {
            PluginAbi::Ansi => "/x86-ansi",
            PluginAbi::Unicode => "/x86-unicode",
        }
    }
}

#[derive(Clone, Debug)]
enum Declaration {
    Include(PathBuf),
    PluginDir(PluginAbi, PathBuf),
    Flag(String, Option<String>),
    EmbedFile { name: Option<String>, path: PathBuf },
}

/// Ordered script document builder.
///
/// `build()` is pure and idempotent: repeated calls on the same accumulated
/// state return the same text.
#[derive(Clone, Debug, Default)]
pub struct ScriptGenerator {
    declarations: Vec<Declaration>,
    // Name -> value for duplicate-flag detection; order lives in
    // `declarations`.
    flags: BTreeMap<String, Option<String>>,
    macros: Vec<(String, ScriptGenerator)>,
    template: String,
}

impl ScriptGenerator {
    /// Creates an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an include directive.
    pub fn include(&mut self, path: impl AsRef<Path>) {
        self.declarations
            .push(Declaration::Include(path.as_ref().to_path_buf()));
    }

    /// Appends a plugin directory declaration for the given ABI.
    pub fn add_plugin_dir(&mut self, abi: PluginAbi, path: impl AsRef<Path>) {
        self.declarations
            .push(Declaration::PluginDir(abi, path.as_ref().to_path_buf()));
    }

    /// Declares a compile-time boolean flag.
    ///
    /// Re-declaring the same flag is a no-op; flags are name-only so a
    /// duplicate is always identical.
    pub fn flag(&mut self, name: impl Into<String>) -> Result<()> {
        self.insert_flag(name.into(), None)
    }

    /// Declares a valued compile-time flag.
    ///
    /// Re-declaring with the identical value is a no-op; a conflicting
    /// value is a construction error.
    pub fn flag_with_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.insert_flag(name.into(), Some(value.into()))
    }

    fn insert_flag(&mut self, name: String, value: Option<String>) -> Result<()> {
        match self.flags.get(&name) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(Error::DuplicateSymbol { name }),
            None => {
                self.flags.insert(name.clone(), value.clone());
                self.declarations.push(Declaration::Flag(name, value));
                Ok(())
            }
        }
    }

    /// Appends a raw file-embed instruction.
    ///
    /// `name` renames the file inside the artifact; without it the source
    /// file name is kept.
    pub fn embed_file(&mut self, name: Option<&str>, path: impl AsRef<Path>) {
        self.declarations.push(Declaration::EmbedFile {
            name: name.map(str::to_string),
            path: path.as_ref().to_path_buf(),
        });
    }

    /// Adds a named macro whose body is itself a script document.
    ///
    /// Macros are serialized after all declarations and before the template
    /// text, in insertion order.
    pub fn add_macro(&mut self, name: impl Into<String>, body: ScriptGenerator) {
        self.macros.push((name.into(), body));
    }

    /// Sets the literal template text emitted after declarations and
    /// macros.
    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
    }

    /// Serializes the accumulated document.
    pub fn build(&self) -> String {
        let mut out = String::new();
        for declaration in &self.declarations {
            match declaration {
                Declaration::Include(path) => {
                    out.push_str(&format!("!include \"{}\"\n", path.display()));
                }
                Declaration::PluginDir(abi, path) => {
                    out.push_str(&format!(
                        "!addplugindir {} \"{}\"\n",
                        abi.directive_switch(),
                        path.display()
                    ));
                }
                Declaration::Flag(name, None) => {
                    out.push_str(&format!("!define {name}\n"));
                }
                Declaration::Flag(name, Some(value)) => {
                    out.push_str(&format!("!define {name} \"{value}\"\n"));
                }
                Declaration::EmbedFile { name, path } => match name {
                    Some(name) => out.push_str(&format!(
                        "File \"/oname={name}\" \"{}\"\n",
                        path.display()
                    )),
                    None => out.push_str(&format!("File \"{}\"\n", path.display())),
                },
            }
        }
        for (name, body) in &self.macros {
            out.push_str(&format!("!macro {name}\n"));
            let rendered = body.build();
            if !rendered.is_empty() {
                out.push_str(&rendered);
                if !rendered.ends_with('\n') {
                    out.push('\n');
                }
            }
            out.push_str("!macroend\n");
        }
        out.push_str(&self.template);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_is_preserved() {
        let mut script = ScriptGenerator::new();
        script.include("second.nsh");
        script.flag("EARLY").unwrap();
        script.include("first.nsh");
        let text = script.build();
        let second = text.find("second.nsh").unwrap();
        let early = text.find("EARLY").unwrap();
        let first = text.find("first.nsh").unwrap();
        assert!(second < early && early < first);
    }

    #[test]
    fn build_is_idempotent() {
        let mut script = ScriptGenerator::new();
        script.include("base.nsh");
        script.flag("A").unwrap();
        let mut body = ScriptGenerator::new();
        body.flag("INNER").unwrap();
        script.add_macro("customInit", body);
        script.set_template("Section\nSectionEnd\n");
        assert_eq!(script.build(), script.build());
    }

    #[test]
    fn duplicate_flag_is_no_op_when_identical() {
        let mut script = ScriptGenerator::new();
        script.flag("A").unwrap();
        script.flag("A").unwrap();
        assert_eq!(script.build().matches("!define A").count(), 1);
    }

    #[test]
    fn duplicate_flag_with_conflicting_value_errors() {
        let mut script = ScriptGenerator::new();
        script.flag_with_value("A", "1").unwrap();
        script.flag_with_value("A", "1").unwrap();
        assert!(matches!(
            script.flag_with_value("A", "2"),
            Err(Error::DuplicateSymbol { .. })
        ));
    }

    #[test]
    fn macros_are_emitted_before_template() {
        let mut script = ScriptGenerator::new();
        let mut body = ScriptGenerator::new();
        body.flag("IN_MACRO").unwrap();
        script.add_macro("pages", body);
        script.set_template("!insertmacro pages\n");
        let text = script.build();
        let def = text.find("!macro pages").unwrap();
        let usage = text.find("!insertmacro pages").unwrap();
        assert!(def < usage);
        assert!(text.contains("!macro pages\n!define IN_MACRO\n!macroend\n"));
    }

    #[test]
    fn plugin_dirs_are_keyed_by_abi() {
        let mut script = ScriptGenerator::new();
        script.add_plugin_dir(PluginAbi::Unicode, "plugins/unicode");
        script.add_plugin_dir(PluginAbi::Ansi, "plugins/ansi");
        let text = script.build();
        assert!(text.contains("!addplugindir /x86-unicode \"plugins/unicode\""));
        assert!(text.contains("!addplugindir /x86-ansi \"plugins/ansi\""));
    }

    #[test]
    fn embed_file_supports_renaming() {
        let mut script = ScriptGenerator::new();
        script.embed_file(Some("icon.ico"), "res/shared.ico");
        script.embed_file(None, "res/extra.dat");
        let text = script.build();
        assert!(text.contains("File \"/oname=icon.ico\" \"res/shared.ico\""));
        assert!(text.contains("File \"res/extra.dat\""));
    }
}
