//! Preprocessor symbol table construction.
//!
//! Derives the flat define/command set handed to the external script
//! compiler from resolved settings, per-architecture packed payloads, and
//! computed hashes and sizes. The table is mutated incrementally by each
//! build phase and frozen into [`CompilerArgs`] immediately before the
//! compiler invocation; nothing mutated after that point reaches the
//! compiled output.

use super::guid;
use crate::error::{Error, Result};
use crate::settings::{Arch, Compression, DeliveryKind, InstallerMode, Settings};
use base64::Engine;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Value of one preprocessor define.
///
/// Presence-without-value is an explicit variant, not key-absence, so the
/// "flag present" state survives inspection and serialization.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DefineValue {
    /// Bare compiler flag (`-D NAME`).
    Flag,
    /// Valued define (`-D NAME=value`).
    Value(String),
}

/// Value of one compiler command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandValue {
    /// Single `-X name value` flag.
    Scalar(String),
    /// One repeated `-X name value` flag per element, in order.
    List(Vec<String>),
}

/// The define/command contract handed to the external compiler.
///
/// Names are unique within one invocation: re-adding an identical entry is
/// a no-op, re-adding a conflicting one is a [`Error::DuplicateSymbol`].
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    defines: BTreeMap<String, DefineValue>,
    commands: BTreeMap<String, CommandValue>,
}

impl SymbolTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valued define.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.insert_define(name.into(), DefineValue::Value(value.into()))
    }

    /// Adds a presence-only define (boolean compiler flag).
    pub fn define_flag(&mut self, name: impl Into<String>) -> Result<()> {
        self.insert_define(name.into(), DefineValue::Flag)
    }

    fn insert_define(&mut self, name: String, value: DefineValue) -> Result<()> {
        match self.defines.get(&name) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(Error::DuplicateSymbol { name }),
            None => {
                self.defines.insert(name, value);
                Ok(())
            }
        }
    }

    /// Adds a command.
    pub fn command(&mut self, name: impl Into<String>, value: CommandValue) -> Result<()> {
        let name = name.into();
        match self.commands.get(&name) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(Error::DuplicateSymbol { name }),
            None => {
                self.commands.insert(name, value);
                Ok(())
            }
        }
    }

    /// Returns the define value for `name`, if present.
    pub fn get_define(&self, name: &str) -> Option<&DefineValue> {
        self.defines.get(name)
    }

    /// Returns true when a define named `name` exists (flag or valued).
    pub fn contains_define(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    /// Removes a define, returning its previous value.
    ///
    /// Used to clear the building-uninstaller marker before the parent
    /// compile.
    pub fn remove_define(&mut self, name: &str) -> Option<DefineValue> {
        self.defines.remove(name)
    }

    /// Removes a command, returning its previous value.
    pub fn remove_command(&mut self, name: &str) -> Option<CommandValue> {
        self.commands.remove(name)
    }

    /// Freezes the table into immutable compiler arguments.
    ///
    /// Consumes the table: no later mutation is visible to the invocation.
    pub fn freeze(self) -> CompilerArgs {
        let mut args = Vec::new();
        for (name, value) in &self.defines {
            args.push("-D".to_string());
            match value {
                DefineValue::Flag => args.push(name.clone()),
                DefineValue::Value(v) => args.push(format!("{name}={v}")),
            }
        }
        for (name, value) in &self.commands {
            match value {
                CommandValue::Scalar(v) => {
                    args.push("-X".to_string());
                    args.push(format!("{name} {v}"));
                }
                CommandValue::List(values) => {
                    for v in values {
                        args.push("-X".to_string());
                        args.push(format!("{name} {v}"));
                    }
                }
            }
        }
        CompilerArgs { args }
    }
}

/// Frozen, ordered compiler argument list.
///
/// Constructed only through [`SymbolTable::freeze`].
#[derive(Clone, Debug)]
pub struct CompilerArgs {
    args: Vec<String>,
}

impl CompilerArgs {
    /// Returns the argument list, defines before commands, names sorted.
    pub fn as_slice(&self) -> &[String] {
        &self.args
    }
}

/// Descriptor of one packed per-architecture payload archive.
#[derive(Clone, Debug)]
pub struct PackagedPayload {
    /// Target architecture of the payload.
    pub arch: Arch,
    /// Absolute path to the packed archive.
    pub path: PathBuf,
    /// File name of the archive (embedded into defines).
    pub file_name: String,
    /// SHA-512 content hash, base64-encoded (hashing collaborator output).
    pub sha512_base64: String,
    /// Archive size on disk in bytes.
    pub archive_size: u64,
    /// Uncompressed payload size in bytes.
    pub unpacked_size: u64,
}

/// Marker define present only while the uninstaller stub is compiled.
pub const BUILD_UNINSTALLER_FLAG: &str = "BUILD_UNINSTALLER";
/// Define carrying the uninstaller output path during the sub-build, and
/// the signed uninstaller path during the parent build.
pub const UNINSTALLER_OUT_FILE: &str = "UNINSTALLER_OUT_FILE";

/// Builds the base symbol table for one build unit.
///
/// Later phases (uninstaller sub-build, fragment providers) add their own
/// defines before the table is frozen.
pub fn build_symbol_table(
    settings: &Settings,
    payloads: &[PackagedPayload],
    estimated_size_kib: Option<u64>,
    installer_path: &Path,
) -> Result<SymbolTable> {
    let mut table = SymbolTable::new();
    let options = settings.installer();

    table.define("PRODUCT_NAME", settings.product_name())?;
    table.define("PRODUCT_FILENAME", settings.app_package_name())?;
    table.define("APP_ID", settings.app_id())?;
    table.define("APP_DESCRIPTION", settings.description())?;
    table.define("VERSION", settings.version())?;
    if let Some(company) = settings.company_name() {
        table.define("COMPANY_NAME", company)?;
    }
    table.define(
        "UNINSTALL_DISPLAY_NAME",
        format!("{} {}", settings.product_name(), settings.version()),
    )?;

    let guid = guid::installer_guid(settings.app_id(), options.guid.as_deref());
    table.define("APP_GUID", guid.as_str())?;
    table.define(
        "UNINSTALL_REGISTRY_KEY",
        format!("Software\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\{guid}"),
    )?;
    let legacy = guid::legacy_registry_guid(&guid);
    if legacy != guid {
        // Upgrades from older installers look their entry up under the
        // stripped key; both must exist for them to find it.
        table.define(
            "UNINSTALL_REGISTRY_KEY_2",
            format!("Software\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\{legacy}"),
        )?;
    }

    for payload in payloads {
        define_payload(&mut table, payload)?;
    }

    if let Some(kib) = estimated_size_kib {
        table.define("ESTIMATED_SIZE", kib.to_string())?;
    }

    define_mode(&mut table, &options.mode)?;
    if options.per_machine {
        table.define_flag("INSTALL_MODE_PER_ALL_USERS")?;
    }
    if options.delivery == DeliveryKind::Web {
        table.define_flag("WEB_INSTALLER")?;
    }

    table.command(
        "Unicode",
        CommandValue::Scalar(if options.unicode { "true" } else { "false" }.to_string()),
    )?;
    if options.compression != Compression::None {
        table.command(
            "SetCompressor",
            CommandValue::Scalar(options.compression.command_value().to_string()),
        )?;
    }
    table.command(
        "OutFile",
        CommandValue::Scalar(format!("\"{}\"", installer_path.display())),
    )?;
    table.command(
        "VIProductVersion",
        CommandValue::Scalar(version_quad(settings.version())),
    )?;
    table.command("VIAddVersionKey", version_keys(settings))?;

    Ok(table)
}

fn define_payload(table: &mut SymbolTable, payload: &PackagedPayload) -> Result<()> {
    let suffix = payload.arch.define_suffix();
    table.define(format!("APP_{suffix}"), payload.path.display().to_string())?;
    table.define(format!("APP_{suffix}_NAME"), payload.file_name.as_str())?;
    table.define(
        format!("APP_{suffix}_HASH"),
        base64_to_hex_upper(&payload.sha512_base64)?,
    )?;
    table.define(
        format!("APP_{suffix}_UNPACKED_SIZE"),
        bytes_to_kib_ceil(payload.unpacked_size).to_string(),
    )?;
    Ok(())
}

fn define_mode(table: &mut SymbolTable, mode: &InstallerMode) -> Result<()> {
    match mode {
        InstallerMode::OneClick(opts) => {
            table.define_flag("ONE_CLICK")?;
            if opts.run_after_finish {
                table.define_flag("RUN_AFTER_FINISH")?;
            }
            if opts.delete_app_data_on_uninstall {
                table.define_flag("DELETE_APP_DATA_ON_UNINSTALL")?;
            }
        }
        InstallerMode::Assisted(opts) => {
            if opts.allow_elevation {
                table.define_flag("MULTIUSER_INSTALLMODE_ALLOW_ELEVATION")?;
            }
            if opts.allow_to_change_installation_directory {
                table.define_flag("ALLOW_TO_CHANGE_INSTALLATION_DIRECTORY")?;
            }
            if opts.remove_default_uninstall_welcome_page {
                table.define_flag("REMOVE_DEFAULT_UNINSTALL_WELCOME_PAGE")?;
            }
        }
        InstallerMode::Portable => {
            table.define_flag("PORTABLE")?;
            table.define("REQUEST_EXECUTION_LEVEL", "user")?;
        }
    }
    Ok(())
}

/// Re-encodes a base64 content hash as uppercase hexadecimal.
///
/// The downstream integrity check consumes hex, while the hashing
/// collaborator reports base64.
pub fn base64_to_hex_upper(b64: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| Error::Generic(format!("payload hash is not valid base64: {e}")))?;
    Ok(hex::encode_upper(bytes))
}

/// Converts bytes to whole KiB, rounding up.
///
/// The consumer's size field has kilobyte granularity and only accepts
/// integers.
pub fn bytes_to_kib_ceil(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}

/// Normalizes a version string to the exact four numeric parts the
/// `VIProductVersion` command requires.
pub fn version_quad(version: &str) -> String {
    // Pre-release and build metadata have no numeric representation.
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let mut parts: Vec<&str> = core
        .split('.')
        .map(|p| if p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() { p } else { "0" })
        .take(4)
        .collect();
    while parts.len() < 4 {
        parts.push("0");
    }
    parts.join(".")
}

fn version_keys(settings: &Settings) -> CommandValue {
    let mut keys = vec![
        format!("ProductName \"{}\"", settings.product_name()),
        format!("ProductVersion \"{}\"", settings.version()),
        format!("FileDescription \"{}\"", settings.description()),
        format!("FileVersion \"{}\"", settings.version()),
    ];
    if let Some(company) = settings.company_name() {
        keys.push(format!("CompanyName \"{company}\""));
    }
    CommandValue::List(keys)
}
