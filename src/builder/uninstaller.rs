//! Uninstaller sub-build coordinator.
//!
//! The uninstall binary cannot be produced directly: the compiler emits an
//! installer-like stub which, when executed once, writes the real
//! uninstaller to a declared path. The sub-build is a typestate machine
//! (Draft → Compiled → Materialized → Signed) so each transition failure is
//! typed and no step can run out of order. Terminal failure at any step
//! aborts the whole build unit.

use super::compiler::{self, LockProbe};
use super::sign;
use super::symbols::{
    BUILD_UNINSTALLER_FLAG, CompilerArgs, SymbolTable, UNINSTALLER_OUT_FILE,
};
use crate::error::{Error, Result};
use crate::settings::Settings;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Polling cadence for the materialization wait.
#[derive(Clone, Copy, Debug)]
pub struct MaterializePoll {
    /// Maximum number of existence checks.
    pub attempts: u32,
    /// Fixed interval between checks.
    pub interval: Duration,
}

impl Default for MaterializePoll {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(300),
        }
    }
}

/// The signed, transient uninstaller binary.
///
/// Deleted on drop together with its stub, success or failure of the
/// parent build; it must never remain on disk as a stray artifact.
#[derive(Debug)]
pub struct UninstallerArtifact {
    path: PathBuf,
    stub_path: PathBuf,
}

impl UninstallerArtifact {
    /// Path of the signed uninstaller, embedded into the parent define
    /// table.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UninstallerArtifact {
    fn drop(&mut self) {
        for path in [&self.path, &self.stub_path] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("could not remove {}: {e}", path.display());
                }
            }
        }
    }
}

/// Runs the whole sub-build and embeds the result into `parent_symbols`.
///
/// On success the parent table carries the `UNINSTALLER_OUT_FILE` define
/// pointing at the signed binary; the building-uninstaller marker only ever
/// exists in the stub's own symbol clone.
pub async fn build_and_embed(
    settings: &Settings,
    compiler_path: &Path,
    parent_symbols: &mut SymbolTable,
    parent_script: &str,
    installer_file_name: &str,
    probe: &LockProbe,
    poll: &MaterializePoll,
) -> Result<UninstallerArtifact> {
    let draft = Draft::new(settings, parent_symbols, parent_script, installer_file_name)?;
    let compiled = draft.compile(compiler_path, probe).await?;
    let materialized = compiled.materialize(settings, poll).await?;
    let signed = materialized.sign(settings).await?;
    let artifact = signed.into_artifact();
    parent_symbols.define(UNINSTALLER_OUT_FILE, artifact.path().display().to_string())?;
    Ok(artifact)
}

/// Stub script composed, not yet compiled.
struct Draft {
    script: String,
    args: CompilerArgs,
    stub_path: PathBuf,
    out_path: PathBuf,
}

/// Stub binary exists on disk.
struct Compiled {
    stub_path: PathBuf,
    out_path: PathBuf,
}

/// Real uninstaller extracted to its declared path.
struct Materialized {
    stub_path: PathBuf,
    out_path: PathBuf,
}

/// Uninstaller signed in place.
struct Signed {
    stub_path: PathBuf,
    out_path: PathBuf,
}

impl Draft {
    /// Composes the stub: the parent script compiled under the
    /// building-uninstaller marker, with output paths unique to this build
    /// unit so concurrent units under other targets cannot collide.
    fn new(
        settings: &Settings,
        parent_symbols: &SymbolTable,
        parent_script: &str,
        installer_file_name: &str,
    ) -> Result<Self> {
        let out_path = temp_uninstaller_path(settings.output_dir(), installer_file_name);
        let stub_path = settings
            .output_dir()
            .join(format!("__uninstaller-stub-{installer_file_name}"));

        let mut symbols = parent_symbols.clone();
        symbols.define_flag(BUILD_UNINSTALLER_FLAG)?;
        symbols.define(UNINSTALLER_OUT_FILE, out_path.display().to_string())?;
        symbols.remove_command("OutFile");
        symbols.command(
            "OutFile",
            super::symbols::CommandValue::Scalar(format!("\"{}\"", stub_path.display())),
        )?;

        Ok(Self {
            script: parent_script.to_string(),
            args: symbols.freeze(),
            stub_path,
            out_path,
        })
    }

    async fn compile(self, compiler_path: &Path, probe: &LockProbe) -> Result<Compiled> {
        compiler::compile(
            compiler_path,
            &self.args,
            &self.script,
            &self.stub_path,
            // Warnings in the stub are the same warnings the parent build
            // will report; do not fail twice.
            false,
            probe,
        )
        .await?;
        Ok(Compiled {
            stub_path: self.stub_path,
            out_path: self.out_path,
        })
    }
}

impl Compiled {
    /// Executes the stub once so it extracts the real uninstaller.
    ///
    /// Runs directly on Windows, through the emulation layer elsewhere,
    /// falling back to the configured VM command when emulation fails. The
    /// output path is then polled for existence with a bounded wait.
    async fn materialize(self, settings: &Settings, poll: &MaterializePoll) -> Result<Materialized> {
        run_stub(&self.stub_path, settings.vm_command()).await?;
        wait_for_materialize(&self.out_path, poll).await?;
        Ok(Materialized {
            stub_path: self.stub_path,
            out_path: self.out_path,
        })
    }
}

impl Materialized {
    async fn sign(self, settings: &Settings) -> Result<Signed> {
        sign::sign_file(settings, &self.out_path).await?;
        Ok(Signed {
            stub_path: self.stub_path,
            out_path: self.out_path,
        })
    }
}

impl Signed {
    fn into_artifact(self) -> UninstallerArtifact {
        UninstallerArtifact {
            path: self.out_path,
            stub_path: self.stub_path,
        }
    }
}

/// Temp path for the materialized uninstaller, derived from the installer's
/// own unique file name so concurrent build units never collide.
pub fn temp_uninstaller_path(output_dir: &Path, installer_file_name: &str) -> PathBuf {
    output_dir.join(format!("__uninstaller-{installer_file_name}"))
}

async fn run_stub(stub: &Path, vm_command: Option<&str>) -> Result<()> {
    if cfg!(target_os = "windows") {
        return run_checked(Command::new(stub), &stub.display().to_string()).await;
    }

    match run_checked(
        {
            let mut command = Command::new("wine");
            command.arg(stub);
            command
        },
        "wine",
    )
    .await
    {
        Ok(()) => Ok(()),
        Err(emulation_error) => match vm_command {
            Some(vm) => {
                log::warn!("emulation failed ({emulation_error}); retrying through VM `{vm}`");
                run_checked(
                    {
                        let mut command = Command::new(vm);
                        command.arg(stub);
                        command
                    },
                    vm,
                )
                .await
            }
            None => Err(emulation_error),
        },
    }
}

async fn run_checked(mut command: Command, name: &str) -> Result<()> {
    let output = command.output().await.map_err(|e| Error::ExecFailed {
        command: name.to_string(),
        reason: e.to_string(),
    })?;
    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::ExecFailed {
            command: name.to_string(),
            reason: text,
        });
    }
    Ok(())
}

async fn wait_for_materialize(path: &Path, poll: &MaterializePoll) -> Result<()> {
    for _ in 0..poll.attempts {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::time::sleep(poll.interval).await;
    }
    Err(Error::MaterializeTimeout {
        path: path.to_path_buf(),
        waited_ms: u64::from(poll.attempts) * poll.interval.as_millis() as u64,
    })
}
