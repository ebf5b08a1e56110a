//! External script compiler invocation.
//!
//! Serializes the frozen symbol table into command-line arguments, probes
//! the output path for lock contention, and pipes the composed script text
//! to the compiler over standard input (no temporary script file to clean
//! up). A nonzero exit is a hard failure carrying the captured output
//! verbatim.

use crate::builder::symbols::CompilerArgs;
use crate::error::{Error, ErrorExt, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// UTF-8 byte order mark the compiler expects at the start of script text.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Locates the script compiler binary on PATH.
pub fn find_compiler() -> Result<PathBuf> {
    which::which("makensis").map_err(|_| Error::ToolNotFound {
        tool: "makensis".into(),
        hint: "install NSIS (e.g. apt-get install nsis)".into(),
    })
}

/// Output-lock probe cadence.
///
/// Virus scanners and indexers routinely hold freshly interesting paths for
/// a moment; the probe retries on a fixed delay instead of failing on the
/// first contention.
#[derive(Clone, Copy, Debug)]
pub struct LockProbe {
    /// Maximum number of exclusive-open attempts.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for LockProbe {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
        }
    }
}

/// Waits until `path` can be opened for writing.
///
/// Returns the number of backoff delays taken. Fails with
/// [`Error::OutputFileLocked`] once the attempt budget is exhausted.
pub async fn wait_for_writable(path: &Path, probe: &LockProbe) -> Result<u32> {
    wait_for_unlock(path, probe, probe_writable).await
}

async fn wait_for_unlock(
    path: &Path,
    probe: &LockProbe,
    mut is_writable: impl FnMut(&Path) -> bool,
) -> Result<u32> {
    let mut delays = 0u32;
    for attempt in 1..=probe.attempts {
        if is_writable(path) {
            return Ok(delays);
        }
        if attempt == probe.attempts {
            break;
        }
        log::debug!(
            "output {} is locked (attempt {attempt}/{}); retrying",
            path.display(),
            probe.attempts
        );
        tokio::time::sleep(probe.delay).await;
        delays += 1;
    }
    Err(Error::OutputFileLocked {
        path: path.to_path_buf(),
        attempts: probe.attempts,
    })
}

/// One exclusive-open probe. A missing file is writable by definition.
fn probe_writable(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    std::fs::OpenOptions::new().write(true).open(path).is_ok()
}

/// Runs the compiler over `script`, producing `output_path`.
///
/// The script text travels over stdin (BOM-prefixed UTF-8); defines and
/// commands travel as arguments. `warnings_as_errors` adds `-WX`.
pub async fn compile(
    compiler: &Path,
    args: &CompilerArgs,
    script: &str,
    output_path: &Path,
    warnings_as_errors: bool,
    probe: &LockProbe,
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating installer output directory", parent)?;
    }
    wait_for_writable(output_path, probe).await?;

    let mut command = Command::new(compiler);
    if warnings_as_errors {
        command.arg("-WX");
    }
    command.args(["-INPUTCHARSET", "UTF8"]);
    command.args(args.as_slice());
    // Trailing marker: read the script from standard input.
    command.arg("-");
    command
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    log::info!("running script compiler for {}", output_path.display());
    let mut child = command.spawn().map_err(|e| Error::ExecFailed {
        command: compiler.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::Generic("compiler stdin was not piped".into()))?;
    stdin.write_all(UTF8_BOM).await?;
    stdin.write_all(script.as_bytes()).await?;
    drop(stdin);

    let output = child.wait_with_output().await.map_err(|e| Error::ExecFailed {
        command: compiler.display().to_string(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        return Err(Error::CompilerFailed {
            status: output.status,
            output: text,
        });
    }
    Ok(())
}
