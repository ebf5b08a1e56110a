//! Error types for installer build orchestration.
//!
//! One flat error enum for the whole build pipeline. Configuration errors
//! are raised before any subprocess starts; external process failures carry
//! the captured output verbatim so callers can surface it for diagnosis.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias for build operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for all build operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration option is invalid or options conflict.
    ///
    /// Always reported before any external process is spawned.
    #[error("invalid configuration: option `{option}`: {reason}")]
    InvalidConfiguration {
        /// The offending option name.
        option: String,
        /// Why the value or combination is rejected.
        reason: String,
    },

    /// A symbol or flag was declared twice with conflicting values.
    #[error("symbol `{name}` already declared with a different value")]
    DuplicateSymbol {
        /// The colliding define/flag name.
        name: String,
    },

    /// The output file stayed locked across every probe attempt.
    ///
    /// Typically a virus scanner or another process holding the artifact.
    #[error("output file {} is locked by another process (gave up after {attempts} attempts)", path.display())]
    OutputFileLocked {
        /// The probed output path.
        path: PathBuf,
        /// How many exclusive-open probes were made.
        attempts: u32,
    },

    /// The external script compiler exited with a failure status.
    #[error("script compiler failed with {status}:\n{output}")]
    CompilerFailed {
        /// Process exit status.
        status: ExitStatus,
        /// Combined stdout and stderr, verbatim.
        output: String,
    },

    /// The signing collaborator reported a failure.
    #[error("signing {} failed:\n{output}", path.display())]
    SignFailed {
        /// The binary that was being signed.
        path: PathBuf,
        /// Captured signer output.
        output: String,
    },

    /// An external process could not be spawned or exited nonzero.
    #[error("`{command}` failed: {reason}")]
    ExecFailed {
        /// The command that failed.
        command: String,
        /// Spawn error or captured output.
        reason: String,
    },

    /// A required external tool was not found on PATH.
    #[error("required tool `{tool}` not found: {hint}")]
    ToolNotFound {
        /// Tool binary name.
        tool: String,
        /// Installation hint.
        hint: String,
    },

    /// The uninstaller stub ran but its output never appeared on disk.
    #[error("uninstaller did not materialize at {} within {waited_ms} ms", path.display())]
    MaterializeTimeout {
        /// Expected output path.
        path: PathBuf,
        /// Total time spent polling.
        waited_ms: u64,
    },

    /// The build was cancelled before completion.
    #[error("build cancelled")]
    Cancelled,

    /// IO error with the operation and path that produced it.
    #[error("{context} ({}): {source}", path.display())]
    Fs {
        /// What was being attempted.
        context: String,
        /// The path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// IO error with no path context.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors (config documents, update metadata).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for failures with a formatted message.
    #[error("{0}")]
    Generic(String),
}

/// Extension trait attaching operation/path context to IO results.
pub trait ErrorExt<T> {
    /// Wraps an IO error with what was being done and to which path.
    fn fs_context(self, context: &str, path: &std::path::Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: &std::path::Path) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context: context.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Extension trait prefixing any build error with a higher-level context line.
pub trait Context<T> {
    /// Wraps the error message with `context`.
    fn context(self, context: &str) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| Error::Generic(format!("{context}: {e}")))
    }
}

/// Returns early with an [`Error::Generic`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Generic(format!($($arg)*)))
    };
}
