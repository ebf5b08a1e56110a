//! NSIS installer build orchestration library
//!
//! This library drives the full installer build for Windows targets:
//! - packs per-architecture application payloads into 7z archives
//! - derives the preprocessor symbol table handed to `makensis`
//! - composes the installer script from fragments and a base template
//! - runs the uninstaller sub-build and embeds the signed result
//! - emits differential-update metadata (block maps, web manifests)
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod builder;
pub mod error;
pub mod settings;

// Re-export commonly used types
pub use builder::{ArtifactDescriptor, BuildEvent, Orchestrator, UpdateInfo};
pub use error::{Error, Result};
pub use settings::{Arch, Settings, SettingsBuilder};
