//! Configuration structures for installer builds.
//!
//! The raw serde document ([`RawInstallerOptions`]) is validated into the
//! typed model ([`InstallerOptions`], [`InstallerMode`]) before any build
//! work starts, so contradictory mode flags are rejected up front and the
//! rest of the pipeline never checks them again.

mod arch;
mod builder;
mod core;
mod options;
mod raw;

pub use arch::Arch;
pub use builder::SettingsBuilder;
pub use core::{PackageSettings, Settings};
pub use options::{
    AssistedOptions, Compression, DeliveryKind, FileAssociation, InstallerMode, InstallerOptions,
    OneClickOptions,
};
pub use raw::RawInstallerOptions;
