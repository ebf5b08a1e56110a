//! Installer build pipeline.
//!
//! The [`orchestrator`] drives the full sequence for each build unit:
//! payload packing ([`archive`]), symbol table construction ([`symbols`]),
//! fragment gathering ([`fragments`]), script assembly ([`script`]), the
//! uninstaller sub-build ([`uninstaller`]), the external compiler
//! invocation ([`compiler`]), signing ([`sign`]), and differential-update
//! metadata ([`blockmap`]).

pub mod archive;
pub mod blockmap;
pub mod checksum;
pub mod compiler;
pub mod events;
pub mod fragments;
pub mod guid;
pub mod orchestrator;
pub mod script;
pub mod sign;
pub mod symbols;
pub mod template;
pub mod uninstaller;

pub use blockmap::UpdateInfo;
pub use events::{BuildEvent, EventReceiver, EventSender};
pub use orchestrator::{ArtifactDescriptor, BuildUnit, Orchestrator, plan_units};
pub use symbols::{DefineValue, SymbolTable};
