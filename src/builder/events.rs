//! Packaging-event sink.
//!
//! The orchestrator emits lifecycle notifications for the surrounding
//! pipeline (reporting, publishing). Nothing in this crate consumes them
//! back; a closed receiver is ignored rather than failing the build.

use super::blockmap::UpdateInfo;
use crate::settings::Arch;
use std::path::PathBuf;

/// Lifecycle notification for one installer artifact.
#[derive(Clone, Debug)]
pub enum BuildEvent {
    /// Compilation of an artifact is about to start.
    ArtifactBuildStarted {
        /// Logical target name (`nsis` or `nsis-web`).
        target: String,
        /// Planned artifact path.
        file: PathBuf,
        /// Architectures covered by the artifact.
        archs: Vec<Arch>,
    },
    /// An artifact and its metadata were emitted.
    ArtifactBuildCompleted {
        /// Logical target name.
        target: String,
        /// Finished artifact path.
        file: PathBuf,
        /// Architectures covered by the artifact.
        archs: Vec<Arch>,
        /// Differential-update metadata, when produced.
        update_info: Option<UpdateInfo>,
    },
}

/// Sending half handed to the orchestrator.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<BuildEvent>;
/// Receiving half kept by the surrounding pipeline.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<BuildEvent>;

/// Creates an event channel pair.
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
