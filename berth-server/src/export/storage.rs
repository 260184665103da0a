//! Storage Client boundary
//!
//! The storage client owns the actual bytes of a remote upload. It
//! reports progress as a stream of events on a channel, ending with
//! exactly one terminal event; the export orchestrator folds that stream
//! into task mutations and subscriber broadcasts.

use std::path::PathBuf;

use tokio::sync::mpsc;

/// Progress stream element for one upload
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Progress {
        /// 0.0 - 100.0
        percent: f64,
        bytes: u64,
    },
    /// Terminal: upload finished, `locator` addresses the stored copy
    Done { locator: String, size: u64 },
    /// Terminal: upload failed
    Failed { reason: String },
}

impl UploadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

/// Remote storage boundary
///
/// `upload` returns immediately with the event channel; the transfer of
/// bytes happens in a task owned by the implementation. Dropping the
/// receiver cancels nothing — uploads run to completion and the
/// orchestrator decides what still matters when they do.
pub trait StorageClient: Send + Sync + 'static {
    fn upload(&self, path: PathBuf, name: String) -> mpsc::Receiver<UploadEvent>;
}
