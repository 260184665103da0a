//! Export task state

use berth_common::time::unix_now;
use berth_common::transfer::InfoHash;

/// Lifecycle of one upload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Uploading,
    Completed,
    Failed,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One upload of one transfer to one destination.
///
/// Identity is (transfer, destination); at most one non-terminal task
/// exists per identity at any time. Terminal tasks are retained for
/// history until a fresh export replaces them.
#[derive(Debug, Clone)]
pub struct ExportTask {
    pub hash: InfoHash,
    pub destination: String,
    pub state: ExportState,
    /// 0.0 - 100.0
    pub progress: f64,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    /// Set on completion: where the stored copy lives
    pub locator: Option<String>,
    /// Set on failure
    pub error: Option<String>,
}

impl ExportTask {
    /// Fresh task, created in `Uploading` on an accepted export command
    pub fn new(hash: InfoHash, destination: String) -> Self {
        Self {
            hash,
            destination,
            state: ExportState::Uploading,
            progress: 0.0,
            started_at: unix_now(),
            finished_at: None,
            locator: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
