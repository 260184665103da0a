//! Push protocol definitions for Berth subscribers
//!
//! All messages are JSON text frames over WebSocket (TLS mandatory).
//! Server-to-client messages carry a `type` tag and a `data` payload:
//!
//! ```json
//! {"type": "status_update", "data": {"transfers": [...], "stats": {...}}}
//! ```
//!
//! The first message after a successful handshake is always `initial_data`
//! with the full record snapshot, so a reconnecting subscriber never has to
//! replay missed deltas.

use serde::{Deserialize, Serialize};

use crate::transfer::{InfoHash, TransferStatus};

/// One file inside a transfer, with fractional completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub size: u64,
    /// 0.0 - 100.0
    pub progress: f64,
}

/// Wire snapshot of a transfer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub hash: InfoHash,
    pub name: String,
    pub size: u64,
    pub status: TransferStatus,
    /// 0.0 - 100.0
    pub progress: f64,
    /// Bytes per second
    pub download_rate: u64,
    pub upload_rate: u64,
    pub downloaded: u64,
    pub uploaded: u64,
    pub peers: u32,
    pub seeds: u32,
    /// Seconds remaining, absent when unknown or not downloading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<u64>,
    pub save_path: String,
    /// Locator the transfer was added from, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Unix seconds
    pub added_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSummary>,
}

/// Aggregate session-wide bandwidth counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub download_rate: u64,
    pub upload_rate: u64,
    pub total_downloaded: u64,
    pub total_uploaded: u64,
}

/// Server-to-subscriber events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    /// Full snapshot sent once, immediately after a successful handshake
    InitialData {
        transfers: Vec<TransferSummary>,
        stats: SessionStats,
        timestamp: i64,
    },
    /// Batched change-set: only records that changed since the last broadcast
    StatusUpdate {
        transfers: Vec<TransferSummary>,
        stats: SessionStats,
        timestamp: i64,
    },
    /// A new transfer was accepted
    Added { transfer: TransferSummary },
    /// A transfer reached 100% (stamped exactly once per record)
    Completed { hash: InfoHash, name: String },
    /// A transfer record was removed
    Removed {
        hash: InfoHash,
        deleted_files: bool,
        /// Set when on-disk deletion failed; the removal itself succeeded
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    /// Remote-storage upload progress, tagged by task identity
    ExportProgress {
        hash: InfoHash,
        destination: String,
        percent: f64,
        bytes: u64,
    },
    ExportDone {
        hash: InfoHash,
        destination: String,
        locator: String,
        size: u64,
    },
    ExportFailed {
        hash: InfoHash,
        destination: String,
        reason: String,
    },
    /// Peer-pull lifecycle, tagged by (peer, transfer) identity
    PeerPullRequested { peer_id: String, hash: InfoHash },
    PeerPullDone { peer_id: String, hash: InfoHash },
    PeerPullFailed {
        peer_id: String,
        hash: InfoHash,
        reason: String,
    },
    /// Keep-alive reply
    Pong { timestamp: i64 },
    /// Hub-level problem (distinct from a record's `error` status)
    Error { message: String },
}

impl PushEvent {
    /// Wire name of this event (the `type` tag)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitialData { .. } => "initial_data",
            Self::StatusUpdate { .. } => "status_update",
            Self::Added { .. } => "added",
            Self::Completed { .. } => "completed",
            Self::Removed { .. } => "removed",
            Self::ExportProgress { .. } => "export_progress",
            Self::ExportDone { .. } => "export_done",
            Self::ExportFailed { .. } => "export_failed",
            Self::PeerPullRequested { .. } => "peer_pull_requested",
            Self::PeerPullDone { .. } => "peer_pull_done",
            Self::PeerPullFailed { .. } => "peer_pull_failed",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }
}

/// Subscriber-to-server frames
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriberFrame {
    /// Keep-alive; the server replies with `pong`
    Ping,
}
