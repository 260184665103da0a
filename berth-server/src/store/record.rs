//! Canonical transfer record
//!
//! The record is the system's engine-independent representation of one
//! tracked transfer. It is created by an accepted add command, mutated
//! only through the store's serialized mutation path, and deleted by an
//! accepted remove command.

use std::path::PathBuf;

use berth_common::protocol::{FileSummary, TransferSummary};
use berth_common::transfer::{InfoHash, TransferStatus};
use chrono::{DateTime, Utc};

/// Canonical state of one tracked transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    /// Immutable identity
    pub hash: InfoHash,
    pub name: String,
    pub size: u64,
    pub status: TransferStatus,
    /// 0.0 - 100.0; never decreases except while a recheck is in flight
    pub progress: f64,
    pub download_rate: u64,
    pub upload_rate: u64,
    pub downloaded: u64,
    pub uploaded: u64,
    pub peers: u32,
    pub seeds: u32,
    /// Seconds remaining, when downloading at a known rate
    pub eta: Option<u64>,
    pub save_path: PathBuf,
    /// Locator the transfer was added from, when one exists
    pub source: Option<String>,
    pub added_at: DateTime<Utc>,
    /// Stamped exactly once, when progress first reaches 100
    pub completed_at: Option<DateTime<Utc>>,
    /// Human-readable reason while status is `Error`
    pub error: Option<String>,
    pub files: Vec<FileSummary>,
    /// Cleared when seeding is stopped manually so restart recovery
    /// leaves the transfer alone
    pub resume_on_start: bool,
    /// Sequence number of the last command that touched this record;
    /// reconciliation rows observed before it may not change status
    pub cmd_seq: u64,
    /// Consecutive reconciliation ticks the engine omitted this record
    pub missed_ticks: u32,
}

impl TransferRecord {
    /// Create a fresh record in `Queued`, as assigned on an accepted add
    pub fn new(hash: InfoHash, name: String, save_path: PathBuf, source: Option<String>) -> Self {
        Self {
            hash,
            name,
            size: 0,
            status: TransferStatus::Queued,
            progress: 0.0,
            download_rate: 0,
            upload_rate: 0,
            downloaded: 0,
            uploaded: 0,
            peers: 0,
            seeds: 0,
            eta: None,
            save_path,
            source,
            added_at: Utc::now(),
            completed_at: None,
            error: None,
            files: Vec::new(),
            resume_on_start: true,
            cmd_seq: 0,
            missed_ticks: 0,
        }
    }

    /// Wire snapshot for broadcasts and the initial subscriber payload
    pub fn to_summary(&self) -> TransferSummary {
        TransferSummary {
            hash: self.hash.clone(),
            name: self.name.clone(),
            size: self.size,
            status: self.status,
            progress: self.progress,
            download_rate: self.download_rate,
            upload_rate: self.upload_rate,
            downloaded: self.downloaded,
            uploaded: self.uploaded,
            peers: self.peers,
            seeds: self.seeds,
            eta: self.eta,
            save_path: self.save_path.display().to_string(),
            source: self.source.clone(),
            added_at: self.added_at.timestamp(),
            completed_at: self.completed_at.map(|t| t.timestamp()),
            files: self.files.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> TransferRecord {
        TransferRecord::new(
            InfoHash::parse("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3").unwrap(),
            "linux.iso".to_string(),
            PathBuf::from("/downloads"),
            Some("magnet:?xt=urn:btih:a94a8fe5ccb19ba61c4c0873d391e987982fbbd3".to_string()),
        )
    }

    #[test]
    fn test_new_record_starts_queued() {
        let record = test_record();
        assert_eq!(record.status, TransferStatus::Queued);
        assert_eq!(record.progress, 0.0);
        assert!(record.completed_at.is_none());
        assert!(record.resume_on_start);
    }

    #[test]
    fn test_summary_reflects_record() {
        let mut record = test_record();
        record.progress = 55.5;
        record.status = TransferStatus::Downloading;
        record.size = 4096;

        let summary = record.to_summary();
        assert_eq!(summary.hash, record.hash);
        assert_eq!(summary.progress, 55.5);
        assert_eq!(summary.status, TransferStatus::Downloading);
        assert_eq!(summary.save_path, "/downloads");
        assert_eq!(summary.added_at, record.added_at.timestamp());
    }

    #[test]
    fn test_summary_ignores_bookkeeping_fields() {
        let record = test_record();
        let mut other = record.clone();
        other.cmd_seq = 42;
        other.missed_ticks = 3;
        // Wire images must match even though internal bookkeeping differs
        assert_eq!(record.to_summary(), other.to_summary());
    }
}
