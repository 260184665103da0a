//! Transfer snapshot database operations

use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use berth_common::protocol::FileSummary;
use berth_common::transfer::{InfoHash, TransferStatus};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::sql::{SQL_DELETE_TRANSFER, SQL_SELECT_ALL_TRANSFERS, SQL_UPSERT_TRANSFER};
use crate::store::TransferRecord;

/// A transfer row as loaded from sqlite
#[derive(Debug, Clone)]
pub struct StoredTransfer {
    pub hash: InfoHash,
    pub name: String,
    pub size: u64,
    pub status: TransferStatus,
    pub progress: f64,
    pub save_path: PathBuf,
    pub source: Option<String>,
    pub added_at: i64,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
    pub files: Vec<FileSummary>,
    pub resume_on_start: bool,
}

impl StoredTransfer {
    /// Rebuild an in-memory record from this snapshot
    pub fn into_record(self) -> TransferRecord {
        let mut record = TransferRecord::new(self.hash, self.name, self.save_path, self.source);
        record.size = self.size;
        record.status = self.status;
        record.progress = self.progress;
        record.added_at = DateTime::from_timestamp(self.added_at, 0).unwrap_or_else(Utc::now);
        record.completed_at = self.completed_at.and_then(|t| DateTime::from_timestamp(t, 0));
        record.error = self.error;
        record.files = self.files;
        record.resume_on_start = self.resume_on_start;
        record
    }
}

/// Database interface for transfer snapshots
#[derive(Clone)]
pub struct TransferDb {
    pool: SqlitePool,
}

impl TransferDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write (or rewrite) one record's snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn upsert(&self, record: &TransferRecord) -> io::Result<()> {
        let files = serde_json::to_string(&record.files).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(SQL_UPSERT_TRANSFER)
            .bind(record.hash.as_str())
            .bind(&record.name)
            .bind(record.size as i64)
            .bind(record.status.to_string())
            .bind(record.progress)
            .bind(record.save_path.display().to_string())
            .bind(&record.source)
            .bind(record.added_at.timestamp())
            .bind(record.completed_at.map(|t| t.timestamp()))
            .bind(&record.error)
            .bind(files)
            .bind(record.resume_on_start)
            .execute(&self.pool)
            .await
            .map_err(io::Error::other)?;
        Ok(())
    }

    /// Delete one snapshot by hash
    pub async fn delete(&self, hash: &InfoHash) -> io::Result<()> {
        sqlx::query(SQL_DELETE_TRANSFER)
            .bind(hash.as_str())
            .execute(&self.pool)
            .await
            .map_err(io::Error::other)?;
        Ok(())
    }

    /// Load every stored snapshot, oldest first.
    ///
    /// Rows with an unparseable hash are skipped rather than failing the
    /// whole load; a corrupt row must not keep the daemon from starting.
    pub async fn load_all(&self) -> io::Result<Vec<StoredTransfer>> {
        let rows = sqlx::query(SQL_SELECT_ALL_TRANSFERS)
            .fetch_all(&self.pool)
            .await
            .map_err(io::Error::other)?;

        let mut transfers = Vec::with_capacity(rows.len());
        for row in rows {
            let hash: String = row.try_get("hash").map_err(io::Error::other)?;
            let Ok(hash) = InfoHash::parse(&hash) else {
                continue;
            };

            let status: String = row.try_get("status").map_err(io::Error::other)?;
            let files: String = row.try_get("files").map_err(io::Error::other)?;

            transfers.push(StoredTransfer {
                hash,
                name: row.try_get("name").map_err(io::Error::other)?,
                size: row.try_get::<i64, _>("size").map_err(io::Error::other)? as u64,
                status: TransferStatus::from_str(&status).unwrap_or(TransferStatus::Queued),
                progress: row.try_get("progress").map_err(io::Error::other)?,
                save_path: PathBuf::from(
                    row.try_get::<String, _>("save_path").map_err(io::Error::other)?,
                ),
                source: row.try_get("source").map_err(io::Error::other)?,
                added_at: row.try_get("added_at").map_err(io::Error::other)?,
                completed_at: row.try_get("completed_at").map_err(io::Error::other)?,
                error: row.try_get("error").map_err(io::Error::other)?,
                files: serde_json::from_str(&files).unwrap_or_default(),
                resume_on_start: row.try_get("resume_on_start").map_err(io::Error::other)?,
            });
        }
        Ok(transfers)
    }
}
