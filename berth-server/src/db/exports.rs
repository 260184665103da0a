//! Export history database operations

use std::io;

use berth_common::time::unix_now;
use berth_common::transfer::InfoHash;
use sqlx::{Row, SqlitePool};

use super::sql::{SQL_INSERT_EXPORT, SQL_SELECT_EXPORT_HISTORY};

/// One completed export, as recorded for history
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub id: i64,
    pub hash: InfoHash,
    pub destination: String,
    pub locator: String,
    pub size: u64,
    pub exported_at: i64,
}

/// Database interface for export history
#[derive(Clone)]
pub struct ExportDb {
    pool: SqlitePool,
}

impl ExportDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one completed export
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn add(
        &self,
        hash: &InfoHash,
        destination: &str,
        locator: &str,
        size: u64,
    ) -> io::Result<()> {
        sqlx::query(SQL_INSERT_EXPORT)
            .bind(hash.as_str())
            .bind(destination)
            .bind(locator)
            .bind(size as i64)
            .bind(unix_now())
            .execute(&self.pool)
            .await
            .map_err(io::Error::other)?;
        Ok(())
    }

    /// Full export history, newest first
    pub async fn history(&self) -> io::Result<Vec<ExportRecord>> {
        let rows = sqlx::query(SQL_SELECT_EXPORT_HISTORY)
            .fetch_all(&self.pool)
            .await
            .map_err(io::Error::other)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let hash: String = row.try_get("hash").map_err(io::Error::other)?;
            let Ok(hash) = InfoHash::parse(&hash) else {
                continue;
            };
            records.push(ExportRecord {
                id: row.try_get("id").map_err(io::Error::other)?,
                hash,
                destination: row.try_get("destination").map_err(io::Error::other)?,
                locator: row.try_get("locator").map_err(io::Error::other)?,
                size: row.try_get::<i64, _>("size").map_err(io::Error::other)? as u64,
                exported_at: row.try_get("exported_at").map_err(io::Error::other)?,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_hash() -> InfoHash {
        InfoHash::parse("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3").unwrap()
    }

    #[tokio::test]
    async fn test_add_and_history() {
        let db = Database::open_in_memory().await.unwrap();
        db.exports
            .add(&test_hash(), "webdav", "dav://host/torrents/linux.iso", 4096)
            .await
            .unwrap();

        let history = db.exports.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].hash, test_hash());
        assert_eq!(history[0].destination, "webdav");
        assert_eq!(history[0].size, 4096);
        assert!(history[0].exported_at > 0);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let db = Database::open_in_memory().await.unwrap();
        db.exports
            .add(&test_hash(), "webdav", "dav://host/a", 1)
            .await
            .unwrap();
        db.exports
            .add(&test_hash(), "s3", "s3://bucket/b", 2)
            .await
            .unwrap();

        let history = db.exports.history().await.unwrap();
        assert_eq!(history.len(), 2);
        // Same second is likely; the id tie-break keeps insertion order reversed
        assert_eq!(history[0].destination, "s3");
        assert_eq!(history[1].destination, "webdav");
    }
}
