//! Persistence layer (sqlite via sqlx)
//!
//! The store of record for restarts: transfer snapshots, export history,
//! and key/value settings. The in-memory Transfer Record Store remains
//! authoritative while the daemon runs; this layer only has to be good
//! enough to restore state at boot and answer history queries.

pub mod config;
pub mod exports;
mod sql;
pub mod transfers;

pub use config::ConfigDb;
pub use exports::{ExportDb, ExportRecord};
pub use transfers::{StoredTransfer, TransferDb};

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Handle bundling the per-table database interfaces.
///
/// SqlitePool uses Arc internally, so cloning is cheap.
#[derive(Clone)]
pub struct Database {
    pub transfers: TransferDb,
    pub exports: ExportDb,
    pub config: ConfigDb,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            transfers: TransferDb::new(pool.clone()),
            exports: ExportDb::new(pool.clone()),
            config: ConfigDb::new(pool),
        }
    }

    /// Open an isolated in-memory database with the schema applied.
    ///
    /// A single-connection pool, since every sqlite `:memory:` connection
    /// is its own database.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        create_tables(&pool).await?;
        Ok(Self::new(pool))
    }
}

/// Default database path for the current platform
/// (e.g. `~/.local/share/berthd/berth.db` on Linux)
pub fn default_database_path() -> Result<PathBuf, String> {
    let data_dir = dirs::data_dir().ok_or("Could not determine platform data directory")?;
    Ok(data_dir.join("berthd").join("berth.db"))
}

/// Initialize the database connection pool and create tables
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    create_tables(&pool).await?;
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(sql::SQL_CREATE_TRANSFERS).execute(pool).await?;
    sqlx::query(sql::SQL_CREATE_EXPORTS).execute(pool).await?;
    sqlx::query(sql::SQL_CREATE_CONFIG).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_db_creates_file_and_tables() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("berth.db");

        let pool = init_db(&path).await.unwrap();
        assert!(path.exists());

        // Tables are queryable immediately
        let db = Database::new(pool);
        assert!(db.transfers.load_all().await.unwrap().is_empty());
        assert!(db.exports.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(db.config.get_api_key().await.is_none());
    }
}
