//! Daemon configuration database operations
//!
//! Simple key/value settings with typed getters that fall back to the
//! compiled-in defaults when a key is missing or unparseable.

use std::io;
use std::path::PathBuf;

use sqlx::SqlitePool;

use super::sql::{SQL_GET_CONFIG, SQL_SET_CONFIG};
use crate::constants::{
    CONFIG_KEY_API_KEY, CONFIG_KEY_DESYNC_THRESHOLD, CONFIG_KEY_DOWNLOAD_ROOT,
    CONFIG_KEY_SEEDING_ENABLED, CONFIG_KEY_TICK_INTERVAL, DEFAULT_DESYNC_THRESHOLD,
    DEFAULT_SEEDING_ENABLED, DEFAULT_TICK_INTERVAL_SECS,
};

/// Database interface for daemon settings
#[derive(Clone)]
pub struct ConfigDb {
    pool: SqlitePool,
}

impl ConfigDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_value(&self, key: &str) -> Option<String> {
        sqlx::query_scalar::<_, String>(SQL_GET_CONFIG)
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .ok()
    }

    async fn set_value(&self, key: &str, value: &str) -> io::Result<()> {
        sqlx::query(SQL_SET_CONFIG)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(io::Error::other)?;
        Ok(())
    }

    /// Get the subscriber api key, if one has been stored
    pub async fn get_api_key(&self) -> Option<String> {
        self.get_value(CONFIG_KEY_API_KEY).await
    }

    /// Store the subscriber api key
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_api_key(&self, key: &str) -> io::Result<()> {
        self.set_value(CONFIG_KEY_API_KEY, key).await
    }

    /// Whether transfers keep uploading after completion.
    ///
    /// With seeding disabled a transfer reaching 100% becomes `completed`
    /// directly and never enters `seeding`.
    pub async fn get_seeding_enabled(&self) -> bool {
        self.get_value(CONFIG_KEY_SEEDING_ENABLED)
            .await
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SEEDING_ENABLED)
    }

    pub async fn set_seeding_enabled(&self, enabled: bool) -> io::Result<()> {
        self.set_value(CONFIG_KEY_SEEDING_ENABLED, &enabled.to_string())
            .await
    }

    /// Reconciliation tick interval in seconds (default 2)
    pub async fn get_tick_interval_secs(&self) -> u64 {
        self.get_value(CONFIG_KEY_TICK_INTERVAL)
            .await
            .and_then(|v| v.parse().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_TICK_INTERVAL_SECS)
    }

    pub async fn set_tick_interval_secs(&self, secs: u64) -> io::Result<()> {
        self.set_value(CONFIG_KEY_TICK_INTERVAL, &secs.to_string())
            .await
    }

    /// Consecutive missed ticks before a record is marked desynchronized
    /// (default 5)
    pub async fn get_desync_threshold(&self) -> u32 {
        self.get_value(CONFIG_KEY_DESYNC_THRESHOLD)
            .await
            .and_then(|v| v.parse().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_DESYNC_THRESHOLD)
    }

    pub async fn set_desync_threshold(&self, ticks: u32) -> io::Result<()> {
        self.set_value(CONFIG_KEY_DESYNC_THRESHOLD, &ticks.to_string())
            .await
    }

    /// Stored download root override, when one was set
    pub async fn get_download_root(&self) -> Option<PathBuf> {
        self.get_value(CONFIG_KEY_DOWNLOAD_ROOT).await.map(PathBuf::from)
    }

    pub async fn set_download_root(&self, path: &str) -> io::Result<()> {
        self.set_value(CONFIG_KEY_DOWNLOAD_ROOT, path).await
    }
}
