//! SQL query constants for database operations
//!
//! This module contains all SQL used by the persistence layer. Each query
//! is documented with its parameters and special behaviors.

// ========================================================================
// Schema
// ========================================================================

/// Transfer record snapshots, keyed by info-hash.
///
/// One row per tracked transfer; rewritten on every persisted mutation
/// and deleted on remove. `files` is a JSON array of file summaries.
pub const SQL_CREATE_TRANSFERS: &str = "CREATE TABLE IF NOT EXISTS transfers (
    hash TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    progress REAL NOT NULL DEFAULT 0,
    save_path TEXT NOT NULL,
    source TEXT,
    added_at INTEGER NOT NULL,
    completed_at INTEGER,
    error TEXT,
    files TEXT NOT NULL DEFAULT '[]',
    resume_on_start INTEGER NOT NULL DEFAULT 1
)";

/// Remote-storage upload history
pub const SQL_CREATE_EXPORTS: &str = "CREATE TABLE IF NOT EXISTS exports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash TEXT NOT NULL,
    destination TEXT NOT NULL,
    locator TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    exported_at INTEGER NOT NULL
)";

/// Key/value daemon settings
pub const SQL_CREATE_CONFIG: &str = "CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";

// ========================================================================
// Transfer Operations
// ========================================================================

/// Insert or rewrite a transfer snapshot
///
/// **Parameters:** hash, name, size, status, progress, save_path, source,
/// added_at, completed_at, error, files (JSON), resume_on_start
pub const SQL_UPSERT_TRANSFER: &str = "INSERT INTO transfers
    (hash, name, size, status, progress, save_path, source, added_at, completed_at, error, files, resume_on_start)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(hash) DO UPDATE SET
        name = excluded.name,
        size = excluded.size,
        status = excluded.status,
        progress = excluded.progress,
        save_path = excluded.save_path,
        source = excluded.source,
        completed_at = excluded.completed_at,
        error = excluded.error,
        files = excluded.files,
        resume_on_start = excluded.resume_on_start";

/// Delete a transfer snapshot by hash
///
/// **Parameters:**
/// 1. `hash: &str`
pub const SQL_DELETE_TRANSFER: &str = "DELETE FROM transfers WHERE hash = ?";

/// Select every stored transfer, oldest first
pub const SQL_SELECT_ALL_TRANSFERS: &str = "SELECT hash, name, size, status, progress, save_path, source, added_at, completed_at, error, files, resume_on_start FROM transfers ORDER BY added_at";

// ========================================================================
// Export Operations
// ========================================================================

/// Record a completed export
///
/// **Parameters:** hash, destination, locator, size, exported_at
pub const SQL_INSERT_EXPORT: &str =
    "INSERT INTO exports (hash, destination, locator, size, exported_at) VALUES (?, ?, ?, ?, ?)";

/// Select export history, newest first
pub const SQL_SELECT_EXPORT_HISTORY: &str =
    "SELECT id, hash, destination, locator, size, exported_at FROM exports ORDER BY exported_at DESC, id DESC";

// ========================================================================
// Configuration Operations
// ========================================================================

/// Get a configuration value by key
///
/// **Parameters:**
/// 1. `key: &str`
///
/// **Returns:** `(value: String)`
pub const SQL_GET_CONFIG: &str = "SELECT value FROM config WHERE key = ?";

/// Set a configuration value (insert or replace)
///
/// **Parameters:**
/// 1. `key: &str`
/// 2. `value: &str`
pub const SQL_SET_CONFIG: &str = "INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)";
