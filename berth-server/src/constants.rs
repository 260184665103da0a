//! Server constants: defaults, config keys, and console message prefixes

// ========================================================================
// Defaults
// ========================================================================

/// Default reconciliation tick interval in seconds
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 2;

/// Consecutive ticks the engine may omit a tracked transfer before the
/// record is marked as desynchronized
pub const DEFAULT_DESYNC_THRESHOLD: u32 = 5;

/// Bounded outbound queue per subscriber connection; overflow drops the
/// connection, never the event
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// How often the subscriber loop checks for heartbeat expiry, in seconds
pub const HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 15;

/// Bound on a single discovery fetch when pulling from a peer, in seconds
pub const DISCOVERY_FETCH_TIMEOUT_SECS: u64 = 30;

/// Reason recorded when a transfer is marked `error` after the engine
/// stopped reporting it
pub const DESYNC_ERROR_REASON: &str = "engine stopped reporting this transfer";

/// Reason recorded when a storage upload channel closes without a terminal event
pub const UPLOAD_INTERRUPTED_REASON: &str = "upload interrupted";

// ========================================================================
// Config keys (sqlite `config` table)
// ========================================================================

pub const CONFIG_KEY_API_KEY: &str = "api_key";
pub const CONFIG_KEY_SEEDING_ENABLED: &str = "seeding_enabled";
pub const CONFIG_KEY_TICK_INTERVAL: &str = "tick_interval_secs";
pub const CONFIG_KEY_DESYNC_THRESHOLD: &str = "desync_threshold";
pub const CONFIG_KEY_DOWNLOAD_ROOT: &str = "download_root";

/// Seeding is on unless explicitly disabled
pub const DEFAULT_SEEDING_ENABLED: bool = true;

// ========================================================================
// TLS
// ========================================================================

pub const CERT_FILENAME: &str = "cert.pem";
pub const KEY_FILENAME: &str = "key.pem";
pub const TLS_CERT_COMMON_NAME: &str = "berthd";

/// Substring of the benign close_notify warning filtered from logs
pub const TLS_CLOSE_NOTIFY_MSG: &str = "close_notify";

/// Prefix of TLS handshake failures (scanners, incompatible clients)
pub const TLS_HANDSHAKE_FAILED_PREFIX: &str = "TLS handshake failed";

// ========================================================================
// Console messages
// ========================================================================

pub const MSG_BANNER: &str = "Berth transfer daemon v";
pub const MSG_DATABASE: &str = "Database: ";
pub const MSG_DOWNLOAD_ROOT: &str = "Download root: ";
pub const MSG_CERTIFICATES: &str = "Certificates: ";
pub const MSG_CERT_FINGERPRINT: &str = "Certificate fingerprint (SHA-256): ";
pub const MSG_GENERATING_CERT: &str = "Generating self-signed TLS certificate...";
pub const MSG_CERT_GENERATED: &str = "Certificate written to ";
pub const MSG_KEY_GENERATED: &str = "Private key written to ";
pub const MSG_LISTENING: &str = "Subscriber WebSocket listening on ";
pub const MSG_ENGINE_SIMULATED: &str = "Transfer engine: simulated (no external engine linked)";
pub const MSG_API_KEY_GENERATED: &str = "Generated subscriber api key: ";
pub const MSG_RESTORED_TRANSFERS: &str = "Restored transfers from database: ";
pub const MSG_SHUTDOWN_RECEIVED: &str = "Shutdown signal received, stopping...";

// ========================================================================
// Error messages
// ========================================================================

pub const ERR_GENERIC: &str = "Error: ";
pub const ERR_DATABASE_INIT: &str = "Failed to initialize database: ";
pub const ERR_DB_PATH_NO_PARENT: &str = "database path should have parent directory";
pub const ERR_BIND_FAILED: &str = "Failed to bind to ";
pub const ERR_ACCEPT: &str = "Failed to accept connection: ";
pub const ERR_CONNECTION: &str = "Connection error from ";
pub const ERR_TLS_INIT: &str = "Failed to initialize TLS: ";
pub const ERR_GENERATE_KEYPAIR: &str = "Failed to generate key pair: ";
pub const ERR_CREATE_CERT_PARAMS: &str = "Failed to create certificate params: ";
pub const ERR_GENERATE_CERT: &str = "Failed to generate certificate: ";
pub const ERR_WRITE_CERT_FILE: &str = "Failed to write certificate file: ";
pub const ERR_WRITE_KEY_FILE: &str = "Failed to write key file: ";
pub const ERR_OPEN_CERT_FILE: &str = "Failed to open certificate file: ";
pub const ERR_OPEN_KEY_FILE: &str = "Failed to open key file: ";
pub const ERR_PARSE_CERT: &str = "Failed to parse certificate: ";
pub const ERR_PARSE_KEY: &str = "Failed to parse private key: ";
pub const ERR_NO_CERTS_FOUND: &str = "No certificates found in certificate file";
pub const ERR_NO_KEY_FOUND: &str = "No private key found in key file";
pub const ERR_CREATE_TLS_CONFIG: &str = "Failed to create TLS config: ";
pub const ERR_SET_CERT_PERMISSIONS: &str = "Failed to set certificate permissions: ";
pub const ERR_SET_KEY_PERMISSIONS: &str = "Failed to set key permissions: ";
pub const ERR_SET_PERMISSIONS: &str = "Failed to set database permissions: ";
pub const ERR_READ_METADATA: &str = "Failed to read file metadata: ";
pub const ERR_SET_PERMS: &str = "Failed to set permissions: ";
pub const ERR_ENGINE_QUERY: &str = "Engine query failed (will retry next tick): ";
pub const ERR_PERSIST_RECORD: &str = "Failed to persist transfer record: ";
pub const ERR_RESTORE_TRANSFER: &str = "Failed to restore transfer: ";
pub const ERR_SIGNAL_SIGTERM: &str = "Failed to install SIGTERM handler";
pub const ERR_SIGNAL_SIGINT: &str = "Failed to install SIGINT handler";
pub const ERR_SIGNAL_CTRLC: &str = "Failed to install Ctrl+C handler";
