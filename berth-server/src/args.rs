//! Command-line argument parsing

use berth_common::DEFAULT_PORT;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// Get default database path help text for current platform
fn default_database_help() -> String {
    #[cfg(target_os = "linux")]
    return "Database file path (default: ~/.local/share/berthd/berth.db)".to_string();

    #[cfg(target_os = "macos")]
    return "Database file path (default: ~/Library/Application Support/berthd/berth.db)"
        .to_string();

    #[cfg(target_os = "windows")]
    return "Database file path (default: %APPDATA%\\berthd\\berth.db)".to_string();

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return "Database file path (overrides platform default)".to_string();
}

/// Berth transfer daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IP address to bind to (IPv4 or IPv6)
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port for subscriber WebSocket connections
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Database file path (overrides platform default)
    #[arg(short, long, help = default_database_help())]
    pub database: Option<PathBuf>,

    /// Directory completed downloads land in (overrides stored setting)
    #[arg(short = 'r', long = "download-root")]
    pub download_root: Option<PathBuf>,

    /// Subscriber api key (overrides stored setting)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Reconciliation tick interval in seconds (stored for future runs)
    #[arg(long)]
    pub tick_interval: Option<u64>,

    /// Consecutive silent ticks before a transfer is marked desynchronized
    /// (stored for future runs)
    #[arg(long)]
    pub desync_threshold: Option<u32>,

    /// Enable debug logging (subscriber connects, engine query failures)
    #[arg(long, default_value = "false")]
    pub debug: bool,
}
