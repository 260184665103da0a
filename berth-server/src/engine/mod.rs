//! Transfer Engine boundary
//!
//! The engine owns the actual transfer protocol (piece selection, peer
//! wire, trackers). Berth only drives it: commands delegate here before
//! touching the record store, and the reconciliation loop merges the
//! engine's reported state back into the store on every tick.
//!
//! Methods return `Send` futures so engine calls can run inside spawned
//! tasks without blocking the mutation path.

pub mod sim;

pub use sim::SimEngine;

use std::future::Future;
use std::path::PathBuf;

use berth_common::transfer::InfoHash;

/// Errors surfaced by the engine boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transient: the engine could not be reached; retry next tick
    Unavailable(String),
    /// The supplied source was rejected by the engine
    InvalidSource(String),
    /// The engine does not track this identifier
    NotFound,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(detail) => write!(f, "engine unavailable: {}", detail),
            Self::InvalidSource(detail) => write!(f, "engine rejected source: {}", detail),
            Self::NotFound => write!(f, "engine does not track this transfer"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Everything the engine needs to start tracking a transfer
#[derive(Debug, Clone)]
pub struct AddRequest {
    pub info_hash: InfoHash,
    /// Magnet link or other locator, when the source had one
    pub locator: Option<String>,
    /// Raw metadata descriptor bytes, when the source was opaque
    pub descriptor: Option<Vec<u8>>,
    /// Display name hint; the engine may override it once metadata arrives
    pub name: Option<String>,
    pub save_path: PathBuf,
}

/// One file inside an engine-reported transfer
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFile {
    pub path: String,
    pub size: u64,
    /// 0.0 - 100.0
    pub progress: f64,
}

/// Live state of one transfer as reported by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub hash: InfoHash,
    /// None until the engine has resolved metadata
    pub name: Option<String>,
    pub total_size: u64,
    /// 0.0 - 100.0
    pub progress: f64,
    pub download_rate: u64,
    pub upload_rate: u64,
    pub downloaded: u64,
    pub uploaded: u64,
    pub peers: u32,
    pub seeds: u32,
    pub is_paused: bool,
    pub is_checking: bool,
    /// Actively uploading after completion
    pub is_seeding: bool,
    pub error: Option<String>,
    pub files: Vec<EngineFile>,
}

/// External transfer engine boundary
///
/// `query_all` is the only bulk call; the reconciliation loop issues one
/// per tick rather than one query per record.
pub trait TransferEngine: Send + Sync + 'static {
    fn add(&self, request: AddRequest)
    -> impl Future<Output = Result<(), EngineError>> + Send;

    fn pause(&self, hash: &InfoHash) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn resume(&self, hash: &InfoHash) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn remove(
        &self,
        hash: &InfoHash,
        delete_files: bool,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn recheck(&self, hash: &InfoHash) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn query_all(&self) -> impl Future<Output = Result<Vec<EngineStatus>, EngineError>> + Send;
}
