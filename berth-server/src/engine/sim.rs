//! Simulated transfer engine
//!
//! Deterministic in-process stand-in for a real engine: progress advances
//! by a fixed step on every `query_all` poll, completion flips the
//! transfer into seeding, and test helpers can inject errors, rewind
//! progress, or make transfers vanish from query results entirely.
//!
//! `berthd` runs on this engine until a real one is linked; every test in
//! the workspace drives it directly.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use berth_common::transfer::InfoHash;

use super::{AddRequest, EngineError, EngineFile, EngineStatus, TransferEngine};

/// Default simulated payload size when the source carries none (256 MB)
const DEFAULT_SIZE: u64 = 256 * 1024 * 1024;

/// Progress gained per poll, in percent
const DEFAULT_STEP: f64 = 5.0;

/// Upload rate reported while seeding, bytes per second
const SEED_RATE: u64 = 48 * 1024;

struct SimTransfer {
    name: String,
    size: u64,
    progress: f64,
    uploaded: u64,
    paused: bool,
    checking: bool,
    error: Option<String>,
    hidden: bool,
}

impl SimTransfer {
    fn files(&self) -> Vec<EngineFile> {
        // One payload file plus a small sidecar, enough to exercise
        // per-file progress plumbing
        vec![
            EngineFile {
                path: format!("{}/{}.bin", self.name, self.name),
                size: self.size.saturating_sub(2048),
                progress: self.progress,
            },
            EngineFile {
                path: format!("{}/{}.nfo", self.name, self.name),
                size: 2048,
                progress: if self.progress > 0.0 { 100.0 } else { 0.0 },
            },
        ]
    }

    fn to_status(&self, hash: &InfoHash, step: f64) -> EngineStatus {
        let complete = self.progress >= 100.0;
        let active = !self.paused && self.error.is_none();
        let download_rate = if active && !complete && !self.checking {
            // Step percent of the payload per poll, folded to a per-second rate
            (self.size as f64 * step / 100.0) as u64
        } else {
            0
        };
        let upload_rate = if complete && active { SEED_RATE } else { 0 };

        EngineStatus {
            hash: hash.clone(),
            name: Some(self.name.clone()),
            total_size: self.size,
            progress: self.progress,
            download_rate,
            upload_rate,
            downloaded: (self.size as f64 * self.progress / 100.0) as u64,
            uploaded: self.uploaded,
            peers: if active { 5 } else { 0 },
            seeds: if active { 2 } else { 0 },
            is_paused: self.paused,
            is_checking: self.checking,
            is_seeding: complete && active,
            error: self.error.clone(),
            files: self.files(),
        }
    }
}

/// Simulated engine; see module docs
pub struct SimEngine {
    transfers: Mutex<HashMap<InfoHash, SimTransfer>>,
    unavailable: AtomicBool,
    step: f64,
}

impl SimEngine {
    pub fn new() -> Self {
        Self {
            transfers: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            step: DEFAULT_STEP,
        }
    }

    /// Engine that makes no progress on its own; tests drive state explicitly
    pub fn frozen() -> Self {
        Self {
            step: 0.0,
            ..Self::new()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<InfoHash, SimTransfer>> {
        self.transfers.lock().expect("sim engine lock poisoned")
    }

    /// Simulate the engine becoming unreachable (or reachable again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Force a transfer's progress to an exact value
    pub fn set_progress(&self, hash: &InfoHash, progress: f64) {
        if let Some(t) = self.lock().get_mut(hash) {
            t.progress = progress.clamp(0.0, 100.0);
        }
    }

    /// Mark a transfer as failed inside the engine
    pub fn set_error(&self, hash: &InfoHash, reason: &str) {
        if let Some(t) = self.lock().get_mut(hash) {
            t.error = Some(reason.to_string());
        }
    }

    /// Drop a transfer from `query_all` results without removing it,
    /// simulating an engine desync
    pub fn vanish(&self, hash: &InfoHash) {
        if let Some(t) = self.lock().get_mut(hash) {
            t.hidden = true;
        }
    }

    /// Number of transfers the engine currently tracks
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEngine for SimEngine {
    async fn add(&self, request: AddRequest) -> Result<(), EngineError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(EngineError::Unavailable("simulated outage".to_string()));
        }

        let mut transfers = self.lock();
        // Duplicate adds are tolerated, matching libtorrent's
        // duplicate_is_error = false posture
        transfers.entry(request.info_hash.clone()).or_insert_with(|| {
            let name = request
                .name
                .unwrap_or_else(|| format!("transfer-{}", &request.info_hash.as_str()[..8]));
            SimTransfer {
                name,
                size: DEFAULT_SIZE,
                progress: 0.0,
                uploaded: 0,
                paused: false,
                checking: false,
                error: None,
                hidden: false,
            }
        });
        Ok(())
    }

    async fn pause(&self, hash: &InfoHash) -> Result<(), EngineError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(EngineError::Unavailable("simulated outage".to_string()));
        }
        let mut transfers = self.lock();
        let transfer = transfers.get_mut(hash).ok_or(EngineError::NotFound)?;
        transfer.paused = true;
        Ok(())
    }

    async fn resume(&self, hash: &InfoHash) -> Result<(), EngineError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(EngineError::Unavailable("simulated outage".to_string()));
        }
        let mut transfers = self.lock();
        let transfer = transfers.get_mut(hash).ok_or(EngineError::NotFound)?;
        transfer.paused = false;
        Ok(())
    }

    async fn remove(&self, hash: &InfoHash, _delete_files: bool) -> Result<(), EngineError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(EngineError::Unavailable("simulated outage".to_string()));
        }
        self.lock().remove(hash).ok_or(EngineError::NotFound)?;
        Ok(())
    }

    async fn recheck(&self, hash: &InfoHash) -> Result<(), EngineError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(EngineError::Unavailable("simulated outage".to_string()));
        }
        let mut transfers = self.lock();
        let transfer = transfers.get_mut(hash).ok_or(EngineError::NotFound)?;
        transfer.checking = true;
        transfer.error = None;
        Ok(())
    }

    async fn query_all(&self) -> Result<Vec<EngineStatus>, EngineError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(EngineError::Unavailable("simulated outage".to_string()));
        }

        let mut transfers = self.lock();
        let mut statuses = Vec::with_capacity(transfers.len());
        for (hash, transfer) in transfers.iter_mut() {
            if transfer.hidden {
                continue;
            }

            if transfer.checking {
                // A recheck completes within one poll
                transfer.checking = false;
            } else if !transfer.paused && transfer.error.is_none() {
                if transfer.progress < 100.0 {
                    transfer.progress = (transfer.progress + self.step).min(100.0);
                } else {
                    transfer.uploaded += SEED_RATE;
                }
            }

            statuses.push(transfer.to_status(hash, self.step));
        }
        Ok(statuses)
    }
}
