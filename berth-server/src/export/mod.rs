//! Export orchestrator
//!
//! Drives remote-storage uploads of completed transfers. Single-flight
//! per (transfer, destination): a second export for the same pair is
//! rejected while the first is non-terminal, and a failed task stays in
//! the map as history until a fresh export replaces it.
//!
//! Upload progress arrives on the storage client's event channel and is
//! folded into the task map and subscriber broadcasts. The transfer may
//! be removed while an upload is in flight; the driver re-checks the
//! record on every event and quietly stops broadcasting when it is gone.

pub mod storage;
mod task;

pub use storage::{StorageClient, UploadEvent};
pub use task::{ExportState, ExportTask};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use berth_common::protocol::PushEvent;
use berth_common::time::unix_now;
use berth_common::transfer::InfoHash;
use tokio::sync::mpsc;

use crate::commands::CommandError;
use crate::constants::UPLOAD_INTERRUPTED_REASON;
use crate::db::Database;
use crate::hub::EventHub;
use crate::store::TransferStore;

/// Orchestrates uploads through a Storage Client
pub struct ExportManager<S: StorageClient> {
    tasks: Mutex<HashMap<(InfoHash, String), ExportTask>>,
    storage: Arc<S>,
    store: Arc<TransferStore>,
    hub: Arc<EventHub>,
    db: Database,
}

impl<S: StorageClient> ExportManager<S> {
    pub fn new(
        storage: Arc<S>,
        store: Arc<TransferStore>,
        hub: Arc<EventHub>,
        db: Database,
    ) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            storage,
            store,
            hub,
            db,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(InfoHash, String), ExportTask>> {
        self.tasks.lock().expect("export task map lock poisoned")
    }

    /// Start an upload of a fully-downloaded transfer.
    ///
    /// Fails with `NotReady` unless progress is 100, and with
    /// `ExportInProgress` when a non-terminal task already exists for
    /// this (transfer, destination) pair.
    pub async fn start(
        self: &Arc<Self>,
        hash: &InfoHash,
        destination: &str,
    ) -> Result<ExportTask, CommandError> {
        let record = self.store.get(hash).await.ok_or(CommandError::NotFound)?;
        if record.progress < 100.0 {
            return Err(CommandError::NotReady {
                progress: record.progress,
            });
        }

        let key = (hash.clone(), destination.to_string());
        let task = {
            let mut tasks = self.lock();
            if let Some(existing) = tasks.get(&key)
                && !existing.is_terminal()
            {
                return Err(CommandError::ExportInProgress);
            }
            let task = ExportTask::new(hash.clone(), destination.to_string());
            tasks.insert(key, task.clone());
            task
        };

        let events = self.storage.upload(record.save_path.clone(), record.name.clone());

        self.hub.broadcast(&PushEvent::ExportProgress {
            hash: hash.clone(),
            destination: destination.to_string(),
            percent: 0.0,
            bytes: 0,
        });

        let manager = self.clone();
        let hash = hash.clone();
        let destination = destination.to_string();
        tokio::spawn(async move {
            manager.drive(hash, destination, events).await;
        });

        Ok(task)
    }

    /// Consume one upload's event stream to its terminal event
    async fn drive(
        self: Arc<Self>,
        hash: InfoHash,
        destination: String,
        mut events: mpsc::Receiver<UploadEvent>,
    ) {
        let key = (hash.clone(), destination.clone());
        let mut finished = false;

        while let Some(event) = events.recv().await {
            // The record may have been removed while the upload ran; the
            // task still resolves, but nothing is broadcast for a ghost
            let record_alive = self.store.get(&hash).await.is_some();

            match event {
                UploadEvent::Progress { percent, bytes } => {
                    if let Some(task) = self.lock().get_mut(&key) {
                        task.progress = percent.clamp(0.0, 100.0);
                    }
                    if record_alive {
                        self.hub.broadcast(&PushEvent::ExportProgress {
                            hash: hash.clone(),
                            destination: destination.clone(),
                            percent,
                            bytes,
                        });
                    }
                }
                UploadEvent::Done { locator, size } => {
                    if let Some(task) = self.lock().get_mut(&key) {
                        task.state = ExportState::Completed;
                        task.progress = 100.0;
                        task.finished_at = Some(unix_now());
                        task.locator = Some(locator.clone());
                    }
                    if record_alive {
                        if let Err(e) =
                            self.db.exports.add(&hash, &destination, &locator, size).await
                        {
                            eprintln!("Failed to record export history: {}", e);
                        }
                        self.hub.broadcast(&PushEvent::ExportDone {
                            hash: hash.clone(),
                            destination: destination.clone(),
                            locator,
                            size,
                        });
                    }
                    finished = true;
                    break;
                }
                UploadEvent::Failed { reason } => {
                    if let Some(task) = self.lock().get_mut(&key) {
                        task.state = ExportState::Failed;
                        task.finished_at = Some(unix_now());
                        task.error = Some(reason.clone());
                    }
                    if record_alive {
                        self.hub.broadcast(&PushEvent::ExportFailed {
                            hash: hash.clone(),
                            destination: destination.clone(),
                            reason,
                        });
                    }
                    finished = true;
                    break;
                }
            }
        }

        // Channel closed without a terminal event: the storage client died
        if !finished {
            if let Some(task) = self.lock().get_mut(&key) {
                task.state = ExportState::Failed;
                task.finished_at = Some(unix_now());
                task.error = Some(UPLOAD_INTERRUPTED_REASON.to_string());
            }
            if self.store.get(&hash).await.is_some() {
                self.hub.broadcast(&PushEvent::ExportFailed {
                    hash,
                    destination,
                    reason: UPLOAD_INTERRUPTED_REASON.to_string(),
                });
            }
        }
    }

    /// Current task for a (transfer, destination) pair
    pub fn get(&self, hash: &InfoHash, destination: &str) -> Option<ExportTask> {
        self.lock()
            .get(&(hash.clone(), destination.to_string()))
            .cloned()
    }

    /// All known tasks, including retained terminal ones
    pub fn tasks(&self) -> Vec<ExportTask> {
        self.lock().values().cloned().collect()
    }

    /// Persisted export history, newest first
    pub async fn history(&self) -> std::io::Result<Vec<crate::db::ExportRecord>> {
        self.db.exports.history().await
    }
}
