//! Peer-pull coordinator
//!
//! Pulls a transfer that a local-network peer already has: fetch its
//! metadata descriptor through the Discovery Service, then hand it to the
//! Transfer Engine through the same add path a local add uses.
//!
//! Requests are deduplicated on (peer, transfer): a second request for an
//! identical pending pair returns the existing task unchanged. Failure at
//! any stage marks the task failed with a reason and creates no record.

pub mod discovery;

pub use discovery::{CatalogEntry, Discovery, DiscoveryError, RemotePeer};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use berth_common::protocol::PushEvent;
use berth_common::time::unix_now;
use berth_common::transfer::InfoHash;

use crate::commands::{self, CommandContext};
use crate::constants::DISCOVERY_FETCH_TIMEOUT_SECS;
use crate::engine::TransferEngine;

/// Lifecycle of one pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    Requested,
    InProgress,
    Completed,
    Failed,
}

impl PullState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One pull of one transfer from one peer.
///
/// Identity is (peer, transfer); a duplicate request for a pending pair
/// is a no-op returning the existing task.
#[derive(Debug, Clone)]
pub struct PeerPullTask {
    pub peer_id: String,
    pub hash: InfoHash,
    pub state: PullState,
    /// Unix seconds
    pub requested_at: i64,
    /// Set on failure
    pub error: Option<String>,
}

impl PeerPullTask {
    fn new(peer_id: String, hash: InfoHash) -> Self {
        Self {
            peer_id,
            hash,
            state: PullState::Requested,
            requested_at: unix_now(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Deduplicates and sequences cross-device pull requests
pub struct PeerPullCoordinator<D: Discovery, E: TransferEngine> {
    tasks: Mutex<HashMap<(String, InfoHash), PeerPullTask>>,
    discovery: Arc<D>,
    commands: CommandContext<E>,
    fetch_timeout: Duration,
}

impl<D: Discovery, E: TransferEngine> PeerPullCoordinator<D, E> {
    pub fn new(discovery: Arc<D>, commands: CommandContext<E>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            discovery,
            commands,
            fetch_timeout: Duration::from_secs(DISCOVERY_FETCH_TIMEOUT_SECS),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, InfoHash), PeerPullTask>> {
        self.tasks.lock().expect("pull task map lock poisoned")
    }

    /// Request a pull. Idempotent for a pending (peer, transfer) pair.
    pub fn request_pull(self: &Arc<Self>, peer_id: &str, hash: &InfoHash) -> PeerPullTask {
        let key = (peer_id.to_string(), hash.clone());
        let task = {
            let mut tasks = self.lock();
            if let Some(existing) = tasks.get(&key)
                && !existing.is_terminal()
            {
                return existing.clone();
            }
            let task = PeerPullTask::new(peer_id.to_string(), hash.clone());
            tasks.insert(key, task.clone());
            task
        };

        self.commands.hub.broadcast(&PushEvent::PeerPullRequested {
            peer_id: peer_id.to_string(),
            hash: hash.clone(),
        });

        let coordinator = self.clone();
        let peer_id = peer_id.to_string();
        let hash = hash.clone();
        tokio::spawn(async move {
            coordinator.resolve(peer_id, hash).await;
        });

        task
    }

    /// Resolve one accepted pull to a terminal state
    async fn resolve(self: Arc<Self>, peer_id: String, hash: InfoHash) {
        let key = (peer_id.clone(), hash.clone());
        if let Some(task) = self.lock().get_mut(&key) {
            task.state = PullState::InProgress;
        }

        let fetched = match tokio::time::timeout(
            self.fetch_timeout,
            self.discovery.fetch_transfer(&peer_id, &hash),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Unreachable("fetch timed out".to_string())),
        };

        let outcome = match fetched {
            Ok(descriptor) => {
                commands::add_transfer_from_peer(&self.commands, &hash, descriptor)
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(()) => {
                if let Some(task) = self.lock().get_mut(&key) {
                    task.state = PullState::Completed;
                }
                self.commands.hub.broadcast(&PushEvent::PeerPullDone {
                    peer_id,
                    hash,
                });
            }
            Err(reason) => {
                if let Some(task) = self.lock().get_mut(&key) {
                    task.state = PullState::Failed;
                    task.error = Some(reason.clone());
                }
                self.commands.hub.broadcast(&PushEvent::PeerPullFailed {
                    peer_id,
                    hash,
                    reason,
                });
            }
        }
    }

    /// Current task for a (peer, transfer) pair
    pub fn get(&self, peer_id: &str, hash: &InfoHash) -> Option<PeerPullTask> {
        self.lock()
            .get(&(peer_id.to_string(), hash.clone()))
            .cloned()
    }

    /// All known pull tasks, including retained terminal ones
    pub fn tasks(&self) -> Vec<PeerPullTask> {
        self.lock().values().cloned().collect()
    }

    /// Peers currently visible on the local network
    pub async fn list_peers(&self) -> Result<Vec<RemotePeer>, DiscoveryError> {
        self.discovery.list_peers().await
    }

    /// One peer's offered transfers
    pub async fn catalog(&self, peer_id: &str) -> Result<Vec<CatalogEntry>, DiscoveryError> {
        self.discovery.fetch_catalog(peer_id).await
    }
}
