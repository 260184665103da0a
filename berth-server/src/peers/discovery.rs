//! Discovery Service boundary
//!
//! Local-network peer discovery and fetch transport live behind this
//! trait. The coordinator only needs three things: who is out there,
//! what they offer, and the metadata descriptor for one transfer.

use std::future::Future;

use berth_common::transfer::{InfoHash, TransferStatus};

/// Errors surfaced by the discovery boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Peer did not answer (or timed out)
    Unreachable(String),
    /// Peer answered but does not have (or will not serve) the transfer
    Rejected(String),
    /// Unknown peer identifier
    UnknownPeer,
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(detail) => write!(f, "peer unreachable: {}", detail),
            Self::Rejected(detail) => write!(f, "peer rejected request: {}", detail),
            Self::UnknownPeer => write!(f, "unknown peer"),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// A peer visible on the local network
#[derive(Debug, Clone)]
pub struct RemotePeer {
    pub id: String,
    pub name: String,
    pub address: String,
    /// Unix seconds
    pub last_seen: i64,
    /// Identifiers the peer offers for pulling
    pub catalog: Vec<InfoHash>,
}

/// One transfer in a peer's catalog
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub hash: InfoHash,
    pub name: String,
    pub size: u64,
    pub status: TransferStatus,
}

/// Local-network discovery boundary
pub trait Discovery: Send + Sync + 'static {
    fn list_peers(&self) -> impl Future<Output = Result<Vec<RemotePeer>, DiscoveryError>> + Send;

    fn fetch_catalog(
        &self,
        peer_id: &str,
    ) -> impl Future<Output = Result<Vec<CatalogEntry>, DiscoveryError>> + Send;

    /// Fetch the metadata descriptor for one transfer from a peer
    fn fetch_transfer(
        &self,
        peer_id: &str,
        hash: &InfoHash,
    ) -> impl Future<Output = Result<Vec<u8>, DiscoveryError>> + Send;
}
