//! Shared helpers for command tests

use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;
use crate::engine::SimEngine;
use crate::hub::EventHub;
use crate::store::TransferStore;

use super::CommandContext;

/// Fresh context over a frozen simulated engine and an in-memory database
pub async fn test_context() -> CommandContext<SimEngine> {
    CommandContext {
        store: Arc::new(TransferStore::new()),
        engine: Arc::new(SimEngine::frozen()),
        hub: Arc::new(EventHub::new()),
        db: Database::open_in_memory().await.expect("in-memory db"),
        download_root: PathBuf::from("/downloads"),
        debug: false,
    }
}

/// A well-formed magnet link for the given trailing byte
pub fn magnet(n: u8) -> String {
    format!("magnet:?xt=urn:btih:{:040x}&dn=transfer-{}", n, n)
}

/// The info-hash embedded in [`magnet`]
pub fn hash(n: u8) -> berth_common::transfer::InfoHash {
    berth_common::transfer::InfoHash::parse(&format!("{:040x}", n)).expect("test hash")
}
