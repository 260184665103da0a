//! Shared helpers for integration tests

use std::path::PathBuf;
use std::sync::Arc;

use berth_common::transfer::InfoHash;
use berth_server::commands::CommandContext;
use berth_server::db::Database;
use berth_server::engine::SimEngine;
use berth_server::hub::EventHub;
use berth_server::reconcile::Reconciler;
use berth_server::store::TransferStore;

/// A daemon's worth of components over a frozen simulated engine and an
/// in-memory database
pub async fn create_daemon() -> (CommandContext<SimEngine>, Reconciler<SimEngine>) {
    let store = Arc::new(TransferStore::new());
    let engine = Arc::new(SimEngine::frozen());
    let hub = Arc::new(EventHub::new());
    let db = Database::open_in_memory().await.expect("in-memory db");

    let ctx = CommandContext {
        store: store.clone(),
        engine: engine.clone(),
        hub: hub.clone(),
        db: db.clone(),
        download_root: PathBuf::from("/downloads"),
        debug: false,
    };
    let reconciler = Reconciler::new(store, engine, hub, db, false);
    (ctx, reconciler)
}

/// A well-formed magnet link for the given trailing byte
pub fn magnet(n: u8) -> String {
    format!("magnet:?xt=urn:btih:{:040x}&dn=transfer-{}", n, n)
}

/// The info-hash embedded in [`magnet`]
pub fn hash(n: u8) -> InfoHash {
    InfoHash::parse(&format!("{:040x}", n)).expect("test hash")
}
