//! Add command
//!
//! Accepts a source locator (magnet link or bare info-hash) or an opaque
//! metadata descriptor, delegates to the engine, and creates the record in
//! `Queued` before the engine has confirmed metadata. Re-adding a tracked
//! identifier returns the existing record unchanged.

use std::path::PathBuf;

use berth_common::protocol::PushEvent;
use berth_common::transfer::InfoHash;
use berth_common::validators::parse_source;

use crate::constants::ERR_PERSIST_RECORD;
use crate::engine::{AddRequest, EngineError, TransferEngine};
use crate::store::{InsertError, TransferRecord};

use super::{CommandContext, CommandError};

/// Add a transfer from a locator string
pub async fn handle_add<E: TransferEngine>(
    ctx: &CommandContext<E>,
    locator: &str,
    save_path: Option<PathBuf>,
) -> Result<TransferRecord, CommandError> {
    let source =
        parse_source(locator).map_err(|e| CommandError::InvalidSource(e.to_string()))?;
    add_inner(
        ctx,
        source.info_hash,
        source.display_name,
        Some(source.raw),
        None,
        save_path,
    )
    .await
}

/// Add a transfer from opaque descriptor bytes (e.g. a metadata file).
///
/// The identifier is derived from the descriptor contents, so re-adding
/// the same bytes is idempotent.
pub async fn handle_add_descriptor<E: TransferEngine>(
    ctx: &CommandContext<E>,
    descriptor: &[u8],
    name: &str,
    save_path: Option<PathBuf>,
) -> Result<TransferRecord, CommandError> {
    if descriptor.is_empty() {
        return Err(CommandError::InvalidSource("empty descriptor".to_string()));
    }
    let hash = InfoHash::derive(descriptor);
    let name = name.trim();
    let name = (!name.is_empty()).then(|| name.to_string());
    add_inner(ctx, hash, name, None, Some(descriptor.to_vec()), save_path).await
}

/// Add a transfer fetched from a local-network peer, keeping the peer's
/// identity for the new record
pub async fn add_transfer_from_peer<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: &InfoHash,
    descriptor: Vec<u8>,
) -> Result<(), CommandError> {
    if descriptor.is_empty() {
        return Err(CommandError::InvalidSource("empty descriptor".to_string()));
    }
    add_inner(ctx, hash.clone(), None, None, Some(descriptor), None)
        .await
        .map(|_| ())
}

pub(crate) async fn add_inner<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: InfoHash,
    name: Option<String>,
    locator: Option<String>,
    descriptor: Option<Vec<u8>>,
    save_path: Option<PathBuf>,
) -> Result<TransferRecord, CommandError> {
    if let Some(existing) = ctx.store.get(&hash).await {
        return Ok(existing);
    }

    let save_path = save_path.unwrap_or_else(|| ctx.download_root.clone());

    ctx.engine
        .add(AddRequest {
            info_hash: hash.clone(),
            locator: locator.clone(),
            descriptor,
            name: name.clone(),
            save_path: save_path.clone(),
        })
        .await
        .map_err(|e| match e {
            EngineError::InvalidSource(detail) => CommandError::InvalidSource(detail),
            other => CommandError::Engine(other),
        })?;

    let display_name =
        name.unwrap_or_else(|| format!("transfer-{}", &hash.as_str()[..8]));
    let mut record = TransferRecord::new(hash, display_name, save_path, locator);
    record.cmd_seq = ctx.store.next_cmd_seq();

    let snapshot = record.clone();
    match ctx.store.insert(record).await {
        Ok(_) => {}
        // Lost an insert race: someone else created it, return theirs
        Err(InsertError::AlreadyTracked(existing)) => return Ok(existing),
    }

    if let Err(e) = ctx.db.transfers.upsert(&snapshot).await {
        eprintln!("{}{}", ERR_PERSIST_RECORD, e);
    }
    ctx.hub.broadcast(&PushEvent::Added {
        transfer: snapshot.to_summary(),
    });

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{hash, magnet, test_context};
    use berth_common::transfer::TransferStatus;

    #[tokio::test]
    async fn test_add_creates_queued_record() {
        let ctx = test_context().await;
        let record = handle_add(&ctx, &magnet(1), None).await.unwrap();

        assert_eq!(record.hash, hash(1));
        assert_eq!(record.status, TransferStatus::Queued);
        assert_eq!(record.name, "transfer-1");
        assert_eq!(record.save_path, ctx.download_root);
        assert_eq!(ctx.engine.tracked(), 1);
        assert!(ctx.store.get(&hash(1)).await.is_some());
    }

    #[tokio::test]
    async fn test_add_broadcasts_added_event() {
        let ctx = test_context().await;
        let (_id, mut rx) = ctx.hub.subscribe();

        handle_add(&ctx, &magnet(1), None).await.unwrap();
        match rx.try_recv().unwrap() {
            berth_common::protocol::PushEvent::Added { transfer } => {
                assert_eq!(transfer.hash, hash(1));
                assert_eq!(transfer.status, TransferStatus::Queued);
            }
            other => panic!("unexpected event: {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_add_persists_record() {
        let ctx = test_context().await;
        handle_add(&ctx, &magnet(1), None).await.unwrap();
        let stored = ctx.db.transfers.load_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].hash, hash(1));
    }

    #[tokio::test]
    async fn test_add_rejects_malformed_source() {
        let ctx = test_context().await;
        let result = handle_add(&ctx, "not a magnet", None).await;
        assert!(matches!(result, Err(CommandError::InvalidSource(_))));
        assert!(ctx.store.is_empty().await);
        assert_eq!(ctx.engine.tracked(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_add_returns_existing() {
        let ctx = test_context().await;
        let first = handle_add(&ctx, &magnet(1), None).await.unwrap();
        let second = handle_add(&ctx, &magnet(1), None).await.unwrap();
        assert_eq!(first.hash, second.hash);
        assert_eq!(ctx.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_engine_outage_surfaces_and_creates_nothing() {
        let ctx = test_context().await;
        ctx.engine.set_unavailable(true);
        let result = handle_add(&ctx, &magnet(1), None).await;
        assert!(matches!(result, Err(CommandError::Engine(_))));
        assert!(ctx.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_descriptor_derives_identity() {
        let ctx = test_context().await;
        let record = handle_add_descriptor(&ctx, b"metadata blob", "payload", None)
            .await
            .unwrap();
        assert_eq!(record.name, "payload");
        assert!(record.source.is_none());

        // Same bytes, same transfer
        let again = handle_add_descriptor(&ctx, b"metadata blob", "payload", None)
            .await
            .unwrap();
        assert_eq!(again.hash, record.hash);
        assert_eq!(ctx.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_descriptor_rejects_empty() {
        let ctx = test_context().await;
        let result = handle_add_descriptor(&ctx, b"", "payload", None).await;
        assert!(matches!(result, Err(CommandError::InvalidSource(_))));
    }
}
