//! Remove command
//!
//! Removal is always terminal for the record. Deleting on-disk data is a
//! Transfer Engine side effect and may fail independently: the command
//! still succeeds, and the failure is surfaced as a warning on the
//! `removed` event rather than a command error.

use berth_common::protocol::PushEvent;
use berth_common::transfer::InfoHash;

use crate::constants::ERR_PERSIST_RECORD;
use crate::engine::{EngineError, TransferEngine};
use crate::store::StoreError;

use super::{CommandContext, CommandError};

/// Remove a transfer, optionally deleting its files.
///
/// Removing an already-removed identifier is a no-op; removing one that
/// never existed is `NotFound`.
pub async fn handle_remove<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: &InfoHash,
    delete_files: bool,
) -> Result<(), CommandError> {
    if ctx.store.was_removed(hash) {
        return Ok(());
    }
    if ctx.store.get(hash).await.is_none() {
        return Err(CommandError::NotFound);
    }

    // The engine no longer knowing the id is fine: the record still goes.
    // Any other failure is a side-effect problem, surfaced as a warning.
    let warning = match ctx.engine.remove(hash, delete_files).await {
        Ok(()) | Err(EngineError::NotFound) => None,
        Err(e) => Some(e.to_string()),
    };

    match ctx.store.remove(hash).await {
        Ok(_) => {}
        Err(StoreError::Removed) => return Ok(()),
        Err(StoreError::NotFound) => return Err(CommandError::NotFound),
    }

    if let Err(e) = ctx.db.transfers.delete(hash).await {
        eprintln!("{}{}", ERR_PERSIST_RECORD, e);
    }
    ctx.hub.broadcast(&PushEvent::Removed {
        hash: hash.clone(),
        deleted_files: delete_files,
        warning,
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{hash, magnet, test_context};
    use crate::commands::handle_add;

    #[tokio::test]
    async fn test_remove_deletes_record_everywhere() {
        let ctx = test_context().await;
        handle_add(&ctx, &magnet(1), None).await.unwrap();

        handle_remove(&ctx, &hash(1), false).await.unwrap();
        assert!(ctx.store.get(&hash(1)).await.is_none());
        assert!(ctx.store.was_removed(&hash(1)));
        assert_eq!(ctx.engine.tracked(), 0);
        assert!(ctx.db.transfers.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_broadcasts_removed_event() {
        let ctx = test_context().await;
        handle_add(&ctx, &magnet(1), None).await.unwrap();
        let (_id, mut rx) = ctx.hub.subscribe();

        handle_remove(&ctx, &hash(1), true).await.unwrap();
        match rx.try_recv().unwrap() {
            PushEvent::Removed {
                hash: h,
                deleted_files,
                warning,
            } => {
                assert_eq!(h, hash(1));
                assert!(deleted_files);
                assert!(warning.is_none());
            }
            other => panic!("unexpected event: {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_remove_unknown_is_not_found() {
        let ctx = test_context().await;
        assert_eq!(
            handle_remove(&ctx, &hash(9), false).await.unwrap_err(),
            CommandError::NotFound
        );
    }

    #[tokio::test]
    async fn test_double_remove_is_noop() {
        let ctx = test_context().await;
        handle_add(&ctx, &magnet(1), None).await.unwrap();
        handle_remove(&ctx, &hash(1), false).await.unwrap();
        assert!(handle_remove(&ctx, &hash(1), false).await.is_ok());
    }

    #[tokio::test]
    async fn test_engine_failure_becomes_warning_not_error() {
        let ctx = test_context().await;
        handle_add(&ctx, &magnet(1), None).await.unwrap();
        let (_id, mut rx) = ctx.hub.subscribe();

        // Engine unreachable: file deletion can't happen, removal still does
        ctx.engine.set_unavailable(true);
        handle_remove(&ctx, &hash(1), true).await.unwrap();
        assert!(ctx.store.get(&hash(1)).await.is_none());

        match rx.try_recv().unwrap() {
            PushEvent::Removed { warning, .. } => assert!(warning.is_some()),
            other => panic!("unexpected event: {}", other.kind()),
        }
    }
}
