//! Restart recovery
//!
//! Re-submits persisted transfers to the engine at boot. Only records
//! with a locator can be recovered (the engine needs something to chew
//! on), and records whose seeding was stopped manually are left alone.

use chrono::{DateTime, Utc};

use crate::constants::ERR_RESTORE_TRANSFER;
use crate::engine::TransferEngine;

use super::{CommandContext, handle_add};

/// Restore persisted transfers into the engine and store.
///
/// Returns the number of transfers restored. Failures are logged per
/// record and do not abort the rest of the recovery.
pub async fn restore_saved_transfers<E: TransferEngine>(ctx: &CommandContext<E>) -> usize {
    let stored = match ctx.db.transfers.load_all().await {
        Ok(stored) => stored,
        Err(e) => {
            eprintln!("{}{}", ERR_RESTORE_TRANSFER, e);
            return 0;
        }
    };

    let mut restored = 0;
    for row in stored {
        if !row.resume_on_start {
            continue;
        }
        let Some(locator) = row.source.clone() else {
            continue;
        };

        match handle_add(ctx, &locator, Some(row.save_path.clone())).await {
            Ok(_) => {
                // Carry the historical fields over the freshly queued record;
                // live stats catch up on the next reconciliation tick
                let carried = ctx
                    .store
                    .apply(&row.hash, |r| {
                        r.name = row.name.clone();
                        r.size = row.size;
                        r.progress = row.progress;
                        r.added_at =
                            DateTime::from_timestamp(row.added_at, 0).unwrap_or_else(Utc::now);
                        r.completed_at =
                            row.completed_at.and_then(|t| DateTime::from_timestamp(t, 0));
                        r.files = row.files.clone();
                    })
                    .await;
                if let Ok(change) = carried
                    && let Some(after) = &change.after
                {
                    let _ = ctx.db.transfers.upsert(after).await;
                }
                restored += 1;
            }
            Err(e) => {
                eprintln!("{}{}: {}", ERR_RESTORE_TRANSFER, row.hash, e);
            }
        }
    }
    restored
}
