//! Recheck command
//!
//! Allowed from any non-removed state, including `error` — this is the
//! retry path for failed transfers. The record goes to `checking`
//! immediately; its real status is re-derived from the next
//! reconciliation tick.

use berth_common::transfer::{InfoHash, TransferStatus};

use crate::engine::TransferEngine;
use crate::store::TransferRecord;

use super::{CommandContext, CommandError, current_record, finish_mutation, flatten_mutate_err};

/// Force a data recheck
pub async fn handle_recheck<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: &InfoHash,
) -> Result<TransferRecord, CommandError> {
    let target = TransferStatus::Checking;
    let current = current_record(ctx, hash, target).await?;
    if !current.status.can_transition(target) {
        return Err(CommandError::InvalidTransition {
            from: current.status,
            to: target,
        });
    }

    ctx.engine.recheck(hash).await?;

    let seq = ctx.store.next_cmd_seq();
    let change = ctx
        .store
        .mutate(hash, |record| {
            record.cmd_seq = seq;
            if !record.status.can_transition(target) {
                return Err(CommandError::InvalidTransition {
                    from: record.status,
                    to: target,
                });
            }
            record.status = target;
            record.error = None;
            Ok(())
        })
        .await
        .map_err(|e| flatten_mutate_err(e, target))?;

    finish_mutation(ctx, change).await
}
