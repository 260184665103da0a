//! Pause command

use berth_common::transfer::{InfoHash, TransferStatus};

use crate::engine::TransferEngine;
use crate::store::TransferRecord;

use super::{CommandContext, CommandError, current_record, finish_mutation, flatten_mutate_err};

/// Pause a transfer. Already-paused transfers are a no-op, not an error.
pub async fn handle_pause<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: &InfoHash,
) -> Result<TransferRecord, CommandError> {
    let target = TransferStatus::Paused;
    let current = current_record(ctx, hash, target).await?;
    if current.status == target {
        return Ok(current);
    }
    if !current.status.can_transition(target) {
        return Err(CommandError::InvalidTransition {
            from: current.status,
            to: target,
        });
    }

    ctx.engine.pause(hash).await?;

    let seq = ctx.store.next_cmd_seq();
    let change = ctx
        .store
        .mutate(hash, |record| {
            record.cmd_seq = seq;
            if record.status == target {
                return Ok(());
            }
            if !record.status.can_transition(target) {
                return Err(CommandError::InvalidTransition {
                    from: record.status,
                    to: target,
                });
            }
            record.status = target;
            record.download_rate = 0;
            record.upload_rate = 0;
            record.eta = None;
            Ok(())
        })
        .await
        .map_err(|e| flatten_mutate_err(e, target))?;

    finish_mutation(ctx, change).await
}
