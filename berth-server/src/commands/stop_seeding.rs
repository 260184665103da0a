//! Stop-seeding command
//!
//! Demotes a seeding transfer to `completed`, pauses its uploads in the
//! engine, and clears the resume-on-start flag so restart recovery does
//! not quietly re-seed it.

use berth_common::transfer::{InfoHash, TransferStatus};

use crate::engine::TransferEngine;
use crate::store::TransferRecord;

use super::{CommandContext, CommandError, current_record, finish_mutation, flatten_mutate_err};

/// Stop seeding a completed transfer permanently
pub async fn handle_stop_seeding<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: &InfoHash,
) -> Result<TransferRecord, CommandError> {
    let target = TransferStatus::Completed;
    let current = current_record(ctx, hash, target).await?;

    match current.status {
        TransferStatus::Completed => {
            // Already done; just make the stop stick across restarts
            let seq = ctx.store.next_cmd_seq();
            let change = ctx
                .store
                .mutate(hash, |record| {
                    record.cmd_seq = seq;
                    record.resume_on_start = false;
                    Ok::<(), CommandError>(())
                })
                .await
                .map_err(|e| flatten_mutate_err(e, target))?;
            finish_mutation(ctx, change).await
        }
        TransferStatus::Seeding => {
            ctx.engine.pause(hash).await?;

            let seq = ctx.store.next_cmd_seq();
            let change = ctx
                .store
                .mutate(hash, |record| {
                    record.cmd_seq = seq;
                    if record.status == target {
                        record.resume_on_start = false;
                        return Ok(());
                    }
                    if !record.status.can_transition(target) {
                        return Err(CommandError::InvalidTransition {
                            from: record.status,
                            to: target,
                        });
                    }
                    record.status = target;
                    record.resume_on_start = false;
                    record.upload_rate = 0;
                    Ok(())
                })
                .await
                .map_err(|e| flatten_mutate_err(e, target))?;
            finish_mutation(ctx, change).await
        }
        other => Err(CommandError::InvalidTransition {
            from: other,
            to: target,
        }),
    }
}
