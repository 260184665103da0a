//! Resume command

use berth_common::transfer::{InfoHash, TransferStatus};

use crate::engine::TransferEngine;
use crate::store::TransferRecord;

use super::{CommandContext, CommandError, current_record, finish_mutation, flatten_mutate_err};

/// Resume a paused transfer. Transfers that are not paused are a no-op,
/// not an error.
pub async fn handle_resume<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: &InfoHash,
) -> Result<TransferRecord, CommandError> {
    let target = TransferStatus::Downloading;
    let current = current_record(ctx, hash, target).await?;
    if current.status != TransferStatus::Paused {
        return Ok(current);
    }

    ctx.engine.resume(hash).await?;

    let seq = ctx.store.next_cmd_seq();
    let change = ctx
        .store
        .mutate(hash, |record| {
            record.cmd_seq = seq;
            if record.status != TransferStatus::Paused {
                return Ok(());
            }
            record.status = target;
            Ok::<(), CommandError>(())
        })
        .await
        .map_err(|e| flatten_mutate_err(e, target))?;

    finish_mutation(ctx, change).await
}
