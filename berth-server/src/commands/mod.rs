//! Command layer
//!
//! One file per public operation, dispatched with a shared context. Every
//! command validates against the current record state, delegates to the
//! Transfer Engine, and then applies its effect through the store's
//! serialized mutation path — revalidating inside the mutation closure so
//! a command can never land on a snapshot another mutation has outdated.
//!
//! All commands return synchronously with a typed error; progress after
//! acceptance is only observable through the push protocol.

mod add;
mod pause;
mod recheck;
mod remove;
mod restore;
mod resume;
mod stop_seeding;

#[cfg(test)]
pub mod testing;

pub use add::{add_transfer_from_peer, handle_add, handle_add_descriptor};
pub use pause::handle_pause;
pub use recheck::handle_recheck;
pub use remove::handle_remove;
pub use restore::restore_saved_transfers;
pub use resume::handle_resume;
pub use stop_seeding::handle_stop_seeding;

use std::path::PathBuf;
use std::sync::Arc;

use berth_common::protocol::PushEvent;
use berth_common::time::unix_now;
use berth_common::transfer::{InfoHash, TransferStatus};

use crate::constants::ERR_PERSIST_RECORD;
use crate::db::Database;
use crate::engine::{EngineError, TransferEngine};
use crate::hub::EventHub;
use crate::store::{Change, MutateError, TransferRecord, TransferStore};

/// Typed command failures, returned synchronously to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Identifier was never tracked
    NotFound,
    /// Malformed or rejected source
    InvalidSource(String),
    /// The record's current state does not allow this command
    InvalidTransition {
        from: TransferStatus,
        to: TransferStatus,
    },
    /// Export requested before the transfer finished downloading
    NotReady { progress: f64 },
    /// A non-terminal export already exists for this (transfer, destination)
    ExportInProgress,
    /// The engine failed the delegated call
    Engine(EngineError),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "transfer not found"),
            Self::InvalidSource(detail) => write!(f, "invalid source: {}", detail),
            Self::InvalidTransition { from, to } => {
                write!(f, "cannot go from {} to {}", from, to)
            }
            Self::NotReady { progress } => {
                write!(f, "transfer not fully downloaded ({:.1}%)", progress)
            }
            Self::ExportInProgress => write!(f, "an export for this destination is already running"),
            Self::Engine(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<EngineError> for CommandError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound => Self::NotFound,
            EngineError::InvalidSource(detail) => Self::InvalidSource(detail),
            other => Self::Engine(other),
        }
    }
}

/// Shared resources every command needs
pub struct CommandContext<E: TransferEngine> {
    pub store: Arc<TransferStore>,
    pub engine: Arc<E>,
    pub hub: Arc<EventHub>,
    pub db: Database,
    pub download_root: PathBuf,
    pub debug: bool,
}

impl<E: TransferEngine> Clone for CommandContext<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            engine: self.engine.clone(),
            hub: self.hub.clone(),
            db: self.db.clone(),
            download_root: self.download_root.clone(),
            debug: self.debug,
        }
    }
}

/// Fetch the current record for a command targeting `to`.
///
/// A tombstoned identifier yields `InvalidTransition` from `Removed`,
/// distinct from `NotFound` for identifiers that never existed.
pub(crate) async fn current_record<E: TransferEngine>(
    ctx: &CommandContext<E>,
    hash: &InfoHash,
    to: TransferStatus,
) -> Result<TransferRecord, CommandError> {
    if ctx.store.was_removed(hash) {
        return Err(CommandError::InvalidTransition {
            from: TransferStatus::Removed,
            to,
        });
    }
    ctx.store.get(hash).await.ok_or(CommandError::NotFound)
}

/// Flatten a store mutation failure into a command error
pub(crate) fn flatten_mutate_err(
    err: MutateError<CommandError>,
    to: TransferStatus,
) -> CommandError {
    match err {
        MutateError::NotFound => CommandError::NotFound,
        MutateError::Removed => CommandError::InvalidTransition {
            from: TransferStatus::Removed,
            to,
        },
        MutateError::Rejected(inner) => inner,
    }
}

/// Broadcast and persist one accepted command mutation, returning the
/// record's new image
pub(crate) async fn finish_mutation<E: TransferEngine>(
    ctx: &CommandContext<E>,
    change: Change,
) -> Result<TransferRecord, CommandError> {
    let Some(after) = change.after.clone() else {
        return Err(CommandError::NotFound);
    };

    if change.is_visible() {
        let stats = ctx.store.stats().await;
        ctx.hub.broadcast(&PushEvent::StatusUpdate {
            transfers: vec![after.to_summary()],
            stats,
            timestamp: unix_now(),
        });
    }
    if change.crossed_completion() {
        ctx.hub.broadcast(&PushEvent::Completed {
            hash: after.hash.clone(),
            name: after.name.clone(),
        });
    }

    if let Err(e) = ctx.db.transfers.upsert(&after).await {
        eprintln!("{}{}", ERR_PERSIST_RECORD, e);
    }

    Ok(after)
}
