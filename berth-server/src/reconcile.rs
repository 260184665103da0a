//! Reconciliation loop
//!
//! Merges the engine's live state into the record store on a fixed tick.
//! Each tick issues one batched `query_all`, applies every returned row
//! through the store's serialized mutation path, sweeps for identifiers
//! the engine stopped reporting, and broadcasts the tick's change-set as
//! a single `status_update`.
//!
//! A transient engine failure skips the tick entirely: nothing is mutated,
//! so records cannot flap while the engine is briefly unreachable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use berth_common::protocol::{FileSummary, PushEvent};
use berth_common::time::unix_now;
use berth_common::transfer::TransferStatus;
use chrono::Utc;

use crate::constants::{DESYNC_ERROR_REASON, ERR_ENGINE_QUERY, ERR_PERSIST_RECORD};
use crate::db::Database;
use crate::engine::{EngineStatus, TransferEngine};
use crate::hub::EventHub;
use crate::store::{Change, TransferRecord, TransferStore};

/// Periodic engine-to-store reconciler
pub struct Reconciler<E: TransferEngine> {
    store: Arc<TransferStore>,
    engine: Arc<E>,
    hub: Arc<EventHub>,
    db: Database,
    debug: bool,
}

impl<E: TransferEngine> Reconciler<E> {
    pub fn new(
        store: Arc<TransferStore>,
        engine: Arc<E>,
        hub: Arc<EventHub>,
        db: Database,
        debug: bool,
    ) -> Self {
        Self {
            store,
            engine,
            hub,
            db,
            debug,
        }
    }

    /// Run ticks forever. The interval is re-read from config each cycle
    /// so it can be changed at runtime.
    pub async fn run(self) {
        loop {
            let secs = self.db.config.get_tick_interval_secs().await;
            tokio::time::sleep(Duration::from_secs(secs)).await;
            self.tick().await;
        }
    }

    /// One reconciliation pass
    pub async fn tick(&self) {
        // Commands accepted after this point own their records' status for
        // the rest of the tick; the engine rows below predate them.
        let seq_at_query = self.store.current_cmd_seq();

        let statuses = match self.engine.query_all().await {
            Ok(statuses) => statuses,
            Err(e) => {
                if self.debug {
                    eprintln!("{}{}", ERR_ENGINE_QUERY, e);
                }
                return;
            }
        };

        let seeding_enabled = self.db.config.get_seeding_enabled().await;
        let desync_threshold = self.db.config.get_desync_threshold().await;

        let mut changes: Vec<Change> = Vec::new();
        let mut seen = HashSet::new();

        for row in &statuses {
            seen.insert(row.hash.clone());
            // Rows for identifiers we do not track are engine-owned extras
            // and are ignored; the store is authoritative for the tracked set
            let Ok(change) = self
                .store
                .apply(&row.hash, |record| {
                    merge_engine_row(record, row, seeding_enabled, seq_at_query);
                })
                .await
            else {
                continue;
            };
            if change.is_visible() {
                changes.push(change);
            }
        }

        // Identifiers the engine failed to report are counted, not dropped;
        // a persistent gap marks the record as desynchronized
        for record in self.store.list().await {
            if seen.contains(&record.hash) {
                continue;
            }
            let Ok(change) = self
                .store
                .apply(&record.hash, |r| {
                    r.missed_ticks += 1;
                    if r.missed_ticks >= desync_threshold && r.status != TransferStatus::Error {
                        r.status = TransferStatus::Error;
                        r.error = Some(DESYNC_ERROR_REASON.to_string());
                        r.download_rate = 0;
                        r.upload_rate = 0;
                        r.peers = 0;
                        r.seeds = 0;
                        r.eta = None;
                    }
                })
                .await
            else {
                continue;
            };
            if change.is_visible() {
                changes.push(change);
            }
        }

        if changes.is_empty() {
            return;
        }

        // One batched broadcast per tick bounds message volume
        let stats = self.store.stats().await;
        let transfers = changes
            .iter()
            .filter_map(|c| c.after.as_ref().map(TransferRecord::to_summary))
            .collect();
        self.hub.broadcast(&PushEvent::StatusUpdate {
            transfers,
            stats,
            timestamp: unix_now(),
        });

        for change in &changes {
            if change.crossed_completion()
                && let Some(after) = &change.after
            {
                self.hub.broadcast(&PushEvent::Completed {
                    hash: after.hash.clone(),
                    name: after.name.clone(),
                });
            }
        }

        for change in &changes {
            let Some(after) = &change.after else {
                continue;
            };
            if let Err(e) = self.db.transfers.upsert(after).await {
                eprintln!("{}{}", ERR_PERSIST_RECORD, e);
            }
        }
    }
}

/// Merge one engine row into a record.
///
/// Rates, counters, and metadata update unconditionally. Progress is
/// monotonic except while a recheck is in flight. Status is re-derived
/// only when no command has touched the record since the engine snapshot
/// was taken (`seq_at_query`), which is what keeps a pause from being
/// overwritten by a reconciliation read that predates it.
fn merge_engine_row(
    record: &mut TransferRecord,
    row: &EngineStatus,
    seeding_enabled: bool,
    seq_at_query: u64,
) {
    record.missed_ticks = 0;

    if let Some(name) = &row.name
        && !name.is_empty()
    {
        record.name = name.clone();
    }
    if row.total_size > 0 {
        record.size = row.total_size;
    }
    record.download_rate = row.download_rate;
    record.upload_rate = row.upload_rate;
    record.downloaded = row.downloaded;
    record.uploaded = row.uploaded;
    record.peers = row.peers;
    record.seeds = row.seeds;
    if !row.files.is_empty() {
        record.files = row
            .files
            .iter()
            .map(|f| FileSummary {
                path: f.path.clone(),
                size: f.size,
                progress: f.progress,
            })
            .collect();
    }

    let reported = row.progress.clamp(0.0, 100.0);
    let rechecking = row.is_checking || record.status == TransferStatus::Checking;
    record.progress = if rechecking {
        reported
    } else {
        record.progress.max(reported)
    };

    record.eta = if record.progress < 100.0 && row.download_rate > 0 {
        Some(record.size.saturating_sub(record.downloaded) / row.download_rate.max(1))
    } else {
        None
    };

    if record.cmd_seq > seq_at_query {
        return;
    }

    let next = if let Some(reason) = &row.error {
        record.error = Some(reason.clone());
        TransferStatus::Error
    } else if row.is_checking {
        TransferStatus::Checking
    } else if record.progress >= 100.0 {
        if seeding_enabled && row.is_seeding && !row.is_paused {
            TransferStatus::Seeding
        } else {
            TransferStatus::Completed
        }
    } else if row.is_paused {
        TransferStatus::Paused
    } else {
        TransferStatus::Downloading
    };

    // The engine may have skipped ahead within one tick (a fresh transfer
    // reported complete passes queued -> downloading -> seeding); such
    // jumps are legal when downloading bridges them.
    let reachable = record.status.can_transition(next)
        || (record.status.can_transition(TransferStatus::Downloading)
            && TransferStatus::Downloading.can_transition(next));
    if next != record.status && reachable {
        record.status = next;
        if next != TransferStatus::Error {
            record.error = None;
        }
    }

    if record.progress >= 100.0
        && record.completed_at.is_none()
        && matches!(
            record.status,
            TransferStatus::Completed | TransferStatus::Seeding
        )
    {
        record.completed_at = Some(Utc::now());
    }
}
