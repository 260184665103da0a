//! Transfer record store
//!
//! Owns the authoritative map from transfer identifier to record. All
//! mutations — reconciliation merges, command effects, and background
//! completions — go through `mutate`/`apply`, which run the caller's
//! closure under the single global write lock and hand back the prior
//! and next images. Reads take a consistent snapshot under the read lock.
//!
//! A command is validated inside its mutation closure, so it can never
//! apply against a snapshot that a concurrent mutation has outdated.
//! Removed identifiers are tombstoned so commands can distinguish a
//! transfer that was removed from one that never existed.

mod record;

pub use record::TransferRecord;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};

use berth_common::protocol::{SessionStats, TransferSummary};
use berth_common::transfer::InfoHash;
use tokio::sync::RwLock;

/// Before/after images from one accepted mutation.
///
/// `before` is absent for an insert, `after` for a removal. A tick's worth
/// of changes forms the change-set broadcast as one `status_update`.
#[derive(Debug, Clone)]
pub struct Change {
    pub hash: InfoHash,
    pub before: Option<TransferRecord>,
    pub after: Option<TransferRecord>,
}

impl Change {
    /// Whether the mutation altered anything a subscriber can observe
    pub fn is_visible(&self) -> bool {
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => before.to_summary() != after.to_summary(),
            _ => true,
        }
    }

    /// Whether this mutation stamped the completion time
    pub fn crossed_completion(&self) -> bool {
        let before_done = self.before.as_ref().is_some_and(|r| r.completed_at.is_some());
        let after_done = self.after.as_ref().is_some_and(|r| r.completed_at.is_some());
        !before_done && after_done
    }
}

/// Lookup failure on the mutation path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Identifier was never tracked
    NotFound,
    /// Identifier was tracked and has been removed
    Removed,
}

/// Failure of a validated mutation
#[derive(Debug)]
pub enum MutateError<E> {
    NotFound,
    Removed,
    /// The closure rejected the mutation; nothing was changed
    Rejected(E),
}

impl<E> From<StoreError> for MutateError<E> {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Removed => Self::Removed,
        }
    }
}

/// Insert failure
#[derive(Debug)]
pub enum InsertError {
    /// The identifier is already tracked; the existing record is returned
    AlreadyTracked(TransferRecord),
}

/// Authoritative, single-writer map of transfer records
pub struct TransferStore {
    records: RwLock<HashMap<InfoHash, TransferRecord>>,
    removed: StdMutex<HashSet<InfoHash>>,
    cmd_seq: AtomicU64,
}

impl TransferStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            removed: StdMutex::new(HashSet::new()),
            cmd_seq: AtomicU64::new(0),
        }
    }

    /// Claim the next command sequence number.
    ///
    /// Commands stamp this onto the records they touch; reconciliation
    /// rows observed before a record's stamp may not change its status.
    pub fn next_cmd_seq(&self) -> u64 {
        self.cmd_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Sequence number most recently claimed
    pub fn current_cmd_seq(&self) -> u64 {
        self.cmd_seq.load(Ordering::Relaxed)
    }

    /// Whether this identifier was tracked once and removed
    pub fn was_removed(&self, hash: &InfoHash) -> bool {
        self.removed
            .lock()
            .expect("removed set lock poisoned")
            .contains(hash)
    }

    /// Insert a fresh record.
    ///
    /// Re-adding a previously removed identifier starts a new lifecycle
    /// and clears its tombstone.
    pub async fn insert(&self, record: TransferRecord) -> Result<Change, InsertError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.hash) {
            return Err(InsertError::AlreadyTracked(existing.clone()));
        }

        self.removed
            .lock()
            .expect("removed set lock poisoned")
            .remove(&record.hash);

        let change = Change {
            hash: record.hash.clone(),
            before: None,
            after: Some(record.clone()),
        };
        records.insert(record.hash.clone(), record);
        Ok(change)
    }

    /// Apply an infallible mutation under the write lock
    pub async fn apply<F>(&self, hash: &InfoHash, f: F) -> Result<Change, StoreError>
    where
        F: FnOnce(&mut TransferRecord),
    {
        self.mutate(hash, |record| {
            f(record);
            Ok::<(), std::convert::Infallible>(())
        })
        .await
        .map_err(|err| match err {
            MutateError::NotFound => StoreError::NotFound,
            MutateError::Removed => StoreError::Removed,
            MutateError::Rejected(never) => match never {},
        })
    }

    /// Apply a validated mutation under the write lock.
    ///
    /// The closure sees the current record and may reject the transition;
    /// rejection leaves the record untouched. On success the prior and new
    /// images are returned so the caller can build a change-set entry.
    pub async fn mutate<E, F>(&self, hash: &InfoHash, f: F) -> Result<Change, MutateError<E>>
    where
        F: FnOnce(&mut TransferRecord) -> Result<(), E>,
    {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(hash) else {
            if self.was_removed(hash) {
                return Err(MutateError::Removed);
            }
            return Err(MutateError::NotFound);
        };

        let before = record.clone();
        let mut next = before.clone();
        f(&mut next).map_err(MutateError::Rejected)?;
        *record = next.clone();

        Ok(Change {
            hash: hash.clone(),
            before: Some(before),
            after: Some(next),
        })
    }

    /// Remove a record (terminal). The record is deleted and its
    /// identifier tombstoned; the change carries no after image.
    pub async fn remove(&self, hash: &InfoHash) -> Result<Change, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.remove(hash) else {
            if self.was_removed(hash) {
                return Err(StoreError::Removed);
            }
            return Err(StoreError::NotFound);
        };

        self.removed
            .lock()
            .expect("removed set lock poisoned")
            .insert(hash.clone());

        Ok(Change {
            hash: hash.clone(),
            before: Some(record),
            after: None,
        })
    }

    /// Snapshot of one record
    pub async fn get(&self, hash: &InfoHash) -> Option<TransferRecord> {
        self.records.read().await.get(hash).cloned()
    }

    /// Consistent snapshot of all records, oldest first
    pub async fn list(&self) -> Vec<TransferRecord> {
        let records = self.records.read().await;
        let mut all: Vec<TransferRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.hash.as_str().cmp(b.hash.as_str())));
        all
    }

    /// Wire snapshots of all records, oldest first
    pub async fn summaries(&self) -> Vec<TransferSummary> {
        self.list().await.iter().map(TransferRecord::to_summary).collect()
    }

    /// Aggregate bandwidth counters across all records
    pub async fn stats(&self) -> SessionStats {
        let records = self.records.read().await;
        let mut stats = SessionStats::default();
        for record in records.values() {
            stats.download_rate += record.download_rate;
            stats.upload_rate += record.upload_rate;
            stats.total_downloaded += record.downloaded;
            stats.total_uploaded += record.uploaded;
        }
        stats
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for TransferStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_common::transfer::TransferStatus;
    use std::path::PathBuf;

    fn hash(n: u8) -> InfoHash {
        InfoHash::parse(&format!("{:040x}", n)).unwrap()
    }

    fn record(n: u8) -> TransferRecord {
        TransferRecord::new(
            hash(n),
            format!("transfer-{}", n),
            PathBuf::from("/downloads"),
            None,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = TransferStore::new();
        let change = store.insert(record(1)).await.unwrap();
        assert!(change.before.is_none());
        assert_eq!(change.after.unwrap().name, "transfer-1");

        let fetched = store.get(&hash(1)).await.unwrap();
        assert_eq!(fetched.status, TransferStatus::Queued);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_double_insert_returns_existing() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();

        match store.insert(record(1)).await {
            Err(InsertError::AlreadyTracked(existing)) => {
                assert_eq!(existing.hash, hash(1));
            }
            Ok(_) => panic!("duplicate insert accepted"),
        }
    }

    #[tokio::test]
    async fn test_apply_returns_before_and_after() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();

        let change = store
            .apply(&hash(1), |r| {
                r.status = TransferStatus::Downloading;
                r.progress = 12.0;
            })
            .await
            .unwrap();

        assert_eq!(change.before.unwrap().status, TransferStatus::Queued);
        let after = change.after.unwrap();
        assert_eq!(after.status, TransferStatus::Downloading);
        assert_eq!(after.progress, 12.0);
    }

    #[tokio::test]
    async fn test_rejected_mutation_leaves_record_untouched() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();

        let result = store
            .mutate(&hash(1), |r| {
                r.progress = 99.0;
                Err::<(), &str>("nope")
            })
            .await;

        assert!(matches!(result, Err(MutateError::Rejected("nope"))));
        assert_eq!(store.get(&hash(1)).await.unwrap().progress, 0.0);
    }

    #[tokio::test]
    async fn test_mutate_unknown_vs_removed() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();
        store.remove(&hash(1)).await.unwrap();

        let removed = store.apply(&hash(1), |_| {}).await;
        assert_eq!(removed.unwrap_err(), StoreError::Removed);

        let unknown = store.apply(&hash(2), |_| {}).await;
        assert_eq!(unknown.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_remove_tombstones_and_deletes() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();

        let change = store.remove(&hash(1)).await.unwrap();
        assert!(change.after.is_none());
        assert_eq!(change.before.unwrap().status, TransferStatus::Queued);

        assert!(store.get(&hash(1)).await.is_none());
        assert!(store.was_removed(&hash(1)));
        assert_eq!(store.remove(&hash(1)).await.unwrap_err(), StoreError::Removed);
    }

    #[tokio::test]
    async fn test_reinsert_after_remove_clears_tombstone() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();
        store.remove(&hash(1)).await.unwrap();

        store.insert(record(1)).await.unwrap();
        assert!(!store.was_removed(&hash(1)));
        assert!(store.get(&hash(1)).await.is_some());
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_age() {
        let store = TransferStore::new();
        let mut first = record(1);
        first.added_at = chrono::Utc::now() - chrono::Duration::seconds(60);
        store.insert(first).await.unwrap();
        store.insert(record(2)).await.unwrap();

        let all = store.list().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].hash, hash(1));
        assert_eq!(all[1].hash, hash(2));
    }

    #[tokio::test]
    async fn test_stats_aggregate() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();
        store.insert(record(2)).await.unwrap();
        store
            .apply(&hash(1), |r| {
                r.download_rate = 100;
                r.downloaded = 1000;
            })
            .await
            .unwrap();
        store
            .apply(&hash(2), |r| {
                r.download_rate = 50;
                r.upload_rate = 25;
                r.uploaded = 500;
            })
            .await
            .unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.download_rate, 150);
        assert_eq!(stats.upload_rate, 25);
        assert_eq!(stats.total_downloaded, 1000);
        assert_eq!(stats.total_uploaded, 500);
    }

    #[tokio::test]
    async fn test_visibility_of_bookkeeping_only_changes() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();

        let change = store.apply(&hash(1), |r| r.missed_ticks += 1).await.unwrap();
        assert!(!change.is_visible());

        let change = store
            .apply(&hash(1), |r| r.progress = 10.0)
            .await
            .unwrap();
        assert!(change.is_visible());
    }

    #[tokio::test]
    async fn test_cmd_seq_monotonic() {
        let store = TransferStore::new();
        let a = store.next_cmd_seq();
        let b = store.next_cmd_seq();
        assert!(b > a);
        assert_eq!(store.current_cmd_seq(), b);
    }

    #[tokio::test]
    async fn test_crossed_completion() {
        let store = TransferStore::new();
        store.insert(record(1)).await.unwrap();

        let change = store
            .apply(&hash(1), |r| {
                r.progress = 100.0;
                r.completed_at = Some(chrono::Utc::now());
            })
            .await
            .unwrap();
        assert!(change.crossed_completion());

        let change = store.apply(&hash(1), |r| r.upload_rate = 1).await.unwrap();
        assert!(!change.crossed_completion());
    }
}
