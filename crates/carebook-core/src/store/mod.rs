//! Shared appointment collection kept consistent across contexts.
//!
//! The durable collection behind one storage key is the source of truth.
//! Each [`SharedStateStore`] keeps a snapshot of it for its own subscribers
//! and re-reads storage on every write and every external signal. Writes
//! persist the whole collection (last write wins).

mod subscribers;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::models::{NewRecord, Record, RecordId, RecordStatus};
use crate::storage::{ContextId, StorageBackend, StorageError};
use crate::util::compact_text;

pub use subscribers::Subscription;
use subscribers::SubscriberRegistry;

/// What a tolerant read of the durable collection found.
enum Durable {
    Missing,
    Present(Vec<Record>),
}

/// What [`SharedStateStore::append_with_outcome`] did with a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Stored as a new record
    Inserted(Record),
    /// A record with the same natural key was already stored
    Existing(Record),
}

impl AppendOutcome {
    pub const fn record(&self) -> &Record {
        match self {
            Self::Inserted(record) | Self::Existing(record) => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            Self::Inserted(record) | Self::Existing(record) => record,
        }
    }

    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// One context's handle on a shared, durably persisted record collection.
pub struct SharedStateStore {
    key: String,
    storage: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    seed: Vec<Record>,
    context: ContextId,
    /// Last collection this context saw. `None` until the first read.
    snapshot: Mutex<Option<Arc<Vec<Record>>>>,
    subscribers: SubscriberRegistry,
}

impl SharedStateStore {
    /// Create a store for `key` on `storage` with the system clock and an
    /// empty first-run seed.
    pub fn new(key: impl Into<String>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            key: key.into(),
            storage,
            clock: Arc::new(SystemClock),
            seed: Vec::new(),
            context: ContextId::new(),
            snapshot: Mutex::new(None),
            subscribers: SubscriberRegistry::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records written to storage the first time the key is found empty.
    #[must_use]
    pub fn with_seed(mut self, seed: Vec<Record>) -> Self {
        self.seed = seed;
        self
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    pub const fn context_id(&self) -> ContextId {
        self.context
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub(crate) fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Read the durable collection, seeding it on first run.
    ///
    /// Never fails. Unreadable or unparseable data yields an empty collection
    /// and a warning; the next successful write replaces it.
    pub fn load(&self) -> Vec<Record> {
        let mut snapshot = self.lock_snapshot();
        let records = match self.read_durable() {
            Durable::Present(records) => records,
            Durable::Missing => {
                if let Err(error) = self.persist(&self.seed) {
                    tracing::warn!(
                        key = %self.key,
                        "Failed to persist first-run seed: {error}"
                    );
                } else {
                    tracing::debug!(
                        key = %self.key,
                        count = self.seed.len(),
                        "Seeded empty collection"
                    );
                }
                self.seed.clone()
            }
        };

        let changed = snapshot
            .as_deref()
            .is_some_and(|previous| *previous != records);
        *snapshot = Some(Arc::new(records.clone()));
        drop(snapshot);

        if changed {
            self.notify_current();
        }
        records
    }

    /// Store `candidate` unless a record with the same natural key exists.
    ///
    /// Returns the stored record: the existing one on a duplicate, otherwise
    /// the new one (placed first, most-recent-first).
    pub fn append(&self, candidate: NewRecord) -> Result<Record> {
        self.append_with_outcome(candidate).map(AppendOutcome::into_record)
    }

    /// Like [`append`](Self::append), also telling whether the candidate
    /// was inserted or matched a stored record.
    pub fn append_with_outcome(&self, candidate: NewRecord) -> Result<AppendOutcome> {
        candidate.validate()?;
        let natural_key = candidate.natural_key();

        let mut snapshot = self.lock_snapshot();
        let current = self.current_for_write()?;

        if let Some(existing) = current
            .iter()
            .find(|record| record.natural_key() == natural_key)
            .cloned()
        {
            tracing::debug!(
                key = %self.key,
                id = %existing.id,
                "Suppressed duplicate append for {natural_key}"
            );
            let refreshed = Self::adopt(&mut snapshot, current);
            drop(snapshot);
            if refreshed {
                self.notify_current();
            }
            return Ok(AppendOutcome::Existing(existing));
        }

        let id = match candidate.id.clone() {
            Some(id) if current.iter().any(|record| record.id == id) => {
                return Err(Error::InvalidInput(format!(
                    "record id {id} is already in use"
                )));
            }
            Some(id) => id,
            None => RecordId::generate(),
        };

        let record = candidate.into_record(id, self.clock.now_millis());
        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(record.clone());
        next.extend(current);

        self.persist(&next)?;
        *snapshot = Some(Arc::new(next));
        drop(snapshot);

        tracing::debug!(key = %self.key, id = %record.id, "Appended record");
        self.notify_current();
        Ok(AppendOutcome::Inserted(record))
    }

    /// Change the status of the record with `id`.
    pub fn update_status(&self, id: &RecordId, status: RecordStatus) -> Result<Record> {
        let mut snapshot = self.lock_snapshot();
        let mut current = self.current_for_write()?;

        let Some(position) = current.iter().position(|record| &record.id == id) else {
            return Err(Error::NotFound(id.to_string()));
        };

        if current[position].status == status {
            let unchanged = current[position].clone();
            let refreshed = Self::adopt(&mut snapshot, current);
            drop(snapshot);
            if refreshed {
                self.notify_current();
            }
            return Ok(unchanged);
        }

        current[position].status = status;
        let updated = current[position].clone();

        self.persist(&current)?;
        *snapshot = Some(Arc::new(current));
        drop(snapshot);

        tracing::debug!(key = %self.key, %id, %status, "Updated record status");
        self.notify_current();
        Ok(updated)
    }

    /// Register `handler` to receive the full collection after every change.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        self.subscribers.register(Arc::new(handler))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Re-read storage after a write from another context.
    ///
    /// Subscribers are notified only when the durable collection differs
    /// structurally from the last snapshot. Returns whether it did.
    pub fn reconcile_from_external_signal(&self) -> bool {
        let mut snapshot = self.lock_snapshot();
        let durable = match self.read_durable() {
            Durable::Present(records) => records,
            Durable::Missing => Vec::new(),
        };
        let changed = Self::adopt(&mut snapshot, durable);
        drop(snapshot);

        if changed {
            tracing::debug!(key = %self.key, "Reconciled external change");
            self.notify_current();
        }
        changed
    }

    /// The collection as last seen by this context, without touching storage.
    pub fn snapshot(&self) -> Vec<Record> {
        self.lock_snapshot()
            .as_deref()
            .cloned()
            .unwrap_or_default()
    }

    /// Look up a record in durable storage.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.durable_or_seed()
            .into_iter()
            .find(|record| &record.id == id)
    }

    /// Ids in durable storage starting with `prefix`, at most `limit`.
    pub fn find_by_prefix(&self, prefix: &str, limit: usize) -> Vec<RecordId> {
        self.durable_or_seed()
            .into_iter()
            .filter(|record| record.id.as_str().starts_with(prefix))
            .map(|record| record.id)
            .take(limit)
            .collect()
    }

    /// Replace the snapshot with `records` when they differ.
    fn adopt(snapshot: &mut Option<Arc<Vec<Record>>>, records: Vec<Record>) -> bool {
        if snapshot.as_deref() == Some(&records) {
            return false;
        }
        *snapshot = Some(Arc::new(records));
        true
    }

    /// Notify subscribers with the latest snapshot.
    ///
    /// Reading the snapshot at delivery time means a handler never ends on an
    /// older collection when two writers notify out of order.
    fn notify_current(&self) {
        let current = self.lock_snapshot().clone().unwrap_or_default();
        self.subscribers.notify(&current);
    }

    fn durable_or_seed(&self) -> Vec<Record> {
        match self.read_durable() {
            Durable::Present(records) => records,
            Durable::Missing => self.seed.clone(),
        }
    }

    /// Collection a write builds on. Unlike reads for views, a failed
    /// storage read aborts the write instead of starting from empty.
    fn current_for_write(&self) -> Result<Vec<Record>> {
        match self.read_stored() {
            Ok(Durable::Present(records)) => Ok(records),
            Ok(Durable::Missing) => Ok(self.seed.clone()),
            Err(error) => {
                tracing::warn!(
                    key = %self.key,
                    backend = self.storage.name(),
                    "Durable read failed, write aborted: {error}"
                );
                Err(Error::StorageUnavailable(error))
            }
        }
    }

    fn read_durable(&self) -> Durable {
        self.read_stored().unwrap_or_else(|error| {
            tracing::warn!(
                key = %self.key,
                backend = self.storage.name(),
                "Durable read failed, treating collection as empty: {error}"
            );
            Durable::Present(Vec::new())
        })
    }

    /// Read and parse the stored collection. Unparseable data counts as
    /// empty; backend errors are returned.
    fn read_stored(&self) -> std::result::Result<Durable, StorageError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(Durable::Missing);
        };

        match serde_json::from_str::<Vec<Record>>(&raw) {
            Ok(records) => Ok(Durable::Present(records)),
            Err(error) => {
                tracing::warn!(
                    key = %self.key,
                    sample = %compact_text(&raw),
                    "Durable collection is not valid, treating as empty: {error}"
                );
                Ok(Durable::Present(Vec::new()))
            }
        }
    }

    fn persist(&self, records: &[Record]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        self.storage
            .set(&self.key, &raw, self.context)
            .map_err(|error| {
                tracing::warn!(
                    key = %self.key,
                    backend = self.storage.name(),
                    "Durable write failed: {error}"
                );
                Error::StorageUnavailable(error)
            })
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, Option<Arc<Vec<Record>>>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SharedStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStateStore")
            .field("key", &self.key)
            .field("backend", &self.storage.name())
            .field("context", &self.context)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
