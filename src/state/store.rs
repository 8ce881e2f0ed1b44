use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

use super::config::StoreConfig;
use super::data::{NewRecord, Record, RecordFilter, RecordId, RecordPatch, Status};
use super::error::{StorageError, StoreError};
use super::slot::{SnapshotSlot, SqliteSlot};

/// Immutable view of the whole collection, published after every mutation
pub type Snapshot = Arc<[Record]>;

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

/// Largest id taken as a millisecond timestamp (2^53 - 1). Larger numeric
/// ids are kept but do not seed the generator.
const MAX_TIMESTAMP_ID: i64 = (1 << 53) - 1;

/// The RecordStore owns the authoritative record collection.
///
/// Storage order is insertion order; callers sort explicitly. Every
/// mutation replaces the persisted snapshot as a whole and publishes a
/// fresh `Snapshot` to subscribers.
///
/// Save failures are optimistic: the in-memory change stays, the store is
/// marked dirty and the caller gets `StoreError::Storage`. The next
/// mutation (or `flush`) writes the full collection again.
///
/// Snapshot entries that cannot be read as records are kept verbatim and
/// written back after the records, so nothing is lost on save.
pub struct RecordStore {
    records: Vec<Record>,
    unreadable: Vec<Value>,
    slot: Box<dyn SnapshotSlot>,
    events: watch::Sender<Snapshot>,
    clock: Clock,
    last_id: i64,
    dirty: bool,
}

impl RecordStore {
    /// Create a store on `slot` and load whatever the slot holds.
    pub fn open(slot: impl SnapshotSlot + 'static) -> Self {
        let (events, _) = watch::channel(Snapshot::from(Vec::new()));
        let mut store = RecordStore {
            records: Vec::new(),
            unreadable: Vec::new(),
            slot: Box::new(slot),
            events,
            clock: Box::new(Utc::now),
            last_id: 0,
            dirty: false,
        };
        store.load();
        store
    }

    /// Open the SQLite slot named by `config` and load it.
    pub fn open_with_config(config: &StoreConfig) -> Result<Self, StorageError> {
        let slot = SqliteSlot::open(&config.db_path, config.snapshot_key.clone())?;
        Ok(Self::open(slot))
    }

    /// Replace the clock used for `createdAt` and id generation
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Reload the collection from the slot.
    ///
    /// An absent, unreadable or corrupt snapshot yields an empty store;
    /// the failure is logged, never returned. Entries are decoded one by
    /// one: an entry that is not a record, or repeats an earlier id, is set
    /// aside and kept. Returns the record count.
    pub fn load(&mut self) -> usize {
        let entries = match self.slot.read() {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<Value>>(&blob) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(slot = %self.slot.describe(), error = %e, "snapshot is corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(slot = %self.slot.describe(), error = %e, "snapshot could not be read, starting empty");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(entries.len());
        let mut unreadable = Vec::new();
        for (index, entry) in entries.into_iter().enumerate() {
            match Record::deserialize(&entry) {
                // First occurrence of an id wins
                Ok(record) if seen.insert(record.id.clone()) => records.push(record),
                Ok(record) => {
                    tracing::warn!(index, id = %record.id, "snapshot entry repeats an id, kept aside");
                    unreadable.push(entry);
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "snapshot entry is not a record, kept aside");
                    unreadable.push(entry);
                }
            }
        }

        self.last_id = records
            .iter()
            .map(|r| r.id.clone())
            .chain(unreadable.iter().filter_map(|v| RecordId::deserialize(v.get("id")?).ok()))
            .filter_map(|id| id.as_millis())
            .filter(|millis| (0..=MAX_TIMESTAMP_ID).contains(millis))
            .max()
            .unwrap_or(0);
        self.records = records;
        self.unreadable = unreadable;
        self.dirty = false;
        self.publish();

        tracing::info!(
            slot = %self.slot.describe(),
            records = self.records.len(),
            unreadable = self.unreadable.len(),
            "record store loaded"
        );
        self.records.len()
    }

    /// Write the full collection to the slot.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        let result = self
            .encode()
            .map_err(StorageError::from)
            .and_then(|blob| self.slot.write(&blob).map(|()| blob.len()));

        match result {
            Ok(bytes) => {
                self.dirty = false;
                tracing::debug!(records = self.records.len(), bytes, "snapshot persisted");
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                tracing::warn!(error = %e, "snapshot save failed, keeping in-memory state");
                Err(e)
            }
        }
    }

    /// Entries kept aside by the last load because they were not records
    pub fn unreadable_entries(&self) -> &[Value] {
        &self.unreadable
    }

    /// True when the last save failed and the slot is behind memory
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Subscribe to change events. The receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.events.subscribe()
    }

    /// Current collection as a shared immutable snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.iter().find(|r| &r.id == id).cloned()
    }

    /// Records matching `filter`, in storage order. The result is a copy.
    pub fn list(&self, filter: &RecordFilter) -> Vec<Record> {
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    // ========== Mutations ==========

    /// Validate a submission and append it with a fresh id and the initial status.
    pub fn create(&mut self, fields: NewRecord) -> Result<Record, StoreError> {
        fields.validate()?;

        let created_at = (self.clock)();
        let id = self.next_id(created_at);
        let record = fields.into_record(id, created_at);

        tracing::debug!(id = %record.id, region = %record.region, district = %record.district, "record created");
        self.records.push(record.clone());
        self.commit()?;
        Ok(record)
    }

    /// Set a record's status.
    ///
    /// Forward-only movement is the caller's policy; the store accepts any status.
    pub fn update_status(&mut self, id: &RecordId, status: Status) -> Result<(), StoreError> {
        let record = self.find_mut(id)?;
        let from = record.status;
        record.status = status;

        tracing::debug!(%id, ?from, to = ?status, "record status updated");
        self.commit()
    }

    /// Move a record one lifecycle step forward and return its new status.
    ///
    /// A collected record is left untouched.
    pub fn advance_status(&mut self, id: &RecordId) -> Result<Status, StoreError> {
        let current = self.find_mut(id)?.status;
        match current.next() {
            Some(next) => {
                self.update_status(id, next)?;
                Ok(next)
            }
            None => Ok(current),
        }
    }

    /// Merge `patch` into a record; `id`, `createdAt` and `status` are kept.
    pub fn update_fields(&mut self, id: &RecordId, patch: RecordPatch) -> Result<Record, StoreError> {
        patch.validate()?;
        let record = self.find_mut(id)?;
        patch.apply(record);
        let updated = record.clone();

        tracing::debug!(%id, "record fields updated");
        self.commit()?;
        Ok(updated)
    }

    /// Flip a record's bookmark and return the new value.
    pub fn toggle_bookmark(&mut self, id: &RecordId) -> Result<bool, StoreError> {
        let record = self.find_mut(id)?;
        record.bookmarked = !record.bookmarked;
        let bookmarked = record.bookmarked;

        tracing::debug!(%id, bookmarked, "record bookmark toggled");
        self.commit()?;
        Ok(bookmarked)
    }

    /// Remove a record. Deleting an unknown id is `NotFound`, every time.
    pub fn delete(&mut self, id: &RecordId) -> Result<Record, StoreError> {
        let index = self.index_of(id)?;
        let removed = self.records.remove(index);

        tracing::debug!(%id, "record deleted");
        self.commit()?;
        Ok(removed)
    }

    // ========== Internals ==========

    fn index_of(&self, id: &RecordId) -> Result<usize, StoreError> {
        self.records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn find_mut(&mut self, id: &RecordId) -> Result<&mut Record, StoreError> {
        let index = self.index_of(id)?;
        Ok(&mut self.records[index])
    }

    /// Millisecond timestamp, bumped past the previous id when the clock
    /// has not moved on.
    fn next_id(&mut self, now: DateTime<Utc>) -> RecordId {
        let mut candidate = now.timestamp_millis().max(self.last_id.saturating_add(1));
        while self.records.iter().any(|r| r.id.as_str() == candidate.to_string()) {
            candidate = candidate.saturating_add(1);
        }
        self.last_id = candidate;
        RecordId::new(candidate.to_string())
    }

    fn encode(&self) -> Result<String, serde_json::Error> {
        if self.unreadable.is_empty() {
            return serde_json::to_string(&self.records);
        }
        let mut entries = Vec::with_capacity(self.records.len() + self.unreadable.len());
        for record in &self.records {
            entries.push(serde_json::to_value(record)?);
        }
        entries.extend(self.unreadable.iter().cloned());
        serde_json::to_string(&entries)
    }

    fn publish(&self) {
        self.events.send_replace(Snapshot::from(self.records.clone()));
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.publish();
        self.flush()?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("slot", &self.slot.describe())
            .field("records", &self.records.len())
            .field("unreadable", &self.unreadable.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
