use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

use super::StoreError;

/// Persistence boundary for booking records.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Non-cancelled records, optionally restricted to one start date.
    async fn list_active(&self, date: Option<NaiveDate>) -> Result<Vec<BookingRecord>, StoreError>;

    async fn get(&self, id: RecordId) -> Result<BookingRecord, StoreError>;

    /// Persist a new record and return the identity the store assigned.
    async fn insert(&self, record: NewBooking) -> Result<RecordId, StoreError>;

    /// Replace the record stored under `id`.
    async fn update(&self, id: RecordId, record: BookingRecord) -> Result<(), StoreError>;
}

// ── Shared index ─────────────────────────────────────────────────

/// Records by id plus a start-date index.
#[derive(Default)]
struct RecordIndex {
    records: DashMap<RecordId, BookingRecord>,
    by_date: DashMap<NaiveDate, Vec<RecordId>>,
}

impl RecordIndex {
    fn upsert(&self, record: BookingRecord) {
        let id = record.id;
        let new_date = record.date;
        if let Some(old) = self.records.insert(id, record) {
            if old.date == new_date {
                return;
            }
            if let Some(mut ids) = self.by_date.get_mut(&old.date) {
                ids.retain(|i| *i != id);
            }
        }
        self.by_date.entry(new_date).or_default().push(id);
    }

    fn list_active(&self, date: Option<NaiveDate>) -> Vec<BookingRecord> {
        let active = |r: &BookingRecord| r.status != BookingStatus::Cancelled;
        match date {
            Some(d) => {
                let ids = self.by_date.get(&d).map(|v| v.value().clone()).unwrap_or_default();
                ids.iter()
                    .filter_map(|id| self.records.get(id).map(|r| r.value().clone()))
                    .filter(active)
                    .collect()
            }
            None => self
                .records
                .iter()
                .map(|e| e.value().clone())
                .filter(active)
                .collect(),
        }
    }

    fn get(&self, id: RecordId) -> Result<BookingRecord, StoreError> {
        self.records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn snapshot(&self) -> Vec<BookingRecord> {
        let mut all: Vec<BookingRecord> = self.records.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|r| r.id);
        all
    }
}

// ── In-memory adapter ────────────────────────────────────────────

/// Volatile store. Outages can be simulated with [`InMemoryStore::set_unavailable`].
#[derive(Default)]
pub struct InMemoryStore {
    index: RecordIndex,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.index.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.records.is_empty()
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn list_active(&self, date: Option<NaiveDate>) -> Result<Vec<BookingRecord>, StoreError> {
        self.check_up()?;
        Ok(self.index.list_active(date))
    }

    async fn get(&self, id: RecordId) -> Result<BookingRecord, StoreError> {
        self.check_up()?;
        self.index.get(id)
    }

    async fn insert(&self, record: NewBooking) -> Result<RecordId, StoreError> {
        self.check_up()?;
        let id = Ulid::new();
        self.index.upsert(record.with_id(id));
        Ok(id)
    }

    async fn update(&self, id: RecordId, mut record: BookingRecord) -> Result<(), StoreError> {
        self.check_up()?;
        if !self.index.records.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        record.id = id;
        self.index.upsert(record);
        Ok(())
    }
}

// ── WAL-backed adapter ───────────────────────────────────────────

/// Durable store: every insert/update is appended to a write-ahead log and
/// fsynced before it becomes visible. The log is rewritten as one insert per
/// record once `compact_threshold` appends have accumulated.
pub struct WalStore {
    index: RecordIndex,
    wal: Mutex<Wal>,
    compact_threshold: u64,
}

impl WalStore {
    pub fn open(path: &Path, compact_threshold: u64) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let index = RecordIndex::default();
        for event in &events {
            index.upsert(event.record().clone());
        }
        info!(path = %path.display(), events = events.len(), records = index.records.len(), "replayed booking log");
        Ok(Self {
            index,
            wal: Mutex::new(Wal::open(path)?),
            compact_threshold: compact_threshold.max(1),
        })
    }

    /// Append, apply, and compact if due. The WAL lock orders all writers.
    /// Once the event is synced the write has happened, so a failed
    /// compaction is logged and retried on the next write.
    async fn persist_and_apply(&self, event: Event) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        wal.append_buffered(&event)?;
        wal.flush_sync()?;
        let (Event::RecordInserted { record } | Event::RecordUpdated { record }) = event;
        self.index.upsert(record);

        if wal.appends_since_compact() >= self.compact_threshold
            && let Err(e) = self.compact(&mut wal)
        {
            warn!(path = %wal.path().display(), error = %e, "booking log compaction failed");
        }
        Ok(())
    }

    /// Rewrite the log as one insert per record.
    fn compact(&self, wal: &mut Wal) -> io::Result<()> {
        let events: Vec<Event> = self
            .index
            .snapshot()
            .into_iter()
            .map(|record| Event::RecordInserted { record })
            .collect();
        Wal::write_compact_file(wal.path(), &events)?;
        wal.swap_compact_file()?;
        info!(records = events.len(), "compacted booking log");
        Ok(())
    }
}

#[async_trait]
impl BookingStore for WalStore {
    async fn list_active(&self, date: Option<NaiveDate>) -> Result<Vec<BookingRecord>, StoreError> {
        Ok(self.index.list_active(date))
    }

    async fn get(&self, id: RecordId) -> Result<BookingRecord, StoreError> {
        self.index.get(id)
    }

    async fn insert(&self, record: NewBooking) -> Result<RecordId, StoreError> {
        let id = Ulid::new();
        self.persist_and_apply(Event::RecordInserted {
            record: record.with_id(id),
        })
        .await?;
        Ok(id)
    }

    async fn update(&self, id: RecordId, mut record: BookingRecord) -> Result<(), StoreError> {
        if !self.index.records.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        record.id = id;
        self.persist_and_apply(Event::RecordUpdated { record }).await
    }
}
