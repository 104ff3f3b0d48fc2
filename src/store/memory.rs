//! In-memory store implementations.
//!
//! Back this crate's tests and are available to the application shell's
//! tests. State is process-local and lost on drop.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{SyncError, SyncResult};
use crate::event::NormalizedEvent;
use crate::sync::report::{SyncRunLog, SyncStatus};

use super::{
    ApplyStats, EventStore, GeocodeCacheEntry, GeocodeCacheStore, ProfileDirectory, ProfileRef,
    RunLogStore, SourceRecord, SourceRegistry, StoredEvent, SyncTuple,
};

fn lock_err() -> SyncError {
    SyncError::store("store lock poisoned")
}

#[derive(Clone)]
struct EventRow {
    id: i64,
    tuple: SyncTuple,
    event: NormalizedEvent,
}

#[derive(Default)]
struct EventStoreInner {
    next_id: i64,
    rows: Vec<EventRow>,
}

/// In-memory event store. Rows get sequential ids the way a database
/// primary key would.
#[derive(Default)]
pub struct MemoryEventStore {
    inner: Mutex<EventStoreInner>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rows for a tuple, with their ids (test inspection).
    pub fn rows_for_tuple(&self, tuple: &SyncTuple) -> Vec<(i64, NormalizedEvent)> {
        let inner = self.inner.lock().expect("store lock");
        inner
            .rows
            .iter()
            .filter(|r| r.tuple == *tuple)
            .map(|r| (r.id, r.event.clone()))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().expect("store lock").rows.len()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn events_for_tuple(&self, tuple: &SyncTuple) -> SyncResult<Vec<StoredEvent>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.tuple == *tuple)
            .map(|r| StoredEvent {
                id: r.id,
                external_id: r.event.external_id.clone(),
                location: r.event.location.clone(),
                location_name: r.event.location_name.clone(),
                geocoding_attempted: r.event.geocoding_attempted,
            })
            .collect())
    }

    async fn apply(
        &self,
        tuple: &SyncTuple,
        upserts: &[NormalizedEvent],
        delete_ids: &[i64],
    ) -> SyncResult<ApplyStats> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;

        for event in upserts {
            let existing = inner
                .rows
                .iter()
                .position(|r| r.tuple == *tuple && r.event.external_id == event.external_id);
            match existing {
                Some(idx) => inner.rows[idx].event = event.clone(),
                None => {
                    inner.next_id += 1;
                    let id = inner.next_id;
                    inner.rows.push(EventRow {
                        id,
                        tuple: tuple.clone(),
                        event: event.clone(),
                    });
                }
            }
        }

        let before = inner.rows.len();
        inner.rows.retain(|r| !delete_ids.contains(&r.id));

        Ok(ApplyStats {
            upserted: upserts.len(),
            deleted: before - inner.rows.len(),
        })
    }

    async fn delete_recurring_from(
        &self,
        recurring_group_id: &str,
        cutoff: DateTime<Utc>,
    ) -> SyncResult<usize> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        let before = inner.rows.len();
        inner.rows.retain(|r| {
            r.event.recurring_group_id.as_deref() != Some(recurring_group_id)
                || r.event.start_time < cutoff
        });
        Ok(before - inner.rows.len())
    }
}

/// In-memory geocode cache.
#[derive(Default)]
pub struct MemoryGeocodeCache {
    entries: Mutex<HashMap<String, GeocodeCacheEntry>>,
}

impl MemoryGeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GeocodeCacheStore for MemoryGeocodeCache {
    async fn get(&self, address_key: &str) -> SyncResult<Option<GeocodeCacheEntry>> {
        let entries = self.entries.lock().map_err(|_| lock_err())?;
        Ok(entries.get(address_key).cloned())
    }

    async fn put(&self, entry: &GeocodeCacheEntry) -> SyncResult<()> {
        let mut entries = self.entries.lock().map_err(|_| lock_err())?;
        entries.insert(entry.address_key.clone(), entry.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RegistryInner {
    sources: HashMap<String, SourceRecord>,
    profiles: HashMap<String, Vec<ProfileRef>>,
}

/// In-memory source registry.
#[derive(Default)]
pub struct MemorySourceRegistry {
    inner: Mutex<RegistryInner>,
}

impl MemorySourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source with its mapped profiles.
    pub fn add_source(&self, source: SourceRecord, profiles: Vec<ProfileRef>) {
        let mut inner = self.inner.lock().expect("store lock");
        inner.profiles.insert(source.id.clone(), profiles);
        inner.sources.insert(source.id.clone(), source);
    }

    pub fn source(&self, source_id: &str) -> Option<SourceRecord> {
        self.inner
            .lock()
            .expect("store lock")
            .sources
            .get(source_id)
            .cloned()
    }
}

#[async_trait]
impl SourceRegistry for MemorySourceRegistry {
    async fn list_sources(&self) -> SyncResult<Vec<SourceRecord>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        let mut sources: Vec<SourceRecord> = inner.sources.values().cloned().collect();
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sources)
    }

    async fn get_source(&self, source_id: &str) -> SyncResult<Option<SourceRecord>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        Ok(inner.sources.get(source_id).cloned())
    }

    async fn profiles_for(&self, source_id: &str) -> SyncResult<Vec<ProfileRef>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        Ok(inner.profiles.get(source_id).cloned().unwrap_or_default())
    }

    async fn begin_sync(&self, source_id: &str) -> SyncResult<bool> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        let source = inner
            .sources
            .get_mut(source_id)
            .ok_or_else(|| SyncError::store(format!("unknown source: {source_id}")))?;
        if source.sync_status == SyncStatus::Pending {
            return Ok(false);
        }
        source.sync_status = SyncStatus::Pending;
        Ok(true)
    }

    async fn finish_sync(
        &self,
        source_id: &str,
        status: SyncStatus,
        error: Option<&str>,
        team_name: Option<&str>,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        let source = inner
            .sources
            .get_mut(source_id)
            .ok_or_else(|| SyncError::store(format!("unknown source: {source_id}")))?;
        source.sync_status = status;
        source.last_synced = Some(Utc::now());
        source.last_error = error.map(str::to_string);
        if let Some(team_name) = team_name {
            source.team_name = Some(team_name.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
struct DirectoryInner {
    timezones: HashMap<String, String>,
    refreshed: HashMap<String, DateTime<Utc>>,
}

/// In-memory profile directory.
#[derive(Default)]
pub struct MemoryProfileDirectory {
    inner: Mutex<DirectoryInner>,
}

impl MemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_timezone(&self, profile_id: &str, timezone: &str) {
        self.inner
            .lock()
            .expect("store lock")
            .timezones
            .insert(profile_id.to_string(), timezone.to_string());
    }

    pub fn refreshed_at(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .expect("store lock")
            .refreshed
            .get(user_id)
            .copied()
    }
}

#[async_trait]
impl ProfileDirectory for MemoryProfileDirectory {
    async fn timezone_for_profile(&self, profile_id: &str) -> SyncResult<Option<String>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        Ok(inner.timezones.get(profile_id).cloned())
    }

    async fn mark_refreshed(&self, user_ids: &[String], at: DateTime<Utc>) -> SyncResult<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        for user_id in user_ids {
            inner.refreshed.insert(user_id.clone(), at);
        }
        Ok(())
    }
}

/// In-memory run log store.
#[derive(Default)]
pub struct MemoryRunLogStore {
    logs: Mutex<HashMap<String, SyncRunLog>>,
}

impl MemoryRunLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<SyncRunLog> {
        self.logs.lock().expect("store lock").get(id).cloned()
    }

    pub fn logs(&self) -> Vec<SyncRunLog> {
        self.logs.lock().expect("store lock").values().cloned().collect()
    }
}

#[async_trait]
impl RunLogStore for MemoryRunLogStore {
    async fn create(&self, log: &SyncRunLog) -> SyncResult<()> {
        let mut logs = self.logs.lock().map_err(|_| lock_err())?;
        logs.insert(log.id.clone(), log.clone());
        Ok(())
    }

    async fn update(&self, log: &SyncRunLog) -> SyncResult<()> {
        let mut logs = self.logs.lock().map_err(|_| lock_err())?;
        if !logs.contains_key(&log.id) {
            return Err(SyncError::store(format!("unknown run log: {}", log.id)));
        }
        logs.insert(log.id.clone(), log.clone());
        Ok(())
    }
}
