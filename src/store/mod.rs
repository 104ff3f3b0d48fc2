//! Storage seams consumed by the sync pipeline.
//!
//! The application shell owns the real persistent store; the pipeline
//! talks to it through these traits. `memory` provides in-process
//! implementations used by tests.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::event::NormalizedEvent;
use crate::sync::report::{SyncRunLog, SyncStatus};

/// Scope of one reconciliation unit. Each tuple owns a disjoint subset of
/// persisted rows; reconciliations for different tuples never contend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncTuple {
    pub platform: String,
    pub source_team_id: String,
    pub profile_id: String,
}

/// Projection of a persisted event row: only the columns the diff needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Row primary key; stable across in-place updates.
    pub id: i64,
    pub external_id: String,
    pub location: Option<String>,
    pub location_name: Option<String>,
    pub geocoding_attempted: bool,
}

/// Counts from one applied reconciliation batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub upserted: usize,
    pub deleted: usize,
}

/// Persisted events, keyed by (platform, source_team_id, external_id)
/// within a profile's partition.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Rows currently persisted for one tuple, projected for diffing.
    async fn events_for_tuple(&self, tuple: &SyncTuple) -> SyncResult<Vec<StoredEvent>>;

    /// Apply one reconciliation batch: upsert every event keyed on its
    /// identity, then delete the given row ids. The batch is atomic; a
    /// failure must leave the previously persisted state intact. An upsert
    /// matching an existing row keeps that row's primary key so in-place
    /// update is observable to foreign references.
    async fn apply(
        &self,
        tuple: &SyncTuple,
        upserts: &[NormalizedEvent],
        delete_ids: &[i64],
    ) -> SyncResult<ApplyStats>;

    /// Delete every occurrence of a recurring group starting at or after
    /// the cutoff. Used by the "delete all future occurrences" flow; not
    /// part of the reconciliation diff.
    async fn delete_recurring_from(
        &self,
        recurring_group_id: &str,
        cutoff: DateTime<Utc>,
    ) -> SyncResult<usize>;
}

/// One durable geocode cache entry, keyed by normalized address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCacheEntry {
    pub address_key: String,
    pub location_name: String,
    pub formatted_address: String,
}

/// Durable address → venue cache. Append-only from the pipeline's side:
/// entries are created on first successful resolution and never expired.
#[async_trait]
pub trait GeocodeCacheStore: Send + Sync {
    async fn get(&self, address_key: &str) -> SyncResult<Option<GeocodeCacheEntry>>;
    async fn put(&self, entry: &GeocodeCacheEntry) -> SyncResult<()>;
}

/// One registered external source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub platform: String,
    pub source_team_id: String,
    pub feed_url: String,
    pub team_name: Option<String>,
    pub sync_status: SyncStatus,
    pub last_synced: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A profile mapped to a source, with its owning user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRef {
    pub profile_id: String,
    pub user_id: String,
}

/// Registry of external sources and their profile mappings.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn list_sources(&self) -> SyncResult<Vec<SourceRecord>>;

    async fn get_source(&self, source_id: &str) -> SyncResult<Option<SourceRecord>>;

    async fn profiles_for(&self, source_id: &str) -> SyncResult<Vec<ProfileRef>>;

    /// Test-and-set the pending flag, serializing reconciliation per
    /// source. Returns false when a sync for this source is already in
    /// flight; the caller must then skip it.
    async fn begin_sync(&self, source_id: &str) -> SyncResult<bool>;

    /// Record the attempt's outcome, stamp `last_synced`, and rewrite the
    /// display name when parsing discovered a better one.
    async fn finish_sync(
        &self,
        source_id: &str,
        status: SyncStatus,
        error: Option<&str>,
        team_name: Option<&str>,
    ) -> SyncResult<()>;
}

/// Profile → user resolution and per-user freshness stamps.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// The owning user's saved IANA timezone preference, if any.
    async fn timezone_for_profile(&self, profile_id: &str) -> SyncResult<Option<String>>;

    /// Stamp "last refreshed" for users whose data changed. A side effect
    /// of completion, not of attempt.
    async fn mark_refreshed(&self, user_ids: &[String], at: DateTime<Utc>) -> SyncResult<()>;
}

/// Run-level summary log rows.
#[async_trait]
pub trait RunLogStore: Send + Sync {
    async fn create(&self, log: &SyncRunLog) -> SyncResult<()>;
    async fn update(&self, log: &SyncRunLog) -> SyncResult<()>;
}
