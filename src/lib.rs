//! External calendar synchronization & enrichment pipeline for Huddle.
//!
//! Pulls third-party sports-team calendar feeds, parses them into
//! normalized events, resolves ambiguous timezone encodings, classifies
//! and enriches each event, and reconciles the result against the
//! persisted event set so storage exactly mirrors each feed:
//! - `fetch`: feed retrieval (webcal scheme rewriting, caching disabled)
//! - `ics`: feed parsing and display-name resolution
//! - `normalize`: the three timestamp encodings → absolute UTC instants
//! - `classify`: event kind, opponent, cancellation heuristics
//! - `geocode`: venue-name enrichment through a durable cache
//! - `sync`: per-tuple reconciliation and run-level orchestration
//!
//! Storage and transports are consumed through the traits in `store`,
//! `fetch` and `geocode`; the application shell plugs in its real
//! implementations and invokes `SyncEngine`.

pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod fetch;
pub mod geocode;
pub mod ics;
pub mod normalize;
pub mod platform;
pub mod store;
pub mod sync;

pub use config::{GeocodingConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use event::{EventKind, FeedTime, NormalizedEvent, RawCalendarEvent};
pub use sync::{
    BulkSyncResult, SingleSyncResult, SourceOutcome, SourceResult, SyncDeps, SyncEngine,
    SyncRunLog, SyncStatus, SyncSummary,
};
