//! Event types for the sync pipeline.
//!
//! `RawCalendarEvent` is what the feed parser extracts; `NormalizedEvent`
//! is the canonical unit the pipeline persists. The identity used for
//! upsert and diffing is the (platform, source_team_id, external_id) tuple.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default visibility for platform-synced events.
pub const DEFAULT_VISIBILITY: &str = "public";

/// A feed timestamp in one of the wire encodings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedTime {
    /// Explicit UTC (`...Z`).
    Utc(DateTime<Utc>),
    /// Wall-clock time in an explicit named zone (`TZID=...`).
    Zoned { datetime: NaiveDateTime, tzid: String },
    /// Floating wall-clock time with no zone, meaningful only relative to
    /// the viewer's locale.
    Floating(NaiveDateTime),
    /// All-day date.
    Date(NaiveDate),
}

impl FeedTime {
    /// Stable string form, used in fallback external ids.
    pub fn to_key(&self) -> String {
        match self {
            FeedTime::Utc(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            FeedTime::Zoned { datetime, tzid } => {
                format!("{}@{}", datetime.format("%Y%m%dT%H%M%S"), tzid)
            }
            FeedTime::Floating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
            FeedTime::Date(d) => d.format("%Y%m%d").to_string(),
        }
    }
}

/// One entry as extracted from a feed, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCalendarEvent {
    /// The feed's own identifier for the occurrence. When the source omits
    /// a UID, the parser substitutes a composite of summary + start time.
    pub external_id: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: FeedTime,
    pub end: Option<FeedTime>,
    /// Explicit `STATUS:CANCELLED` on the feed entry.
    pub status_cancelled: bool,
}

/// Event kind derived from free-text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Game,
    Practice,
    Tournament,
    /// Anything that doesn't match a more specific kind.
    Event,
}

/// The canonical synced event, as persisted to the event store.
///
/// Invariant: `end_time >= start_time` (corrected during normalization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    /// Raw location text from the feed.
    pub location: Option<String>,
    /// Human-readable venue name from geocoding enrichment.
    pub location_name: Option<String>,
    pub geocoding_attempted: bool,
    pub sport: Option<String>,
    pub color: String,
    /// Source system name. Manually created personal events have none and
    /// are never touched by this pipeline.
    pub platform: String,
    pub platform_color: String,
    pub profile_id: String,
    pub source_team_id: String,
    pub visibility: String,
    pub is_cancelled: bool,
    /// Set only on manually created recurring occurrences; platform-synced
    /// events never carry one.
    pub recurring_group_id: Option<String>,
}
