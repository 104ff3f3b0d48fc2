//! Timezone normalization.
//!
//! Each raw event's start/end arrives in one of three encodings: explicit
//! UTC, an explicit named zone, or floating. Floating times are the common
//! case for recreational sports feeds and are only meaningful relative to a
//! human's locale; interpreting them as UTC would silently shift every
//! event by the viewer's offset.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{SyncError, SyncResult};
use crate::event::FeedTime;

/// Resolve one feed timestamp to an absolute UTC instant.
///
/// Floating times and all-day dates are interpreted in the viewer's zone.
/// An unknown TZID degrades to the viewer's zone rather than dropping the
/// event.
pub fn resolve_instant(time: &FeedTime, viewer_tz: Tz) -> SyncResult<DateTime<Utc>> {
    match time {
        FeedTime::Utc(dt) => Ok(*dt),
        FeedTime::Zoned { datetime, tzid } => {
            let tz: Tz = match tzid.parse() {
                Ok(tz) => tz,
                Err(_) => {
                    tracing::warn!(tzid = %tzid, "unknown TZID on feed entry, using viewer timezone");
                    viewer_tz
                }
            };
            local_to_utc(*datetime, tz)
        }
        FeedTime::Floating(datetime) => local_to_utc(*datetime, viewer_tz),
        FeedTime::Date(date) => local_to_utc(date.and_time(NaiveTime::MIN), viewer_tz),
    }
}

/// Interpret a wall-clock time in a zone. DST folds resolve to the earlier
/// instant; a wall-clock time skipped by a DST gap advances past the gap.
fn local_to_utc(datetime: NaiveDateTime, tz: Tz) -> SyncResult<DateTime<Utc>> {
    match tz.from_local_datetime(&datetime) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let shifted = datetime + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                    Ok(dt.with_timezone(&Utc))
                }
                LocalResult::None => Err(SyncError::Normalization(format!(
                    "cannot resolve local time {datetime} in {tz}"
                ))),
            }
        }
    }
}

/// Resolve an event's start/end pair.
///
/// A missing or unusable end defaults to one hour after the start (a full
/// day for all-day entries); an end before the start is corrected the same
/// way rather than dropping the event.
pub fn resolve_event_times(
    start: &FeedTime,
    end: Option<&FeedTime>,
    viewer_tz: Tz,
) -> SyncResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start_utc = resolve_instant(start, viewer_tz)?;
    let default_span = match start {
        FeedTime::Date(_) => Duration::hours(24),
        _ => Duration::hours(1),
    };

    let end_utc = match end {
        Some(end) => match resolve_instant(end, viewer_tz) {
            Ok(end_utc) if end_utc >= start_utc => end_utc,
            Ok(_) => start_utc + default_span,
            Err(e) => {
                tracing::warn!(error = %e, "unusable end time on feed entry, defaulting");
                start_utc + default_span
            }
        },
        None => start_utc + default_span,
    };

    Ok((start_utc, end_utc))
}

/// Look up a viewer timezone by IANA name, defaulting to UTC. A missing or
/// unrecognized preference must never abort a sync.
pub fn viewer_timezone(name: Option<&str>) -> Tz {
    match name {
        Some(name) => name.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %name, "unrecognized viewer timezone, defaulting to UTC");
            Tz::UTC
        }),
        None => Tz::UTC,
    }
}
