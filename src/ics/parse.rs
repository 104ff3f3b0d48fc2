//! ICS feed parsing using the icalendar crate's parser.

use std::sync::OnceLock;

use icalendar::{
    DatePerhapsTime,
    parser::{Component, read_calendar, unfold},
};
use regex::Regex;
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::event::{FeedTime, RawCalendarEvent};
use crate::fetch::normalize_feed_url;

/// Result of parsing one feed.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Entries in feed order. Malformed entries are already dropped.
    pub events: Vec<RawCalendarEvent>,
    /// The feed's explicit calendar-name property, when present.
    pub calendar_name: Option<String>,
}

/// Parse raw feed bytes into raw events plus the feed's display name.
///
/// An entry whose start time fails to parse is dropped, never fatal: a
/// malformed single event must not abort the whole feed.
pub fn parse_feed(content: &str) -> SyncResult<ParsedFeed> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| SyncError::Parse(e.to_string()))?;

    let calendar_name = calendar
        .properties
        .iter()
        .find(|p| p.name == "X-WR-CALNAME")
        .map(|p| p.val.to_string());

    let mut events = Vec::new();
    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        match parse_vevent(vevent) {
            Some(event) => events.push(event),
            None => {
                let summary = vevent
                    .find_prop("SUMMARY")
                    .map(|p| p.val.to_string())
                    .unwrap_or_default();
                tracing::warn!(summary = %summary, "dropping feed entry with unparseable start time");
            }
        }
    }

    Ok(ParsedFeed {
        events,
        calendar_name,
    })
}

fn parse_vevent(vevent: &Component<'_>) -> Option<RawCalendarEvent> {
    let start = feed_time(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(feed_time);

    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "(No title)".to_string());
    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| p.val.to_string())
        .filter(|d| !d.trim().is_empty());
    let location = vevent
        .find_prop("LOCATION")
        .map(|p| p.val.to_string())
        .filter(|l| !l.trim().is_empty());

    // Some platforms omit UID; substitute a composite that stays stable
    // for the same occurrence across fetches.
    let external_id = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .filter(|uid| !uid.trim().is_empty())
        .unwrap_or_else(|| fallback_external_id(&summary, &start));

    let status_cancelled = vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("CANCELLED"));

    Some(RawCalendarEvent {
        external_id,
        summary,
        description,
        location,
        start,
        end,
        status_cancelled,
    })
}

/// Convert icalendar's DatePerhapsTime to our wire encoding enum.
fn feed_time(dpt: DatePerhapsTime) -> FeedTime {
    match dpt {
        DatePerhapsTime::Date(d) => FeedTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => FeedTime::Utc(dt),
            icalendar::CalendarDateTime::Floating(naive) => FeedTime::Floating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => FeedTime::Zoned {
                datetime: date_time,
                tzid,
            },
        },
    }
}

fn fallback_external_id(summary: &str, start: &FeedTime) -> String {
    let slug: String = summary
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    format!("{}-{}", slug.trim_matches('-'), start.to_key())
}

/// Resolve the best-effort team display name for a feed.
///
/// Upstream platforms are inconsistent about exposing a clean team name,
/// and a wrong-but-stable name is worse than updating it opportunistically
/// on every successful parse. Priority: the explicit calendar-name
/// property, then a "X vs Y" or "... Field/Court/Gym" fragment from the
/// first entry, then a name derived from the feed URL path. Generic words
/// are stripped from whatever was found.
pub fn resolve_team_name(feed: &ParsedFeed, feed_url: &str) -> String {
    if let Some(name) = feed.calendar_name.as_deref() {
        let cleaned = strip_generic_words(name);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }

    if let Some(first) = feed.events.first() {
        let fragment = team_fragment(&first.summary)
            .or_else(|| first.location.as_deref().and_then(team_fragment));
        if let Some(fragment) = fragment {
            let cleaned = strip_generic_words(&fragment);
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
    }

    name_from_url(feed_url)
}

fn re_vs_fragment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(.{2,}?)\s+(?:vs\.?|versus)\s+.+$").unwrap())
}

fn re_venue_fragment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(.{2,}?)\s+(?:field|court|gym|park|arena|stadium)\b").unwrap()
    })
}

fn re_generic_words() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(calendar|schedule)\b").unwrap())
}

/// Take the team fragment from "X vs Y" or "X Field/Court/Gym" shapes.
fn team_fragment(text: &str) -> Option<String> {
    re_vs_fragment()
        .captures(text)
        .or_else(|| re_venue_fragment().captures(text))
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn strip_generic_words(name: &str) -> String {
    let stripped = re_generic_words().replace_all(name, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last-resort name from the feed URL's path: "spring-roster.ics" →
/// "spring roster".
fn name_from_url(feed_url: &str) -> String {
    let segment = Url::parse(&normalize_feed_url(feed_url))
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segs| segs.filter(|s| !s.is_empty()).next_back())
                .map(|s| s.to_string())
        })
        .unwrap_or_default();

    let stem = segment.trim_end_matches(".ics");
    let name = stem
        .replace(['-', '_', '+', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() { "Team".to_string() } else { name }
}
