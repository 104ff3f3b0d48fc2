//! Event classification and enrichment from free-text fields.
//!
//! Feeds carry no structured "game vs practice" field; everything here is
//! keyword and pattern matching over summary/description text. False
//! negatives are expected and acceptable; whole-word matching keeps false
//! positives down.

use std::sync::OnceLock;

use regex::Regex;

use crate::event::{EventKind, RawCalendarEvent};

/// Derived classification for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: EventKind,
    pub opponent: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub is_cancelled: bool,
}

const PRACTICE_WORDS: &[&str] = &["practice", "training", "scrimmage"];
const TOURNAMENT_WORDS: &[&str] = &["tournament", "tourney", "playoffs"];
const GAME_WORDS: &[&str] = &["game", "match"];

fn re_vs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bvs\.?\s+(.+)$").unwrap())
}

fn re_team_at() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^([^,]{2,}?)\s+at\s+([A-Za-z][^,]*)$").unwrap())
}

/// Venue/time tails that follow an opponent name: " at Rec Center",
/// " @ Field 3", " (makeup)", " - away".
fn re_opponent_tail() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(?:at|@)\s.*$|\s+-\s.*$|\s*\(.*$").unwrap())
}

fn re_cancelled() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(cancell?ed|cancel|postponed|rescheduled)\b").unwrap())
}

/// Classify one raw event and compose its stored title/description.
pub fn classify(raw: &RawCalendarEvent) -> Classification {
    let summary = raw.summary.trim();
    let description = raw.description.as_deref().map(str::trim);

    let kind = derive_kind(summary);
    let opponent = match kind {
        EventKind::Game => extract_opponent(summary),
        _ => None,
    };

    let title = match &opponent {
        Some(opponent) => format!("Game vs {opponent}"),
        None => summary.to_string(),
    };

    let composed_description = compose_description(summary, description, opponent.as_deref(), &title);

    let is_cancelled = raw.status_cancelled
        || [Some(title.as_str()), description, Some(summary)]
            .into_iter()
            .flatten()
            .any(|text| re_cancelled().is_match(text));

    Classification {
        kind,
        opponent,
        title,
        description: composed_description,
        is_cancelled,
    }
}

/// First match wins: practice and tournament keywords outrank the looser
/// game patterns so "Practice at Jefferson Gym" never reads as a game.
fn derive_kind(summary: &str) -> EventKind {
    let lower = summary.to_lowercase();
    if contains_word(&lower, PRACTICE_WORDS) {
        EventKind::Practice
    } else if contains_word(&lower, TOURNAMENT_WORDS) {
        EventKind::Tournament
    } else if contains_word(&lower, GAME_WORDS)
        || re_vs().is_match(summary)
        || re_team_at().is_match(summary)
    {
        EventKind::Game
    } else {
        EventKind::Event
    }
}

fn contains_word(haystack_lower: &str, words: &[&str]) -> bool {
    haystack_lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| words.contains(&token))
}

/// Opponent from "vs X" or "Team at Opponent" shapes.
fn extract_opponent(summary: &str) -> Option<String> {
    let captured = re_vs()
        .captures(summary)
        .map(|caps| caps[1].to_string())
        .or_else(|| {
            re_team_at()
                .captures(summary)
                .map(|caps| caps[2].to_string())
        })?;

    let opponent = re_opponent_tail().replace(&captured, "").trim().to_string();
    (!opponent.is_empty()).then_some(opponent)
}

/// Fold the original summary and an explicit "Opponent: X" line into the
/// description without duplicating text already present.
fn compose_description(
    summary: &str,
    description: Option<&str>,
    opponent: Option<&str>,
    title: &str,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(description) = description.filter(|d| !d.is_empty()) {
        parts.push(description.to_string());
    }

    if title != summary && !parts.iter().any(|p| p.contains(summary)) {
        parts.push(summary.to_string());
    }

    if let Some(opponent) = opponent {
        let line = format!("Opponent: {opponent}");
        let line_lower = line.to_lowercase();
        if !parts.iter().any(|p| p.to_lowercase().contains(&line_lower)) {
            parts.push(line);
        }
    }

    (!parts.is_empty()).then(|| parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FeedTime;
    use chrono::NaiveDate;

    fn raw(summary: &str, description: Option<&str>) -> RawCalendarEvent {
        RawCalendarEvent {
            external_id: "e1".to_string(),
            summary: summary.to_string(),
            description: description.map(str::to_string),
            location: None,
            start: FeedTime::Floating(
                NaiveDate::from_ymd_opt(2025, 6, 1)
                    .unwrap()
                    .and_hms_opt(16, 0, 0)
                    .unwrap(),
            ),
            end: None,
            status_cancelled: false,
        }
    }

    #[test]
    fn test_vs_pattern_is_a_game_with_opponent() {
        let c = classify(&raw("Rockets vs Hawks", None));
        assert_eq!(c.kind, EventKind::Game);
        assert_eq!(c.opponent.as_deref(), Some("Hawks"));
        assert_eq!(c.title, "Game vs Hawks");
    }

    #[test]
    fn test_opponent_tail_is_trimmed() {
        let c = classify(&raw("Rockets vs Hawks at Rec Center", None));
        assert_eq!(c.opponent.as_deref(), Some("Hawks"));

        let c = classify(&raw("Rockets vs Hawks (makeup)", None));
        assert_eq!(c.opponent.as_deref(), Some("Hawks"));
    }

    #[test]
    fn test_team_at_opponent_pattern() {
        let c = classify(&raw("Rockets at Thunder", None));
        assert_eq!(c.kind, EventKind::Game);
        assert_eq!(c.opponent.as_deref(), Some("Thunder"));
    }

    #[test]
    fn test_practice_outranks_at_pattern() {
        let c = classify(&raw("Practice at Jefferson Gym", None));
        assert_eq!(c.kind, EventKind::Practice);
        assert!(c.opponent.is_none());
        assert_eq!(c.title, "Practice at Jefferson Gym");
    }

    #[test]
    fn test_tournament_keyword() {
        let c = classify(&raw("Spring Tournament Day 1", None));
        assert_eq!(c.kind, EventKind::Tournament);
    }

    #[test]
    fn test_plain_entry_is_generic_event() {
        let c = classify(&raw("Team photos", None));
        assert_eq!(c.kind, EventKind::Event);
        assert_eq!(c.title, "Team photos");
        assert!(c.description.is_none());
    }

    #[test]
    fn test_description_folds_summary_and_opponent() {
        let c = classify(&raw("Rockets vs Hawks", Some("Bring water")));
        let description = c.description.unwrap();
        assert!(description.contains("Bring water"));
        assert!(description.contains("Rockets vs Hawks"));
        assert!(description.contains("Opponent: Hawks"));
    }

    #[test]
    fn test_description_does_not_duplicate_existing_text() {
        let c = classify(&raw("Rockets vs Hawks", Some("Opponent: Hawks. Wear white.")));
        let description = c.description.unwrap();
        assert_eq!(description.matches("Opponent: Hawks").count(), 1);
    }

    #[test]
    fn test_cancellation_keywords_whole_word() {
        assert!(classify(&raw("CANCELLED: Rockets vs Hawks", None)).is_cancelled);
        assert!(classify(&raw("Game vs Hawks", Some("Postponed due to rain"))).is_cancelled);
        assert!(classify(&raw("Practice — rescheduled", None)).is_cancelled);
        // Whole-word: "Cancellation" is not in the keyword set
        assert!(!classify(&raw("Cancellation policy reminder", None)).is_cancelled);
        assert!(!classify(&raw("Rockets vs Hawks", None)).is_cancelled);
    }

    #[test]
    fn test_structured_cancelled_status_wins() {
        let mut event = raw("Rockets vs Hawks", None);
        event.status_cancelled = true;
        assert!(classify(&event).is_cancelled);
    }
}
