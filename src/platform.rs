//! Platform adapters.
//!
//! Upstream scheduling platforms differ in cosmetics and feed quirks, not
//! in sync semantics. The pipeline control flow is generic; everything
//! platform-specific lives in this capability set as data.

use serde::{Deserialize, Serialize};

/// Stable fallback color for events whose sport is unknown.
pub const DEFAULT_EVENT_COLOR: &str = "#607D8B";

/// Badge color for platforms we have no specific knowledge about.
const GENERIC_PLATFORM_COLOR: &str = "#9E9E9E";

/// The per-platform capability set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAdapter {
    /// Canonical platform key, stored on every synced event.
    pub name: String,
    /// Badge color for the platform.
    pub color: String,
    /// Sport to assume when the feed does not say. Most platforms are
    /// sport-specific, so this is usually enough.
    pub default_sport: Option<String>,
    /// Platform-branded words to strip from discovered team names.
    pub name_noise: Vec<String>,
}

impl PlatformAdapter {
    /// Adapter for a platform key. Unknown platforms get neutral defaults
    /// rather than an error so a newly added source still syncs.
    pub fn for_platform(name: &str) -> PlatformAdapter {
        match name.to_lowercase().as_str() {
            "teamsnap" => Self::known(name, "#F26722", None, &["teamsnap"]),
            "sportsengine" => Self::known(name, "#2E3192", None, &["sportsengine"]),
            "gamechanger" => Self::known(name, "#00A862", Some("baseball"), &["gamechanger"]),
            "leagueapps" => Self::known(name, "#0072CE", None, &["leagueapps"]),
            "playmetrics" => Self::known(name, "#1B9E4B", Some("soccer"), &["playmetrics"]),
            _ => PlatformAdapter {
                name: name.to_string(),
                color: GENERIC_PLATFORM_COLOR.to_string(),
                default_sport: None,
                name_noise: Vec::new(),
            },
        }
    }

    fn known(name: &str, color: &str, sport: Option<&str>, noise: &[&str]) -> PlatformAdapter {
        PlatformAdapter {
            name: name.to_string(),
            color: color.to_string(),
            default_sport: sport.map(str::to_string),
            name_noise: noise.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Strip platform-branded noise words from a discovered team name.
    /// Falls back to the input when stripping would leave nothing.
    pub fn clean_team_name(&self, name: &str) -> String {
        let kept: Vec<&str> = name
            .split_whitespace()
            .filter(|word| {
                !self
                    .name_noise
                    .iter()
                    .any(|noise| noise.eq_ignore_ascii_case(word))
            })
            .collect();
        if kept.is_empty() {
            name.trim().to_string()
        } else {
            kept.join(" ")
        }
    }
}

/// Event color derived from sport, with a stable fallback.
pub fn color_for_sport(sport: Option<&str>) -> &'static str {
    match sport.map(str::to_lowercase).as_deref() {
        Some("soccer") => "#4CAF50",
        Some("baseball") | Some("softball") => "#8D6E63",
        Some("basketball") => "#FF7043",
        Some("hockey") => "#42A5F5",
        Some("football") => "#7E57C2",
        Some("volleyball") => "#FFCA28",
        Some("lacrosse") => "#26A69A",
        _ => DEFAULT_EVENT_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_platform_has_defaults() {
        let adapter = PlatformAdapter::for_platform("GameChanger");
        assert_eq!(adapter.default_sport.as_deref(), Some("baseball"));
        assert_ne!(adapter.color, GENERIC_PLATFORM_COLOR);
    }

    #[test]
    fn test_unknown_platform_is_neutral() {
        let adapter = PlatformAdapter::for_platform("somenewthing");
        assert_eq!(adapter.name, "somenewthing");
        assert_eq!(adapter.color, GENERIC_PLATFORM_COLOR);
        assert!(adapter.default_sport.is_none());
    }

    #[test]
    fn test_clean_team_name_strips_brand_noise() {
        let adapter = PlatformAdapter::for_platform("teamsnap");
        assert_eq!(adapter.clean_team_name("TeamSnap Rockets U12"), "Rockets U12");
        // Stripping must not empty the name entirely
        assert_eq!(adapter.clean_team_name("TeamSnap"), "TeamSnap");
    }

    #[test]
    fn test_color_for_sport_fallback_is_stable() {
        assert_eq!(color_for_sport(Some("soccer")), "#4CAF50");
        assert_eq!(color_for_sport(Some("Soccer")), "#4CAF50");
        assert_eq!(color_for_sport(Some("curling")), DEFAULT_EVENT_COLOR);
        assert_eq!(color_for_sport(None), DEFAULT_EVENT_COLOR);
    }
}
