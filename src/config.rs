//! Pipeline configuration.
//!
//! All ambient state (API keys, service endpoints, tuning knobs) travels in
//! one explicit struct handed to the engine at construction. Nothing in the
//! pipeline reads the process environment.

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_sources() -> usize {
    4
}

fn default_fallback_timezone() -> String {
    "UTC".to_string()
}

fn default_geocode_url() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".to_string()
}

fn default_nearby_url() -> String {
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json".to_string()
}

fn default_nearby_radius_m() -> u32 {
    200
}

fn default_max_concurrent_calls() -> usize {
    4
}

/// Configuration for one sync engine instance.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Per-source feed fetch timeout. On timeout the source is marked
    /// errored and the run moves on.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// How many sources a bulk run reconciles at once.
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    /// Viewer timezone used when a profile has no saved preference.
    #[serde(default = "default_fallback_timezone")]
    pub fallback_timezone: String,

    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// Geocoding service endpoints and limits.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    /// API key for the geocoding service. Unset disables outbound calls;
    /// events then sync without venue names.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    #[serde(default = "default_nearby_url")]
    pub nearby_url: String,

    /// Radius for the secondary nearby-place search.
    #[serde(default = "default_nearby_radius_m")]
    pub nearby_radius_m: u32,

    /// Bound on concurrent outbound geocoding calls per run.
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_sources: default_max_concurrent_sources(),
            fallback_timezone: default_fallback_timezone(),
            geocoding: GeocodingConfig::default(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        GeocodingConfig {
            api_key: None,
            geocode_url: default_geocode_url(),
            nearby_url: default_nearby_url(),
            nearby_radius_m: default_nearby_radius_m(),
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml(content: &str) -> SyncResult<Self> {
        toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SyncConfig::from_toml("").unwrap();
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.fallback_timezone, "UTC");
        assert!(config.geocoding.api_key.is_none());
        assert!(config.geocoding.geocode_url.contains("geocode"));
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = SyncConfig::from_toml(
            r#"
fetch_timeout_secs = 10
fallback_timezone = "America/New_York"

[geocoding]
api_key = "test-key"
nearby_radius_m = 500
"#,
        )
        .unwrap();
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.fallback_timezone, "America/New_York");
        assert_eq!(config.geocoding.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.geocoding.nearby_radius_m, 500);
        // Untouched fields keep their defaults
        assert_eq!(config.geocoding.max_concurrent_calls, 4);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = SyncConfig::from_toml("fetch_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
