//! Venue-name selection heuristics.
//!
//! Geocoders frequently return the street address itself as a place
//! "name", which is useless to a parent glancing at a venue label. This
//! strategy decides which candidate names are worth showing. It is fragile
//! pattern matching over free text, kept separate from the client's
//! caching and network logic so it can be tuned or swapped on its own.

use std::sync::OnceLock;

use regex::Regex;

use super::api::{GeocodeCandidate, PlaceCandidate};

/// Address-component types that indicate a human-recognizable venue.
const POI_TYPES: &[&str] = &[
    "establishment",
    "point_of_interest",
    "school",
    "university",
    "stadium",
    "park",
    "gym",
    "premise",
    "sports_complex",
];

/// City names too generic to serve as a venue label on their own.
const GENERIC_CITY_NAMES: &[&str] = &[
    "springfield",
    "franklin",
    "clinton",
    "georgetown",
    "salem",
    "madison",
    "arlington",
    "fairfield",
    "greenville",
    "riverside",
];

/// "123 Main St", "45-47 Oak Avenue"
fn re_address_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[\w-]*\s+\w+").unwrap())
}

/// Replaceable strategy for picking a venue name out of geocoder output.
#[derive(Debug, Clone)]
pub struct PlaceNameFilter {
    generic_city_names: Vec<String>,
}

impl Default for PlaceNameFilter {
    fn default() -> Self {
        PlaceNameFilter::new(GENERIC_CITY_NAMES.iter().map(|s| s.to_string()).collect())
    }
}

impl PlaceNameFilter {
    pub fn new(generic_city_names: Vec<String>) -> Self {
        PlaceNameFilter { generic_city_names }
    }

    /// Pick a venue name from a candidate's address components, preferring
    /// a point-of-interest component over the raw street address.
    pub fn venue_component(&self, candidate: &GeocodeCandidate) -> Option<String> {
        candidate
            .address_components
            .iter()
            .find(|component| {
                component
                    .types
                    .iter()
                    .any(|t| POI_TYPES.contains(&t.as_str()))
            })
            .map(|component| component.long_name.clone())
    }

    /// Whether a nearby-place name is usable as a venue label: not a
    /// restatement of the street address and not a bare city name.
    pub fn usable_place_name(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || re_address_shape().is_match(name) {
            return false;
        }
        !self
            .generic_city_names
            .iter()
            .any(|city| city.eq_ignore_ascii_case(name))
    }

    /// First nearby candidate whose name passes the filter.
    pub fn pick_nearby(&self, candidates: &[PlaceCandidate]) -> Option<String> {
        candidates
            .iter()
            .map(|c| c.name.trim())
            .find(|name| self.usable_place_name(name))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::api::AddressComponent;

    fn candidate(components: Vec<AddressComponent>) -> GeocodeCandidate {
        GeocodeCandidate {
            formatted_address: "123 Main St, Springfield".to_string(),
            address_components: components,
            location: None,
        }
    }

    fn component(name: &str, types: &[&str]) -> AddressComponent {
        AddressComponent {
            long_name: name.to_string(),
            types: types.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_poi_component_preferred_over_street_address() {
        let filter = PlaceNameFilter::default();
        let c = candidate(vec![
            component("123", &["street_number"]),
            component("Main St", &["route"]),
            component("Lincoln Middle School", &["school", "establishment"]),
        ]);
        assert_eq!(
            filter.venue_component(&c).as_deref(),
            Some("Lincoln Middle School")
        );
    }

    #[test]
    fn test_no_poi_component_yields_none() {
        let filter = PlaceNameFilter::default();
        let c = candidate(vec![
            component("123", &["street_number"]),
            component("Main St", &["route"]),
            component("Springfield", &["locality", "political"]),
        ]);
        assert!(filter.venue_component(&c).is_none());
    }

    #[test]
    fn test_address_shaped_names_rejected() {
        let filter = PlaceNameFilter::default();
        assert!(!filter.usable_place_name("123 Main St"));
        assert!(!filter.usable_place_name("45-B Oak Avenue"));
        assert!(filter.usable_place_name("Veterans Memorial Park"));
    }

    #[test]
    fn test_generic_city_names_rejected() {
        let filter = PlaceNameFilter::default();
        assert!(!filter.usable_place_name("Springfield"));
        assert!(!filter.usable_place_name("springfield"));
        assert!(filter.usable_place_name("Springfield Aquatic Center"));
    }

    #[test]
    fn test_pick_nearby_skips_unusable_candidates() {
        let filter = PlaceNameFilter::default();
        let candidates = vec![
            PlaceCandidate {
                name: "742 Evergreen Terrace".to_string(),
                vicinity: None,
            },
            PlaceCandidate {
                name: "Springfield".to_string(),
                vicinity: None,
            },
            PlaceCandidate {
                name: "Evergreen Sports Complex".to_string(),
                vicinity: Some("Springfield".to_string()),
            },
        ];
        assert_eq!(
            filter.pick_nearby(&candidates).as_deref(),
            Some("Evergreen Sports Complex")
        );
    }
}
