//! Location enrichment through a durable geocode cache.
//!
//! Given a free-text location string, resolve a short human-readable venue
//! name, consulting and populating the cache before calling the external
//! geocoding API. Failures degrade to "no venue name"; they never abort
//! the owning event or source.

mod api;
mod place_name;

pub use api::{AddressComponent, GeocodeApi, GeocodeCandidate, HttpGeocodeApi, LatLng, PlaceCandidate};
pub use place_name::PlaceNameFilter;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::GeocodingConfig;
use crate::store::{GeocodeCacheEntry, GeocodeCacheStore};

/// A resolved venue: display name plus the formatted address.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlace {
    pub location_name: String,
    pub formatted_address: String,
}

/// Normalize an address string into the cache key.
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache-or-call geocoding client.
pub struct Geocoder {
    api: Arc<dyn GeocodeApi>,
    cache: Arc<dyn GeocodeCacheStore>,
    filter: PlaceNameFilter,
    nearby_radius_m: u32,
    /// Bounds concurrent outbound calls; external rate limits are the
    /// dominant constraint on a bulk run.
    limiter: Semaphore,
}

impl Geocoder {
    pub fn new(
        api: Arc<dyn GeocodeApi>,
        cache: Arc<dyn GeocodeCacheStore>,
        filter: PlaceNameFilter,
        config: &GeocodingConfig,
    ) -> Self {
        Geocoder {
            api,
            cache,
            filter,
            nearby_radius_m: config.nearby_radius_m,
            limiter: Semaphore::new(config.max_concurrent_calls.max(1)),
        }
    }

    /// Resolve an address to a venue name, or `None` when the address is
    /// empty or unresolvable.
    ///
    /// Only genuine resolutions are cached, so a transient API failure or
    /// ambiguous address is retried on a later sync instead of permanently
    /// poisoning the cache.
    pub async fn resolve(&self, address: &str) -> Option<ResolvedPlace> {
        let key = normalize_address(address);
        if key.is_empty() {
            return None;
        }

        match self.cache.get(&key).await {
            Ok(Some(entry)) => {
                tracing::debug!(address = %key, "geocode cache hit");
                return Some(ResolvedPlace {
                    location_name: entry.location_name,
                    formatted_address: entry.formatted_address,
                });
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "geocode cache read failed"),
        }

        let resolved = self.lookup(address).await?;

        let entry = GeocodeCacheEntry {
            address_key: key,
            location_name: resolved.location_name.clone(),
            formatted_address: resolved.formatted_address.clone(),
        };
        if let Err(e) = self.cache.put(&entry).await {
            tracing::warn!(error = %e, "geocode cache write failed");
        }

        Some(resolved)
    }

    /// Call the external API: forward geocode first, preferring a
    /// point-of-interest component; fall back to a nearby-place search
    /// when the geocoder only knows the street address.
    async fn lookup(&self, address: &str) -> Option<ResolvedPlace> {
        let _permit = self.limiter.acquire().await.ok()?;

        let candidates = match self.api.geocode(address).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, address = %address, "geocoding call failed");
                return None;
            }
        };
        let candidate = candidates.into_iter().next()?;

        if let Some(name) = self.filter.venue_component(&candidate) {
            return Some(ResolvedPlace {
                location_name: name,
                formatted_address: candidate.formatted_address,
            });
        }

        let location = candidate.location?;
        match self.api.nearby(location, self.nearby_radius_m).await {
            Ok(places) => self
                .filter
                .pick_nearby(&places)
                .map(|name| ResolvedPlace {
                    location_name: name,
                    formatted_address: candidate.formatted_address,
                }),
            Err(e) => {
                tracing::warn!(error = %e, address = %address, "nearby place search failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SyncError, SyncResult};
    use crate::store::memory::MemoryGeocodeCache;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted API: one canned response per normalized address.
    #[derive(Default)]
    struct ScriptedApi {
        geocode_calls: AtomicUsize,
        nearby_calls: AtomicUsize,
        geocode_results: Mutex<Vec<GeocodeCandidate>>,
        nearby_results: Mutex<Vec<PlaceCandidate>>,
        fail_geocode: bool,
    }

    impl ScriptedApi {
        fn with_geocode(results: Vec<GeocodeCandidate>) -> Self {
            ScriptedApi {
                geocode_results: Mutex::new(results),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl GeocodeApi for ScriptedApi {
        async fn geocode(&self, _address: &str) -> SyncResult<Vec<GeocodeCandidate>> {
            self.geocode_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_geocode {
                return Err(SyncError::Geocode("scripted failure".to_string()));
            }
            Ok(self.geocode_results.lock().unwrap().clone())
        }

        async fn nearby(
            &self,
            _location: LatLng,
            _radius_m: u32,
        ) -> SyncResult<Vec<PlaceCandidate>> {
            self.nearby_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.nearby_results.lock().unwrap().clone())
        }
    }

    fn poi_candidate(name: &str) -> GeocodeCandidate {
        GeocodeCandidate {
            formatted_address: "123 Main St, Springfield".to_string(),
            address_components: vec![AddressComponent {
                long_name: name.to_string(),
                types: vec!["establishment".to_string()],
            }],
            location: Some(LatLng { lat: 1.0, lng: 2.0 }),
        }
    }

    fn street_only_candidate() -> GeocodeCandidate {
        GeocodeCandidate {
            formatted_address: "123 Main St, Springfield".to_string(),
            address_components: vec![AddressComponent {
                long_name: "Main St".to_string(),
                types: vec!["route".to_string()],
            }],
            location: Some(LatLng { lat: 1.0, lng: 2.0 }),
        }
    }

    fn geocoder(api: Arc<ScriptedApi>, cache: Arc<MemoryGeocodeCache>) -> Geocoder {
        Geocoder::new(
            api,
            cache,
            PlaceNameFilter::default(),
            &crate::config::GeocodingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_api() {
        let api = Arc::new(ScriptedApi::with_geocode(vec![poi_candidate("Rec Center")]));
        let cache = Arc::new(MemoryGeocodeCache::new());
        let geocoder = geocoder(api.clone(), cache.clone());

        let first = geocoder.resolve("123 Main St").await.unwrap();
        assert_eq!(first.location_name, "Rec Center");
        assert_eq!(api.geocode_calls.load(Ordering::SeqCst), 1);

        // Same address, different whitespace/case: served from cache
        let second = geocoder.resolve("  123  MAIN st ").await.unwrap();
        assert_eq!(second.location_name, "Rec Center");
        assert_eq!(api.geocode_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let api = Arc::new(ScriptedApi {
            fail_geocode: true,
            ..Default::default()
        });
        let cache = Arc::new(MemoryGeocodeCache::new());
        let geocoder = geocoder(api.clone(), cache.clone());

        assert!(geocoder.resolve("123 Main St").await.is_none());
        assert_eq!(cache.len(), 0);

        // A later resolve tries the API again rather than trusting a
        // poisoned cache entry
        assert!(geocoder.resolve("123 Main St").await.is_none());
        assert_eq!(api.geocode_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_nearby_fallback_when_no_poi_component() {
        let api = Arc::new(ScriptedApi {
            geocode_results: Mutex::new(vec![street_only_candidate()]),
            nearby_results: Mutex::new(vec![
                PlaceCandidate {
                    name: "123 Main St".to_string(),
                    vicinity: None,
                },
                PlaceCandidate {
                    name: "Northside Soccer Complex".to_string(),
                    vicinity: None,
                },
            ]),
            ..Default::default()
        });
        let cache = Arc::new(MemoryGeocodeCache::new());
        let geocoder = geocoder(api.clone(), cache.clone());

        let resolved = geocoder.resolve("123 Main St").await.unwrap();
        assert_eq!(resolved.location_name, "Northside Soccer Complex");
        assert_eq!(api.nearby_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_unusable_nearby_names_resolve_to_none() {
        let api = Arc::new(ScriptedApi {
            geocode_results: Mutex::new(vec![street_only_candidate()]),
            nearby_results: Mutex::new(vec![PlaceCandidate {
                name: "Springfield".to_string(),
                vicinity: None,
            }]),
            ..Default::default()
        });
        let cache = Arc::new(MemoryGeocodeCache::new());
        let geocoder = geocoder(api, cache.clone());

        assert!(geocoder.resolve("123 Main St").await.is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_empty_address_is_not_looked_up() {
        let api = Arc::new(ScriptedApi::default());
        let cache = Arc::new(MemoryGeocodeCache::new());
        let geocoder = geocoder(api.clone(), cache);

        assert!(geocoder.resolve("   ").await.is_none());
        assert_eq!(api.geocode_calls.load(Ordering::SeqCst), 0);
    }
}
