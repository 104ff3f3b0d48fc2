//! Geocoding API client.
//!
//! Two modes: forward geocoding of an address string, and a secondary
//! nearby-place search by coordinates. The HTTP implementation speaks the
//! Google-style JSON shapes; endpoints and key come from configuration.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GeocodingConfig;
use crate::error::{SyncError, SyncResult};

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// One address component of a geocoding result.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// One candidate returned by forward geocoding.
#[derive(Debug, Clone)]
pub struct GeocodeCandidate {
    pub formatted_address: String,
    pub address_components: Vec<AddressComponent>,
    pub location: Option<LatLng>,
}

/// One candidate returned by nearby-place search.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    #[serde(default)]
    pub vicinity: Option<String>,
}

/// External geocoding service.
#[async_trait]
pub trait GeocodeApi: Send + Sync {
    async fn geocode(&self, address: &str) -> SyncResult<Vec<GeocodeCandidate>>;
    async fn nearby(&self, location: LatLng, radius_m: u32) -> SyncResult<Vec<PlaceCandidate>>;
}

// Wire shapes for the Google-style JSON responses.

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResultRaw>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResultRaw {
    formatted_address: String,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceCandidate>,
}

/// HTTP geocoding client.
pub struct HttpGeocodeApi {
    client: reqwest::Client,
    config: GeocodingConfig,
}

impl HttpGeocodeApi {
    pub fn new(config: GeocodingConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpGeocodeApi { client, config })
    }

    fn api_key(&self) -> SyncResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| SyncError::Geocode("no geocoding API key configured".to_string()))
    }
}

#[async_trait]
impl GeocodeApi for HttpGeocodeApi {
    async fn geocode(&self, address: &str) -> SyncResult<Vec<GeocodeCandidate>> {
        let response = self
            .client
            .get(&self.config.geocode_url)
            .query(&[("address", address), ("key", self.api_key()?)])
            .send()
            .await
            .map_err(|e| SyncError::Geocode(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Geocode(format!(
                "geocode request returned HTTP {status}"
            )));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Geocode(format!("unexpected geocode response: {e}")))?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body
                .results
                .into_iter()
                .map(|r| GeocodeCandidate {
                    formatted_address: r.formatted_address,
                    address_components: r.address_components,
                    location: r.geometry.map(|g| g.location),
                })
                .collect()),
            other => Err(SyncError::Geocode(format!("geocode request failed: {other}"))),
        }
    }

    async fn nearby(&self, location: LatLng, radius_m: u32) -> SyncResult<Vec<PlaceCandidate>> {
        let location_param = format!("{},{}", location.lat, location.lng);
        let radius_param = radius_m.to_string();
        let response = self
            .client
            .get(&self.config.nearby_url)
            .query(&[
                ("location", location_param.as_str()),
                ("radius", radius_param.as_str()),
                ("key", self.api_key()?),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Geocode(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Geocode(format!(
                "nearby search returned HTTP {status}"
            )));
        }

        let body: NearbyResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Geocode(format!("unexpected nearby response: {e}")))?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body.results),
            other => Err(SyncError::Geocode(format!("nearby search failed: {other}"))),
        }
    }
}
