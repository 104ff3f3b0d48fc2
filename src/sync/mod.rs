//! Per-source reconciliation and run-level orchestration.

pub mod orchestrator;
pub mod reconcile;
pub mod report;

pub use orchestrator::{SyncDeps, SyncEngine};
pub use report::{
    BulkSyncResult, SingleSyncResult, SourceOutcome, SourceResult, SyncRunLog, SyncStatus,
    SyncSummary,
};

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared fixtures for sync tests: canned feeds and a scripted
    //! geocoding API.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::{SyncError, SyncResult};
    use crate::fetch::FeedFetcher;
    use crate::geocode::{
        AddressComponent, GeocodeApi, GeocodeCandidate, LatLng, PlaceCandidate,
    };
    use crate::store::SourceRecord;
    use crate::sync::report::SyncStatus;

    /// Serves canned feed bytes per URL; unknown URLs act like HTTP 404.
    #[derive(Default)]
    pub struct StubFetcher {
        feeds: Mutex<HashMap<String, Result<String, u16>>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn serve(&self, url: &str, content: &str) {
            self.feeds
                .lock()
                .expect("fetcher lock")
                .insert(url.to_string(), Ok(content.to_string()));
        }

        pub fn fail(&self, url: &str, status: u16) {
            self.feeds
                .lock()
                .expect("fetcher lock")
                .insert(url.to_string(), Err(status));
        }
    }

    #[async_trait]
    impl FeedFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> SyncResult<String> {
            match self.feeds.lock().expect("fetcher lock").get(url) {
                Some(Ok(content)) => Ok(content.clone()),
                Some(Err(status)) => Err(SyncError::fetch_status(
                    *status,
                    format!("{url} returned HTTP {status}"),
                )),
                None => Err(SyncError::fetch_status(404, format!("{url} returned HTTP 404"))),
            }
        }
    }

    /// Resolves every address to "<address> Venue" and counts calls.
    #[derive(Default)]
    pub struct CountingGeocodeApi {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodeApi for CountingGeocodeApi {
        async fn geocode(&self, address: &str) -> SyncResult<Vec<GeocodeCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![GeocodeCandidate {
                formatted_address: address.to_string(),
                address_components: vec![AddressComponent {
                    long_name: format!("{address} Venue"),
                    types: vec!["establishment".to_string()],
                }],
                location: Some(LatLng { lat: 0.0, lng: 0.0 }),
            }])
        }

        async fn nearby(
            &self,
            _location: LatLng,
            _radius_m: u32,
        ) -> SyncResult<Vec<PlaceCandidate>> {
            Ok(vec![])
        }
    }

    /// Geocoding API that never resolves anything.
    #[derive(Default)]
    pub struct UnresolvableGeocodeApi {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodeApi for UnresolvableGeocodeApi {
        async fn geocode(&self, _address: &str) -> SyncResult<Vec<GeocodeCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn nearby(
            &self,
            _location: LatLng,
            _radius_m: u32,
        ) -> SyncResult<Vec<PlaceCandidate>> {
            Ok(vec![])
        }
    }

    /// Minimal valid feed with one VEVENT per (uid, summary, location).
    pub fn feed(entries: &[(&str, &str, &str)]) -> String {
        let mut out = String::from("BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\n");
        for (uid, summary, location) in entries {
            out.push_str("BEGIN:VEVENT\n");
            out.push_str(&format!("UID:{uid}\n"));
            out.push_str(&format!("SUMMARY:{summary}\n"));
            if !location.is_empty() {
                out.push_str(&format!("LOCATION:{location}\n"));
            }
            out.push_str("DTSTART:20250601T160000Z\nDTEND:20250601T180000Z\nEND:VEVENT\n");
        }
        out.push_str("END:VCALENDAR");
        out
    }

    pub fn source(id: &str, platform: &str, team: &str, url: &str) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            platform: platform.to_string(),
            source_team_id: team.to_string(),
            feed_url: url.to_string(),
            team_name: None,
            sync_status: SyncStatus::Success,
            last_synced: None,
            last_error: None,
        }
    }
}
