//! Per-tuple reconciliation.
//!
//! For one (platform, source_team_id, profile_id) tuple: build the fresh
//! event set from the fetch → parse → normalize → classify chain, enrich
//! it through the geocode cache, then make the persisted rows an exact
//! mirror of the feed with one atomic upsert+delete batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono_tz::Tz;

use crate::classify;
use crate::error::{SyncError, SyncResult};
use crate::event::{DEFAULT_VISIBILITY, NormalizedEvent, RawCalendarEvent};
use crate::fetch::FeedFetcher;
use crate::geocode::{Geocoder, normalize_address};
use crate::ics::{parse_feed, resolve_team_name};
use crate::normalize::{resolve_event_times, viewer_timezone};
use crate::platform::{PlatformAdapter, color_for_sport};
use crate::store::{EventStore, ProfileDirectory, ProfileRef, SourceRecord, StoredEvent, SyncTuple};

/// Outcome of one tuple's reconciliation.
#[derive(Debug, Clone)]
pub struct TupleOutcome {
    /// Events now persisted for the tuple.
    pub events: usize,
    /// Display name discovered during parsing.
    pub team_name: String,
}

/// Shared per-run dependencies for tuple reconciliation.
pub(crate) struct Pipeline {
    pub(crate) fetcher: Arc<dyn FeedFetcher>,
    pub(crate) geocoder: Geocoder,
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) profiles: Arc<dyn ProfileDirectory>,
    pub(crate) fallback_timezone: String,
}

impl Pipeline {
    /// Reconcile one tuple against its feed.
    ///
    /// A fetch or parse failure aborts only this tuple and leaves the
    /// previously persisted state intact; the caller records it as the
    /// source's error.
    pub(crate) async fn reconcile_tuple(
        &self,
        source: &SourceRecord,
        profile: &ProfileRef,
    ) -> SyncResult<TupleOutcome> {
        let raw_feed = self.fetcher.fetch(&source.feed_url).await?;
        let feed = parse_feed(&raw_feed)?;

        let adapter = PlatformAdapter::for_platform(&source.platform);
        let team_name = adapter.clean_team_name(&resolve_team_name(&feed, &source.feed_url));

        let viewer_tz = self.viewer_timezone_for(&profile.profile_id).await;
        let tuple = SyncTuple {
            platform: source.platform.clone(),
            source_team_id: source.source_team_id.clone(),
            profile_id: profile.profile_id.clone(),
        };

        // Normalize + classify. A malformed entry drops; a feed where
        // every entry is malformed aborts the tuple.
        let mut fresh: Vec<NormalizedEvent> = Vec::with_capacity(feed.events.len());
        for raw in &feed.events {
            match build_event(raw, viewer_tz, &adapter, &tuple) {
                Ok(event) => fresh.push(event),
                Err(e) => {
                    tracing::warn!(
                        external_id = %raw.external_id,
                        error = %e,
                        "dropping feed entry"
                    );
                }
            }
        }
        if fresh.is_empty() && !feed.events.is_empty() {
            return Err(SyncError::Normalization(
                "no usable events in feed".to_string(),
            ));
        }

        // A feed may list the same occurrence twice (general listing plus
        // team-specific listing); collapse to one row per identity.
        let fresh = dedupe_by_external_id(fresh);

        let existing = self.events.events_for_tuple(&tuple).await?;
        let existing_by_id: HashMap<&str, &StoredEvent> = existing
            .iter()
            .map(|row| (row.external_id.as_str(), row))
            .collect();

        let mut upserts = Vec::with_capacity(fresh.len());
        for mut event in fresh {
            let prior = existing_by_id.get(event.external_id.as_str()).copied();
            self.enrich(&mut event, prior).await;
            upserts.push(event);
        }

        // Stored rows absent from the fresh set are deleted: removals and
        // id-changing reschedules in the feed must not leave stale rows.
        let fresh_ids: HashSet<&str> = upserts.iter().map(|e| e.external_id.as_str()).collect();
        let delete_ids: Vec<i64> = existing
            .iter()
            .filter(|row| !fresh_ids.contains(row.external_id.as_str()))
            .map(|row| row.id)
            .collect();

        let stats = self.events.apply(&tuple, &upserts, &delete_ids).await?;
        tracing::info!(
            source = %source.id,
            profile = %profile.profile_id,
            upserted = stats.upserted,
            deleted = stats.deleted,
            "reconciled source"
        );

        Ok(TupleOutcome {
            events: upserts.len(),
            team_name,
        })
    }

    async fn viewer_timezone_for(&self, profile_id: &str) -> Tz {
        let preference = match self.profiles.timezone_for_profile(profile_id).await {
            Ok(preference) => preference,
            Err(e) => {
                tracing::warn!(
                    profile = %profile_id,
                    error = %e,
                    "timezone lookup failed, using fallback"
                );
                None
            }
        };
        viewer_timezone(Some(
            preference.as_deref().unwrap_or(&self.fallback_timezone),
        ))
    }

    /// Decide enrichment reuse vs. re-geocode.
    ///
    /// An unchanged address reuses the prior outcome: a failed attempt is
    /// not retried (`geocoding_attempted` suppresses it) and a manually
    /// entered name survives. Only net-new or changed locations reach the
    /// geocoder, which bounds outbound calls per run.
    async fn enrich(&self, event: &mut NormalizedEvent, prior: Option<&StoredEvent>) {
        let location = match event.location.as_deref().map(str::trim) {
            Some(location) if !location.is_empty() => location.to_string(),
            _ => return,
        };

        if let Some(prior) = prior {
            let unchanged = prior
                .location
                .as_deref()
                .map(normalize_address)
                .is_some_and(|key| key == normalize_address(&location));
            if unchanged && (prior.geocoding_attempted || prior.location_name.is_some()) {
                event.location_name = prior.location_name.clone();
                event.geocoding_attempted = prior.geocoding_attempted;
                return;
            }
        }

        event.location_name = self
            .geocoder
            .resolve(&location)
            .await
            .map(|place| place.location_name);
        event.geocoding_attempted = true;
    }
}

fn build_event(
    raw: &RawCalendarEvent,
    viewer_tz: Tz,
    adapter: &PlatformAdapter,
    tuple: &SyncTuple,
) -> SyncResult<NormalizedEvent> {
    let (start_time, end_time) = resolve_event_times(&raw.start, raw.end.as_ref(), viewer_tz)?;
    let classification = classify::classify(raw);
    let sport = adapter.default_sport.clone();
    let color = color_for_sport(sport.as_deref()).to_string();

    Ok(NormalizedEvent {
        external_id: raw.external_id.clone(),
        title: classification.title,
        description: classification.description,
        start_time,
        end_time,
        kind: classification.kind,
        location: raw.location.clone(),
        location_name: None,
        geocoding_attempted: false,
        sport,
        color,
        platform: tuple.platform.clone(),
        platform_color: adapter.color.clone(),
        profile_id: tuple.profile_id.clone(),
        source_team_id: tuple.source_team_id.clone(),
        visibility: DEFAULT_VISIBILITY.to_string(),
        is_cancelled: classification.is_cancelled,
        recurring_group_id: None,
    })
}

fn dedupe_by_external_id(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut seen: HashSet<String> = HashSet::with_capacity(events.len());
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        if seen.insert(event.external_id.clone()) {
            out.push(event);
        } else {
            tracing::debug!(external_id = %event.external_id, "collapsing duplicate feed entry");
        }
    }
    out
}
