//! Top-level sync orchestration.
//!
//! Iterates all known external sources, invokes the per-tuple pipeline for
//! each mapped profile, isolates failures per source, and writes the
//! run-level summary log. This is the only component aware of multiplicity
//! across sources.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::fetch::FeedFetcher;
use crate::geocode::{GeocodeApi, Geocoder, PlaceNameFilter};
use crate::store::{
    EventStore, GeocodeCacheStore, ProfileDirectory, ProfileRef, RunLogStore, SourceRecord,
    SourceRegistry,
};

use super::reconcile::Pipeline;
use super::report::{
    BulkSyncResult, SingleSyncResult, SourceOutcome, SourceResult, SyncRunLog, SyncStatus,
};

/// Everything the engine consumes from the application shell.
pub struct SyncDeps {
    pub fetcher: Arc<dyn FeedFetcher>,
    pub geocode_api: Arc<dyn GeocodeApi>,
    pub events: Arc<dyn EventStore>,
    pub geocode_cache: Arc<dyn GeocodeCacheStore>,
    pub registry: Arc<dyn SourceRegistry>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub run_logs: Arc<dyn RunLogStore>,
}

/// Entry point for the sync pipeline.
pub struct SyncEngine {
    pipeline: Arc<Pipeline>,
    registry: Arc<dyn SourceRegistry>,
    profiles: Arc<dyn ProfileDirectory>,
    run_logs: Arc<dyn RunLogStore>,
    events: Arc<dyn EventStore>,
    max_concurrent_sources: usize,
}

struct SourceReport {
    result: SourceResult,
    affected_users: Vec<String>,
}

struct ProfileRunOutcome {
    events: usize,
    affected: Vec<String>,
    team_name: Option<String>,
    first_error: Option<String>,
}

impl SyncEngine {
    pub fn new(config: &SyncConfig, deps: SyncDeps) -> Self {
        let geocoder = Geocoder::new(
            deps.geocode_api,
            deps.geocode_cache,
            PlaceNameFilter::default(),
            &config.geocoding,
        );
        let pipeline = Arc::new(Pipeline {
            fetcher: deps.fetcher,
            geocoder,
            events: deps.events.clone(),
            profiles: deps.profiles.clone(),
            fallback_timezone: config.fallback_timezone.clone(),
        });
        SyncEngine {
            pipeline,
            registry: deps.registry,
            profiles: deps.profiles,
            run_logs: deps.run_logs,
            events: deps.events,
            max_concurrent_sources: config.max_concurrent_sources.max(1),
        }
    }

    /// Sync every known source, isolating failures per source.
    ///
    /// The run log row is created up front and updated at completion, even
    /// when the run itself fails part-way: whatever partial counts were
    /// accumulated are recorded together with the failure detail.
    pub async fn sync_all(&self) -> SyncResult<BulkSyncResult> {
        let started = Instant::now();
        let mut log = SyncRunLog::begin(Utc::now());
        self.run_logs.create(&log).await?;
        tracing::info!(run = %log.id, "starting bulk sync");

        let outcome = self.run_bulk(&mut log).await;

        log.summary.execution_duration_ms = started.elapsed().as_millis() as u64;
        log.completed_at = Some(Utc::now());
        if let Err(e) = &outcome {
            log.error = Some(e.to_string());
        }
        if let Err(update_err) = self.run_logs.update(&log).await {
            tracing::error!(run = %log.id, error = %update_err, "failed to record run log");
        }

        outcome?;
        tracing::info!(
            run = %log.id,
            successful = log.summary.successful,
            errors = log.summary.errors,
            skipped = log.summary.skipped,
            events = log.summary.total_events,
            "bulk sync complete"
        );
        Ok(BulkSyncResult {
            success: true,
            summary: log.summary,
            results: log.results,
        })
    }

    async fn run_bulk(&self, log: &mut SyncRunLog) -> SyncResult<()> {
        let sources = self.registry.list_sources().await?;
        log.summary.total_teams = sources.len();

        let limiter = Arc::new(Semaphore::new(self.max_concurrent_sources));
        let mut tasks = JoinSet::new();
        for source in sources {
            let limiter = limiter.clone();
            let pipeline = self.pipeline.clone();
            let registry = self.registry.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                Self::process_source(pipeline, registry, source).await
            });
        }

        let mut users_affected: HashSet<String> = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let report =
                joined.map_err(|e| SyncError::Sync(format!("source task failed: {e}")))?;
            match &report.result.outcome {
                SourceOutcome::Synced { events } => {
                    log.summary.successful += 1;
                    log.summary.total_events += events;
                }
                SourceOutcome::Skipped => log.summary.skipped += 1,
                SourceOutcome::Failed { .. } => log.summary.errors += 1,
            }
            users_affected.extend(report.affected_users);
            log.results.push(report.result);
        }

        log.summary.total_users_affected = users_affected.len();
        if !users_affected.is_empty() {
            let mut users: Vec<String> = users_affected.into_iter().collect();
            users.sort();
            self.profiles.mark_refreshed(&users, Utc::now()).await?;
        }
        Ok(())
    }

    /// Process one source end to end: enumerate profiles, take the
    /// per-source serialization guard, reconcile each tuple, and record
    /// the source's status.
    async fn process_source(
        pipeline: Arc<Pipeline>,
        registry: Arc<dyn SourceRegistry>,
        source: SourceRecord,
    ) -> SourceReport {
        let profiles = match registry.profiles_for(&source.id).await {
            Ok(profiles) => profiles,
            Err(e) => return Self::record_failure(&registry, source, e.to_string()).await,
        };

        if profiles.is_empty() {
            // Nothing to store events against.
            tracing::info!(source = %source.id, "no mapped profiles, skipping");
            return SourceReport {
                result: SourceResult {
                    source_id: source.id.clone(),
                    team_name: source.team_name.clone(),
                    outcome: SourceOutcome::Skipped,
                },
                affected_users: Vec::new(),
            };
        }

        // A manual "sync now" overlapping this run must not race the same
        // upsert/delete batch.
        match registry.begin_sync(&source.id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(source = %source.id, "sync already in flight, skipping");
                return SourceReport {
                    result: SourceResult {
                        source_id: source.id.clone(),
                        team_name: source.team_name.clone(),
                        outcome: SourceOutcome::Skipped,
                    },
                    affected_users: Vec::new(),
                };
            }
            Err(e) => return Self::record_failure(&registry, source, e.to_string()).await,
        }

        let run = Self::sync_profiles(&pipeline, &source, &profiles).await;

        let (status, outcome, error) = match &run.first_error {
            None => (
                SyncStatus::Success,
                SourceOutcome::Synced { events: run.events },
                None,
            ),
            Some(error) => (
                SyncStatus::Error,
                SourceOutcome::Failed {
                    error: error.clone(),
                },
                Some(error.clone()),
            ),
        };
        if let Err(e) = registry
            .finish_sync(&source.id, status, error.as_deref(), run.team_name.as_deref())
            .await
        {
            tracing::error!(source = %source.id, error = %e, "failed to record source status");
        }

        SourceReport {
            result: SourceResult {
                source_id: source.id.clone(),
                team_name: run.team_name.or(source.team_name),
                outcome,
            },
            affected_users: run.affected,
        }
    }

    /// Reconcile every mapped profile for a source. One profile's failure
    /// does not stop its siblings.
    async fn sync_profiles(
        pipeline: &Pipeline,
        source: &SourceRecord,
        profiles: &[ProfileRef],
    ) -> ProfileRunOutcome {
        let mut events = 0usize;
        let mut affected = Vec::new();
        let mut team_name = None;
        let mut first_error = None;

        for profile in profiles {
            match pipeline.reconcile_tuple(source, profile).await {
                Ok(outcome) => {
                    events += outcome.events;
                    affected.push(profile.user_id.clone());
                    team_name = Some(outcome.team_name);
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source.id,
                        profile = %profile.profile_id,
                        error = %e,
                        "tuple reconciliation failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        ProfileRunOutcome {
            events,
            affected,
            team_name,
            first_error,
        }
    }

    async fn record_failure(
        registry: &Arc<dyn SourceRegistry>,
        source: SourceRecord,
        error: String,
    ) -> SourceReport {
        if let Err(e) = registry
            .finish_sync(&source.id, SyncStatus::Error, Some(&error), None)
            .await
        {
            tracing::error!(source = %source.id, error = %e, "failed to record source status");
        }
        SourceReport {
            result: SourceResult {
                source_id: source.id.clone(),
                team_name: source.team_name,
                outcome: SourceOutcome::Failed { error },
            },
            affected_users: Vec::new(),
        }
    }

    /// Sync one source now (the manual "sync now" path).
    pub async fn sync_source(
        &self,
        feed_url: &str,
        source_id: &str,
        profile_id: Option<&str>,
    ) -> SingleSyncResult {
        match self.sync_source_inner(feed_url, source_id, profile_id).await {
            Ok((event_count, team_name)) => SingleSyncResult {
                success: true,
                event_count,
                team_name: Some(team_name),
                error: None,
            },
            Err(e) => SingleSyncResult {
                success: false,
                event_count: 0,
                team_name: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn sync_source_inner(
        &self,
        feed_url: &str,
        source_id: &str,
        profile_id: Option<&str>,
    ) -> SyncResult<(usize, String)> {
        let mut source = self
            .registry
            .get_source(source_id)
            .await?
            .ok_or_else(|| SyncError::Config(format!("unknown source: {source_id}")))?;
        // The trigger layer may hand us a fresher URL than the stored row.
        source.feed_url = feed_url.to_string();

        let mapped = self.registry.profiles_for(source_id).await?;
        let profiles: Vec<ProfileRef> = match profile_id {
            Some(profile_id) => mapped
                .into_iter()
                .filter(|p| p.profile_id == profile_id)
                .collect(),
            None => mapped,
        };
        if profiles.is_empty() {
            return Err(SyncError::Config(format!(
                "no mapped profiles for source {source_id}"
            )));
        }

        if !self.registry.begin_sync(source_id).await? {
            return Err(SyncError::Sync(format!(
                "sync already in progress for source {source_id}"
            )));
        }

        let run = Self::sync_profiles(&self.pipeline, &source, &profiles).await;

        let (status, error) = match &run.first_error {
            None => (SyncStatus::Success, None),
            Some(error) => (SyncStatus::Error, Some(error.clone())),
        };
        self.registry
            .finish_sync(source_id, status, error.as_deref(), run.team_name.as_deref())
            .await?;

        if !run.affected.is_empty() {
            self.profiles.mark_refreshed(&run.affected, Utc::now()).await?;
        }

        match run.first_error {
            None => Ok((
                run.events,
                run.team_name
                    .or(source.team_name)
                    .unwrap_or_else(|| "Team".to_string()),
            )),
            Some(error) => Err(SyncError::Sync(error)),
        }
    }

    /// Delete all occurrences of a manually created recurring group at or
    /// after the cutoff. Operates on the shared event table directly and
    /// is not part of the reconciliation diff.
    pub async fn delete_recurring_from(
        &self,
        recurring_group_id: &str,
        cutoff: DateTime<Utc>,
    ) -> SyncResult<usize> {
        self.events
            .delete_recurring_from(recurring_group_id, cutoff)
            .await
    }
}
