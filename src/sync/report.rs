//! Sync statuses, per-source results, and the run-level summary log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync lifecycle state of one external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// A reconciliation is in flight. Also serializes overlapping runs for
    /// the same source.
    Pending,
    Success,
    Error,
}

/// Outcome of one source within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SourceOutcome {
    /// Every mapped profile reconciled.
    Synced { events: usize },
    /// No mapped profiles, or a sync was already in flight; reconciliation
    /// was not invoked.
    Skipped,
    /// At least one profile failed.
    Failed { error: String },
}

/// Per-source entry in the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source_id: String,
    pub team_name: Option<String>,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// Aggregate counts for one orchestrator invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub total_teams: usize,
    pub successful: usize,
    pub errors: usize,
    pub skipped: usize,
    pub total_events: usize,
    pub total_users_affected: usize,
    pub execution_duration_ms: u64,
}

/// One row per orchestrator invocation. Created at start and updated in
/// place at completion, including on a top-level failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunLog {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: SyncSummary,
    pub results: Vec<SourceResult>,
    /// Top-level failure detail; partial counts are still recorded.
    pub error: Option<String>,
}

impl SyncRunLog {
    pub fn begin(now: DateTime<Utc>) -> Self {
        SyncRunLog {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            completed_at: None,
            summary: SyncSummary::default(),
            results: Vec::new(),
            error: None,
        }
    }
}

/// Result of a single-source sync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSyncResult {
    pub success: bool,
    pub event_count: usize,
    pub team_name: Option<String>,
    pub error: Option<String>,
}

/// Result of a bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSyncResult {
    pub success: bool,
    pub summary: SyncSummary,
    pub results: Vec<SourceResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_outcome_serializes_with_tag() {
        let result = SourceResult {
            source_id: "src-1".to_string(),
            team_name: Some("Rockets".to_string()),
            outcome: SourceOutcome::Failed {
                error: "HTTP 500".to_string(),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"], "HTTP 500");
    }

    #[test]
    fn test_run_log_ids_are_unique() {
        let a = SyncRunLog::begin(Utc::now());
        let b = SyncRunLog::begin(Utc::now());
        assert_ne!(a.id, b.id);
    }
}
