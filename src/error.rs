//! Error types for the sync pipeline.

use thiserror::Error;

/// Errors that can occur while syncing external calendar sources.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Non-2xx response or network failure retrieving a feed.
    #[error("Fetch error: {message}")]
    Fetch {
        /// HTTP status of the failed request, when one was received.
        status: Option<u16>,
        message: String,
    },

    /// Feed bytes do not conform to the calendar interchange format.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An event's date-time cannot be resolved to a valid absolute instant
    /// even after defaulting.
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// External geocoding call failed or returned an unusable shape.
    /// Always non-fatal: enrichment degrades to no venue name.
    #[error("Geocode error: {0}")]
    Geocode(String),

    /// The persistent store rejected a read or write.
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid or missing pipeline configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sync error outside the per-stage taxonomy (overlapping run, task failure).
    #[error("Sync error: {0}")]
    Sync(String),
}

impl SyncError {
    pub fn fetch(message: impl Into<String>) -> Self {
        SyncError::Fetch {
            status: None,
            message: message.into(),
        }
    }

    pub fn fetch_status(status: u16, message: impl Into<String>) -> Self {
        SyncError::Fetch {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        SyncError::Store(message.into())
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
