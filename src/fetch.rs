//! Feed retrieval.
//!
//! Fetches raw calendar-feed bytes for one external source. Subscription
//! URLs are normalized first: browsers understand `webcal://`, HTTP clients
//! do not. Retries are the orchestrator's concern, not this layer's.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Retrieves raw feed bytes for a feed URL.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> SyncResult<String>;
}

/// Rewrite calendar-subscription schemes to standard secure HTTP.
pub fn normalize_feed_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("webcals://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("webcal://") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

/// HTTP feed transport.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpFeedFetcher { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> SyncResult<String> {
        let url = normalize_feed_url(url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/calendar")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| SyncError::fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::fetch_status(
                status.as_u16(),
                format!("{url} returned HTTP {status}"),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| SyncError::fetch(format!("{url}: failed to read body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webcal_scheme_is_rewritten() {
        assert_eq!(
            normalize_feed_url("webcal://feeds.example.com/team/123.ics"),
            "https://feeds.example.com/team/123.ics"
        );
        assert_eq!(
            normalize_feed_url("webcals://feeds.example.com/team/123.ics"),
            "https://feeds.example.com/team/123.ics"
        );
    }

    #[test]
    fn test_http_urls_pass_through() {
        assert_eq!(
            normalize_feed_url("https://feeds.example.com/a.ics"),
            "https://feeds.example.com/a.ics"
        );
        assert_eq!(
            normalize_feed_url("http://feeds.example.com/a.ics"),
            "http://feeds.example.com/a.ics"
        );
    }
}
