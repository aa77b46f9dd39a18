use crate::normalize::normalize;
use crate::storage::LocalState;
use futures::StreamExt;
use reqwest::Client;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{error, info};

/// Cache freshness window: a feed snapshot younger than this is reused
/// without touching the network.
pub const FEED_CACHE_FRESH_MS: u64 = 60 * 60 * 1000;

/// Fetches the remote threat feed and maintains its local-scope cache.
pub struct ThreatFeedFetcher {
    client: Client,
    feed_url: String,
    local: LocalState,
}

impl ThreatFeedFetcher {
    pub fn new(feed_url: String, local: LocalState) -> Self {
        Self {
            client: Client::builder()
                .user_agent("SafeShield/1.0")
                .build()
                .unwrap(),
            feed_url,
            local,
        }
    }

    /// Fetches and normalizes the remote feed: one domain per line,
    /// unparseable lines dropped. On success the cache is overwritten with
    /// the new list and timestamp; on any network or read failure the result
    /// is empty and the prior cache stays untouched.
    pub async fn refresh(&self) -> Vec<String> {
        info!("Fetching threat feed from {}", self.feed_url);
        let resp = match self.client.get(&self.feed_url).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Threat feed request rejected: {}", e);
                    return Vec::new();
                }
            },
            Err(e) => {
                error!("Failed to fetch threat feed: {}", e);
                return Vec::new();
            }
        };

        let stream = resp
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));
        let reader = StreamReader::new(stream);
        let mut lines = BufReader::new(reader).lines();
        let mut domains = Vec::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(domain) = normalize(&line) {
                        domains.push(domain);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed reading threat feed body: {}", e);
                    return Vec::new();
                }
            }
        }

        info!("Fetched {} threat domains", domains.len());
        if let Err(e) = self.local.set_threat_feed_cache(&domains, now_ms()).await {
            error!("Failed to persist threat feed cache: {}", e);
        }
        domains
    }

    /// Returns the cached list if it is younger than the freshness window.
    /// Consulting the cache before fetching is the caller's job.
    pub async fn cached_if_fresh(&self, now_ms: u64) -> Option<Vec<String>> {
        let (domains, timestamp) = self.local.threat_feed_cache().await.ok()??;
        if now_ms.saturating_sub(timestamp) < FEED_CACHE_FRESH_MS {
            Some(domains)
        } else {
            None
        }
    }

    #[cfg(test)]
    fn parse_body(text: &str) -> Vec<String> {
        text.lines().filter_map(normalize).collect()
    }
}

/// Milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
