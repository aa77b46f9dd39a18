mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::BlockerError;
use crate::normalize::normalize;
use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::sync::Arc;

// Synchronized scope keys.
pub const KEY_BLACKLIST: &str = "blacklist";
pub const KEY_BLOCK_ENABLED: &str = "blockEnabled";

// Local scope keys.
pub const KEY_THREAT_FEED_CACHE: &str = "threatFeedCache";
pub const KEY_CACHE_TIMESTAMP: &str = "cacheTimestamp";
pub const KEY_BLOCK_STATS: &str = "blockStats";
pub const KEY_LAST_BLOCKED_URL: &str = "lastBlockedUrl";

/// One storage scope: a flat JSON map with whole-value replace per key.
///
/// The backing store guarantees consistency for a single key only. There is
/// no merge discipline: two writers racing on the same key are
/// last-write-wins.
#[async_trait::async_trait]
pub trait StorageArea: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Typed accessor for the synchronized scope: the blacklist set and the
/// blocking flag. The single source of truth for "what should be blocked".
#[derive(Clone)]
pub struct SyncSettings {
    area: Arc<dyn StorageArea>,
}

impl SyncSettings {
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self { area }
    }

    pub async fn blacklist(&self) -> Result<Vec<String>> {
        match self.area.get(KEY_BLACKLIST).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replaces the whole collection. Concurrent writers race on the entire
    /// list, not on individual entries.
    pub async fn set_blacklist(&self, domains: &[String]) -> Result<()> {
        self.area
            .set(KEY_BLACKLIST, serde_json::to_value(domains)?)
            .await
    }

    /// Absent flag means enabled; only an explicit `false` disables blocking.
    pub async fn block_enabled(&self) -> Result<bool> {
        Ok(!matches!(
            self.area.get(KEY_BLOCK_ENABLED).await?,
            Some(Value::Bool(false))
        ))
    }

    /// Persists the flag only. Callers re-materialize rules themselves.
    pub async fn set_block_enabled(&self, enabled: bool) -> Result<()> {
        self.area.set(KEY_BLOCK_ENABLED, Value::Bool(enabled)).await
    }

    /// Normalizes and appends. Fails on unparseable input or an entry that
    /// is already present.
    pub async fn add_domain(&self, raw: &str) -> Result<String, BlockerError> {
        let domain = normalize(raw).ok_or(BlockerError::InvalidUrl)?;
        let mut blacklist = self.blacklist().await.map_err(BlockerError::storage)?;
        if blacklist.contains(&domain) {
            return Err(BlockerError::DuplicateEntry);
        }
        blacklist.push(domain.clone());
        self.set_blacklist(&blacklist)
            .await
            .map_err(BlockerError::storage)?;
        Ok(domain)
    }

    /// Normalizes and removes. Removing an absent domain is a success.
    pub async fn remove_domain(&self, raw: &str) -> Result<String, BlockerError> {
        let domain = normalize(raw).ok_or(BlockerError::InvalidUrl)?;
        let blacklist = self.blacklist().await.map_err(BlockerError::storage)?;
        let updated: Vec<String> = blacklist.into_iter().filter(|d| *d != domain).collect();
        self.set_blacklist(&updated)
            .await
            .map_err(BlockerError::storage)?;
        Ok(domain)
    }

    /// Wipes the whole scope (blacklist and flag).
    pub async fn clear(&self) -> Result<()> {
        self.area.clear().await
    }
}

/// Typed accessor for the local (device-only) scope: threat feed cache,
/// block statistics, and the last-blocked slot.
#[derive(Clone)]
pub struct LocalState {
    area: Arc<dyn StorageArea>,
}

impl LocalState {
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self { area }
    }

    pub async fn threat_feed_cache(&self) -> Result<Option<(Vec<String>, u64)>> {
        let domains = self.area.get(KEY_THREAT_FEED_CACHE).await?;
        let timestamp = self.area.get(KEY_CACHE_TIMESTAMP).await?;
        match (domains, timestamp) {
            (Some(d), Some(t)) => Ok(Some((
                serde_json::from_value(d)?,
                serde_json::from_value(t)?,
            ))),
            _ => Ok(None),
        }
    }

    pub async fn set_threat_feed_cache(&self, domains: &[String], timestamp_ms: u64) -> Result<()> {
        self.area
            .set(KEY_THREAT_FEED_CACHE, serde_json::to_value(domains)?)
            .await?;
        self.area
            .set(KEY_CACHE_TIMESTAMP, Value::from(timestamp_ms))
            .await
    }

    pub async fn block_stats(&self) -> Result<FxHashMap<String, u64>> {
        match self.area.get(KEY_BLOCK_STATS).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(FxHashMap::default()),
        }
    }

    /// Bumps the per-domain match counter. Counters only ever grow; they are
    /// never reconciled against the blacklist.
    pub async fn record_block(&self, domain: &str) -> Result<u64> {
        let mut stats = self.block_stats().await?;
        let count = stats.entry(domain.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        self.area
            .set(KEY_BLOCK_STATS, serde_json::to_value(&stats)?)
            .await?;
        Ok(count)
    }

    pub async fn last_blocked_url(&self) -> Result<Option<String>> {
        match self.area.get(KEY_LAST_BLOCKED_URL).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(None),
        }
    }

    /// Overwrites the single last-blocked slot with the raw URL.
    pub async fn set_last_blocked_url(&self, url: &str) -> Result<()> {
        self.area
            .set(KEY_LAST_BLOCKED_URL, Value::from(url))
            .await
    }
}

/// Order-preserving set union: `base` entries first, then unseen `extra`
/// entries in their own order.
pub fn merge_unique(base: &[String], extra: &[String]) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut merged = Vec::with_capacity(base.len() + extra.len());
    for domain in base.iter().chain(extra) {
        if seen.insert(domain.as_str()) {
            merged.push(domain.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_over_memory() -> SyncSettings {
        SyncSettings::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_then_duplicate() {
        let sync = sync_over_memory();
        assert_eq!(sync.add_domain("https://evil.com/x").await.unwrap(), "evil.com");
        let err = sync.add_domain("evil.com").await.unwrap_err();
        assert_eq!(err.to_string(), "URL already in blacklist");
    }

    #[tokio::test]
    async fn test_add_invalid() {
        let sync = sync_over_memory();
        let err = sync.add_domain("not a url").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid URL");
    }

    #[tokio::test]
    async fn test_remove_absent_is_success() {
        let sync = sync_over_memory();
        sync.remove_domain("never-added.com").await.unwrap();
        assert!(sync.blacklist().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_block_enabled_defaults_true() {
        let sync = sync_over_memory();
        assert!(sync.block_enabled().await.unwrap());
        sync.set_block_enabled(false).await.unwrap();
        assert!(!sync.block_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_record_block_monotone() {
        let local = LocalState::new(Arc::new(MemoryStore::new()));
        assert_eq!(local.record_block("evil.com").await.unwrap(), 1);
        assert_eq!(local.record_block("evil.com").await.unwrap(), 2);
        assert_eq!(local.record_block("other.com").await.unwrap(), 1);
        let stats = local.block_stats().await.unwrap();
        assert_eq!(stats["evil.com"], 2);
    }

    #[test]
    fn test_merge_unique_keeps_order() {
        let base = vec!["a.com".to_string(), "b.com".to_string()];
        let extra = vec!["b.com".to_string(), "c.com".to_string(), "a.com".to_string()];
        assert_eq!(merge_unique(&base, &extra), vec!["a.com", "b.com", "c.com"]);
    }
}
