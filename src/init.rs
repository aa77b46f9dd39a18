//! Startup and install lifecycle for the blocking core.
//!
//! Browser startup intentionally resets the synchronized scope: the rules
//! and the whole sync store are wiped, and the blacklist repopulates from
//! the local feed cache (and any synced-device copy). Install keeps the
//! existing state and only re-materializes rules from it.

use crate::config::Config;
use crate::engine::RuleReconciler;
use crate::feed::{now_ms, ThreatFeedFetcher};
use crate::storage::{merge_unique, SyncSettings};
use anyhow::Result;
use tracing::{info, warn};

/// Sets up the tracing subscriber with the configured filter.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Startup reset: clears all active rules, then the entire synchronized
/// scope. Every restart wipes the user's blacklist and flag on purpose.
pub async fn on_startup(sync: &SyncSettings, reconciler: &RuleReconciler) -> Result<()> {
    info!("Clearing all dynamic rules and synchronized storage on startup");
    if let Err(e) = reconciler.clear_rules().await {
        warn!("Failed to clear rules on startup: {}", e);
    }
    sync.clear().await?;
    Ok(())
}

/// Re-materializes rules from a surviving blacklist when blocking is
/// enabled. The whole install path; also the post-wipe no-op on startup.
pub async fn apply_initial_rules(sync: &SyncSettings, reconciler: &RuleReconciler) -> Result<()> {
    let blacklist = sync.blacklist().await?;
    let enabled = sync.block_enabled().await?;
    info!(
        "Initial state: {} blacklisted domains, blocking enabled: {}",
        blacklist.len(),
        enabled
    );
    if !blacklist.is_empty() && enabled {
        if let Err(e) = reconciler.apply_rules(&blacklist).await {
            warn!("Failed to apply initial rules: {}", e);
        }
    }
    Ok(())
}

/// Merges the threat feed into the blacklist: a cache younger than the
/// freshness window is reused, otherwise the feed is fetched. Rules are
/// re-materialized when blocking is enabled and anything was merged.
pub async fn bootstrap_threat_feed(
    sync: &SyncSettings,
    fetcher: &ThreatFeedFetcher,
    reconciler: &RuleReconciler,
) -> Result<()> {
    let threat_domains = match fetcher.cached_if_fresh(now_ms()).await {
        Some(cached) => {
            info!("Using cached threat feed ({} domains)", cached.len());
            cached
        }
        None => fetcher.refresh().await,
    };
    if threat_domains.is_empty() {
        return Ok(());
    }

    let blacklist = sync.blacklist().await?;
    let merged = merge_unique(&blacklist, &threat_domains);
    sync.set_blacklist(&merged).await?;

    if sync.block_enabled().await? {
        if let Err(e) = reconciler.apply_rules(&merged).await {
            warn!("Failed to apply merged blacklist: {}", e);
        }
    }
    Ok(())
}
