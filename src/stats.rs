use crate::engine::MatchEvent;
use crate::normalize::normalize;
use crate::storage::LocalState;
use tokio::sync::mpsc;
use tokio::time::{self, Duration};
use tracing::{error, info};

/// Consumes rule-match events: bumps the per-domain block counter and
/// overwrites the last-blocked slot with the raw URL. Stats are purely
/// observational and never reconciled against the blacklist.
pub async fn run_match_recorder(local: LocalState, mut events: mpsc::Receiver<MatchEvent>) {
    while let Some(event) = events.recv().await {
        let Some(domain) = normalize(&event.url) else {
            continue;
        };
        match local.record_block(&domain).await {
            Ok(count) => info!("Blocked navigation to {} ({} total)", domain, count),
            Err(e) => error!("Failed to record block for {}: {}", domain, e),
        }
        if let Err(e) = local.set_last_blocked_url(&event.url).await {
            error!("Failed to store last blocked URL: {}", e);
        }
    }
}

/// Spawns the periodic totals dump.
pub fn spawn_stats_logger(local: LocalState, log_interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(log_interval_secs));
        loop {
            interval.tick().await;
            dump_stats(&local).await;
        }
    });
}

async fn dump_stats(local: &LocalState) {
    match local.block_stats().await {
        Ok(stats) => {
            let total: u64 = stats.values().sum();
            info!(
                "STATS DUMP: {} domains blocked, {} total hits",
                stats.len(),
                total
            );
        }
        Err(e) => error!("Failed to read block stats: {}", e),
    }
}
