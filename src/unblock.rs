use crate::engine::RuleReconciler;
use crate::error::BlockerError;
use crate::normalize::normalize;
use crate::storage::{LocalState, SyncSettings};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Default override window: ten minutes.
pub const DEFAULT_UNBLOCK_MS: u64 = 10 * 60 * 1000;

/// The pending restoration. One slot exists process-wide; a newer override
/// overwrites it. Timers are never cancelled: every fire re-reads the
/// blacklist and re-applies it, so the last restore to run wins.
#[derive(Debug, Clone)]
pub struct PendingRestore {
    /// Normalized domain excluded from the active rules, or the raw URL on
    /// the degraded path.
    pub target: String,
    pub restore_at: Instant,
}

/// Process-scoped override slot. Lives in memory only: a restart drops any
/// in-flight override and the full blacklist applies again.
#[derive(Clone)]
pub struct OverrideSlot {
    inner: Arc<RwLock<Option<PendingRestore>>>,
}

impl OverrideSlot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    pub fn arm(&self, target: String, window: Duration) {
        let mut guard = self.inner.write().unwrap();
        *guard = Some(PendingRestore {
            target,
            restore_at: Instant::now() + window,
        });
    }

    pub fn current(&self) -> Option<PendingRestore> {
        self.inner.read().unwrap().clone()
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        let guard = self.inner.read().unwrap();
        if let Some(pending) = guard.as_ref() {
            let now = Instant::now();
            if pending.restore_at > now {
                return Some(pending.restore_at.duration_since(now).as_secs());
            }
        }
        None
    }

    /// Drops the pending entry once its deadline has passed. A newer
    /// override with a later deadline is left in place.
    pub fn clear_elapsed(&self) {
        let mut guard = self.inner.write().unwrap();
        if let Some(pending) = guard.as_ref() {
            if pending.restore_at <= Instant::now() {
                *guard = None;
            }
        }
    }
}

impl Default for OverrideSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes the temporary-unblock flow: narrow the active rules by the most
/// recently blocked domain, then restore after a bounded window.
pub struct TemporaryUnblock {
    sync: SyncSettings,
    local: LocalState,
    reconciler: Arc<RuleReconciler>,
    slot: OverrideSlot,
    default_duration_ms: u64,
}

impl TemporaryUnblock {
    pub fn new(
        sync: SyncSettings,
        local: LocalState,
        reconciler: Arc<RuleReconciler>,
        slot: OverrideSlot,
        default_duration_ms: u64,
    ) -> Self {
        Self {
            sync,
            local,
            reconciler,
            slot,
            default_duration_ms,
        }
    }

    /// Unblocks the domain in the last-blocked slot for `duration_ms`
    /// (default window when unset), then re-applies the blacklist as read
    /// fresh from the store at restore time — edits made during the window
    /// are honored. Returns the raw URL that was unblocked.
    pub async fn unblock(&self, duration_ms: Option<u64>) -> Result<String, BlockerError> {
        let original = self
            .local
            .last_blocked_url()
            .await
            .map_err(BlockerError::storage)?
            .unwrap_or_default();
        let blacklist = self.sync.blacklist().await.map_err(BlockerError::storage)?;
        let window = Duration::from_millis(duration_ms.unwrap_or(self.default_duration_ms));

        let (target, narrowed): (String, Vec<String>) = match normalize(&original) {
            Some(domain) => {
                info!("Temporarily unblocking {} for {:?}", domain, window);
                let narrowed = blacklist.iter().filter(|d| **d != domain).cloned().collect();
                (domain, narrowed)
            }
            None => {
                // Degraded path: exact string match against the raw URL.
                warn!(
                    "Normalization failed, using original URL for unblock: {}",
                    original
                );
                let narrowed = blacklist
                    .iter()
                    .filter(|d| **d != original)
                    .cloned()
                    .collect();
                (original.clone(), narrowed)
            }
        };

        self.reconciler.apply_rules(&narrowed).await?;
        self.slot.arm(target, window);
        self.spawn_restore(window);
        Ok(original)
    }

    fn spawn_restore(&self, window: Duration) {
        let sync = self.sync.clone();
        let reconciler = self.reconciler.clone();
        let slot = self.slot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            info!("Restoring blacklist after temporary unblock");
            match sync.blacklist().await {
                Ok(blacklist) => {
                    if let Err(e) = reconciler.apply_rules(&blacklist).await {
                        error!("Failed to restore rules after unblock: {}", e);
                    }
                }
                Err(e) => error!("Failed to read blacklist for restore: {}", e),
            }
            slot.clear_elapsed();
        });
    }
}
