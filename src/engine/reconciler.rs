use super::rules::{Rule, RuleId};
use super::traits::RuleEngine;
use crate::error::BlockerError;
use crate::normalize::normalize;
use std::sync::Arc;
use tracing::{error, info};

/// Re-materializes the active rule set from a domain list.
///
/// The active rules are a derived projection of the blacklist: every apply
/// recomputes the whole set (remove-all-then-add-all) with fresh 1-based
/// ids. Ids never survive a reconciliation and must not be assumed stable.
pub struct RuleReconciler {
    engine: Arc<dyn RuleEngine>,
    warning_page: String,
}

impl RuleReconciler {
    pub fn new(engine: Arc<dyn RuleEngine>, warning_page: String) -> Self {
        Self {
            engine,
            warning_page,
        }
    }

    /// Normalizes every input domain, drops the unparseable ones, and swaps
    /// the full active set in one bulk update. An empty surviving list is
    /// equivalent to [`clear_rules`](Self::clear_rules).
    pub async fn apply_rules(&self, domains: &[String]) -> Result<(), BlockerError> {
        let normalized: Vec<String> = domains.iter().filter_map(|d| normalize(d)).collect();
        if normalized.is_empty() {
            info!("No blacklist domains to apply, clearing rules");
            return self.clear_rules().await;
        }

        let remove_ids = self.active_ids().await?;
        let rules: Vec<Rule> = normalized
            .iter()
            .enumerate()
            .map(|(idx, domain)| Rule::block_domain(idx as RuleId + 1, domain, &self.warning_page))
            .collect();

        info!(
            "Applying {} rules (removing {} existing)",
            rules.len(),
            remove_ids.len()
        );
        self.engine.update_rules(remove_ids, rules).await.map_err(|e| {
            // No application-level rollback; the engine's own atomicity
            // bounds the damage.
            error!("Rule engine rejected bulk update: {}", e);
            BlockerError::rule_engine(e)
        })
    }

    /// Removes every active rule with no replacement. Used when blocking is
    /// disabled and during an override window.
    pub async fn clear_rules(&self) -> Result<(), BlockerError> {
        let remove_ids = self.active_ids().await?;
        self.engine
            .update_rules(remove_ids, Vec::new())
            .await
            .map_err(|e| {
                error!("Rule engine rejected clear: {}", e);
                BlockerError::rule_engine(e)
            })
    }

    async fn active_ids(&self) -> Result<Vec<RuleId>, BlockerError> {
        Ok(self
            .engine
            .active_rules()
            .await
            .map_err(BlockerError::rule_engine)?
            .into_iter()
            .map(|rule| rule.id)
            .collect())
    }
}
