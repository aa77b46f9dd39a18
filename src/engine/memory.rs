use super::rules::{Rule, RuleAction, RuleId};
use super::traits::RuleEngine;
use crate::normalize::normalize;
use anyhow::{bail, Result};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Navigation hit reported by the engine, analogous to the host's
/// rule-matched notification.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    /// Full URL of the intercepted navigation.
    pub url: String,
}

/// Dynamic-rule budget mirroring the platform cap.
pub const MAX_DYNAMIC_RULES: usize = 5_000;

/// Reference rule engine holding the active set in memory.
///
/// Honors the host contract: bulk updates are validated up front and swap
/// the whole rule vector atomically, and every navigation hit is published
/// on the match channel.
pub struct InMemoryRuleEngine {
    rules: ArcSwap<Vec<Rule>>,
    matches: mpsc::Sender<MatchEvent>,
    max_rules: usize,
}

impl InMemoryRuleEngine {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<MatchEvent>) {
        let (tx, rx) = mpsc::channel(1024);
        (
            Arc::new(Self {
                rules: ArcSwap::from_pointee(Vec::new()),
                matches: tx,
                max_rules: MAX_DYNAMIC_RULES,
            }),
            rx,
        )
    }

    /// Runs one top-level navigation through the active rules. Returns the
    /// redirect target on the first match and publishes a match event.
    /// Rules never apply to navigations initiated by an excluded scheme
    /// (the warning page itself must not retrigger a redirect).
    pub fn evaluate(&self, request_url: &str, initiator: Option<&str>) -> Option<String> {
        let rules = self.rules.load();
        for rule in rules.iter() {
            if let Some(init) = initiator {
                if rule
                    .condition
                    .excluded_initiator_domains
                    .iter()
                    .any(|excluded| init.starts_with(excluded.as_str()))
                {
                    continue;
                }
            }
            if Self::filter_matches(&rule.condition.url_filter, request_url) {
                debug!("Rule {} matched {}", rule.id, request_url);
                let RuleAction::Redirect { url: redirect } = &rule.action;
                // Fire and forget; a full channel drops the event.
                let _ = self.matches.try_send(MatchEvent {
                    url: request_url.to_string(),
                });
                return Some(redirect.clone());
            }
        }
        None
    }

    /// `||domain` filters match the domain itself or any subdomain of it,
    /// under any scheme. Unanchored filters fall back to substring match.
    fn filter_matches(filter: &str, request_url: &str) -> bool {
        let Some(domain) = filter.strip_prefix("||") else {
            return request_url.contains(filter);
        };
        let Some(host) = normalize(request_url) else {
            return false;
        };
        host == domain || host.ends_with(&format!(".{}", domain))
    }
}

#[async_trait::async_trait]
impl RuleEngine for InMemoryRuleEngine {
    async fn active_rules(&self) -> Result<Vec<Rule>> {
        Ok(self.rules.load().as_ref().clone())
    }

    async fn update_rules(&self, remove_ids: Vec<RuleId>, add: Vec<Rule>) -> Result<()> {
        let current = self.rules.load();
        let mut next: Vec<Rule> = current
            .iter()
            .filter(|rule| !remove_ids.contains(&rule.id))
            .cloned()
            .collect();

        // Validate before mutating so a rejected update leaves the active
        // set untouched.
        for rule in &add {
            if next.iter().any(|r| r.id == rule.id) || add.iter().filter(|r| r.id == rule.id).count() > 1 {
                bail!("duplicate rule id {}", rule.id);
            }
        }
        if next.len() + add.len() > self.max_rules {
            bail!(
                "rule budget exceeded: {} > {}",
                next.len() + add.len(),
                self.max_rules
            );
        }

        next.extend(add);
        self.rules.store(Arc::new(next));
        Ok(())
    }
}
