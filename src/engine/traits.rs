use super::rules::{Rule, RuleId};
use anyhow::Result;

/// The declarative request-rule engine: the host capability that matches
/// navigations against URL filters and redirects them without inspecting
/// payloads.
#[async_trait::async_trait]
pub trait RuleEngine: Send + Sync {
    /// Snapshot of the currently active rules.
    async fn active_rules(&self) -> Result<Vec<Rule>>;

    /// Removes `remove_ids` and installs `add` as one atomic bulk
    /// operation. Atomicity is the engine's guarantee: on rejection the
    /// previous set stays in whatever state the engine left it.
    async fn update_rules(&self, remove_ids: Vec<RuleId>, add: Vec<Rule>) -> Result<()>;
}
