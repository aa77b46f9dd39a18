mod memory;
mod reconciler;
mod rules;
mod traits;

pub use memory::{InMemoryRuleEngine, MatchEvent, MAX_DYNAMIC_RULES};
pub use reconciler::RuleReconciler;
pub use rules::{ResourceType, Rule, RuleAction, RuleCondition, RuleId};
pub use traits::RuleEngine;
