use crate::normalize::EXTENSION_SCHEME;
use serde::{Deserialize, Serialize};

/// Identifier of an active rule. Ids are assigned 1-based per
/// reconciliation and do not survive the next one.
pub type RuleId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Script,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    Redirect { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// `||domain` filters anchor at a host-name boundary.
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_initiator_domains: Vec<String>,
}

/// A declarative navigation rule, materialized 1:1 from the blacklist at
/// reconciliation time. Derived state only; never stored independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl Rule {
    /// Builds the redirect rule for one blacklisted domain: top-level
    /// navigations only, warning page target carrying the domain as a query
    /// parameter, extension pages excluded as initiators.
    pub fn block_domain(id: RuleId, domain: &str, warning_page: &str) -> Self {
        let encoded: String = url::form_urlencoded::byte_serialize(domain.as_bytes()).collect();
        Self {
            id,
            priority: 1,
            action: RuleAction::Redirect {
                url: format!("{}?blockedUrl={}", warning_page, encoded),
            },
            condition: RuleCondition {
                url_filter: format!("||{}", domain),
                resource_types: vec![ResourceType::MainFrame],
                excluded_initiator_domains: vec![EXTENSION_SCHEME.to_string()],
            },
        }
    }

    /// Domain carried by this rule's filter, without the `||` anchor.
    pub fn domain(&self) -> &str {
        self.condition
            .url_filter
            .strip_prefix("||")
            .unwrap_or(&self.condition.url_filter)
    }
}
