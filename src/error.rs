use thiserror::Error;

/// Failure taxonomy for blacklist and rule operations.
///
/// The display strings of the user-facing variants double as the wire
/// messages returned on the event bus.
#[derive(Debug, Error)]
pub enum BlockerError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("URL already in blacklist")]
    DuplicateEntry,

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("rule engine failure: {0}")]
    RuleEngine(String),
}

impl BlockerError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        Self::Storage(e.to_string())
    }

    pub fn rule_engine(e: impl std::fmt::Display) -> Self {
        Self::RuleEngine(e.to_string())
    }
}
