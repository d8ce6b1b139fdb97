//! Parse errors for model identifiers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Unknown usage counter: {0}")]
    UnknownCounter(String),
}
