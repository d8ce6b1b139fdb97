//! Billing error types.

use tasklane_models::PlanId;
use tasklane_storage::StorageError;
use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Billing network error: {0}")]
    Network(String),

    #[error("Invalid plan transition from {from} to {to}")]
    InvalidTransition { from: PlanId, to: PlanId },

    #[error("An upgrade to {0} is already in progress")]
    UpgradeInProgress(PlanId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BillingError {
    pub fn declined(msg: impl Into<String>) -> Self {
        Self::PaymentDeclined(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Network(_) | BillingError::UpgradeInProgress(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BillingError::PaymentDeclined(_) => "declined",
            BillingError::Network(_) => "network",
            BillingError::InvalidTransition { .. } => "invalid_transition",
            BillingError::UpgradeInProgress(_) => "in_progress",
            BillingError::Config(_) => "config",
            BillingError::Storage(_) => "storage",
        }
    }
}
