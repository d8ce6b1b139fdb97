//! Shared data models for Tasklane billing.
//!
//! This crate provides Serde-serializable types for:
//! - The static plan catalog and numeric limits
//! - Feature and usage counter identifiers
//! - Usage counters and usage periods
//! - Persisted and in-memory subscription state

pub mod error;
pub mod feature;
pub mod plan;
pub mod subscription;
pub mod usage;

// Re-export common types
pub use error::ParseError;
pub use feature::{CountedFeature, LimitFeature, MeteredResource, UsageCounter};
pub use plan::{
    catalog, format_megabytes, Limit, Plan, PlanId, PlanLimits, FREE_AI_MONTHLY_QUOTA, MB_PER_GB,
    UNLIMITED_SENTINEL,
};
pub use subscription::{
    PersistedEnvelope, PersistedSubscription, SubscriptionState, UpgradePhase, UsageReading,
    DEFAULT_TRIAL_DAYS, STATE_VERSION,
};
pub use usage::{current_usage_period, usage_period_key, Usage};
