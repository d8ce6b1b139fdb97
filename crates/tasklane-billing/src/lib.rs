//! Subscription plan and usage store for Tasklane.
//!
//! This crate provides:
//! - [`SubscriptionStore`], the single source of truth for plan and usage
//! - Limit, quota and capability checks consulted before gated actions
//! - Plan upgrades through a pluggable [`BillingGateway`]
//! - Persistence of business state through `tasklane-storage`

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod store;

pub use config::{BillingConfig, DEFAULT_STORAGE_KEY, DEFAULT_UPGRADE_DELAY};
pub use error::{BillingError, BillingResult};
pub use gateway::{BillingGateway, SimulatedGateway, SimulatedOutcome};
pub use store::{SubscriptionStore, UpgradeReceipt};
