//! Billing configuration.

use std::time::Duration;

use tasklane_models::DEFAULT_TRIAL_DAYS;
use tasklane_storage::StorageConfig;

use crate::error::{BillingError, BillingResult};

/// Storage key the subscription state is persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "subscription-storage";

/// Simulated billing round-trip.
pub const DEFAULT_UPGRADE_DELAY: Duration = Duration::from_millis(1000);

/// Subscription store configuration.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Key the persisted state lives under
    pub storage_key: String,
    /// Simulated gateway latency for upgrades
    pub upgrade_delay: Duration,
    /// Trial length started by an upgrade, in days
    pub trial_days: i64,
    /// File storage settings
    pub storage: StorageConfig,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            upgrade_delay: DEFAULT_UPGRADE_DELAY,
            trial_days: DEFAULT_TRIAL_DAYS,
            storage: StorageConfig::default(),
        }
    }
}

impl BillingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> BillingResult<Self> {
        let storage = StorageConfig::from_env()?;

        let trial_days = std::env::var("TASKLANE_TRIAL_DAYS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TRIAL_DAYS);
        if trial_days < 0 {
            return Err(BillingError::config(format!(
                "TASKLANE_TRIAL_DAYS must not be negative (got {})",
                trial_days
            )));
        }

        Ok(Self {
            storage_key: std::env::var("TASKLANE_STORAGE_KEY")
                .unwrap_or_else(|_| DEFAULT_STORAGE_KEY.to_string()),
            upgrade_delay: Duration::from_millis(
                std::env::var("TASKLANE_UPGRADE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_UPGRADE_DELAY.as_millis() as u64),
            ),
            trial_days,
            storage,
        })
    }

    /// Same config with a different upgrade delay.
    pub fn with_upgrade_delay(mut self, delay: Duration) -> Self {
        self.upgrade_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.storage_key, "subscription-storage");
        assert_eq!(config.trial_days, 14);
        assert_eq!(config.upgrade_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_with_upgrade_delay() {
        let config = BillingConfig::default().with_upgrade_delay(Duration::ZERO);
        assert_eq!(config.upgrade_delay, Duration::ZERO);
    }
}
