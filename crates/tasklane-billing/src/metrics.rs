//! Billing metrics.
//!
//! Counters for:
//! - Limit checks that denied an action
//! - Usage increments by counter
//! - Upgrade attempts by target plan and outcome

use metrics::counter;

use tasklane_models::{LimitFeature, PlanId, UsageCounter};

/// Metric name constants for consistency.
pub mod names {
    /// Limit checks that returned false, by feature.
    pub const LIMIT_DENIALS_TOTAL: &str = "billing_limit_denials_total";

    /// Units added to usage counters, by counter.
    pub const USAGE_INCREMENTS_TOTAL: &str = "billing_usage_increments_total";

    /// Upgrade attempts by target plan and outcome.
    pub const UPGRADES_TOTAL: &str = "billing_upgrades_total";
}

pub fn record_limit_denial(feature: LimitFeature) {
    counter!(
        names::LIMIT_DENIALS_TOTAL,
        "feature" => feature.as_str()
    )
    .increment(1);
}

pub fn record_usage_increment(usage_counter: UsageCounter, amount: u64) {
    counter!(
        names::USAGE_INCREMENTS_TOTAL,
        "counter" => usage_counter.as_str()
    )
    .increment(amount);
}

/// Record an upgrade attempt. `outcome` is "success" or an error kind.
pub fn record_upgrade(target: PlanId, outcome: &'static str) {
    counter!(
        names::UPGRADES_TOTAL,
        "plan" => target.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::LIMIT_DENIALS_TOTAL.starts_with("billing_"));
        assert!(names::USAGE_INCREMENTS_TOTAL.ends_with("_total"));
        assert!(names::UPGRADES_TOTAL.contains("upgrades"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_limit_denial(LimitFeature::MaxProjects);
        record_usage_increment(UsageCounter::Projects, 2);
        record_upgrade(PlanId::Enterprise, "success");
    }
}
