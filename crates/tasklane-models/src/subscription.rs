//! Subscription state.
//!
//! State is split in two:
//! - [`PersistedSubscription`]: business data that survives a reload
//!   (plan, usage, trial window, usage period)
//! - [`SubscriptionState`]: the persisted part plus ephemeral UI state
//!   (upgrade dialog, upgrade phase) that never reaches storage

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::plan::{Limit, PlanId};
use crate::feature::MeteredResource;
use crate::usage::{usage_period_key, Usage};

/// Version of the persisted envelope format.
pub const STATE_VERSION: u32 = 1;

/// Default trial length started by an upgrade.
pub const DEFAULT_TRIAL_DAYS: i64 = 14;

/// Subscription data written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSubscription {
    /// Unknown ids read as the free plan so the rest of the record survives.
    #[serde(deserialize_with = "plan_or_free")]
    #[schemars(with = "PlanId")]
    pub current_plan: PlanId,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_trial_active: bool,
    /// Month ("YYYY-MM") the monthly counters belong to.
    #[serde(default)]
    pub usage_period: Option<String>,
}

impl PersistedSubscription {
    /// Seed state for a new tenant: free plan, no usage, no trial.
    pub fn seed(now: DateTime<Utc>) -> Self {
        Self {
            current_plan: PlanId::Free,
            usage: Usage::default(),
            trial_ends_at: None,
            is_trial_active: false,
            usage_period: Some(usage_period_key(now)),
        }
    }

    /// Switch plan and open a trial window of `trial_days`.
    ///
    /// The trial is only marked active for paid plans; the end date is set
    /// regardless.
    pub fn switch_plan(&mut self, plan: PlanId, now: DateTime<Utc>, trial_days: i64) {
        self.current_plan = plan;
        self.trial_ends_at = Some(now + Duration::days(trial_days));
        self.is_trial_active = plan.is_paid();
    }

    /// Whole days left in an active trial, rounded up. `None` without one.
    pub fn trial_days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_trial_active {
            return None;
        }
        let ends_at = self.trial_ends_at?;
        let seconds = (ends_at - now).num_seconds();
        if seconds <= 0 {
            return Some(0);
        }
        Some((seconds + 86_399) / 86_400)
    }

    /// Deactivate the trial once its window has passed.
    ///
    /// Returns true if the state changed.
    pub fn expire_trial(&mut self, now: DateTime<Utc>) -> bool {
        match self.trial_ends_at {
            Some(ends_at) if self.is_trial_active && ends_at <= now => {
                self.is_trial_active = false;
                true
            }
            _ => false,
        }
    }

    /// Move to the usage period containing `now`, clearing monthly counters
    /// when the month changed.
    ///
    /// Returns true if the period rolled over.
    pub fn rollover_usage_period(&mut self, now: DateTime<Utc>) -> bool {
        let period = usage_period_key(now);
        if self.usage_period.as_deref() == Some(period.as_str()) {
            return false;
        }
        // A missing period means state from before periods were tracked;
        // adopt the current month without discarding its counters.
        let rolled = self.usage_period.is_some();
        if rolled {
            self.usage.reset_monthly();
        }
        self.usage_period = Some(period);
        rolled
    }
}

fn plan_or_free<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PlanId, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(PlanId::lookup(&raw))
}

/// Versioned wrapper stored under the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PersistedEnvelope {
    pub state: PersistedSubscription,
    pub version: u32,
}

impl PersistedEnvelope {
    pub fn new(state: PersistedSubscription) -> Self {
        Self {
            state,
            version: STATE_VERSION,
        }
    }
}

/// Progress of a plan upgrade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum UpgradePhase {
    #[default]
    Idle,
    /// A billing call for `target` is in flight.
    Pending { target: PlanId },
}

impl UpgradePhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, UpgradePhase::Pending { .. })
    }
}

/// Full in-memory subscription state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    #[serde(flatten)]
    pub persisted: PersistedSubscription,
    pub upgrade_dialog_open: bool,
    pub upgrade_phase: UpgradePhase,
}

impl SubscriptionState {
    /// Wrap persisted data with fresh UI state.
    pub fn from_persisted(persisted: PersistedSubscription) -> Self {
        Self {
            persisted,
            upgrade_dialog_open: false,
            upgrade_phase: UpgradePhase::Idle,
        }
    }

    pub fn seed(now: DateTime<Utc>) -> Self {
        Self::from_persisted(PersistedSubscription::seed(now))
    }
}

/// One line of a usage report.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageReading {
    pub resource: MeteredResource,
    pub used: u64,
    pub limit: Limit,
    /// Percentage of the limit used; not clamped.
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_seed_is_free_and_empty() {
        let seed = PersistedSubscription::seed(at(2025, 6, 1));
        assert_eq!(seed.current_plan, PlanId::Free);
        assert_eq!(seed.usage, Usage::default());
        assert!(!seed.is_trial_active);
        assert!(seed.trial_ends_at.is_none());
        assert_eq!(seed.usage_period.as_deref(), Some("2025-06"));
    }

    #[test]
    fn test_switch_plan_starts_trial_for_paid_plans() {
        let now = at(2025, 6, 1);
        let mut state = PersistedSubscription::seed(now);
        state.switch_plan(PlanId::Professional, now, DEFAULT_TRIAL_DAYS);
        assert_eq!(state.current_plan, PlanId::Professional);
        assert!(state.is_trial_active);
        assert_eq!(state.trial_ends_at, Some(at(2025, 6, 15)));

        state.switch_plan(PlanId::Free, now, DEFAULT_TRIAL_DAYS);
        assert!(!state.is_trial_active);
        assert!(state.trial_ends_at.is_some());
    }

    #[test]
    fn test_trial_days_remaining_rounds_up() {
        let now = at(2025, 6, 1);
        let mut state = PersistedSubscription::seed(now);
        assert_eq!(state.trial_days_remaining(now), None);

        state.switch_plan(PlanId::Enterprise, now, 14);
        assert_eq!(state.trial_days_remaining(now), Some(14));
        assert_eq!(state.trial_days_remaining(now + Duration::hours(1)), Some(14));
        assert_eq!(state.trial_days_remaining(now + Duration::days(14)), Some(0));
        assert_eq!(state.trial_days_remaining(now + Duration::days(20)), Some(0));
    }

    #[test]
    fn test_expire_trial() {
        let now = at(2025, 6, 1);
        let mut state = PersistedSubscription::seed(now);
        state.switch_plan(PlanId::Professional, now, 14);
        assert!(!state.expire_trial(now + Duration::days(13)));
        assert!(state.is_trial_active);
        assert!(state.expire_trial(now + Duration::days(14)));
        assert!(!state.is_trial_active);
        assert!(!state.expire_trial(now + Duration::days(15)));
    }

    #[test]
    fn test_rollover_resets_ai_counter_only() {
        let mut state = PersistedSubscription::seed(at(2025, 6, 20));
        state.usage.projects = 2;
        state.usage.ai_requests_this_month = 7;

        assert!(!state.rollover_usage_period(at(2025, 6, 30)));
        assert_eq!(state.usage.ai_requests_this_month, 7);

        assert!(state.rollover_usage_period(at(2025, 7, 1)));
        assert_eq!(state.usage.ai_requests_this_month, 0);
        assert_eq!(state.usage.projects, 2);
        assert_eq!(state.usage_period.as_deref(), Some("2025-07"));
    }

    #[test]
    fn test_rollover_adopts_period_when_untracked() {
        let mut state = PersistedSubscription::seed(at(2025, 6, 20));
        state.usage_period = None;
        state.usage.ai_requests_this_month = 4;
        assert!(!state.rollover_usage_period(at(2025, 8, 2)));
        assert_eq!(state.usage.ai_requests_this_month, 4);
        assert_eq!(state.usage_period.as_deref(), Some("2025-08"));
    }

    #[test]
    fn test_legacy_dialog_flag_is_ignored() {
        let json = r#"{
            "currentPlan": "professional",
            "usage": {"projects": 1, "teamMembers": 2, "storageUsedMB": 10, "aiRequestsThisMonth": 0},
            "trialEndsAt": null,
            "isTrialActive": false,
            "upgradeDialog": true
        }"#;
        let persisted: PersistedSubscription = serde_json::from_str(json).unwrap();
        let state = SubscriptionState::from_persisted(persisted);
        assert!(!state.upgrade_dialog_open);
        assert_eq!(state.persisted.current_plan, PlanId::Professional);
    }

    #[test]
    fn test_unknown_plan_keeps_usage_and_trial() {
        let json = r#"{
            "currentPlan": "platinum",
            "usage": {"projects": 2, "teamMembers": 4, "storageUsedMB": 700, "aiRequestsThisMonth": 3},
            "trialEndsAt": "2025-06-15T09:30:00Z",
            "isTrialActive": true
        }"#;
        let persisted: PersistedSubscription = serde_json::from_str(json).unwrap();
        assert_eq!(persisted.current_plan, PlanId::Free);
        assert_eq!(persisted.usage.projects, 2);
        assert_eq!(persisted.usage.storage_used_mb, 700);
        assert_eq!(persisted.trial_ends_at, Some(at(2025, 6, 15)));
        assert!(persisted.is_trial_active);
    }

    #[test]
    fn test_non_string_plan_is_rejected() {
        let json = r#"{"currentPlan": 7}"#;
        assert!(serde_json::from_str::<PersistedSubscription>(json).is_err());
    }

    #[test]
    fn test_envelope_does_not_carry_ui_state() {
        let envelope = PersistedEnvelope::new(PersistedSubscription::seed(at(2025, 6, 1)));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["version"], STATE_VERSION);
        assert!(json["state"].get("upgradeDialogOpen").is_none());
        assert_eq!(json["state"]["currentPlan"], "free");
    }

    #[test]
    fn test_upgrade_phase_serde() {
        let pending = UpgradePhase::Pending { target: PlanId::Enterprise };
        let json = serde_json::to_value(pending).unwrap();
        assert_eq!(json["phase"], "pending");
        assert_eq!(json["target"], "enterprise");
        assert!(pending.is_pending());
        assert!(!UpgradePhase::Idle.is_pending());
    }
}
