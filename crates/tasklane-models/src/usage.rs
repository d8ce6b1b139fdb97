//! Per-tenant usage counters.

use chrono::{DateTime, Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::feature::UsageCounter;

/// Usage counters tracked against plan limits.
///
/// Counters only grow through [`Usage::increment`]; the monthly AI counter is
/// additionally cleared when the usage period rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub projects: u64,
    #[serde(default)]
    pub team_members: u64,
    #[serde(default, rename = "storageUsedMB")]
    pub storage_used_mb: u64,
    #[serde(default)]
    pub ai_requests_this_month: u64,
}

impl Usage {
    pub fn get(&self, counter: UsageCounter) -> u64 {
        match counter {
            UsageCounter::Projects => self.projects,
            UsageCounter::TeamMembers => self.team_members,
            UsageCounter::StorageUsedMb => self.storage_used_mb,
            UsageCounter::AiRequestsThisMonth => self.ai_requests_this_month,
        }
    }

    /// Add `amount` to a counter and return the new value. Saturates.
    pub fn increment(&mut self, counter: UsageCounter, amount: u64) -> u64 {
        let slot = match counter {
            UsageCounter::Projects => &mut self.projects,
            UsageCounter::TeamMembers => &mut self.team_members,
            UsageCounter::StorageUsedMb => &mut self.storage_used_mb,
            UsageCounter::AiRequestsThisMonth => &mut self.ai_requests_this_month,
        };
        *slot = slot.saturating_add(amount);
        *slot
    }

    /// Clear counters that reset every billing month.
    pub fn reset_monthly(&mut self) {
        self.ai_requests_this_month = 0;
    }
}

/// Usage period key in "YYYY-MM" format.
pub fn usage_period_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Usage period key for the current month.
pub fn current_usage_period() -> String {
    usage_period_key(Utc::now())
}
