//! Feature and counter identifiers used to query plan limits.
//!
//! - [`LimitFeature`]: every key of the plan's limits record
//! - [`CountedFeature`]: limits that are compared against a usage counter
//! - [`MeteredResource`]: resources reported as a percentage of the cap
//! - [`UsageCounter`]: the mutable per-tenant counters

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A key of the plan limits record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum LimitFeature {
    MaxProjects,
    MaxTeamMembers,
    #[serde(rename = "storageGB")]
    StorageGb,
    AiFeatures,
    AdvancedAnalytics,
    PrioritySupport,
    CustomIntegrations,
    SsoEnabled,
    ApiAccess,
}

impl LimitFeature {
    pub const ALL: &'static [LimitFeature] = &[
        LimitFeature::MaxProjects,
        LimitFeature::MaxTeamMembers,
        LimitFeature::StorageGb,
        LimitFeature::AiFeatures,
        LimitFeature::AdvancedAnalytics,
        LimitFeature::PrioritySupport,
        LimitFeature::CustomIntegrations,
        LimitFeature::SsoEnabled,
        LimitFeature::ApiAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitFeature::MaxProjects => "maxProjects",
            LimitFeature::MaxTeamMembers => "maxTeamMembers",
            LimitFeature::StorageGb => "storageGB",
            LimitFeature::AiFeatures => "aiFeatures",
            LimitFeature::AdvancedAnalytics => "advancedAnalytics",
            LimitFeature::PrioritySupport => "prioritySupport",
            LimitFeature::CustomIntegrations => "customIntegrations",
            LimitFeature::SsoEnabled => "ssoEnabled",
            LimitFeature::ApiAccess => "apiAccess",
        }
    }

    /// Usage counter consumed against this limit, if any.
    pub fn usage_counter(&self) -> Option<UsageCounter> {
        match self {
            LimitFeature::MaxProjects => Some(UsageCounter::Projects),
            LimitFeature::MaxTeamMembers => Some(UsageCounter::TeamMembers),
            LimitFeature::StorageGb => Some(UsageCounter::StorageUsedMb),
            LimitFeature::AiFeatures => Some(UsageCounter::AiRequestsThisMonth),
            _ => None,
        }
    }

    /// The countable feature behind this key, if any.
    pub fn counted(&self) -> Option<CountedFeature> {
        match self {
            LimitFeature::MaxProjects => Some(CountedFeature::MaxProjects),
            LimitFeature::MaxTeamMembers => Some(CountedFeature::MaxTeamMembers),
            _ => None,
        }
    }
}

impl fmt::Display for LimitFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LimitFeature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['-', '_'], "").to_lowercase();
        LimitFeature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().to_lowercase() == normalized)
            .ok_or_else(|| ParseError::UnknownFeature(s.to_string()))
    }
}

/// A limit that is checked against a usage counter, one unit at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CountedFeature {
    MaxProjects,
    MaxTeamMembers,
}

impl CountedFeature {
    /// Counter consumed by this feature.
    pub fn counter(&self) -> UsageCounter {
        match self {
            CountedFeature::MaxProjects => UsageCounter::Projects,
            CountedFeature::MaxTeamMembers => UsageCounter::TeamMembers,
        }
    }

    pub fn as_limit_feature(&self) -> LimitFeature {
        match self {
            CountedFeature::MaxProjects => LimitFeature::MaxProjects,
            CountedFeature::MaxTeamMembers => LimitFeature::MaxTeamMembers,
        }
    }
}

impl fmt::Display for CountedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_limit_feature())
    }
}

impl FromStr for CountedFeature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<LimitFeature>()?
            .counted()
            .ok_or_else(|| ParseError::UnknownFeature(s.to_string()))
    }
}

/// A resource whose consumption is reported as a percentage of its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum MeteredResource {
    Projects,
    TeamMembers,
    Storage,
}

impl MeteredResource {
    pub const ALL: &'static [MeteredResource] = &[
        MeteredResource::Projects,
        MeteredResource::TeamMembers,
        MeteredResource::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeteredResource::Projects => "projects",
            MeteredResource::TeamMembers => "teamMembers",
            MeteredResource::Storage => "storage",
        }
    }

    /// Counter measured for this resource.
    pub fn counter(&self) -> UsageCounter {
        match self {
            MeteredResource::Projects => UsageCounter::Projects,
            MeteredResource::TeamMembers => UsageCounter::TeamMembers,
            MeteredResource::Storage => UsageCounter::StorageUsedMb,
        }
    }
}

impl fmt::Display for MeteredResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mutable per-tenant usage counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum UsageCounter {
    Projects,
    TeamMembers,
    #[serde(rename = "storageUsedMB")]
    StorageUsedMb,
    AiRequestsThisMonth,
}

impl UsageCounter {
    pub const ALL: &'static [UsageCounter] = &[
        UsageCounter::Projects,
        UsageCounter::TeamMembers,
        UsageCounter::StorageUsedMb,
        UsageCounter::AiRequestsThisMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageCounter::Projects => "projects",
            UsageCounter::TeamMembers => "teamMembers",
            UsageCounter::StorageUsedMb => "storageUsedMB",
            UsageCounter::AiRequestsThisMonth => "aiRequestsThisMonth",
        }
    }
}

impl fmt::Display for UsageCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UsageCounter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['-', '_'], "").to_lowercase();
        UsageCounter::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().to_lowercase() == normalized)
            .ok_or_else(|| ParseError::UnknownCounter(s.to_string()))
    }
}
