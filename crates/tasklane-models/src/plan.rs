//! Plan catalog and numeric limits.
//!
//! Plans are static configuration: three tiers, each bundling feature flags
//! and numeric caps. Numeric caps travel over the wire as integers where `-1`
//! means "unlimited".

use std::fmt;
use std::str::FromStr;

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::ParseError;
use crate::feature::{LimitFeature, UsageCounter};

/// Wire value used in place of a numeric limit to mean "no cap".
pub const UNLIMITED_SENTINEL: i64 = -1;

/// Monthly AI request quota on the free plan.
pub const FREE_AI_MONTHLY_QUOTA: u64 = 10;

/// Megabytes per gigabyte for storage limits.
pub const MB_PER_GB: u64 = 1024;

/// Plan identifier. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    #[default]
    Free,
    Professional,
    Enterprise,
}

impl PlanId {
    pub const ALL: &'static [PlanId] = &[PlanId::Free, PlanId::Professional, PlanId::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Free => "free",
            PlanId::Professional => "professional",
            PlanId::Enterprise => "enterprise",
        }
    }

    /// True for any tier that is billed.
    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanId::Free)
    }

    /// Position in the upgrade ladder (free is lowest).
    pub fn rank(&self) -> u8 {
        match self {
            PlanId::Free => 0,
            PlanId::Professional => 1,
            PlanId::Enterprise => 2,
        }
    }

    /// Parse a stored identifier, reading anything unknown as the free plan.
    pub fn lookup(id: &str) -> Self {
        match id.parse::<PlanId>() {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Unrecognized plan id; using the free plan");
                PlanId::Free
            }
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(PlanId::Free),
            "professional" | "pro" => Ok(PlanId::Professional),
            "enterprise" => Ok(PlanId::Enterprise),
            _ => Err(ParseError::UnknownPlan(s.to_string())),
        }
    }
}

/// A numeric plan limit.
///
/// Serializes as a plain integer, with [`UNLIMITED_SENTINEL`] for
/// [`Limit::Unlimited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    Unlimited,
    Capped(u64),
}

impl Limit {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }

    /// The cap, or `None` when unlimited.
    pub fn cap(&self) -> Option<u64> {
        match self {
            Limit::Unlimited => None,
            Limit::Capped(n) => Some(*n),
        }
    }

    /// True when `used` still leaves room for one more unit.
    pub fn allows(&self, used: u64) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Capped(cap) => used < *cap,
        }
    }

    /// Units left before the cap, floored at zero. Unlimited stays unlimited.
    pub fn remaining(&self, used: u64) -> Limit {
        match self {
            Limit::Unlimited => Limit::Unlimited,
            Limit::Capped(cap) => Limit::Capped(cap.saturating_sub(used)),
        }
    }

    /// Percentage of the cap consumed. Not clamped; zero when unlimited or
    /// when the cap itself is zero.
    pub fn percentage(&self, used: u64) -> f64 {
        match self {
            Limit::Capped(cap) if *cap > 0 => used as f64 / *cap as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// Integer form with `-1` for unlimited.
    pub fn as_sentinel(&self) -> i64 {
        match self {
            Limit::Unlimited => UNLIMITED_SENTINEL,
            Limit::Capped(n) => i64::try_from(*n).unwrap_or(i64::MAX),
        }
    }

    /// Parse the integer form. Any negative value reads as unlimited.
    pub fn from_sentinel(value: i64) -> Self {
        if value < 0 {
            Limit::Unlimited
        } else {
            Limit::Capped(value as u64)
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Unlimited => write!(f, "unlimited"),
            Limit::Capped(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_sentinel())
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Ok(Limit::from_sentinel(value))
    }
}

impl JsonSchema for Limit {
    fn schema_name() -> String {
        "Limit".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        i64::json_schema(gen)
    }
}

/// Feature flags and numeric caps bundled by a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub max_projects: Limit,
    pub max_team_members: Limit,
    #[serde(rename = "storageGB")]
    pub storage_gb: Limit,
    pub ai_features: bool,
    pub advanced_analytics: bool,
    pub priority_support: bool,
    pub custom_integrations: bool,
    pub sso_enabled: bool,
    pub api_access: bool,
}

impl PlanLimits {
    /// Storage cap converted to megabytes.
    pub fn storage_mb(&self) -> Limit {
        match self.storage_gb {
            Limit::Unlimited => Limit::Unlimited,
            Limit::Capped(gb) => Limit::Capped(gb.saturating_mul(MB_PER_GB)),
        }
    }
}

/// A subscription tier with display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub description: String,
    /// Monthly price in cents.
    pub price_monthly_cents: u32,
    /// Yearly price in cents.
    pub price_yearly_cents: u32,
    /// Shown as the recommended tier on pricing pages.
    pub highlighted: bool,
    /// Marketing bullets for pricing pages.
    pub features: Vec<String>,
    pub limits: PlanLimits,
}

impl Plan {
    /// Catalog entry for a plan identifier.
    pub fn for_id(id: PlanId) -> Self {
        match id {
            PlanId::Free => Self::free(),
            PlanId::Professional => Self::professional(),
            PlanId::Enterprise => Self::enterprise(),
        }
    }

    /// Cap applied to a usage counter on this plan.
    ///
    /// Monthly AI requests are capped at [`FREE_AI_MONTHLY_QUOTA`] on the free
    /// plan, unlimited on paid plans, and zero when AI is not included.
    pub fn quota(&self, counter: UsageCounter) -> Limit {
        match counter {
            UsageCounter::Projects => self.limits.max_projects,
            UsageCounter::TeamMembers => self.limits.max_team_members,
            UsageCounter::StorageUsedMb => self.limits.storage_mb(),
            UsageCounter::AiRequestsThisMonth => {
                if !self.limits.ai_features {
                    Limit::Capped(0)
                } else if self.id.is_paid() {
                    Limit::Unlimited
                } else {
                    Limit::Capped(FREE_AI_MONTHLY_QUOTA)
                }
            }
        }
    }

    /// Whether the plan includes a feature at all, ignoring consumption.
    ///
    /// Numeric limits count as included unless capped at zero.
    pub fn includes(&self, feature: LimitFeature) -> bool {
        let numeric = |limit: Limit| limit.cap() != Some(0);
        match feature {
            LimitFeature::MaxProjects => numeric(self.limits.max_projects),
            LimitFeature::MaxTeamMembers => numeric(self.limits.max_team_members),
            LimitFeature::StorageGb => numeric(self.limits.storage_gb),
            LimitFeature::AiFeatures => self.limits.ai_features,
            LimitFeature::AdvancedAnalytics => self.limits.advanced_analytics,
            LimitFeature::PrioritySupport => self.limits.priority_support,
            LimitFeature::CustomIntegrations => self.limits.custom_integrations,
            LimitFeature::SsoEnabled => self.limits.sso_enabled,
            LimitFeature::ApiAccess => self.limits.api_access,
        }
    }

    fn free() -> Self {
        Self {
            id: PlanId::Free,
            name: "Free".to_string(),
            description: "For individuals getting organized".to_string(),
            price_monthly_cents: 0,
            price_yearly_cents: 0,
            highlighted: false,
            features: bullets(&[
                "Up to 3 projects",
                "Up to 5 team members",
                "1 GB storage",
                "10 AI requests per month",
            ]),
            limits: PlanLimits {
                max_projects: Limit::Capped(3),
                max_team_members: Limit::Capped(5),
                storage_gb: Limit::Capped(1),
                ai_features: true,
                advanced_analytics: false,
                priority_support: false,
                custom_integrations: false,
                sso_enabled: false,
                api_access: false,
            },
        }
    }

    fn professional() -> Self {
        Self {
            id: PlanId::Professional,
            name: "Professional".to_string(),
            description: "For growing teams shipping every week".to_string(),
            price_monthly_cents: 1_900,
            price_yearly_cents: 19_000,
            highlighted: true,
            features: bullets(&[
                "Up to 25 projects",
                "Up to 50 team members",
                "100 GB storage",
                "Unlimited AI requests",
                "Advanced analytics",
                "Priority support",
                "Custom integrations",
                "API access",
            ]),
            limits: PlanLimits {
                max_projects: Limit::Capped(25),
                max_team_members: Limit::Capped(50),
                storage_gb: Limit::Capped(100),
                ai_features: true,
                advanced_analytics: true,
                priority_support: true,
                custom_integrations: true,
                sso_enabled: false,
                api_access: true,
            },
        }
    }

    fn enterprise() -> Self {
        Self {
            id: PlanId::Enterprise,
            name: "Enterprise".to_string(),
            description: "For organizations with advanced security needs".to_string(),
            price_monthly_cents: 4_900,
            price_yearly_cents: 49_000,
            highlighted: false,
            features: bullets(&[
                "Unlimited projects",
                "Unlimited team members",
                "Unlimited storage",
                "Unlimited AI requests",
                "Advanced analytics",
                "Priority support",
                "Custom integrations",
                "SSO",
                "API access",
            ]),
            limits: PlanLimits {
                max_projects: Limit::Unlimited,
                max_team_members: Limit::Unlimited,
                storage_gb: Limit::Unlimited,
                ai_features: true,
                advanced_analytics: true,
                priority_support: true,
                custom_integrations: true,
                sso_enabled: true,
                api_access: true,
            },
        }
    }
}

fn bullets(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The full plan catalog in upgrade order.
pub fn catalog() -> Vec<Plan> {
    PlanId::ALL.iter().copied().map(Plan::for_id).collect()
}

/// Format megabytes as a human-readable string (MB, GB).
pub fn format_megabytes(mb: u64) -> String {
    if mb >= MB_PER_GB {
        format!("{:.2} GB", mb as f64 / MB_PER_GB as f64)
    } else {
        format!("{} MB", mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_id_parse() {
        assert_eq!("free".parse::<PlanId>().unwrap(), PlanId::Free);
        assert_eq!("Professional".parse::<PlanId>().unwrap(), PlanId::Professional);
        assert_eq!("pro".parse::<PlanId>().unwrap(), PlanId::Professional);
        assert_eq!("ENTERPRISE".parse::<PlanId>().unwrap(), PlanId::Enterprise);
        assert!("platinum".parse::<PlanId>().is_err());
    }

    #[test]
    fn test_plan_id_serde_lowercase() {
        let json = serde_json::to_string(&PlanId::Professional).unwrap();
        assert_eq!(json, "\"professional\"");
        let back: PlanId = serde_json::from_str("\"enterprise\"").unwrap();
        assert_eq!(back, PlanId::Enterprise);
        assert!(serde_json::from_str::<PlanId>("\"gold\"").is_err());
    }

    #[test]
    fn test_limit_sentinel_serde() {
        assert_eq!(serde_json::to_string(&Limit::Unlimited).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Limit::Capped(25)).unwrap(), "25");
        assert_eq!(serde_json::from_str::<Limit>("-1").unwrap(), Limit::Unlimited);
        assert_eq!(serde_json::from_str::<Limit>("3").unwrap(), Limit::Capped(3));
    }

    #[test]
    fn test_limit_allows_is_strict() {
        let limit = Limit::Capped(3);
        assert!(limit.allows(2));
        assert!(!limit.allows(3));
        assert!(!limit.allows(4));
        assert!(Limit::Unlimited.allows(u64::MAX));
    }

    #[test]
    fn test_limit_remaining_floors_at_zero() {
        assert_eq!(Limit::Capped(3).remaining(1), Limit::Capped(2));
        assert_eq!(Limit::Capped(3).remaining(3), Limit::Capped(0));
        assert_eq!(Limit::Capped(3).remaining(7), Limit::Capped(0));
        assert_eq!(Limit::Unlimited.remaining(7).as_sentinel(), -1);
    }

    #[test]
    fn test_limit_percentage_not_clamped() {
        assert!((Limit::Capped(4).percentage(2) - 50.0).abs() < f64::EPSILON);
        assert!((Limit::Capped(4).percentage(6) - 150.0).abs() < f64::EPSILON);
        assert_eq!(Limit::Unlimited.percentage(6), 0.0);
        assert_eq!(Limit::Capped(0).percentage(6), 0.0);
    }

    #[test]
    fn test_plan_limits_wire_names() {
        let json = serde_json::to_value(&Plan::for_id(PlanId::Enterprise).limits).unwrap();
        assert_eq!(json["maxProjects"], -1);
        assert_eq!(json["storageGB"], -1);
        assert_eq!(json["ssoEnabled"], true);
    }

    #[test]
    fn test_storage_mb_conversion() {
        let free = Plan::for_id(PlanId::Free);
        assert_eq!(free.limits.storage_mb(), Limit::Capped(1024));
        let enterprise = Plan::for_id(PlanId::Enterprise);
        assert!(enterprise.limits.storage_mb().is_unlimited());
    }

    #[test]
    fn test_lookup_falls_back_to_free() {
        assert_eq!(PlanId::lookup("professional"), PlanId::Professional);
        assert_eq!(PlanId::lookup("pro"), PlanId::Professional);
        assert_eq!(PlanId::lookup("legacy-team"), PlanId::Free);
    }

    #[test]
    fn test_catalog_order_matches_rank() {
        let plans = catalog();
        assert_eq!(plans.len(), 3);
        for pair in plans.windows(2) {
            assert!(pair[0].id.rank() < pair[1].id.rank());
        }
        assert_eq!(plans.iter().filter(|p| p.highlighted).count(), 1);
    }

    #[test]
    fn test_ai_quota_by_plan() {
        let free = Plan::for_id(PlanId::Free);
        assert_eq!(free.quota(UsageCounter::AiRequestsThisMonth), Limit::Capped(FREE_AI_MONTHLY_QUOTA));
        let pro = Plan::for_id(PlanId::Professional);
        assert!(pro.quota(UsageCounter::AiRequestsThisMonth).is_unlimited());

        let mut no_ai = Plan::for_id(PlanId::Professional);
        no_ai.limits.ai_features = false;
        assert_eq!(no_ai.quota(UsageCounter::AiRequestsThisMonth), Limit::Capped(0));
    }

    #[test]
    fn test_includes_flags_and_numeric_limits() {
        let free = Plan::for_id(PlanId::Free);
        assert!(free.includes(LimitFeature::MaxProjects));
        assert!(free.includes(LimitFeature::AiFeatures));
        assert!(!free.includes(LimitFeature::SsoEnabled));
        assert!(!free.includes(LimitFeature::ApiAccess));

        let enterprise = Plan::for_id(PlanId::Enterprise);
        for feature in LimitFeature::ALL {
            assert!(enterprise.includes(*feature), "{} missing", feature);
        }
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(0), "0 MB");
        assert_eq!(format_megabytes(512), "512 MB");
        assert_eq!(format_megabytes(1024), "1.00 GB");
        assert_eq!(format_megabytes(1536), "1.50 GB");
    }
}
