//! Subscription store.
//!
//! Single source of truth for the tenant's plan and usage. The rest of the
//! application consults it before an action that consumes a limit
//! (creating a project, inviting a member, calling an AI feature) and calls
//! a mutator afterwards.
//!
//! # Architecture
//!
//! - Reads are synchronous and take a short read lock
//! - Mutators apply their change under the write lock, then persist a
//!   snapshot of the business state through [`StateStorage`]
//! - UI state (upgrade dialog, upgrade phase) is never persisted
//! - Upgrades go through a [`BillingGateway`]; the lock is never held across
//!   the gateway call
//!
//! Limit checks are advisory: the store never refuses an increment.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use scopeguard::ScopeGuard;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tasklane_models::{
    CountedFeature, Limit, LimitFeature, MeteredResource, PersistedEnvelope,
    PersistedSubscription, Plan, PlanId, SubscriptionState, UpgradePhase, Usage, UsageCounter,
    UsageReading, STATE_VERSION,
};
use tasklane_storage::{load_json, save_json, StateStorage, StorageError};

use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::gateway::BillingGateway;
use crate::metrics;

/// Result of a successful plan change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeReceipt {
    pub plan: PlanId,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub is_trial_active: bool,
}

struct StoreInner {
    state: RwLock<SubscriptionState>,
    /// Serializes writes to storage so snapshots land in order.
    persist_lock: Mutex<()>,
    storage: Arc<dyn StateStorage>,
    gateway: Arc<dyn BillingGateway>,
    config: BillingConfig,
}

impl StoreInner {
    fn read(&self) -> RwLockReadGuard<'_, SubscriptionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SubscriptionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Plan and usage store, shared by cloning.
#[derive(Clone)]
pub struct SubscriptionStore {
    inner: Arc<StoreInner>,
}

impl SubscriptionStore {
    /// Build a store around already-loaded state without touching storage.
    pub fn from_parts(
        config: BillingConfig,
        storage: Arc<dyn StateStorage>,
        gateway: Arc<dyn BillingGateway>,
        persisted: PersistedSubscription,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(SubscriptionState::from_persisted(persisted)),
                persist_lock: Mutex::new(()),
                storage,
                gateway,
                config,
            }),
        }
    }

    /// Load persisted state, or start from seed state when none exists.
    ///
    /// Unreadable state is discarded with a warning. The usage period is
    /// rolled forward and an elapsed trial is closed before the store is
    /// returned.
    pub async fn hydrate(
        config: BillingConfig,
        storage: Arc<dyn StateStorage>,
        gateway: Arc<dyn BillingGateway>,
    ) -> BillingResult<Self> {
        let now = Utc::now();
        let loaded = load_persisted(storage.as_ref(), &config.storage_key).await?;
        let restored = loaded.is_some();
        let mut persisted = loaded.unwrap_or_else(|| PersistedSubscription::seed(now));

        let rolled = persisted.rollover_usage_period(now);
        let expired = persisted.expire_trial(now);

        info!(
            plan = %persisted.current_plan,
            restored = restored,
            backend = storage.name(),
            "Hydrated subscription store"
        );

        let store = Self::from_parts(config, storage, gateway, persisted);
        if rolled || expired {
            store.persist().await?;
        }
        Ok(store)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Copy of the full state, UI flags included.
    pub fn snapshot(&self) -> SubscriptionState {
        self.inner.read().clone()
    }

    pub fn current_plan_id(&self) -> PlanId {
        self.inner.read().persisted.current_plan
    }

    /// Catalog record for the active plan.
    pub fn current_plan(&self) -> Plan {
        Plan::for_id(self.current_plan_id())
    }

    pub fn usage(&self) -> Usage {
        self.inner.read().persisted.usage
    }

    /// Whether the next action guarded by `feature` is allowed.
    ///
    /// Countable limits compare current usage strictly below the cap, so at
    /// `usage == limit` this returns false. AI on the free plan is gated by
    /// the monthly quota; on paid plans only by the feature flag.
    pub fn check_limit(&self, feature: LimitFeature) -> bool {
        let (plan, usage) = self.plan_and_usage();
        let allowed = evaluate_limit(&plan, &usage, feature);
        if !allowed {
            debug!(plan = %plan.id, feature = %feature, "Limit check denied");
            metrics::record_limit_denial(feature);
        }
        allowed
    }

    /// Whether the plan includes `feature` at all, ignoring consumption.
    pub fn has_capability(&self, feature: LimitFeature) -> bool {
        self.current_plan().includes(feature)
    }

    /// Whether `counter` has headroom for one more unit on the active plan.
    pub fn check_quota(&self, counter: UsageCounter) -> bool {
        let (plan, usage) = self.plan_and_usage();
        plan.quota(counter).allows(usage.get(counter))
    }

    /// Units left for a countable feature; [`Limit::Unlimited`] when uncapped.
    pub fn remaining_limit(&self, feature: CountedFeature) -> Limit {
        let (plan, usage) = self.plan_and_usage();
        let counter = feature.counter();
        plan.quota(counter).remaining(usage.get(counter))
    }

    /// Percentage of the cap used. Zero when unlimited; never clamped.
    pub fn usage_percentage(&self, resource: MeteredResource) -> f64 {
        let (plan, usage) = self.plan_and_usage();
        let counter = resource.counter();
        plan.quota(counter).percentage(usage.get(counter))
    }

    /// One reading per metered resource, for dashboards.
    pub fn usage_report(&self) -> Vec<UsageReading> {
        let (plan, usage) = self.plan_and_usage();
        MeteredResource::ALL
            .iter()
            .map(|resource| {
                let counter = resource.counter();
                let limit = plan.quota(counter);
                let used = usage.get(counter);
                UsageReading {
                    resource: *resource,
                    used,
                    limit,
                    percentage: limit.percentage(used),
                }
            })
            .collect()
    }

    pub fn is_upgrade_dialog_open(&self) -> bool {
        self.inner.read().upgrade_dialog_open
    }

    pub fn upgrade_phase(&self) -> UpgradePhase {
        self.inner.read().upgrade_phase
    }

    /// Whole days left in an active trial at `now`.
    pub fn trial_days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.inner.read().persisted.trial_days_remaining(now)
    }

    fn plan_and_usage(&self) -> (Plan, Usage) {
        let state = self.inner.read();
        (
            Plan::for_id(state.persisted.current_plan),
            state.persisted.usage,
        )
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Add one unit to a usage counter.
    pub async fn increment_usage(&self, counter: UsageCounter) -> BillingResult<u64> {
        self.increment_usage_by(counter, 1).await
    }

    /// Add `amount` to a usage counter and return the new value.
    ///
    /// Never refused: callers gate with [`check_limit`](Self::check_limit)
    /// first.
    pub async fn increment_usage_by(&self, counter: UsageCounter, amount: u64) -> BillingResult<u64> {
        let value = self.apply_increment(counter, amount);
        metrics::record_usage_increment(counter, amount);
        debug!(counter = %counter, amount = amount, value = value, "Incremented usage");
        self.persist().await?;
        Ok(value)
    }

    /// Show or hide the upgrade dialog. UI state only; not persisted.
    pub fn set_upgrade_dialog(&self, open: bool) {
        self.inner.write().upgrade_dialog_open = open;
        debug!(open = open, "Upgrade dialog toggled");
    }

    /// Switch to `target` after the billing gateway confirms.
    ///
    /// On success the plan changes, the dialog closes and a trial window of
    /// the configured length starts (active only for paid plans). On failure
    /// nothing but the phase changes: the dialog stays as it was so the UI
    /// can show feedback.
    ///
    /// # Errors
    /// * [`BillingError::UpgradeInProgress`] - another upgrade is pending
    /// * [`BillingError::InvalidTransition`] - `target` is already active
    /// * [`BillingError::PaymentDeclined`] / [`BillingError::Network`] - from the gateway
    /// * [`BillingError::Storage`] - the switch applied but could not be saved
    pub async fn upgrade_to(&self, target: PlanId) -> BillingResult<UpgradeReceipt> {
        let result = self.run_upgrade(target).await;
        match &result {
            Ok(receipt) => {
                metrics::record_upgrade(target, "success");
                info!(
                    plan = %receipt.plan,
                    trial_active = receipt.is_trial_active,
                    "Plan upgraded"
                );
            }
            Err(e) => {
                metrics::record_upgrade(target, e.kind());
                warn!(plan = %target, error = %e, "Plan upgrade failed");
            }
        }
        result
    }

    async fn run_upgrade(&self, target: PlanId) -> BillingResult<UpgradeReceipt> {
        let from = self.begin_upgrade(target)?;

        // Return to idle even if this future is dropped mid-call.
        let pending = scopeguard::guard(Arc::clone(&self.inner), |inner| {
            inner.write().upgrade_phase = UpgradePhase::Idle;
        });

        debug!(from = %from, to = %target, "Awaiting billing gateway");
        let outcome = self.inner.gateway.change_plan(from, target).await;

        let inner = ScopeGuard::into_inner(pending);
        let receipt = finish_upgrade(&inner, target, outcome)?;
        self.persist().await?;
        Ok(receipt)
    }

    fn begin_upgrade(&self, target: PlanId) -> BillingResult<PlanId> {
        let mut state = self.inner.write();
        if let UpgradePhase::Pending { target: pending } = state.upgrade_phase {
            return Err(BillingError::UpgradeInProgress(pending));
        }
        let from = state.persisted.current_plan;
        if from == target {
            return Err(BillingError::InvalidTransition { from, to: target });
        }
        state.upgrade_phase = UpgradePhase::Pending { target };
        Ok(from)
    }

    /// Close the usage period if the month changed, clearing monthly counters.
    pub async fn rollover_usage_period(&self, now: DateTime<Utc>) -> BillingResult<bool> {
        let rolled = self.inner.write().persisted.rollover_usage_period(now);
        if rolled {
            info!("Usage period rolled over; monthly counters reset");
            self.persist().await?;
        }
        Ok(rolled)
    }

    /// Mark the trial inactive once its window has passed.
    pub async fn refresh_trial(&self, now: DateTime<Utc>) -> BillingResult<bool> {
        let expired = self.inner.write().persisted.expire_trial(now);
        if expired {
            info!(plan = %self.current_plan_id(), "Trial window ended");
            self.persist().await?;
        }
        Ok(expired)
    }

    /// Return to seed state and delete the persisted copy.
    ///
    /// # Errors
    /// * [`BillingError::UpgradeInProgress`] - an upgrade is pending; nothing changes
    pub async fn reset(&self) -> BillingResult<()> {
        self.reset_state()?;
        let _guard = self.inner.persist_lock.lock().await;
        self.inner
            .storage
            .remove(&self.inner.config.storage_key)
            .await?;
        info!("Subscription state reset");
        Ok(())
    }

    fn reset_state(&self) -> BillingResult<()> {
        let mut state = self.inner.write();
        if let UpgradePhase::Pending { target } = state.upgrade_phase {
            return Err(BillingError::UpgradeInProgress(target));
        }
        *state = SubscriptionState::seed(Utc::now());
        Ok(())
    }

    fn apply_increment(&self, counter: UsageCounter, amount: u64) -> u64 {
        self.inner.write().persisted.usage.increment(counter, amount)
    }

    fn persisted_snapshot(&self) -> PersistedSubscription {
        self.inner.read().persisted.clone()
    }

    /// Write the current business state to storage.
    async fn persist(&self) -> BillingResult<()> {
        let _guard = self.inner.persist_lock.lock().await;
        let envelope = PersistedEnvelope::new(self.persisted_snapshot());
        save_json(
            self.inner.storage.as_ref(),
            &self.inner.config.storage_key,
            &envelope,
        )
        .await?;
        Ok(())
    }
}

fn finish_upgrade(
    inner: &StoreInner,
    target: PlanId,
    outcome: BillingResult<()>,
) -> BillingResult<UpgradeReceipt> {
    let mut state = inner.write();
    state.upgrade_phase = UpgradePhase::Idle;
    outcome?;

    state
        .persisted
        .switch_plan(target, Utc::now(), inner.config.trial_days);
    state.upgrade_dialog_open = false;

    Ok(UpgradeReceipt {
        plan: state.persisted.current_plan,
        trial_ends_at: state.persisted.trial_ends_at,
        is_trial_active: state.persisted.is_trial_active,
    })
}

/// Capability and quota combined.
fn evaluate_limit(plan: &Plan, usage: &Usage, feature: LimitFeature) -> bool {
    if !plan.includes(feature) {
        return false;
    }
    match feature.usage_counter() {
        Some(counter) => plan.quota(counter).allows(usage.get(counter)),
        None => true,
    }
}

async fn load_persisted(
    storage: &dyn StateStorage,
    key: &str,
) -> BillingResult<Option<PersistedSubscription>> {
    let loaded = load_json::<PersistedEnvelope>(storage, key)
        .await
        .and_then(|envelope| match envelope {
            Some(envelope) if envelope.version != STATE_VERSION => {
                Err(StorageError::UnsupportedVersion {
                    found: envelope.version,
                    expected: STATE_VERSION,
                })
            }
            other => Ok(other.map(|envelope| envelope.state)),
        });

    match loaded {
        Ok(state) => Ok(state),
        Err(e) if e.is_corrupt() => {
            warn!(key = %key, error = %e, "Discarding unreadable subscription state");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(projects: u64, team_members: u64, storage_used_mb: u64, ai: u64) -> Usage {
        Usage {
            projects,
            team_members,
            storage_used_mb,
            ai_requests_this_month: ai,
        }
    }

    #[tokio::test]
    async fn test_load_persisted_discards_other_versions() {
        let storage = tasklane_storage::MemoryStorage::new();
        let mut envelope = PersistedEnvelope::new(PersistedSubscription::seed(Utc::now()));
        envelope.version = STATE_VERSION + 1;
        save_json(&storage, "subscription-storage", &envelope).await.unwrap();
        assert_eq!(load_persisted(&storage, "subscription-storage").await.unwrap(), None);

        envelope.version = STATE_VERSION;
        save_json(&storage, "subscription-storage", &envelope).await.unwrap();
        assert_eq!(
            load_persisted(&storage, "subscription-storage").await.unwrap(),
            Some(envelope.state)
        );
    }

    #[tokio::test]
    async fn test_load_persisted_propagates_invalid_key() {
        let storage = tasklane_storage::MemoryStorage::new();
        let err = load_persisted(&storage, "../escape").await.unwrap_err();
        assert!(matches!(err, BillingError::Storage(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_evaluate_projects_at_limit_is_denied() {
        let free = Plan::for_id(PlanId::Free);
        assert!(evaluate_limit(&free, &usage(2, 0, 0, 0), LimitFeature::MaxProjects));
        assert!(!evaluate_limit(&free, &usage(3, 0, 0, 0), LimitFeature::MaxProjects));
    }

    #[test]
    fn test_evaluate_unlimited_always_allows() {
        let enterprise = Plan::for_id(PlanId::Enterprise);
        let heavy = usage(10_000, 10_000, 10_000_000, 10_000);
        for feature in LimitFeature::ALL {
            assert!(evaluate_limit(&enterprise, &heavy, *feature));
        }
    }

    #[test]
    fn test_evaluate_ai_quota_only_on_free() {
        let free = Plan::for_id(PlanId::Free);
        assert!(evaluate_limit(&free, &usage(0, 0, 0, 9), LimitFeature::AiFeatures));
        assert!(!evaluate_limit(&free, &usage(0, 0, 0, 10), LimitFeature::AiFeatures));

        let pro = Plan::for_id(PlanId::Professional);
        assert!(evaluate_limit(&pro, &usage(0, 0, 0, 5_000), LimitFeature::AiFeatures));

        let mut no_ai = Plan::for_id(PlanId::Professional);
        no_ai.limits.ai_features = false;
        assert!(!evaluate_limit(&no_ai, &usage(0, 0, 0, 0), LimitFeature::AiFeatures));
    }

    #[test]
    fn test_evaluate_flags_pass_through() {
        let free = Plan::for_id(PlanId::Free);
        let pro = Plan::for_id(PlanId::Professional);
        let none = Usage::default();
        assert!(!evaluate_limit(&free, &none, LimitFeature::AdvancedAnalytics));
        assert!(evaluate_limit(&pro, &none, LimitFeature::AdvancedAnalytics));
        assert!(!evaluate_limit(&pro, &none, LimitFeature::SsoEnabled));
    }

    #[test]
    fn test_evaluate_storage_against_megabytes() {
        let free = Plan::for_id(PlanId::Free);
        assert!(evaluate_limit(&free, &usage(0, 0, 1023, 0), LimitFeature::StorageGb));
        assert!(!evaluate_limit(&free, &usage(0, 0, 1024, 0), LimitFeature::StorageGb));
    }
}
