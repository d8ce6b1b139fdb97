//! Billing gateway seam.
//!
//! The store never talks to a payment provider directly; it calls a
//! [`BillingGateway`]. [`SimulatedGateway`] stands in for the real provider
//! with a fixed latency and a configurable outcome.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info_span, Instrument};

use tasklane_models::PlanId;

use crate::error::{BillingError, BillingResult};

/// Payment provider used to confirm plan changes.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Confirm a switch from `from` to `to`. Resolves once the provider has
    /// accepted or rejected the change.
    async fn change_plan(&self, from: PlanId, to: PlanId) -> BillingResult<()>;
}

/// Outcome returned by [`SimulatedGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SimulatedOutcome {
    #[default]
    Approve,
    Decline(String),
    NetworkFailure(String),
}

/// Gateway that waits a fixed delay and then returns a preset outcome.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    delay: Duration,
    outcome: SimulatedOutcome,
}

impl SimulatedGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            outcome: SimulatedOutcome::Approve,
        }
    }

    pub fn with_outcome(mut self, outcome: SimulatedOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

#[async_trait]
impl BillingGateway for SimulatedGateway {
    async fn change_plan(&self, from: PlanId, to: PlanId) -> BillingResult<()> {
        let span = info_span!("billing_gateway", from = %from, to = %to);
        async {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            debug!(outcome = ?self.outcome, "Simulated billing round-trip finished");
            match &self.outcome {
                SimulatedOutcome::Approve => Ok(()),
                SimulatedOutcome::Decline(reason) => Err(BillingError::declined(reason.clone())),
                SimulatedOutcome::NetworkFailure(reason) => {
                    Err(BillingError::network(reason.clone()))
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_approves_by_default() {
        let gateway = SimulatedGateway::new(Duration::ZERO);
        assert!(gateway.change_plan(PlanId::Free, PlanId::Professional).await.is_ok());
    }

    #[tokio::test]
    async fn test_decline_and_network_outcomes() {
        let declined = SimulatedGateway::new(Duration::ZERO)
            .with_outcome(SimulatedOutcome::Decline("insufficient funds".into()));
        let err = declined
            .change_plan(PlanId::Free, PlanId::Enterprise)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::PaymentDeclined(ref m) if m == "insufficient funds"));

        let offline = SimulatedGateway::new(Duration::ZERO)
            .with_outcome(SimulatedOutcome::NetworkFailure("connection reset".into()));
        let err = offline
            .change_plan(PlanId::Free, PlanId::Enterprise)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_waits_for_delay() {
        let gateway = SimulatedGateway::new(Duration::from_millis(20));
        let started = std::time::Instant::now();
        gateway
            .change_plan(PlanId::Free, PlanId::Professional)
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
