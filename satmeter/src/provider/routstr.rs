//! Prepaid e-cash provider backed by a metering gateway.
//!
//! `prepare_run` sends the budget out of the wallet as a token. The metered
//! process spends it against the gateway as a bearer credential. On
//! `finalize_run` the same token is presented to the gateway's refund
//! endpoint and any change is credited back to the wallet.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{
    PaymentProvider, ProviderStatus, Reconciliation, RunOutcome, RunReservation, RunSettlement,
};
use crate::gateway::{RefundOutcome, SharedGateway};
use crate::spend_log::{SharedSpendLog, SpendLogEntry};
use crate::wallet::Wallet;

/// Provider that pays for runs from an e-cash wallet.
pub struct RoutstrProvider {
    wallet: Arc<Wallet>,
    gateway: SharedGateway,
    spend_log: SharedSpendLog,
}

impl std::fmt::Debug for RoutstrProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutstrProvider")
            .field("wallet", &self.wallet)
            .field("gateway", &self.gateway.base_url())
            .finish_non_exhaustive()
    }
}

impl RoutstrProvider {
    /// Provider name.
    pub const NAME: &'static str = "routstr";

    /// Create a provider.
    pub fn new(wallet: Arc<Wallet>, gateway: SharedGateway, spend_log: SharedSpendLog) -> Self {
        Self {
            wallet,
            gateway,
            spend_log,
        }
    }

    /// Ask the gateway for change and credit it. Never fails; problems are
    /// folded into the returned reconciliation.
    async fn reconcile(&self, token: &str) -> (u64, Reconciliation) {
        match self.gateway.refund(token).await {
            RefundOutcome::Exhausted => (0, Reconciliation::Exhausted),
            RefundOutcome::Received(change) => match self.wallet.receive_token(&change).await {
                Ok(summary) if summary.received_sats > 0 => {
                    (summary.received_sats, Reconciliation::Refunded)
                }
                Ok(summary) => (
                    0,
                    Reconciliation::Failed(format!(
                        "change token credited nothing ({} rejected)",
                        summary.rejected
                    )),
                ),
                Err(e) => (
                    0,
                    Reconciliation::Failed(format!("change token not credited: {e}")),
                ),
            },
            RefundOutcome::Failed(reason) => (0, Reconciliation::Failed(reason)),
        }
    }
}

#[async_trait]
impl PaymentProvider for RoutstrProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn prepare_run(&self, budget_sats: u64) -> crate::Result<RunReservation> {
        let token = self.wallet.send_token(budget_sats).await?;
        info!(budget = budget_sats, "run budget reserved");
        Ok(RunReservation::new(Self::NAME, Some(token), budget_sats))
    }

    async fn finalize_run(
        &self,
        reservation: RunReservation,
        outcome: RunOutcome,
    ) -> crate::Result<RunSettlement> {
        let budget = reservation.budget_sats();
        let (refund, reconciliation) = match reservation.bearer_token() {
            Some(token) => self.reconcile(token).await,
            None => (0, Reconciliation::NotRequired),
        };
        let settlement = RunSettlement::new(budget, refund, reconciliation);

        if let Some(reason) = settlement.warning() {
            warn!(budget, reason, "refund reconciliation failed, budget counted as spent");
        } else {
            info!(
                budget,
                refund = settlement.refund_sats,
                spent = settlement.spent_sats,
                "run settled"
            );
        }

        let entry = SpendLogEntry::new(Self::NAME, budget, settlement.refund_sats)
            .success(outcome.success)
            .model(outcome.model)
            .session_id(outcome.session_id)
            .prompt_prefix(outcome.prompt.as_deref())
            .note(settlement.warning());
        if let Err(source) = self.spend_log.append(&entry).await {
            error!(
                error = %source,
                spent = settlement.spent_sats,
                "failed to append spend log entry"
            );
            return Err(crate::Error::SpendLogUnrecorded {
                settlement: Box::new(settlement),
                source,
            });
        }

        Ok(settlement)
    }

    async fn status(&self) -> crate::Result<ProviderStatus> {
        let info = self.wallet.info().await?;
        Ok(ProviderStatus {
            provider: Self::NAME.to_owned(),
            balance_sats: info.balance_sats,
            base_url: Some(self.gateway.base_url().to_owned()),
        })
    }
}
