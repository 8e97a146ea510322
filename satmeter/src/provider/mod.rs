//! Payment providers: bracket a metered run with a reservation and a settlement.
//!
//! # Lifecycle
//!
//! ```text
//! IDLE ── prepare_run(budget) ──► PREPARED ── (run) ──► finalize_run ──► FINALIZED
//! ```
//!
//! [`PaymentProvider::prepare_run`] debits the budget up front and hands back
//! a [`RunReservation`]. The caller injects [`RunReservation::bearer_token`]
//! into the metered process, and must call [`PaymentProvider::finalize_run`]
//! on every exit path. Skipping it strands the reserved budget with the
//! gateway. A reservation is consumed by finalization, so it cannot be
//! settled twice.
//!
//! Finalization never fails because of the gateway. An unreachable gateway,
//! a timeout or an unusable change token is accounted as a full loss and
//! reported through [`RunSettlement::warning`]. It does fail if the spend log
//! row cannot be written: [`Error::SpendLogUnrecorded`](crate::Error::SpendLogUnrecorded)
//! carries the settlement that was already applied to the wallet.

mod local;
mod routstr;

pub use local::LocalProvider;
pub use routstr::RoutstrProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{MeterConfig, ProviderKind};
use crate::gateway::HttpRefundGateway;
use crate::spend_log::SharedSpendLog;
use crate::util::timestamp_ms;
use crate::wallet::Wallet;

/// Budget debited for one run.
///
/// Not `Clone`: exactly one settlement exists per reservation.
#[must_use = "a reservation must be passed to `finalize_run` or its budget is lost"]
pub struct RunReservation {
    provider: &'static str,
    token: Option<String>,
    budget_sats: u64,
    created_at: u64,
}

impl std::fmt::Debug for RunReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunReservation")
            .field("provider", &self.provider)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("budget_sats", &self.budget_sats)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl RunReservation {
    pub(crate) fn new(provider: &'static str, token: Option<String>, budget_sats: u64) -> Self {
        Self {
            provider,
            token,
            budget_sats,
            created_at: timestamp_ms(),
        }
    }

    /// Bearer credential for the metered process, if the provider charges.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Sats debited.
    #[must_use]
    pub const fn budget_sats(&self) -> u64 {
        self.budget_sats
    }

    /// Provider that issued the reservation.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// When the budget was debited (Unix milliseconds).
    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }
}

/// What the caller reports about a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Whether the run succeeded.
    pub success: bool,
    /// Caller's session identifier.
    pub session_id: Option<String>,
    /// The prompt that started the run. Only a prefix is logged.
    pub prompt: Option<String>,
    /// Model used.
    pub model: Option<String>,
}

impl RunOutcome {
    /// A successful run.
    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A failed run.
    #[must_use]
    pub fn failed() -> Self {
        Self::default()
    }

    /// Set the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// How the budget was reconciled with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Nothing was reserved.
    NotRequired,
    /// Change was returned and credited.
    Refunded,
    /// The whole budget was consumed.
    Exhausted,
    /// The refund could not be confirmed; the budget is treated as spent.
    Failed(String),
}

/// Result of finalizing a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettlement {
    /// Sats reserved.
    pub budget_sats: u64,
    /// Sats credited back.
    pub refund_sats: u64,
    /// `max(0, budget - refund)`.
    pub spent_sats: u64,
    /// How the refund went.
    pub reconciliation: Reconciliation,
}

impl RunSettlement {
    pub(crate) fn new(budget_sats: u64, refund_sats: u64, reconciliation: Reconciliation) -> Self {
        Self {
            budget_sats,
            refund_sats,
            spent_sats: budget_sats.saturating_sub(refund_sats),
            reconciliation,
        }
    }

    /// Operator-facing warning when the refund could not be confirmed.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match &self.reconciliation {
            Reconciliation::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Read-only provider summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Provider name.
    pub provider: String,
    /// Wallet balance.
    pub balance_sats: u64,
    /// Gateway base URL, if the provider talks to one.
    pub base_url: Option<String>,
}

/// Pays for metered runs.
#[async_trait]
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a payment provider",
    label = "implement `PaymentProvider` for `{Self}`"
)]
pub trait PaymentProvider: Send + Sync {
    /// Provider name, as written in the spend log.
    fn name(&self) -> &'static str;

    /// Debit `budget_sats` and return the reservation.
    ///
    /// # Errors
    ///
    /// Fails with the wallet's insufficient-funds error, unchanged, if the
    /// balance cannot cover the budget. Nothing is debited on error.
    async fn prepare_run(&self, budget_sats: u64) -> crate::Result<RunReservation>;

    /// Reconcile a reservation with the gateway and log the run.
    ///
    /// # Errors
    ///
    /// Gateway problems are reported in the settlement, not as errors. Fails
    /// with [`Error::SpendLogUnrecorded`](crate::Error::SpendLogUnrecorded)
    /// if the run cannot be written to the spend log; the wallet change has
    /// been applied by then and the error carries the settlement.
    async fn finalize_run(
        &self,
        reservation: RunReservation,
        outcome: RunOutcome,
    ) -> crate::Result<RunSettlement>;

    /// Current balance and gateway endpoint. No side effects.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    async fn status(&self) -> crate::Result<ProviderStatus>;
}

/// A shared, reference-counted provider.
pub type SharedProvider = Arc<dyn PaymentProvider>;

/// Build the provider selected by `config`.
///
/// # Errors
///
/// Returns an error if the gateway HTTP client cannot be built.
pub fn build_provider(
    config: &MeterConfig,
    wallet: Arc<Wallet>,
    spend_log: SharedSpendLog,
) -> crate::Result<SharedProvider> {
    match config.provider {
        ProviderKind::Local => Ok(Arc::new(LocalProvider::new().with_spend_log(spend_log))),
        ProviderKind::Routstr => {
            let gateway = HttpRefundGateway::new(&config.gateway_url, &config.refund_http())?;
            Ok(Arc::new(RoutstrProvider::new(
                wallet,
                Arc::new(gateway),
                spend_log,
            )))
        }
    }
}
