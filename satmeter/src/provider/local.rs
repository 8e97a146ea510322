//! Zero-cost provider for runs that are not metered.

use async_trait::async_trait;
use tracing::error;

use super::{
    PaymentProvider, ProviderStatus, Reconciliation, RunOutcome, RunReservation, RunSettlement,
};
use crate::spend_log::{SharedSpendLog, SpendLogEntry};

/// Provider that reserves nothing and always settles at zero.
///
/// If a spend log is attached, each finalized run is still recorded so run
/// counts stay comparable across providers.
#[derive(Default)]
pub struct LocalProvider {
    spend_log: Option<SharedSpendLog>,
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("spend_log", &self.spend_log.is_some())
            .finish()
    }
}

impl LocalProvider {
    /// Provider name.
    pub const NAME: &'static str = "local";

    /// Create a provider without a spend log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record finalized runs in `spend_log`.
    #[must_use]
    pub fn with_spend_log(mut self, spend_log: SharedSpendLog) -> Self {
        self.spend_log = Some(spend_log);
        self
    }
}

#[async_trait]
impl PaymentProvider for LocalProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn prepare_run(&self, _budget_sats: u64) -> crate::Result<RunReservation> {
        Ok(RunReservation::new(Self::NAME, None, 0))
    }

    async fn finalize_run(
        &self,
        _reservation: RunReservation,
        outcome: RunOutcome,
    ) -> crate::Result<RunSettlement> {
        let settlement = RunSettlement::new(0, 0, Reconciliation::NotRequired);
        if let Some(log) = &self.spend_log {
            let entry = SpendLogEntry::new(Self::NAME, 0, 0)
                .success(outcome.success)
                .model(outcome.model)
                .session_id(outcome.session_id)
                .prompt_prefix(outcome.prompt.as_deref());
            if let Err(source) = log.append(&entry).await {
                error!(error = %source, "failed to append spend log entry");
                return Err(crate::Error::SpendLogUnrecorded {
                    settlement: Box::new(settlement),
                    source,
                });
            }
        }
        Ok(settlement)
    }

    async fn status(&self) -> crate::Result<ProviderStatus> {
        Ok(ProviderStatus {
            provider: Self::NAME.to_owned(),
            balance_sats: 0,
            base_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::spend_log::{MemorySpendLog, SpendLog};
    use crate::testing::FailingSpendLog;

    #[tokio::test]
    async fn test_local_is_free() {
        let provider = LocalProvider::new();
        let reservation = provider.prepare_run(2000).await.unwrap();
        assert_eq!(reservation.bearer_token(), None);
        assert_eq!(reservation.budget_sats(), 0);

        let settlement = provider
            .finalize_run(reservation, RunOutcome::succeeded())
            .await
            .unwrap();
        assert_eq!(settlement.spent_sats, 0);
        assert_eq!(settlement.reconciliation, Reconciliation::NotRequired);
        assert_eq!(provider.status().await.unwrap().base_url, None);
    }

    #[tokio::test]
    async fn test_local_logs_one_row_per_run() {
        let log = Arc::new(MemorySpendLog::new());
        let provider = LocalProvider::new().with_spend_log(log.clone());

        for _ in 0..2 {
            let reservation = provider.prepare_run(500).await.unwrap();
            let _ = provider
                .finalize_run(reservation, RunOutcome::failed().with_model("local-llm"))
                .await
                .unwrap();
        }

        let entries = log.entries(None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.provider == "local" && e.spent_sats == 0));
        assert!(!entries[0].success);
        assert_eq!(entries[0].model.as_deref(), Some("local-llm"));
    }

    #[tokio::test]
    async fn test_local_reports_unwritable_spend_log() {
        let provider = LocalProvider::new().with_spend_log(Arc::new(FailingSpendLog));
        let reservation = provider.prepare_run(500).await.unwrap();

        let err = provider
            .finalize_run(reservation, RunOutcome::succeeded())
            .await
            .unwrap_err();
        let settlement = err.unrecorded_settlement().unwrap();
        assert_eq!(settlement.reconciliation, Reconciliation::NotRequired);
        assert!(err.to_string().contains("disk full"));
    }
}
