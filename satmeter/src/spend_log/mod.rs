//! Append-only accounting of finalized runs.
//!
//! One [`SpendLogEntry`] is written per finalized run and never updated or
//! deleted. The log is read by reporting tools only; nothing in the wallet
//! consults it.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemorySpendLog;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSpendLog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerResult;
use crate::util::{timestamp_ms, truncate_str};

/// Maximum stored length of the prompt prefix, in characters.
pub const PROMPT_PREFIX_MAX_CHARS: usize = 80;

/// One finalized run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendLogEntry {
    /// When the run was finalized (Unix milliseconds).
    pub timestamp: u64,
    /// Payment provider name.
    pub provider: String,
    /// Sats reserved for the run.
    pub budget_sats: u64,
    /// Sats recovered afterwards.
    pub refund_sats: u64,
    /// `max(0, budget - refund)`.
    pub spent_sats: u64,
    /// Whether the run itself reported success.
    pub success: bool,
    /// Model used by the run.
    pub model: Option<String>,
    /// Caller's session identifier.
    pub session_id: Option<String>,
    /// Leading part of the prompt.
    pub prompt_prefix: Option<String>,
    /// Reconciliation note, set when a refund could not be confirmed.
    pub note: Option<String>,
}

impl SpendLogEntry {
    /// Create an entry timestamped now. `spent_sats` is derived.
    #[must_use]
    pub fn new(provider: impl Into<String>, budget_sats: u64, refund_sats: u64) -> Self {
        Self {
            timestamp: timestamp_ms(),
            provider: provider.into(),
            budget_sats,
            refund_sats,
            spent_sats: budget_sats.saturating_sub(refund_sats),
            success: true,
            model: None,
            session_id: None,
            prompt_prefix: None,
            note: None,
        }
    }

    /// Set the run success flag.
    #[must_use]
    pub const fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Set the model.
    #[must_use]
    pub fn model(mut self, model: Option<impl Into<String>>) -> Self {
        self.model = model.map(Into::into);
        self
    }

    /// Set the session id.
    #[must_use]
    pub fn session_id(mut self, session_id: Option<impl Into<String>>) -> Self {
        self.session_id = session_id.map(Into::into);
        self
    }

    /// Set the prompt prefix, truncated to [`PROMPT_PREFIX_MAX_CHARS`].
    #[must_use]
    pub fn prompt_prefix(mut self, prompt: Option<&str>) -> Self {
        self.prompt_prefix = prompt.map(|p| truncate_str(p, PROMPT_PREFIX_MAX_CHARS).to_owned());
        self
    }

    /// Attach a reconciliation note.
    #[must_use]
    pub fn note(mut self, note: Option<impl Into<String>>) -> Self {
        self.note = note.map(Into::into);
        self
    }
}

/// Totals over a set of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendSummary {
    /// Number of runs.
    pub runs: usize,
    /// Sum of budgets.
    pub budget_sats: u64,
    /// Sum of refunds.
    pub refund_sats: u64,
    /// Sum of spent amounts.
    pub spent_sats: u64,
    /// Runs whose refund could not be confirmed.
    pub unreconciled: usize,
}

impl SpendSummary {
    /// Aggregate entries.
    #[must_use]
    pub fn from_entries(entries: &[SpendLogEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, e| {
            acc.runs += 1;
            acc.budget_sats = acc.budget_sats.saturating_add(e.budget_sats);
            acc.refund_sats = acc.refund_sats.saturating_add(e.refund_sats);
            acc.spent_sats = acc.spent_sats.saturating_add(e.spent_sats);
            if e.note.is_some() {
                acc.unreconciled += 1;
            }
            acc
        })
    }
}

/// Append-only store of [`SpendLogEntry`] rows.
#[async_trait]
pub trait SpendLog: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: &SpendLogEntry) -> LedgerResult<()>;

    /// Entries in chronological order.
    ///
    /// - `limit: Some(n)` returns the **latest** `n` entries.
    /// - `limit: None` returns all entries.
    async fn entries(&self, limit: Option<usize>) -> LedgerResult<Vec<SpendLogEntry>>;

    /// Totals over every entry.
    async fn summary(&self) -> LedgerResult<SpendSummary> {
        Ok(SpendSummary::from_entries(&self.entries(None).await?))
    }
}

/// A shared, reference-counted spend log.
pub type SharedSpendLog = std::sync::Arc<dyn SpendLog>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spent_is_clamped_at_zero() {
        assert_eq!(SpendLogEntry::new("routstr", 2000, 1700).spent_sats, 300);
        assert_eq!(SpendLogEntry::new("routstr", 2000, 0).spent_sats, 2000);
        assert_eq!(SpendLogEntry::new("routstr", 100, 150).spent_sats, 0);
    }

    #[test]
    fn test_prompt_prefix_truncated() {
        let long = "x".repeat(200);
        let entry = SpendLogEntry::new("routstr", 1, 0).prompt_prefix(Some(&long));
        assert_eq!(entry.prompt_prefix.unwrap().chars().count(), PROMPT_PREFIX_MAX_CHARS);

        let entry = SpendLogEntry::new("routstr", 1, 0).prompt_prefix(Some("fix the tests"));
        assert_eq!(entry.prompt_prefix.as_deref(), Some("fix the tests"));
    }

    #[test]
    fn test_summary() {
        let entries = vec![
            SpendLogEntry::new("routstr", 2000, 1700),
            SpendLogEntry::new("routstr", 2000, 0).note(Some("gateway timed out")),
            SpendLogEntry::new("local", 0, 0),
        ];
        let summary = SpendSummary::from_entries(&entries);
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.budget_sats, 4000);
        assert_eq!(summary.refund_sats, 1700);
        assert_eq!(summary.spent_sats, 2300);
        assert_eq!(summary.unreconciled, 1);
    }
}
