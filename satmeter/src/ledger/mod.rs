//! Durable storage of the wallet's proof set.
//!
//! The ledger is a plain keyed store: it knows nothing about mints or tokens.
//! Every record is keyed by its proof `secret`, which is unique per proof and
//! is the mint's double-spend key. Records are never mutated in place; they
//! are only inserted or deleted.
//!
//! # Backends
//!
//! - [`MemoryLedger`] - in-process, lost on restart
//! - [`SqliteLedger`] - single-file SQLite database (feature `sqlite`)
//!
//! # Single writer
//!
//! Backends keep themselves memory-safe under concurrent access, but the
//! wallet protocol assumes at most one mutating call in flight. Callers
//! serialize budget operations.

mod error;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use error::{LedgerError, LedgerResult};
pub use memory::MemoryLedger;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::token::Proof;
use crate::util::timestamp_ms;

/// A proof as held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    /// The wire proof.
    #[serde(flatten)]
    pub proof: Proof,
    /// Base URL of the issuing mint.
    pub mint: String,
    /// When this record was written (Unix milliseconds).
    pub updated_at: u64,
}

impl ProofRecord {
    /// Wrap a wire proof, stamping it with its mint and the current time.
    #[must_use]
    pub fn new(proof: Proof, mint: impl Into<String>) -> Self {
        Self {
            proof,
            mint: mint.into(),
            updated_at: timestamp_ms(),
        }
    }

    /// The storage key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.proof.secret
    }

    /// Amount in sats.
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.proof.amount
    }
}

/// Sum of record amounts.
#[must_use]
pub fn balance(records: &[ProofRecord]) -> u64 {
    records
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.amount()))
}

/// Keyed proof storage.
#[async_trait]
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement the `ProofLedger` trait",
    label = "this type cannot be used as a proof store",
    note = "implement `ProofLedger` to give the wallet somewhere to keep proofs"
)]
pub trait ProofLedger: Send + Sync {
    /// Backend name, used in logs.
    fn backend(&self) -> &'static str;

    /// Load every stored record.
    async fn load_all(&self) -> LedgerResult<Vec<ProofRecord>>;

    /// Insert records, replacing any with the same key.
    async fn save_many(&self, records: &[ProofRecord]) -> LedgerResult<()>;

    /// Delete records by key. Unknown keys are ignored.
    async fn delete_many(&self, records: &[ProofRecord]) -> LedgerResult<()>;

    /// Delete `remove` and insert `insert` as one unit.
    ///
    /// Backends with transactions override this so a crash between the two
    /// halves cannot leave a half-applied proof set.
    async fn replace(&self, remove: &[ProofRecord], insert: &[ProofRecord]) -> LedgerResult<()> {
        self.delete_many(remove).await?;
        self.save_many(insert).await
    }

    /// Current spendable balance.
    async fn balance(&self) -> LedgerResult<u64> {
        Ok(balance(&self.load_all().await?))
    }
}

/// A shared, reference-counted ledger handle.
pub type SharedLedger = std::sync::Arc<dyn ProofLedger>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_sums_amounts() {
        let records = vec![
            ProofRecord::new(Proof::new("00", 4, "a", "c"), "https://mint"),
            ProofRecord::new(Proof::new("00", 16, "b", "c"), "https://mint"),
        ];
        assert_eq!(balance(&records), 20);
        assert_eq!(balance(&[]), 0);
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = ProofRecord::new(Proof::new("00ff", 8, "s1", "02aa"), "https://mint");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "00ff");
        assert_eq!(json["C"], "02aa");
        assert_eq!(json["mint"], "https://mint");
        assert_eq!(record.key(), "s1");
    }
}
