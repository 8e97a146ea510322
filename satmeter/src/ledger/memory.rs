//! In-memory ledger backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LedgerResult, ProofLedger, ProofRecord};

/// In-memory proof ledger.
///
/// Fast but not persistent across restarts. Records are kept ordered by key
/// so `load_all` is deterministic.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<BTreeMap<String, ProofRecord>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger pre-populated with records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = ProofRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.key().to_owned(), r))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }
}

#[async_trait]
impl ProofLedger for MemoryLedger {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load_all(&self) -> LedgerResult<Vec<ProofRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn save_many(&self, records: &[ProofRecord]) -> LedgerResult<()> {
        let mut map = self.records.write().await;
        for record in records {
            map.insert(record.key().to_owned(), record.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, records: &[ProofRecord]) -> LedgerResult<()> {
        let mut map = self.records.write().await;
        for record in records {
            map.remove(record.key());
        }
        Ok(())
    }

    async fn replace(&self, remove: &[ProofRecord], insert: &[ProofRecord]) -> LedgerResult<()> {
        // Single write guard so no reader observes the intermediate state.
        let mut map = self.records.write().await;
        for record in remove {
            map.remove(record.key());
        }
        for record in insert {
            map.insert(record.key().to_owned(), record.clone());
        }
        Ok(())
    }
}
