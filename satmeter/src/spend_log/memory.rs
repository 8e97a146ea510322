//! In-memory spend log.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SpendLog, SpendLogEntry};
use crate::ledger::LedgerResult;

/// In-memory spend log. Not persistent across restarts.
#[derive(Debug, Default)]
pub struct MemorySpendLog {
    entries: RwLock<Vec<SpendLogEntry>>,
}

impl MemorySpendLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpendLog for MemorySpendLog {
    async fn append(&self, entry: &SpendLogEntry) -> LedgerResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn entries(&self, limit: Option<usize>) -> LedgerResult<Vec<SpendLogEntry>> {
        let entries = self.entries.read().await;
        let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
        Ok(entries[skip..].to_vec())
    }
}
