//! SQLite spend log.
//!
//! Rows are insert-only; the table has no update or delete path.

use async_trait::async_trait;
use rusqlite::params;
use tracing::debug;

use super::{SpendLog, SpendLogEntry};
use crate::db::{Database, from_sql_int, to_sql_int};
use crate::ledger::LedgerResult;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS spend_log (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp      INTEGER NOT NULL,
    provider       TEXT NOT NULL,
    budget_sats    INTEGER NOT NULL,
    refund_sats    INTEGER NOT NULL,
    spent_sats     INTEGER NOT NULL,
    success        INTEGER NOT NULL,
    model          TEXT,
    session_id     TEXT,
    prompt_prefix  TEXT,
    note           TEXT
);
";

/// SQLite-backed spend log.
#[derive(Debug, Clone)]
pub struct SqliteSpendLog {
    db: Database,
}

impl SqliteSpendLog {
    /// Open (or create) a spend log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<std::path::Path>) -> LedgerResult<Self> {
        Self::from_database(Database::open(path)?)
    }

    /// Use an already-open database, creating the `spend_log` table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn from_database(db: Database) -> LedgerResult<Self> {
        db.execute_batch(SCHEMA)?;
        Ok(Self { db })
    }
}

type Row = (
    i64,
    String,
    i64,
    i64,
    i64,
    bool,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

#[async_trait]
impl SpendLog for SqliteSpendLog {
    async fn append(&self, entry: &SpendLogEntry) -> LedgerResult<()> {
        let entry = entry.clone();
        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO spend_log (timestamp, provider, budget_sats, refund_sats,
                        spent_sats, success, model, session_id, prompt_prefix, note)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        to_sql_int(entry.timestamp)?,
                        entry.provider,
                        to_sql_int(entry.budget_sats)?,
                        to_sql_int(entry.refund_sats)?,
                        to_sql_int(entry.spent_sats)?,
                        entry.success,
                        entry.model,
                        entry.session_id,
                        entry.prompt_prefix,
                        entry.note,
                    ],
                )?;
                debug!(provider = %entry.provider, spent = entry.spent_sats, "spend logged");
                Ok(())
            })
            .await
    }

    async fn entries(&self, limit: Option<usize>) -> LedgerResult<Vec<SpendLogEntry>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        self.db
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, provider, budget_sats, refund_sats, spent_sats, success,
                            model, session_id, prompt_prefix, note
                     FROM (SELECT * FROM spend_log ORDER BY seq DESC LIMIT ?1)
                     ORDER BY seq ASC",
                )?;
                let rows = stmt.query_map(params![limit], |row| {
                    Ok::<Row, rusqlite::Error>((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                    ))
                })?;

                let mut entries = Vec::new();
                for row in rows {
                    let (
                        timestamp,
                        provider,
                        budget,
                        refund,
                        spent,
                        success,
                        model,
                        session_id,
                        prompt_prefix,
                        note,
                    ) = row?;
                    entries.push(SpendLogEntry {
                        timestamp: from_sql_int(timestamp)?,
                        provider,
                        budget_sats: from_sql_int(budget)?,
                        refund_sats: from_sql_int(refund)?,
                        spent_sats: from_sql_int(spent)?,
                        success,
                        model,
                        session_id,
                        prompt_prefix,
                        note,
                    });
                }
                Ok(entries)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ProofLedger, SqliteLedger};

    #[tokio::test]
    async fn test_sqlite_spend_log_roundtrip() {
        let log = SqliteSpendLog::from_database(Database::open_in_memory().unwrap()).unwrap();
        let entry = SpendLogEntry::new("routstr", 2000, 1700)
            .success(false)
            .model(Some("claude-sonnet"))
            .session_id(Some("sess-1"))
            .prompt_prefix(Some("refactor the parser"));
        log.append(&entry).await.unwrap();
        log.append(&SpendLogEntry::new("routstr", 500, 0).note(Some("gateway timed out")))
            .await
            .unwrap();

        let all = log.entries(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], entry);
        assert_eq!(all[1].note.as_deref(), Some("gateway timed out"));

        let latest = log.entries(Some(1)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].budget_sats, 500);

        let summary = log.summary().await.unwrap();
        assert_eq!(summary.spent_sats, 800);
        assert_eq!(summary.unreconciled, 1);
    }

    #[tokio::test]
    async fn test_shares_database_with_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("wallet.db")).unwrap();
        let ledger = SqliteLedger::from_database(db.clone()).unwrap();
        let log = SqliteSpendLog::from_database(db).unwrap();

        log.append(&SpendLogEntry::new("routstr", 10, 0)).await.unwrap();
        assert_eq!(ledger.balance().await.unwrap(), 0);
        assert_eq!(log.entries(None).await.unwrap().len(), 1);
    }
}
