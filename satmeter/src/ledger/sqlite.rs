//! SQLite ledger backend.
//!
//! One table, one row per proof, keyed by secret. Blocking `rusqlite` calls
//! run on the tokio blocking pool so the async caller is never stalled.

use async_trait::async_trait;
use rusqlite::params;
use tracing::debug;

use super::{LedgerResult, ProofLedger, ProofRecord};
use crate::db::{Database, from_sql_int, to_sql_int};
use crate::token::Proof;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS proofs (
    secret      TEXT PRIMARY KEY NOT NULL,
    id          TEXT NOT NULL,
    amount      INTEGER NOT NULL CHECK (amount > 0),
    c           TEXT NOT NULL,
    mint        TEXT NOT NULL,
    updated_at  INTEGER NOT NULL
);
";

/// SQLite-backed proof ledger.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    /// Open (or create) a ledger database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<std::path::Path>) -> LedgerResult<Self> {
        Self::from_database(Database::open(path)?)
    }

    /// Open a ledger in a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::from_database(Database::open_in_memory()?)
    }

    /// Use an already-open database, creating the `proofs` table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn from_database(db: Database) -> LedgerResult<Self> {
        db.execute_batch(SCHEMA)?;
        Ok(Self { db })
    }

    /// Database file path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.db.path()
    }
}

fn insert_all(tx: &rusqlite::Transaction<'_>, records: &[ProofRecord]) -> LedgerResult<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO proofs (secret, id, amount, c, mint, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for r in records {
        stmt.execute(params![
            r.proof.secret,
            r.proof.id,
            to_sql_int(r.proof.amount)?,
            r.proof.c,
            r.mint,
            to_sql_int(r.updated_at)?,
        ])?;
    }
    Ok(())
}

fn delete_all(tx: &rusqlite::Transaction<'_>, records: &[ProofRecord]) -> LedgerResult<()> {
    let mut stmt = tx.prepare_cached("DELETE FROM proofs WHERE secret = ?1")?;
    for r in records {
        stmt.execute(params![r.proof.secret])?;
    }
    Ok(())
}

#[async_trait]
impl ProofLedger for SqliteLedger {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn load_all(&self) -> LedgerResult<Vec<ProofRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT secret, id, amount, c, mint, updated_at FROM proofs ORDER BY secret",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (secret, id, amount, c, mint, updated_at) = row?;
                records.push(ProofRecord {
                    proof: Proof {
                        id,
                        amount: from_sql_int(amount)?,
                        secret,
                        c,
                    },
                    mint,
                    updated_at: from_sql_int(updated_at)?,
                });
            }
            Ok(records)
        })
        .await
    }

    async fn save_many(&self, records: &[ProofRecord]) -> LedgerResult<()> {
        let records = records.to_vec();
        self.db.with_conn(move |conn| {
            let tx = conn.transaction()?;
            insert_all(&tx, &records)?;
            tx.commit()?;
            debug!(count = records.len(), "saved proofs");
            Ok(())
        })
        .await
    }

    async fn delete_many(&self, records: &[ProofRecord]) -> LedgerResult<()> {
        let records = records.to_vec();
        self.db.with_conn(move |conn| {
            let tx = conn.transaction()?;
            delete_all(&tx, &records)?;
            tx.commit()?;
            debug!(count = records.len(), "deleted proofs");
            Ok(())
        })
        .await
    }

    async fn replace(&self, remove: &[ProofRecord], insert: &[ProofRecord]) -> LedgerResult<()> {
        let remove = remove.to_vec();
        let insert = insert.to_vec();
        self.db.with_conn(move |conn| {
            let tx = conn.transaction()?;
            delete_all(&tx, &remove)?;
            insert_all(&tx, &insert)?;
            tx.commit()?;
            debug!(
                removed = remove.len(),
                inserted = insert.len(),
                "replaced proofs"
            );
            Ok(())
        })
        .await
    }

    async fn balance(&self) -> LedgerResult<u64> {
        self.db.with_conn(|conn| {
            let total: i64 =
                conn.query_row("SELECT COALESCE(SUM(amount), 0) FROM proofs", [], |row| {
                    row.get(0)
                })?;
            from_sql_int(total)
        })
        .await
    }
}
