//! Shared SQLite connection handle.
//!
//! The ledger and the spend log live in the same database file and share one
//! connection. All blocking work is pushed onto the tokio blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::ledger::{LedgerError, LedgerResult};

/// A cloneable handle to one SQLite connection.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be opened.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::storage("sqlite", format!("create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!(path = %path.display(), "opened sqlite database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Database file path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run schema statements synchronously.
    pub(crate) fn execute_batch(&self, sql: &str) -> LedgerResult<()> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Lock(e.to_string()))?;
        guard.execute_batch(sql)?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> LedgerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> LedgerResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|e| LedgerError::Lock(e.to_string()))?;
            f(&mut guard)
        })
        .await?
    }
}

/// Convert an unsigned value for storage in an `INTEGER` column.
pub(crate) fn to_sql_int(value: u64) -> LedgerResult<i64> {
    i64::try_from(value).map_err(|_| LedgerError::Corrupt(format!("value {value} exceeds i64")))
}

/// Convert a stored `INTEGER` back to unsigned.
pub(crate) fn from_sql_int(value: i64) -> LedgerResult<u64> {
    u64::try_from(value).map_err(|_| LedgerError::Corrupt(format!("negative value {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_conversions() {
        assert_eq!(to_sql_int(42).unwrap(), 42);
        assert!(to_sql_int(u64::MAX).is_err());
        assert_eq!(from_sql_int(7).unwrap(), 7);
        assert!(matches!(from_sql_int(-1), Err(LedgerError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_with_conn_runs_on_blocking_pool() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();
        let v: i64 = db
            .with_conn(|conn| {
                conn.execute("INSERT INTO t (v) VALUES (5)", [])?;
                Ok(conn.query_row("SELECT v FROM t", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(v, 5);
        assert!(db.path().is_none());
    }
}
