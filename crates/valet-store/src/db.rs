//! SQLite database handle.
//!
//! [`Database`] wraps a `rusqlite::Connection` behind an `Arc<Mutex<>>` and
//! exposes async methods that dispatch onto `tokio::task::spawn_blocking`,
//! keeping the async runtime free of file I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Thread-safe handle to a SQLite database.
///
/// All reads and writes go through [`Database::call`], which runs the given
/// closure on the blocking thread pool.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database at `path` and apply pragmas.
    ///
    /// Blocks briefly on file I/O — call during startup or wrap in
    /// `spawn_blocking` yourself.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database — useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database and run all pending migrations.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open(&path)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.call(migration::run_all).await
    }

    /// Execute a closure against the connection on the blocking pool.
    ///
    /// This is the primary way to interact with the database from async
    /// code.  The closure receives a `&Connection` and must return a
    /// `StoreResult<T>`.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::TaskJoin(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    // ── pragmas ──────────────────────────────────────────────────────

    /// Apply connection pragmas for safe concurrent access.
    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        // WAL: concurrent readers alongside a single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // NORMAL sync is safe under WAL; a power failure loses at most the
        // last transaction, never corrupts.
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        // Enforce foreign key constraints.
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Wait for a busy writer instead of failing immediately.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_and_query() {
        let db = Database::open_in_memory().unwrap();
        let one: i64 = db
            .call(|conn| {
                let one = conn.query_row("SELECT 1", [], |row| row.get(0))?;
                Ok(one)
            })
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn open_on_disk_and_migrate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valet.db");

        let db = Database::open_and_migrate(path.clone()).await.unwrap();
        db.call(|conn| {
            conn.execute(
                "INSERT INTO chat_turns (id, session_id, user_message, assistant_response, intent_snapshot, needs_approval, created_at) \
                 VALUES ('t1', 's1', 'hi', 'hello', '{}', 0, 0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        // Reopen and verify the row survived.
        drop(db);
        let db = Database::open_and_migrate(path).await.unwrap();
        let count: i64 = db
            .call(|conn| {
                let count =
                    conn.query_row("SELECT COUNT(*) FROM chat_turns", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();
    }
}
