//! Schema migration system.
//!
//! Migrations are static SQL strings keyed by version number.  Applied
//! versions are tracked in a `_migrations` table, so running the set is
//! idempotent.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Append new migrations; never edit applied ones.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema — chat turns and automation ledger",
    sql: r#"
        CREATE TABLE chat_turns (
            id                 TEXT PRIMARY KEY,
            session_id         TEXT NOT NULL,
            user_message       TEXT NOT NULL,
            assistant_response TEXT NOT NULL,
            intent_snapshot    TEXT NOT NULL,
            needs_approval     BOOLEAN NOT NULL DEFAULT 0,
            created_at         INTEGER NOT NULL
        );
        CREATE INDEX idx_chat_turns_session ON chat_turns(session_id);

        CREATE TABLE automation_records (
            id              TEXT PRIMARY KEY,
            session_id      TEXT NOT NULL,
            automation_type TEXT NOT NULL,
            parameters      TEXT NOT NULL,
            result          TEXT NOT NULL,
            success         BOOLEAN NOT NULL,
            message         TEXT NOT NULL,
            execution_time  REAL NOT NULL CHECK(execution_time >= 0),
            created_at      INTEGER NOT NULL
        );
        CREATE INDEX idx_automation_records_session ON automation_records(session_id);
    "#,
}];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// This is a **synchronous** function — call it from `spawn_blocking`.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version    INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    conn.execute_batch(&format!(
        "BEGIN;\n{}\nINSERT INTO _migrations (version, applied_at) VALUES ({}, strftime('%s','now'));\nCOMMIT;",
        migration.sql, migration.version
    ))
    .map_err(|e| StoreError::Migration {
        version: migration.version,
        message: e.to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_all_applies_and_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);

        // Second run is a no-op.
        run_all(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);

        // Tables exist.
        conn.prepare("SELECT id FROM chat_turns").unwrap();
        conn.prepare("SELECT id FROM automation_records").unwrap();
    }
}
