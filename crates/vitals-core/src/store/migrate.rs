//! Versioned schema migrations.
//!
//! `PRAGMA user_version` records how far a database has been migrated.
//! Each pending step runs in its own transaction and bumps the version,
//! so startup is idempotent and a crash mid-migration resumes cleanly.
//! Steps only ever add tables or columns; existing rows are never touched.

use rusqlite::Connection;
use tracing::info;

use super::StoreError;

/// Migration steps, in order. Index N produces schema version N+1.
pub(crate) const MIGRATIONS: &[&str] = &[
    // v1: base tables for both record families
    "CREATE TABLE IF NOT EXISTS system_metrics (
         id          INTEGER PRIMARY KEY AUTOINCREMENT,
         group_key   TEXT NOT NULL DEFAULT 'unknown',
         cpu_usage   REAL,
         memory_usage REAL,
         recorded_at TEXT NOT NULL
     );
     CREATE TABLE IF NOT EXISTS stock_metrics (
         id             INTEGER PRIMARY KEY AUTOINCREMENT,
         symbol         TEXT,
         price          REAL,
         change_percent REAL,
         recorded_at    TEXT NOT NULL
     );
     CREATE INDEX IF NOT EXISTS idx_stock_metrics_symbol ON stock_metrics(symbol);",
    // v2: optional CPU temperature
    "ALTER TABLE system_metrics ADD COLUMN cpu_temp REAL;",
    // v3: client-supplied timestamps kept alongside server receipt time
    "ALTER TABLE system_metrics ADD COLUMN client_time TEXT;
     ALTER TABLE stock_metrics ADD COLUMN client_time TEXT;",
];

/// Applies every migration step the database has not seen yet.
pub(crate) fn run(conn: &mut Connection) -> Result<(), StoreError> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = idx + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| StoreError::Migration(format!("step v{version}: {e}")))?;
        tx.pragma_update(None, "user_version", version as i64)?;
        tx.commit()?;
        info!(version, "applied schema migration");
    }

    Ok(())
}
