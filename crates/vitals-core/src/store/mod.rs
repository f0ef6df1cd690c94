//! SQLite-backed time-series store and query layer.
//!
//! Append-only: ingestion inserts rows, queries read them back, nothing
//! updates a row in place. The server-assigned insertion id is the
//! ordering primitive everywhere — strictly increasing and unique, so
//! "latest" is always MAX(id) and mixed client clocks cannot reorder
//! history. The only deletions are bulk retention pruning.

mod migrate;

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::debug;

use crate::model::{ResourceRecord, ResourceRow, StockRecord, StockRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("schema migration failed: {0}")]
    Migration(String),
}

/// Row counts per record family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub system: u64,
    pub stock: u64,
}

/// Append-only SQLite store for both record families.
pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    /// Opens (or creates) the store at `path` and applies pending schema
    /// migrations. WAL keeps readers unblocked during writes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrate::run(&mut conn)?;
        Ok(Self { conn })
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        migrate::run(&mut conn)?;
        Ok(Self { conn })
    }

    // ------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------

    /// Appends one resource record. The server receipt time is assigned
    /// here; the client timestamp rides along untouched.
    pub fn insert_resource(&self, row: &ResourceRow) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO system_metrics
                 (group_key, cpu_usage, memory_usage, cpu_temp, recorded_at, client_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.group_key,
                row.cpu_usage,
                row.memory_usage,
                row.cpu_temp,
                now_stamp(),
                row.client_time,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Appends a batch of stock records in a single transaction: either
    /// every row commits or none do.
    pub fn insert_stock_batch(&mut self, rows: &[StockRow]) -> Result<usize, StoreError> {
        let stamp = now_stamp();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO stock_metrics
                     (symbol, price, change_percent, recorded_at, client_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.symbol,
                    row.price,
                    row.change_percent,
                    stamp,
                    row.client_time,
                ])?;
            }
        }
        tx.commit()?;
        debug!(records = rows.len(), "stock batch committed");
        Ok(rows.len())
    }

    // ------------------------------------------------------------
    // Query layer
    // ------------------------------------------------------------

    /// Latest resource record by insertion id. None on an empty store.
    pub fn latest_resource(&self) -> Result<Option<ResourceRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, group_key, cpu_usage, memory_usage, cpu_temp, recorded_at, client_time
                 FROM system_metrics ORDER BY id DESC LIMIT 1",
                [],
                resource_from_row,
            )
            .optional()?)
    }

    /// One row per distinct symbol: the row carrying that symbol's
    /// maximum insertion id. Empty store yields an empty list.
    pub fn latest_stock_per_symbol(&self) -> Result<Vec<StockRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s1.id, s1.symbol, s1.price, s1.change_percent, s1.recorded_at, s1.client_time
             FROM stock_metrics s1
             JOIN (SELECT symbol, MAX(id) AS max_id
                   FROM stock_metrics GROUP BY symbol) s2
               ON s1.symbol = s2.symbol AND s1.id = s2.max_id
             ORDER BY s1.symbol",
        )?;
        let rows = stmt.query_map([], stock_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Up to `limit` most recent resource rows, ascending for charting.
    pub fn resource_history(&self, limit: usize) -> Result<Vec<ResourceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM
                 (SELECT id, group_key, cpu_usage, memory_usage, cpu_temp, recorded_at, client_time
                  FROM system_metrics ORDER BY id DESC LIMIT ?1)
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![limit as i64], resource_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Windowed stock history, ascending for charting.
    ///
    /// With a symbol filter: that symbol's `per_symbol_limit` most recent
    /// rows. Without: every symbol's own window — each symbol is
    /// guaranteed representation up to the cap, regardless of how active
    /// the others are.
    pub fn stock_history(
        &self,
        symbol: Option<&str>,
        per_symbol_limit: usize,
    ) -> Result<Vec<StockRecord>, StoreError> {
        let rows = match symbol {
            Some(sym) => {
                let mut stmt = self.conn.prepare(
                    "SELECT * FROM
                         (SELECT id, symbol, price, change_percent, recorded_at, client_time
                          FROM stock_metrics WHERE symbol = ?1
                          ORDER BY id DESC LIMIT ?2)
                     ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params![sym, per_symbol_limit as i64], stock_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "WITH ranked AS
                         (SELECT id, symbol, price, change_percent, recorded_at, client_time,
                                 ROW_NUMBER() OVER
                                     (PARTITION BY symbol ORDER BY id DESC) AS rn
                          FROM stock_metrics)
                     SELECT id, symbol, price, change_percent, recorded_at, client_time
                     FROM ranked WHERE rn <= ?1
                     ORDER BY symbol, id ASC",
                )?;
                let rows = stmt.query_map(params![per_symbol_limit as i64], stock_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(rows)
    }

    /// Tabular listing: most recent first, optionally filtered to one
    /// group key, capped at `limit` rows.
    pub fn resource_table(
        &self,
        group_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ResourceRecord>, StoreError> {
        let rows = match group_key {
            Some(key) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, group_key, cpu_usage, memory_usage, cpu_temp, recorded_at, client_time
                     FROM system_metrics WHERE group_key = ?1
                     ORDER BY id DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![key, limit as i64], resource_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, group_key, cpu_usage, memory_usage, cpu_temp, recorded_at, client_time
                     FROM system_metrics ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit as i64], resource_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(rows)
    }

    // ------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------

    /// Deletes rows whose server receipt time predates `cutoff`
    /// (`%Y-%m-%d %H:%M:%S`). Returns per-family removal counts.
    pub fn prune_older_than(&self, cutoff: &str) -> Result<(usize, usize), StoreError> {
        let system = self.conn.execute(
            "DELETE FROM system_metrics WHERE recorded_at < ?1",
            params![cutoff],
        )?;
        let stock = self.conn.execute(
            "DELETE FROM stock_metrics WHERE recorded_at < ?1",
            params![cutoff],
        )?;
        Ok((system, stock))
    }

    /// Row counts per family.
    pub fn counts(&self) -> Result<StoreCounts, StoreError> {
        let system: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM system_metrics", [], |row| row.get(0))?;
        let stock: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM stock_metrics", [], |row| row.get(0))?;
        Ok(StoreCounts {
            system: system as u64,
            stock: stock as u64,
        })
    }
}

/// Server receipt timestamp, UTC.
fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceRecord> {
    Ok(ResourceRecord {
        id: row.get(0)?,
        group_key: row.get(1)?,
        cpu_usage: row.get(2)?,
        memory_usage: row.get(3)?,
        cpu_temp: row.get(4)?,
        recorded_at: row.get(5)?,
        client_time: row.get(6)?,
    })
}

fn stock_from_row(row: &Row<'_>) -> rusqlite::Result<StockRecord> {
    Ok(StockRecord {
        id: row.get(0)?,
        symbol: row.get(1)?,
        price: row.get(2)?,
        change_percent: row.get(3)?,
        recorded_at: row.get(4)?,
        client_time: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource_row(group_key: &str, cpu: f64) -> ResourceRow {
        ResourceRow {
            group_key: group_key.to_string(),
            cpu_usage: Some(cpu),
            memory_usage: Some(60.0),
            cpu_temp: Some(48.5),
            client_time: Some("2026-08-06 10:00:00".to_string()),
        }
    }

    fn stock_row(symbol: &str, price: f64) -> StockRow {
        StockRow {
            symbol: Some(symbol.to_string()),
            price: Some(price),
            change_percent: Some(1.2),
            client_time: None,
        }
    }

    #[test]
    fn empty_store_yields_empty_results() {
        let store = MetricsStore::open_in_memory().unwrap();
        assert_eq!(store.latest_resource().unwrap(), None);
        assert!(store.latest_stock_per_symbol().unwrap().is_empty());
        assert!(store.resource_history(100).unwrap().is_empty());
        assert!(store.stock_history(None, 30).unwrap().is_empty());
        assert!(store.resource_table(None, 100).unwrap().is_empty());
    }

    #[test]
    fn resource_insert_then_latest_round_trips() {
        let store = MetricsStore::open_in_memory().unwrap();
        let id = store.insert_resource(&resource_row("lab-1", 41.5)).unwrap();

        let record = store.latest_resource().unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.group_key, "lab-1");
        assert_eq!(record.cpu_usage, Some(41.5));
        assert_eq!(record.memory_usage, Some(60.0));
        assert_eq!(record.cpu_temp, Some(48.5));
        assert_eq!(record.client_time.as_deref(), Some("2026-08-06 10:00:00"));
        assert!(!record.recorded_at.is_empty());
    }

    #[test]
    fn latest_resource_is_by_insertion_id() {
        let store = MetricsStore::open_in_memory().unwrap();
        store.insert_resource(&resource_row("lab-1", 10.0)).unwrap();
        store.insert_resource(&resource_row("lab-2", 20.0)).unwrap();

        let record = store.latest_resource().unwrap().unwrap();
        assert_eq!(record.group_key, "lab-2");
        assert_eq!(record.cpu_usage, Some(20.0));
    }

    #[test]
    fn missing_fields_are_stored_as_null() {
        let store = MetricsStore::open_in_memory().unwrap();
        store
            .insert_resource(&ResourceRow {
                group_key: "unknown".to_string(),
                ..ResourceRow::default()
            })
            .unwrap();

        let record = store.latest_resource().unwrap().unwrap();
        assert_eq!(record.cpu_usage, None);
        assert_eq!(record.memory_usage, None);
        assert_eq!(record.cpu_temp, None);
        assert_eq!(record.client_time, None);
    }

    #[test]
    fn stock_batch_inserts_every_row_atomically() {
        let mut store = MetricsStore::open_in_memory().unwrap();
        let rows = vec![
            stock_row("AAPL", 190.5),
            stock_row("MSFT", 410.0),
            stock_row("GOOGL", 170.3),
        ];
        let inserted = store.insert_stock_batch(&rows).unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(store.counts().unwrap().stock, 3);
    }

    #[test]
    fn latest_per_symbol_returns_one_row_per_symbol() {
        let mut store = MetricsStore::open_in_memory().unwrap();
        for price in [100.0, 101.0, 102.0] {
            store
                .insert_stock_batch(&[stock_row("AAPL", price), stock_row("MSFT", price + 200.0)])
                .unwrap();
        }

        let latest = store.latest_stock_per_symbol().unwrap();
        assert_eq!(latest.len(), 2);
        let aapl = latest
            .iter()
            .find(|r| r.symbol.as_deref() == Some("AAPL"))
            .unwrap();
        assert_eq!(aapl.price, Some(102.0));
        let msft = latest
            .iter()
            .find(|r| r.symbol.as_deref() == Some("MSFT"))
            .unwrap();
        assert_eq!(msft.price, Some(302.0));
    }

    #[test]
    fn resource_history_caps_and_orders_ascending() {
        let store = MetricsStore::open_in_memory().unwrap();
        for i in 0..10 {
            store
                .insert_resource(&resource_row("lab-1", f64::from(i)))
                .unwrap();
        }

        let history = store.resource_history(4).unwrap();
        assert_eq!(history.len(), 4);
        // The 4 most recent rows, oldest of them first.
        let cpus: Vec<f64> = history.iter().filter_map(|r| r.cpu_usage).collect();
        assert_eq!(cpus, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn stock_history_cap_is_per_symbol_not_global() {
        let mut store = MetricsStore::open_in_memory().unwrap();
        for i in 0..40 {
            store
                .insert_stock_batch(&[
                    stock_row("AAA", 10.0 + f64::from(i)),
                    stock_row("BBB", 20.0 + f64::from(i)),
                ])
                .unwrap();
        }

        let history = store.stock_history(None, 30).unwrap();
        let aaa = history
            .iter()
            .filter(|r| r.symbol.as_deref() == Some("AAA"))
            .count();
        let bbb = history
            .iter()
            .filter(|r| r.symbol.as_deref() == Some("BBB"))
            .count();
        assert_eq!(aaa, 30);
        assert_eq!(bbb, 30);
    }

    #[test]
    fn stock_history_filtered_is_ascending_and_capped() {
        let mut store = MetricsStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .insert_stock_batch(&[stock_row("AAA", f64::from(i)), stock_row("BBB", 99.0)])
                .unwrap();
        }

        let history = store.stock_history(Some("AAA"), 3).unwrap();
        let prices: Vec<f64> = history.iter().filter_map(|r| r.price).collect();
        assert_eq!(prices, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn resource_table_filters_and_orders_descending() {
        let store = MetricsStore::open_in_memory().unwrap();
        store.insert_resource(&resource_row("lab-1", 1.0)).unwrap();
        store.insert_resource(&resource_row("lab-2", 2.0)).unwrap();
        store.insert_resource(&resource_row("lab-1", 3.0)).unwrap();

        let all = store.resource_table(None, 100).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].cpu_usage, Some(3.0));

        let lab1 = store.resource_table(Some("lab-1"), 100).unwrap();
        assert_eq!(lab1.len(), 2);
        assert_eq!(lab1[0].cpu_usage, Some(3.0));
        assert_eq!(lab1[1].cpu_usage, Some(1.0));
    }

    #[test]
    fn prune_removes_old_rows_only() {
        let mut store = MetricsStore::open_in_memory().unwrap();
        store.insert_resource(&resource_row("lab-1", 1.0)).unwrap();
        store.insert_stock_batch(&[stock_row("AAA", 1.0)]).unwrap();

        // Everything was recorded "now"; a cutoff in the past removes nothing.
        let removed = store.prune_older_than("2000-01-01 00:00:00").unwrap();
        assert_eq!(removed, (0, 0));
        assert_eq!(
            store.counts().unwrap(),
            StoreCounts {
                system: 1,
                stock: 1
            }
        );

        // A cutoff in the far future removes everything.
        let removed = store.prune_older_than("2100-01-01 00:00:00").unwrap();
        assert_eq!(removed, (1, 1));
        assert_eq!(
            store.counts().unwrap(),
            StoreCounts {
                system: 0,
                stock: 0
            }
        );
    }

    #[test]
    fn reopening_a_store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.db");

        {
            let store = MetricsStore::open(&path).unwrap();
            store.insert_resource(&resource_row("lab-1", 41.5)).unwrap();
        }

        let store = MetricsStore::open(&path).unwrap();
        assert_eq!(store.counts().unwrap().system, 1);
        let record = store.latest_resource().unwrap().unwrap();
        assert_eq!(record.group_key, "lab-1");
    }

    #[test]
    fn v1_database_migrates_without_losing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.db");

        // Simulate a database created before cpu_temp and client_time existed.
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(migrate::MIGRATIONS[0]).unwrap();
            conn.pragma_update(None, "user_version", 1).unwrap();
            conn.execute(
                "INSERT INTO system_metrics (group_key, cpu_usage, memory_usage, recorded_at)
                 VALUES ('old-host', 12.5, 34.0, '2025-01-01 00:00:00')",
                [],
            )
            .unwrap();
        }

        let store = MetricsStore::open(&path).unwrap();
        let record = store.latest_resource().unwrap().unwrap();
        assert_eq!(record.group_key, "old-host");
        assert_eq!(record.cpu_usage, Some(12.5));
        // Columns added after the row was written read back as NULL.
        assert_eq!(record.cpu_temp, None);
        assert_eq!(record.client_time, None);
    }
}
