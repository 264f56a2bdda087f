//! DuckDB-backed source for offline runs over a local copy of the table

use std::path::Path;

use anyhow::{Context, Result};
use duckdb::{Connection, params};
use indicatif::ProgressBar;

use crate::query::{Dialect, batch_query};
use crate::schema::{FIELDS, Record, RecordBatch};
use crate::source::RecordSource;

pub struct DuckDbSource {
    conn: Connection,
    table: String,
    sql: String,
}

impl DuckDbSource {
    /// Open a database file read-only.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        let config = duckdb::Config::default()
            .access_mode(duckdb::AccessMode::ReadOnly)
            .context("Failed to configure DuckDB")?;
        let conn = Connection::open_with_flags(path, config)
            .with_context(|| format!("Failed to open DuckDB database {}", path.display()))?;
        Self::from_connection(conn, table)
    }

    /// Wrap an existing connection (in-memory tables in tests).
    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        let sql = batch_query(Dialect::DuckDb, table)?;
        Ok(Self {
            conn,
            table: table.to_string(),
            sql,
        })
    }
}

impl RecordSource for DuckDbSource {
    fn describe(&self) -> String {
        format!("duckdb:{}", self.table)
    }

    fn fetch(&self, offset: u64, limit: usize, pb: &ProgressBar) -> Result<RecordBatch> {
        pb.set_message(format!("querying {} at offset {offset}", self.table));
        let mut stmt = self
            .conn
            .prepare_cached(&self.sql)
            .with_context(|| format!("Failed to prepare batch query on {}", self.table))?;

        let limit = i64::try_from(limit).context("batch size out of range")?;
        let offset = i64::try_from(offset).context("offset out of range")?;
        let rows = stmt
            .query_map(params![limit, offset], |row| {
                let mut values = Vec::with_capacity(FIELDS.len());
                for i in 0..FIELDS.len() {
                    values.push(row.get::<_, Option<String>>(i)?);
                }
                Ok(values)
            })
            .with_context(|| format!("Batch query failed on {}", self.table))?;

        let mut batch = Vec::new();
        for values in rows {
            let values = values.context("Failed to read row")?;
            let record = Record::from_values(values).context("row width does not match schema")?;
            batch.push(record);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(rows: &str) -> DuckDbSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE nature (id VARCHAR, title VARCHAR, abstract VARCHAR, \
             authors VARCHAR, keywords VARCHAR, organization_affiliated VARCHAR);
             INSERT INTO nature VALUES {rows};"
        ))
        .unwrap();
        DuckDbSource::from_connection(conn, "nature").unwrap()
    }

    fn ids(batch: &RecordBatch) -> Vec<&str> {
        batch.iter().map(|r| r.id.as_deref().unwrap()).collect()
    }

    #[test]
    fn filters_nulls_then_orders_then_windows() {
        let source = source_with(
            "('c', 't', 'a', 'au', 'k', 'o'), \
             ('a', 't', 'a', 'au', 'k', 'o'), \
             ('b', NULL, 'a', 'au', 'k', 'o'), \
             ('d', 't', 'a', 'au', 'k', 'o'), \
             ('e', 't', 'a', 'au', 'k', NULL)",
        );
        let pb = ProgressBar::hidden();
        assert_eq!(ids(&source.fetch(0, 2, &pb).unwrap()), vec!["a", "c"]);
        assert_eq!(ids(&source.fetch(2, 2, &pb).unwrap()), vec!["d"]);
        assert!(source.fetch(3, 2, &pb).unwrap().is_empty());
    }

    #[test]
    fn repeated_fetch_is_identical() {
        let source = source_with(
            "('2', 't2', 'a', 'au', 'k', 'o'), ('1', 't1', 'a', 'au', 'k', 'o')",
        );
        let pb = ProgressBar::hidden();
        let first = source.fetch(0, 10, &pb).unwrap();
        let second = source.fetch(0, 10, &pb).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].title.as_deref(), Some("t1"));
    }

    #[test]
    fn describe_names_table() {
        let source = source_with("('1', 't', 'a', 'au', 'k', 'o')");
        assert_eq!(source.describe(), "duckdb:nature");
    }
}
