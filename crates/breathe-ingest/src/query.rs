//! The one read query the pipeline issues, in both SQL dialects.
//!
//! Six-column projection, every column required non-null, ordered by `id`
//! and windowed by LIMIT/OFFSET bound as query parameters.

use anyhow::{Result, bail};

use crate::schema::FIELDS;

/// SQL flavor of the backend running the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// GoogleSQL with named `@limit` / `@offset` parameters
    BigQuery,
    /// DuckDB with positional `?` parameters (limit first)
    DuckDb,
}

impl Dialect {
    fn quote(self, ident: &str) -> String {
        match self {
            Self::BigQuery => format!("`{ident}`"),
            Self::DuckDb => format!("\"{ident}\""),
        }
    }

    fn text_type(self) -> &'static str {
        match self {
            Self::BigQuery => "STRING",
            Self::DuckDb => "VARCHAR",
        }
    }

    fn window(self) -> &'static str {
        match self {
            Self::BigQuery => "LIMIT @limit OFFSET @offset",
            Self::DuckDb => "LIMIT ? OFFSET ?",
        }
    }
}

/// Reject anything that is not a plain dotted identifier, since table names
/// cannot be bound as parameters.
pub fn validate_table_ref(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if !valid {
        bail!("Invalid table reference: {table:?}");
    }
    Ok(())
}

/// Build the windowed batch query against `table`.
pub fn batch_query(dialect: Dialect, table: &str) -> Result<String> {
    validate_table_ref(table)?;

    let projection = FIELDS
        .iter()
        .map(|f| format!("CAST({f} AS {}) AS {f}", dialect.text_type()))
        .collect::<Vec<_>>()
        .join(",\n  ");
    let filter = FIELDS
        .iter()
        .map(|f| format!("{f} IS NOT NULL"))
        .collect::<Vec<_>>()
        .join("\n  AND ");

    Ok(format!(
        "SELECT\n  {projection}\nFROM {}\nWHERE\n  {filter}\nORDER BY id\n{}",
        dialect.quote(table),
        dialect.window()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigquery_query_shape() {
        let sql = batch_query(Dialect::BigQuery, "bigquery-public-data.breathe.nature").unwrap();
        assert!(sql.contains("FROM `bigquery-public-data.breathe.nature`"));
        assert!(sql.contains("CAST(abstract AS STRING) AS abstract"));
        assert!(sql.contains("ORDER BY id\nLIMIT @limit OFFSET @offset"));
        for field in FIELDS {
            assert!(sql.contains(&format!("{field} IS NOT NULL")), "{field}");
        }
    }

    #[test]
    fn duckdb_query_uses_positional_params() {
        let sql = batch_query(Dialect::DuckDb, "nature").unwrap();
        assert!(sql.contains("FROM \"nature\""));
        assert!(sql.contains("CAST(id AS VARCHAR) AS id"));
        assert!(sql.ends_with("LIMIT ? OFFSET ?"));
    }

    #[test]
    fn rejects_injection_in_table_name() {
        assert!(batch_query(Dialect::DuckDb, "t; DROP TABLE x").is_err());
        assert!(batch_query(Dialect::BigQuery, "a..b").is_err());
        assert!(batch_query(Dialect::BigQuery, "").is_err());
        assert!(batch_query(Dialect::BigQuery, "proj`.x").is_err());
    }
}
