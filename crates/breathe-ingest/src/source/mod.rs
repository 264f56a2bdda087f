//! Record sources: one bounded, id-ordered window per call.

mod bigquery;
mod local;

pub use bigquery::BigQuerySource;
pub use local::DuckDbSource;

use anyhow::Result;
use indicatif::ProgressBar;

use crate::schema::RecordBatch;

/// A remote (or local) table the pipeline reads batches from.
///
/// Implementations must filter out rows with any NULL field, order by `id`
/// ascending, and only then apply the `offset`/`limit` window, so the same
/// window returns the same rows on every call. An empty batch means the
/// dataset is exhausted.
pub trait RecordSource {
    /// Short description for logs (`bigquery:proj.ds.table`).
    fn describe(&self) -> String;

    /// Fetch rows `[offset, offset + limit)` of the filtered, ordered table.
    fn fetch(&self, offset: u64, limit: usize, pb: &ProgressBar) -> Result<RecordBatch>;
}
