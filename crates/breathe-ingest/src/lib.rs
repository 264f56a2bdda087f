//! breathe-ingest: resumable batch extraction of the breathe paper dataset
//!
//! One [`pipeline::run_batch`] call reads the cursor, fetches one ordered
//! window from a [`RecordSource`], cleans every cell, writes the batch as CSV
//! and only then advances the cursor. [`convert`] later derives JSON Lines
//! files from the written batches.

pub mod config;
pub mod convert;
pub mod cursor;
pub mod layout;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod source;
pub mod status;

pub use config::{BigQueryConfig, IngestConfig};
pub use convert::{ConvertOutcome, ConvertSummary, convert_all};
pub use cursor::{JsonFileStore, MemoryStore, OffsetStore};
pub use pipeline::{BatchOutcome, run_batch};
pub use schema::{FIELDS, Record, RecordBatch};
pub use source::{BigQuerySource, DuckDbSource, RecordSource};
pub use status::{CsvState, SampleStatus, inspect};
