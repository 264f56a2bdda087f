//! One resumable unit of work:
//!
//! ```text
//! READ_OFFSET -> FETCH -> (empty? -> Exhausted)
//!             -> CLEAN -> WRITE_ARTIFACT -> ADVANCE_OFFSET -> Written
//! ```
//!
//! The artifact is durable (tmp + fsync + rename) before the cursor moves.
//! A crash in between makes the next run fetch the same window and replace
//! the same offset-keyed file, so every batch is delivered at least once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use breathe_core::{CsvSink, ProgressContext, cleanup_tmp_files, fmt_num};

use crate::config::IngestConfig;
use crate::cursor::OffsetStore;
use crate::layout;
use crate::normalize::clean_batch;
use crate::schema::{FIELDS, RecordBatch};
use crate::source::RecordSource;

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// A batch was written and the cursor moved to `next_offset`.
    Written {
        offset: u64,
        rows: usize,
        next_offset: u64,
        path: PathBuf,
    },
    /// No qualifying rows at `offset`; nothing written, cursor untouched.
    Exhausted { offset: u64 },
}

/// Check what the query boundary promises before anything is written.
fn validate_batch(batch: &RecordBatch, limit: usize) -> Result<()> {
    if batch.len() > limit {
        bail!("source returned {} rows for a batch of {limit}", batch.len());
    }
    let mut seen = HashSet::with_capacity(batch.len());
    for (i, record) in batch.iter().enumerate() {
        if !record.is_complete() {
            bail!("row {i} has NULL fields despite the non-null filter");
        }
        if let Some(id) = record.id.as_deref() {
            if !seen.insert(id) {
                bail!("duplicate id {id:?} in batch");
            }
        }
    }
    Ok(())
}

/// Write a cleaned batch to its offset-keyed CSV, replacing any earlier copy.
///
/// Returns the final path once the file is durable.
pub fn write_batch(root: &Path, dataset: &str, offset: u64, batch: &RecordBatch) -> Result<PathBuf> {
    let dir = layout::sample_dir(root, offset);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    cleanup_tmp_files(&dir)
        .with_context(|| format!("Failed to clean stale files in {}", dir.display()))?;

    let path = layout::csv_path(root, dataset, offset);
    let mut sink = CsvSink::create(&path, &FIELDS)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in batch {
        sink.write_row(record)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    sink.finalize()
        .with_context(|| format!("Failed to finalize {}", path.display()))?;
    Ok(path)
}

/// Process exactly one batch.
pub fn run_batch(
    config: &IngestConfig,
    source: &dyn RecordSource,
    cursor: &mut dyn OffsetStore,
    progress: &ProgressContext,
) -> Result<BatchOutcome> {
    if config.batch_size == 0 {
        bail!("batch size must be positive");
    }
    let start = Instant::now();

    let offset = cursor.read().context("Failed to read cursor")?;
    log::info!(
        "Fetching {} rows from {} at offset {}",
        fmt_num(config.batch_size as u64),
        source.describe(),
        fmt_num(offset)
    );

    let pb = progress.stage_line("fetch");
    let fetched = source.fetch(offset, config.batch_size, &pb);
    pb.finish_and_clear();
    let raw = fetched.with_context(|| format!("Fetch at offset {offset} failed"))?;

    if raw.is_empty() {
        log::info!("No rows at offset {}: dataset exhausted", fmt_num(offset));
        return Ok(BatchOutcome::Exhausted { offset });
    }
    validate_batch(&raw, config.batch_size)
        .with_context(|| format!("Invalid batch at offset {offset}"))?;

    let cleaned = clean_batch(&raw);
    let path = write_batch(&config.output_dir, &config.dataset, offset, &cleaned)?;
    log::info!("Wrote {} rows to {}", fmt_num(cleaned.len() as u64), path.display());

    let next_offset = offset + cleaned.len() as u64;
    cursor
        .write(next_offset)
        .with_context(|| format!("Batch {offset} written but cursor not advanced"))?;
    log::info!(
        "Cursor advanced to {} ({:.1}s)",
        fmt_num(next_offset),
        start.elapsed().as_secs_f64()
    );

    Ok(BatchOutcome::Written {
        offset,
        rows: cleaned.len(),
        next_offset,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryStore;
    use crate::schema::Record;
    use indicatif::ProgressBar;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn record(id: &str) -> Record {
        Record::from_values(
            FIELDS
                .iter()
                .map(|f| Some(format!("{f} {id}")))
                .collect(),
        )
        .unwrap()
    }

    /// In-memory table that already satisfies the source contract.
    struct VecSource {
        rows: Vec<Record>,
        calls: Cell<usize>,
        fail: bool,
    }

    impl VecSource {
        fn new(n: usize) -> Self {
            Self {
                rows: (0..n).map(|i| record(&format!("{i:05}"))).collect(),
                calls: Cell::new(0),
                fail: false,
            }
        }
    }

    impl RecordSource for VecSource {
        fn describe(&self) -> String {
            "vec".into()
        }

        fn fetch(&self, offset: u64, limit: usize, _pb: &ProgressBar) -> Result<RecordBatch> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                bail!("connection refused");
            }
            Ok(self
                .rows
                .iter()
                .skip(offset as usize)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn config(dir: &TempDir, batch_size: usize) -> IngestConfig {
        IngestConfig {
            dataset: "breathe".into(),
            batch_size,
            output_dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn writes_then_advances() {
        let dir = TempDir::new().unwrap();
        let mut cursor = MemoryStore::new();
        let outcome = run_batch(
            &config(&dir, 10),
            &VecSource::new(25),
            &mut cursor,
            &ProgressContext::hidden(),
        )
        .unwrap();

        let expected_path = layout::csv_path(dir.path(), "breathe", 0);
        assert_eq!(
            outcome,
            BatchOutcome::Written {
                offset: 0,
                rows: 10,
                next_offset: 10,
                path: expected_path.clone(),
            }
        );
        assert_eq!(cursor.read().unwrap(), 10);
        let content = std::fs::read_to_string(expected_path).unwrap();
        assert!(content.starts_with("id,title,abstract,authors,keywords,organization_affiliated\n"));
        assert_eq!(content.lines().count(), 11);
    }

    #[test]
    fn exhausted_leaves_everything_untouched() {
        let dir = TempDir::new().unwrap();
        let mut cursor = MemoryStore::starting_at(25);
        let outcome = run_batch(
            &config(&dir, 10),
            &VecSource::new(25),
            &mut cursor,
            &ProgressContext::hidden(),
        )
        .unwrap();
        assert_eq!(outcome, BatchOutcome::Exhausted { offset: 25 });
        assert_eq!(cursor.read().unwrap(), 25);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn fetch_failure_is_fatal_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let mut source = VecSource::new(5);
        source.fail = true;
        let mut cursor = MemoryStore::starting_at(0);
        let err = run_batch(
            &config(&dir, 10),
            &source,
            &mut cursor,
            &ProgressContext::hidden(),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("connection refused"));
        assert_eq!(cursor.read().unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn zero_batch_size_rejected_before_fetch() {
        let dir = TempDir::new().unwrap();
        let source = VecSource::new(5);
        let result = run_batch(
            &config(&dir, 0),
            &source,
            &mut MemoryStore::new(),
            &ProgressContext::hidden(),
        );
        assert!(result.is_err());
        assert_eq!(source.calls.get(), 0);
    }

    #[test]
    fn write_failure_does_not_advance() {
        let dir = TempDir::new().unwrap();
        // Output root is a file, so the sample directory cannot be created
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, "x").unwrap();
        let config = IngestConfig {
            output_dir: root,
            ..config(&dir, 10)
        };
        let mut cursor = MemoryStore::new();
        assert!(
            run_batch(&config, &VecSource::new(5), &mut cursor, &ProgressContext::hidden())
                .is_err()
        );
        assert_eq!(cursor.read().unwrap(), 0);
    }

    #[test]
    fn validate_rejects_contract_violations() {
        let mut incomplete = record("1");
        incomplete.title = None;
        assert!(validate_batch(&vec![incomplete], 10).is_err());
        assert!(validate_batch(&vec![record("1"), record("1")], 10).is_err());
        assert!(validate_batch(&vec![record("1"), record("2")], 1).is_err());
        assert!(validate_batch(&vec![record("1"), record("2")], 2).is_ok());
    }

    #[test]
    fn write_batch_replaces_previous_copy() {
        let dir = TempDir::new().unwrap();
        let first = write_batch(dir.path(), "breathe", 0, &vec![record("a")]).unwrap();
        let second = write_batch(dir.path(), "breathe", 0, &vec![record("b")]).unwrap();
        assert_eq!(first, second);
        let content = std::fs::read_to_string(second).unwrap();
        assert!(content.contains("id b"));
        assert!(!content.contains("id a"));
    }
}
