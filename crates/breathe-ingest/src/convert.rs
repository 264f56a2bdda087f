//! Second stage: derive a JSON Lines file from every written CSV batch.
//!
//! Conversion is check-then-create: an existing `.json` is never rewritten,
//! and the target only appears once complete, so an interrupted run cannot
//! leave a partial file that later runs would skip.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use breathe_core::{JsonLinesSink, ProgressContext};

use crate::layout;
use crate::schema::{FIELDS, Record};

/// What happened to one `sample_<offset>` directory.
#[derive(Debug)]
pub enum ConvertOutcome {
    Converted { rows: usize },
    AlreadyPresent,
    SourceMissing,
    Failed(anyhow::Error),
}

/// Per-directory results, in offset order.
#[derive(Debug, Default)]
pub struct ConvertSummary {
    pub items: Vec<(u64, ConvertOutcome)>,
}

impl ConvertSummary {
    fn count(&self, pred: impl Fn(&ConvertOutcome) -> bool) -> usize {
        self.items.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Converted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::AlreadyPresent))
    }

    pub fn missing(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::SourceMissing))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Failed(_)))
    }
}

/// Convert one CSV into JSON Lines, row by row in file order.
pub fn convert_file(csv_path: &Path, json_path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;
    let mut sink = JsonLinesSink::create(json_path)
        .with_context(|| format!("Failed to create {}", json_path.display()))?;

    // A column present in the header is text, possibly empty; only a column
    // the file lacks altogether becomes null.
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", csv_path.display()))?
        .clone();
    let positions: Vec<Option<usize>> = FIELDS
        .iter()
        .map(|field| headers.iter().position(|h| h == *field))
        .collect();

    for (i, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("{}: bad row {}", csv_path.display(), i + 1))?;
        let values = positions
            .iter()
            .map(|pos| pos.and_then(|p| row.get(p)).map(str::to_string))
            .collect();
        let record = Record::from_values(values)
            .with_context(|| format!("{}: bad row {}", csv_path.display(), i + 1))?;
        sink.write_row(&record)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
    }
    sink.finalize()
        .with_context(|| format!("Failed to finalize {}", json_path.display()))
}

fn convert_sample(root: &Path, dataset: &str, offset: u64) -> (PathBuf, ConvertOutcome) {
    let csv_path = layout::csv_path(root, dataset, offset);
    let json_path = layout::jsonl_path(root, dataset, offset);

    if !csv_path.is_file() {
        log::warn!("CSV not found: {}", csv_path.display());
        return (csv_path, ConvertOutcome::SourceMissing);
    }
    if json_path.exists() {
        log::debug!("JSON already exists: {}", json_path.display());
        return (json_path, ConvertOutcome::AlreadyPresent);
    }
    match convert_file(&csv_path, &json_path) {
        Ok(rows) => {
            log::info!("Converted {rows} rows: {}", json_path.display());
            (json_path, ConvertOutcome::Converted { rows })
        }
        Err(e) => {
            log::error!("{e:#}");
            (json_path, ConvertOutcome::Failed(e))
        }
    }
}

/// Convert every batch under `root` that has a CSV but no JSON Lines file.
///
/// Missing sources and per-item failures are recorded, not fatal; only an
/// unreadable root aborts.
pub fn convert_all(root: &Path, dataset: &str, progress: &ProgressContext) -> Result<ConvertSummary> {
    let samples = layout::list_samples(root)
        .with_context(|| format!("Failed to list {}", root.display()))?;
    log::info!("Found {} batch directories in {}", samples.len(), root.display());

    let pb = progress.count_bar("convert", samples.len() as u64);
    let mut summary = ConvertSummary::default();
    for (offset, _) in samples {
        let (path, outcome) = convert_sample(root, dataset, offset);
        pb.set_message(path.display().to_string());
        pb.inc(1);
        summary.items.push((offset, outcome));
    }
    pb.finish_and_clear();

    log::info!(
        "Convert: {} converted, {} already present, {} missing CSV, {} failed",
        summary.converted(),
        summary.skipped(),
        summary.missing(),
        summary.failed()
    );
    Ok(summary)
}
