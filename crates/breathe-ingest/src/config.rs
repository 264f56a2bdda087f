//! Ingest configuration, handed to each component at construction

use std::path::PathBuf;

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Settings for the batch pipeline and converter.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Dataset label used in artifact file names (`<dataset>_dataset_offset_<n>.csv`)
    pub dataset: String,
    /// Rows requested per invocation (> 0)
    pub batch_size: usize,
    /// Root directory holding `sample_<offset>/` batch directories
    pub output_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset: "breathe".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            output_dir: PathBuf::from("./data"),
        }
    }
}

impl IngestConfig {
    /// Default cursor location inside the output root.
    pub fn default_cursor_path(&self) -> PathBuf {
        self.output_dir.join("progress.json")
    }
}

/// Where the remote table lives and who is billed for the query.
#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    /// Project the query job runs (and is billed) in
    pub project_id: String,
    /// Project owning the source table
    pub source_project: String,
    pub dataset: String,
    pub table: String,
    /// Job location (`US`, `EU`, ...); None lets BigQuery decide
    pub location: Option<String>,
    pub api_base: String,
}

impl BigQueryConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            source_project: "bigquery-public-data".to_string(),
            dataset: "breathe".to_string(),
            table: "nature".to_string(),
            location: None,
            api_base: "https://bigquery.googleapis.com/bigquery/v2/".to_string(),
        }
    }

    /// `project.dataset.table` as written in a query.
    pub fn table_ref(&self) -> String {
        format!("{}.{}.{}", self.source_project, self.dataset, self.table)
    }
}
