//! Fetch subcommand - process exactly one batch

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use breathe_core::{SharedProgress, fmt_num};
use breathe_ingest::{
    BatchOutcome, BigQuerySource, DuckDbSource, JsonFileStore, RecordSource, run_batch,
};

use crate::cmd::google_auth;
use crate::config::{Config, DuckDbSection};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Rows per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Output root directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Read from a local DuckDB database instead of BigQuery
    #[arg(long)]
    pub duckdb: Option<PathBuf>,

    /// Table name inside the DuckDB database (default: nature)
    #[arg(long, requires = "duckdb")]
    pub table: Option<String>,
}

fn build_source(config: &Config) -> Result<Box<dyn RecordSource>> {
    if let Some(duckdb) = &config.duckdb {
        return Ok(Box::new(DuckDbSource::open(&duckdb.path, &duckdb.table)?));
    }
    let auth = google_auth(config)?;
    let project = config.billing_project(auth.credentials.project_id.as_deref())?;
    let source = BigQuerySource::new(config.bigquery_config(project), auth.client, auth.token)?;
    Ok(Box::new(source))
}

pub fn run(args: FetchArgs, config: &mut Config, progress: &SharedProgress) -> Result<()> {
    if let Some(batch_size) = args.batch_size {
        config.ingest.batch_size = batch_size;
    }
    if let Some(output) = args.output {
        config.ingest.output_dir = output;
    }
    if let Some(path) = args.duckdb {
        config.duckdb = Some(DuckDbSection {
            path,
            table: args.table.unwrap_or_else(|| "nature".to_string()),
        });
    }
    config.validate()?;

    let source = build_source(config)?;
    let mut cursor = JsonFileStore::new(config.cursor_path());

    match run_batch(&config.ingest_config(), source.as_ref(), &mut cursor, progress)? {
        BatchOutcome::Written {
            offset,
            rows,
            next_offset,
            path,
        } => {
            log::info!(
                "Batch at offset {} done: {} rows -> {} (next offset {})",
                fmt_num(offset),
                fmt_num(rows as u64),
                path.display(),
                fmt_num(next_offset)
            );
            println!("{}", path.display());
        }
        BatchOutcome::Exhausted { offset } => {
            log::info!(
                "All records processed: nothing left at offset {}",
                fmt_num(offset)
            );
        }
    }
    Ok(())
}
