//! Status subcommand - cursor position and artifact inventory

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use breathe_core::fmt_num;
use breathe_ingest::{CsvState, JsonFileStore, OffsetStore, inspect};

use crate::cmd::new_table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output root to inspect (default: ingest.output_dir)
    pub dir: Option<PathBuf>,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let root = args.dir.unwrap_or_else(|| config.ingest.output_dir.clone());
    let cursor = JsonFileStore::new(config.cursor_path());
    let offset = cursor.read()?;
    let samples = inspect(&root, &config.bigquery.dataset)?;

    let mut table = new_table(&["Offset", "Rows", "CSV", "JSON Lines"]);
    let mut total_rows = 0u64;
    for sample in &samples {
        let (rows, csv) = match &sample.csv {
            CsvState::Rows(n) => {
                total_rows += *n as u64;
                (fmt_num(*n as u64), "yes".to_string())
            }
            CsvState::Missing => ("-".to_string(), "missing".to_string()),
            CsvState::Unreadable(reason) => ("-".to_string(), format!("unreadable: {reason}")),
        };
        table.add_row(vec![
            fmt_num(sample.offset),
            rows,
            csv,
            if sample.has_json { "yes" } else { "no" }.to_string(),
        ]);
    }

    eprintln!("\nCursor: {} ({})", fmt_num(offset), cursor.path().display());
    eprintln!(
        "Batches: {} in {}, {} rows",
        samples.len(),
        root.display(),
        fmt_num(total_rows)
    );
    if !samples.is_empty() {
        eprintln!("{table}");
    }
    Ok(())
}
