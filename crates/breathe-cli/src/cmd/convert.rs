//! Convert subcommand - CSV batches to JSON Lines

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use breathe_core::SharedProgress;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Output root holding sample_<offset>/ directories (default: ingest.output_dir)
    pub dir: Option<PathBuf>,
}

pub fn run(args: ConvertArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let root = args.dir.unwrap_or_else(|| config.ingest.output_dir.clone());
    let summary = breathe_ingest::convert_all(&root, &config.bigquery.dataset, progress)?;

    if summary.failed() > 0 {
        bail!("{} batch(es) failed to convert", summary.failed());
    }
    Ok(())
}
