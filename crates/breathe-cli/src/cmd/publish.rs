//! Publish subcommand - mirror the output tree to Cloud Storage

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use breathe_core::{SharedProgress, fmt_num};
use breathe_publish::{GcsConfig, GcsStore, MemoryStore, ObjectStore, mirror_dir};

use crate::cmd::google_auth;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Local directory to upload (default: ingest.output_dir)
    pub dir: Option<PathBuf>,

    /// Object key prefix (default: publish.prefix)
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Target bucket (default: publish.bucket)
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// List what would be uploaded without uploading
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: PublishArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let root = args.dir.unwrap_or_else(|| config.ingest.output_dir.clone());
    let prefix = args.prefix.unwrap_or_else(|| config.publish.prefix.clone());
    let bucket = args.bucket.unwrap_or_else(|| config.publish.bucket.clone());

    let store: Box<dyn ObjectStore> = if args.dry_run {
        Box::new(MemoryStore::new())
    } else {
        let auth = google_auth(config)?;
        Box::new(GcsStore::new(GcsConfig::new(&bucket), auth.client, auth.token))
    };

    let summary = mirror_dir(&root, &prefix, store.as_ref(), args.dry_run, progress)?;
    for (key, _) in &summary.keys {
        println!("gs://{bucket}/{key}");
    }
    log::info!(
        "{} {} files to gs://{bucket}",
        if args.dry_run { "Would upload" } else { "Uploaded" },
        fmt_num(summary.files as u64)
    );
    Ok(())
}
