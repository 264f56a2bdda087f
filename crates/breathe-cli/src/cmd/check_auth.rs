//! check-auth subcommand - prove the credentials work by listing buckets

use anyhow::{Context, Result};

use breathe_core::SharedProgress;
use breathe_publish::{GcsConfig, GcsStore};

use crate::cmd::google_auth;
use crate::config::Config;

pub fn run(config: &Config, progress: &SharedProgress) -> Result<()> {
    let auth = google_auth(config)?;
    let project = config.billing_project(auth.credentials.project_id.as_deref())?;
    let store = GcsStore::new(
        GcsConfig::new(&config.publish.bucket),
        auth.client,
        auth.token,
    );

    let pb = progress.stage_line("auth");
    pb.set_message(format!("listing buckets in {project}"));
    let buckets = store.list_buckets(&project, &pb);
    pb.finish_and_clear();
    let buckets = buckets.with_context(|| format!("Failed to list buckets in {project}"))?;

    log::info!("Successfully listed {} buckets", buckets.len());
    for name in &buckets {
        println!("- {name}");
    }
    if !buckets.iter().any(|b| b == &config.publish.bucket) {
        log::warn!(
            "Publish bucket {} is not among the listed buckets",
            config.publish.bucket
        );
    }
    Ok(())
}
