//! breathe - resumable extraction of the breathe paper dataset
//!
//! Pulls one cleaned batch per `fetch` from BigQuery (or a local DuckDB copy),
//! derives JSON Lines files with `convert`, and mirrors the output tree to
//! Cloud Storage with `publish`.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "breathe")]
#[command(about = "Resumable extraction, cleaning and publishing of the breathe dataset")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./breathe.toml or ~/.config/breathe/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, clean and write the next batch, then advance the cursor
    Fetch(cmd::fetch::FetchArgs),
    /// Derive JSON Lines files from written CSV batches
    Convert(cmd::convert::ConvertArgs),
    /// Upload the output tree to Cloud Storage
    Publish(cmd::publish::PublishArgs),
    /// Show cursor position and batch artifacts
    Status(cmd::status::StatusArgs),
    /// List buckets visible to the configured credentials
    CheckAuth,
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(breathe_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, spinners show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    breathe_core::init_logging(quiet, cli.debug, multi);

    let mut config = Config::load(cli.config.as_deref())?;

    // CLI overrides for HTTP settings
    if let Some(timeout) = cli.timeout {
        config.http.timeout = timeout;
    }
    if let Some(max_retries) = cli.max_retries {
        config.http.max_retries = max_retries;
    }

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &mut config, &progress),
        Command::Convert(args) => cmd::convert::run(args, &config, &progress),
        Command::Publish(args) => cmd::publish::run(args, &config, &progress),
        Command::Status(args) => cmd::status::run(args, &config),
        Command::CheckAuth => cmd::check_auth::run(&config, &progress),
        Command::Config => {
            cmd::show_config(&config);
            Ok(())
        }
    }
}
