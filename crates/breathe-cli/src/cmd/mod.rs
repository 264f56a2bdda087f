pub mod check_auth;
pub mod convert;
pub mod fetch;
pub mod publish;
pub mod status;

use anyhow::{Context, Result};
use breathe_core::{CredentialFile, HttpClient, TokenProvider, token_provider};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

/// Everything needed to call a Google API.
pub struct GoogleAuth {
    pub client: HttpClient,
    pub token: Box<dyn TokenProvider>,
    pub credentials: CredentialFile,
}

/// Resolve credentials and build the HTTP client. Fails before any state
/// is touched when the credential file is missing or unreadable.
pub fn google_auth(config: &Config) -> Result<GoogleAuth> {
    let path = config.credentials_path()?;
    let credentials = CredentialFile::load(&path)?;
    log::info!(
        "Using credentials {} ({})",
        path.display(),
        credentials.principal()
    );
    let client = HttpClient::new(config.http_config()).context("Failed to build HTTP client")?;
    let token = token_provider(
        &path,
        std::env::var(breathe_core::credentials::ACCESS_TOKEN_ENV).ok(),
    );
    Ok(GoogleAuth {
        client,
        token,
        credentials,
    })
}

fn header(table: &mut Table, columns: &[&str]) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
}

/// Table with the shared preset and a cyan header row.
pub fn new_table(columns: &[&str]) -> Table {
    let mut table = Table::new();
    header(&mut table, columns);
    table
}

pub fn show_config(config: &Config) {
    let mut table = new_table(&["Setting", "Value"]);

    table.add_row(vec![
        "BigQuery project",
        config.bigquery.project_id.as_deref().unwrap_or("(from credentials)"),
    ]);
    table.add_row(vec![
        "Source table",
        &format!(
            "{}.{}.{}",
            config.bigquery.source_project, config.bigquery.dataset, config.bigquery.table
        ),
    ]);
    table.add_row(vec![
        "Location",
        config.bigquery.location.as_deref().unwrap_or("auto"),
    ]);
    table.add_row(vec!["Batch size", &config.ingest.batch_size.to_string()]);
    table.add_row(vec![
        "Output directory",
        &config.ingest.output_dir.display().to_string(),
    ]);
    table.add_row(vec!["Cursor", &config.cursor_path().display().to_string()]);
    table.add_row(vec![
        "Credentials",
        &config
            .auth
            .credentials_path
            .as_ref()
            .map_or_else(|| "not set".to_string(), |p| p.display().to_string()),
    ]);
    table.add_row(vec![
        "Access token",
        if std::env::var(breathe_core::credentials::ACCESS_TOKEN_ENV).is_ok() {
            "configured"
        } else {
            "via gcloud"
        },
    ]);
    table.add_row(vec!["Bucket", &config.publish.bucket]);
    table.add_row(vec!["Key prefix", &config.publish.prefix]);
    table.add_row(vec!["Timeout", &format!("{}s", config.http.timeout)]);
    table.add_row(vec!["Max retries", &config.http.max_retries.to_string()]);
    if let Some(duckdb) = &config.duckdb {
        table.add_row(vec![
            "DuckDB source",
            &format!("{} ({})", duckdb.path.display(), duckdb.table),
        ]);
    }

    eprintln!("\n{table}");
}
