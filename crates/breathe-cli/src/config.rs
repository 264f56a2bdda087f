//! Configuration loading.
//!
//! Layers, lowest to highest: built-in defaults, TOML file, `.env` file,
//! process environment, command-line flags (applied in `main`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use breathe_ingest::config::DEFAULT_BATCH_SIZE;

/// Global configuration for breathe
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub bigquery: BigQuerySection,
    pub ingest: IngestSection,
    pub auth: AuthSection,
    pub publish: PublishSection,
    pub http: HttpSection,
    pub duckdb: Option<DuckDbSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BigQuerySection {
    /// Billing project; falls back to the credential file's project
    #[serde(deserialize_with = "deserialize_env_var")]
    pub project_id: Option<String>,
    pub source_project: String,
    pub dataset: String,
    pub table: String,
    pub location: Option<String>,
}

impl Default for BigQuerySection {
    fn default() -> Self {
        Self {
            project_id: None,
            source_project: "bigquery-public-data".to_string(),
            dataset: "breathe".to_string(),
            table: "nature".to_string(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub batch_size: usize,
    pub output_dir: PathBuf,
    /// Defaults to `<output_dir>/progress.json`
    pub cursor_path: Option<PathBuf>,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            output_dir: PathBuf::from("./data"),
            cursor_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthSection {
    #[serde(deserialize_with = "deserialize_env_path")]
    pub credentials_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishSection {
    pub bucket: String,
    pub prefix: String,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            bucket: "bio-med".to_string(),
            prefix: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Whole-request timeout in seconds
    pub timeout: u64,
    pub max_retries: u32,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout: 120,
            max_retries: 3,
        }
    }
}

/// Read batches from a local DuckDB file instead of BigQuery.
#[derive(Debug, Clone, Deserialize)]
pub struct DuckDbSection {
    pub path: PathBuf,
    #[serde(default = "default_duckdb_table")]
    pub table: String,
}

fn default_duckdb_table() -> String {
    "nature".to_string()
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

fn deserialize_env_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_env_var(deserializer)?.map(PathBuf::from))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

/// Non-empty, trimmed value of an environment lookup.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from default locations, then apply `.env` and the
    /// process environment.
    ///
    /// File search order:
    /// 1. `explicit` (from `--config`)
    /// 2. ./breathe.toml (current directory)
    /// 3. ~/.config/breathe/config.toml
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to load .env file"),
        }

        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_locations()?,
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_default_locations() -> Result<Self> {
        // Try current directory first
        let local_config = PathBuf::from("breathe.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Try user config directory
        if let Some(config_dir) = directories::ProjectDirs::from("", "", "breathe") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment variables on top of file values.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| non_empty(env(key));

        if let Some(v) = var("GCP_PROJECT_ID") {
            self.bigquery.project_id = Some(v);
        }
        if let Some(v) = var("BREATHE_SOURCE_PROJECT") {
            self.bigquery.source_project = v;
        }
        if let Some(v) = var("BREATHE_DATASET") {
            self.bigquery.dataset = v;
        }
        if let Some(v) = var("BREATHE_TABLE") {
            self.bigquery.table = v;
        }
        if let Some(v) = var("BREATHE_LOCATION") {
            self.bigquery.location = Some(v);
        }
        if let Some(v) = var("BREATHE_BATCH_SIZE") {
            self.ingest.batch_size = v
                .parse()
                .with_context(|| format!("BREATHE_BATCH_SIZE is not a number: {v:?}"))?;
        }
        if let Some(v) = var("BREATHE_OUTPUT_DIR") {
            self.ingest.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("BREATHE_CURSOR_PATH") {
            self.ingest.cursor_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.auth.credentials_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GCS_BUCKET_NAME") {
            self.publish.bucket = v;
        }
        if let Some(v) = var("BREATHE_PUBLISH_PREFIX") {
            self.publish.prefix = v;
        }
        Ok(())
    }

    /// Checks that do not need any remote access.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            bail!("batch size must be a positive integer");
        }
        if self.publish.bucket.trim().is_empty() {
            bail!("publish bucket must not be empty");
        }
        Ok(())
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.ingest
            .cursor_path
            .clone()
            .unwrap_or_else(|| self.ingest_config().default_cursor_path())
    }

    pub fn ingest_config(&self) -> breathe_ingest::IngestConfig {
        breathe_ingest::IngestConfig {
            dataset: self.bigquery.dataset.clone(),
            batch_size: self.ingest.batch_size,
            output_dir: self.ingest.output_dir.clone(),
        }
    }

    pub fn http_config(&self) -> breathe_core::HttpConfig {
        breathe_core::HttpConfig {
            timeout: Duration::from_secs(self.http.timeout),
            max_retries: self.http.max_retries,
            ..Default::default()
        }
    }

    /// Absolute credential file path; required for every remote call.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        let path = self.auth.credentials_path.as_ref().context(
            "No credentials configured: set GOOGLE_APPLICATION_CREDENTIALS or auth.credentials_path",
        )?;
        let path = if path.is_relative() {
            std::env::current_dir()
                .context("Cannot resolve working directory")?
                .join(path)
        } else {
            path.clone()
        };
        if !path.is_file() {
            bail!("Credentials file not found: {}", path.display());
        }
        Ok(path)
    }

    /// Billing project: explicit setting, else the credential file's project.
    pub fn billing_project(&self, credentials_project: Option<&str>) -> Result<String> {
        self.bigquery
            .project_id
            .clone()
            .or_else(|| credentials_project.map(str::to_string))
            .context("No BigQuery project: set GCP_PROJECT_ID or bigquery.project_id")
    }

    pub fn bigquery_config(&self, project_id: String) -> breathe_ingest::BigQueryConfig {
        let mut config = breathe_ingest::BigQueryConfig::new(project_id);
        config.source_project = self.bigquery.source_project.clone();
        config.dataset = self.bigquery.dataset.clone();
        config.table = self.bigquery.table.clone();
        config.location = self.bigquery.location.clone();
        config
    }
}
