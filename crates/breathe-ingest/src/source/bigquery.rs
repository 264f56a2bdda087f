//! BigQuery REST source (`jobs.query` + `jobs.getQueryResults`)

use anyhow::{Context, Result, bail};
use breathe_core::{HttpClient, RemoteError, RetryPolicy, TokenProvider, retry_with_backoff};
use indicatif::ProgressBar;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::BigQueryConfig;
use crate::query::{Dialect, batch_query};
use crate::schema::{FIELDS, Record, RecordBatch};
use crate::source::RecordSource;

/// How long the server may hold each request waiting for the job.
const SERVER_WAIT_MS: u64 = 60_000;

/// Incomplete-job polls before giving up on one fetch.
const MAX_POLLS: u32 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: [QueryParameter; 2],
    max_results: usize,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameter {
    name: &'static str,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: String,
}

impl QueryParameter {
    /// INT64 parameters travel as decimal strings.
    fn int64(name: &'static str, value: u64) -> Self {
        Self {
            name,
            parameter_type: ParameterType { kind: "INT64" },
            parameter_value: ParameterValue {
                value: value.to_string(),
            },
        }
    }
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

/// Position of each of [`FIELDS`] in the result schema.
fn column_positions(schema: &TableSchema) -> Result<[usize; 6]> {
    let mut positions = [0usize; 6];
    for (slot, field) in positions.iter_mut().zip(FIELDS) {
        *slot = schema
            .fields
            .iter()
            .position(|f| f.name == field)
            .with_context(|| format!("result schema has no column {field:?}"))?;
    }
    Ok(positions)
}

fn cell_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode_rows(rows: &[TableRow], positions: &[usize; 6], out: &mut RecordBatch) -> Result<()> {
    for row in rows {
        let values = positions
            .iter()
            .map(|&i| row.f.get(i).map(|cell| cell_text(&cell.v)))
            .collect::<Option<Vec<_>>>()
            .context("result row is narrower than its schema")?;
        out.push(Record::from_values(values).context("row width does not match schema")?);
    }
    Ok(())
}

/// Batch fetcher over the public BigQuery table.
pub struct BigQuerySource {
    config: BigQueryConfig,
    client: HttpClient,
    token: Box<dyn TokenProvider>,
    sql: String,
}

impl BigQuerySource {
    pub fn new(
        config: BigQueryConfig,
        client: HttpClient,
        token: Box<dyn TokenProvider>,
    ) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            bail!("BigQuery billing project is not set");
        }
        let sql = batch_query(Dialect::BigQuery, &config.table_ref())?;
        Ok(Self {
            config,
            client,
            token,
            sql,
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.client.config().max_retries)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = breathe_core::http::parse_url(&self.config.api_base)?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Decode("API base cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request_body(&self, offset: u64, limit: usize) -> QueryRequest<'_> {
        QueryRequest {
            query: &self.sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: [
                QueryParameter::int64("limit", limit as u64),
                QueryParameter::int64("offset", offset),
            ],
            max_results: limit,
            timeout_ms: SERVER_WAIT_MS,
            location: self.config.location.as_deref(),
        }
    }

    fn start_query(
        &self,
        token: &str,
        offset: u64,
        limit: usize,
        pb: &ProgressBar,
    ) -> Result<QueryResponse, RemoteError> {
        let url = self.endpoint(&["projects", &self.config.project_id, "queries"])?;
        let body = self.request_body(offset, limit);
        retry_with_backoff("bigquery query", self.retry_policy(), pb, || {
            self.client.post_json(url.clone(), token, &body)
        })
    }

    fn query_results(
        &self,
        token: &str,
        job: &JobReference,
        page_token: Option<&str>,
        limit: usize,
        pb: &ProgressBar,
    ) -> Result<QueryResponse, RemoteError> {
        let mut url = self.endpoint(&["projects", &job.project_id, "queries", &job.job_id])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("maxResults", &limit.to_string());
            query.append_pair("timeoutMs", &SERVER_WAIT_MS.to_string());
            if let Some(location) = job.location.as_deref() {
                query.append_pair("location", location);
            }
            if let Some(page_token) = page_token {
                query.append_pair("pageToken", page_token);
            }
        }
        retry_with_backoff("bigquery results", self.retry_policy(), pb, || {
            self.client.get_json(url.clone(), token)
        })
    }
}

impl RecordSource for BigQuerySource {
    fn describe(&self) -> String {
        format!("bigquery:{}", self.config.table_ref())
    }

    fn fetch(&self, offset: u64, limit: usize, pb: &ProgressBar) -> Result<RecordBatch> {
        let token = self
            .token
            .access_token()
            .context("Failed to obtain access token")?;

        pb.set_message(format!("query at offset {offset}"));
        let mut page = self
            .start_query(&token, offset, limit, pb)
            .context("BigQuery query failed")?;
        let job = page.job_reference.clone();

        let mut batch = Vec::with_capacity(limit);
        let mut positions = None;
        let mut polls = 0;
        loop {
            let page_token = if page.job_complete {
                let columns = match positions {
                    Some(p) => p,
                    None => {
                        let schema = page.schema.as_ref().context("result has no schema")?;
                        column_positions(schema)?
                    }
                };
                positions = Some(columns);
                decode_rows(&page.rows, &columns, &mut batch)?;
                pb.set_message(format!("offset {offset}: {} rows", batch.len()));
                match page.page_token.take() {
                    Some(t) => t,
                    None => break,
                }
            } else {
                polls += 1;
                if polls > MAX_POLLS {
                    bail!("BigQuery job still running after {MAX_POLLS} polls");
                }
                log::debug!("BigQuery job incomplete, polling ({polls}/{MAX_POLLS})");
                String::new()
            };

            let job = job.as_ref().context("incomplete result without job reference")?;
            let page_token = Some(page_token.as_str()).filter(|t| !t.is_empty());
            page = self
                .query_results(&token, job, page_token, limit, pb)
                .context("BigQuery getQueryResults failed")?;
        }

        if batch.len() > limit {
            bail!("BigQuery returned {} rows for LIMIT {limit}", batch.len());
        }
        Ok(batch)
    }
}
