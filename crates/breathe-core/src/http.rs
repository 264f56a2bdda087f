//! Blocking JSON-over-HTTP facade for Google REST APIs.
//!
//! Uses async reqwest internally on a small shared tokio runtime, but presents
//! a sync interface so the pipeline stays a plain sequential program.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::RemoteError;

/// Longest error body excerpt kept in an error message
const MAX_ERROR_BODY: usize = 300;

/// HTTP settings passed to every client at construction.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout (long BigQuery queries block server-side)
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Authenticated JSON client with connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| RemoteError::from_reqwest(&e))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// GET `url` with a bearer token and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(&self, url: Url, token: &str) -> Result<T, RemoteError> {
        self.send(self.client.get(url).bearer_auth(token))
    }

    /// POST a JSON body and decode the JSON response.
    pub fn post_json<B, T>(&self, url: Url, token: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.client.post(url).bearer_auth(token).json(body))
    }

    /// POST raw bytes (media upload) and decode the JSON response.
    pub fn post_bytes<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<T, RemoteError> {
        self.send(
            self.client
                .post(url)
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body),
        )
    }

    fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, RemoteError> {
        SHARED_RUNTIME.handle().block_on(async {
            let response = request
                .send()
                .await
                .map_err(|e| RemoteError::from_reqwest(&e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Http {
                    status: Some(status.as_u16()),
                    message: error_message(&body),
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| RemoteError::from_reqwest(&e))?;
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
        })
    }
}

/// Parse a URL built from configuration values.
pub fn parse_url(url: &str) -> Result<Url, RemoteError> {
    Url::parse(url).map_err(|e| RemoteError::Decode(format!("invalid URL {url}: {e}")))
}

/// Extract `error.message` from a Google API error body, falling back to
/// a truncated copy of the raw body.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    if let Some(msg) = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(|m| m.as_str())
    {
        return msg.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_from_google_body() {
        let body = r#"{"error":{"code":403,"message":"Access Denied: Table x","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(error_message(body), "Access Denied: Table x");
    }

    #[test]
    fn error_message_plain_text() {
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn error_message_empty() {
        assert_eq!(error_message(""), "empty response body");
    }

    #[test]
    fn error_message_truncates_long_body() {
        let body = "x".repeat(1000);
        let msg = error_message(&body);
        assert!(msg.ends_with("..."));
        assert_eq!(msg.len(), MAX_ERROR_BODY + 3);
    }

    #[test]
    fn parse_url_rejects_garbage() {
        assert!(parse_url("not a url").is_err());
        assert!(parse_url("https://bigquery.googleapis.com/bigquery/v2/").is_ok());
    }

    #[test]
    fn default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(120));
    }
}
