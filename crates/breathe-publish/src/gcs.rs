//! Google Cloud Storage via the JSON API (single-request media uploads)

use std::path::Path;

use breathe_core::{HttpClient, RemoteError, RetryPolicy, TokenProvider, retry_with_backoff};
use indicatif::ProgressBar;
use reqwest::Url;
use serde::Deserialize;

use crate::store::ObjectStore;

/// Bucket and endpoints for [`GcsStore`].
#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub bucket: String,
    pub api_base: String,
    pub upload_base: String,
}

impl GcsConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            api_base: "https://storage.googleapis.com/storage/v1/".to_string(),
            upload_base: "https://storage.googleapis.com/upload/storage/v1/".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketList {
    #[serde(default)]
    items: Vec<BucketResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BucketResource {
    name: String,
}

/// Content type from the file extension.
fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn endpoint(base: &str, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = breathe_core::http::parse_url(base)?;
    url.path_segments_mut()
        .map_err(|_| RemoteError::Decode(format!("cannot extend URL {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub struct GcsStore {
    config: GcsConfig,
    client: HttpClient,
    token: Box<dyn TokenProvider>,
}

impl GcsStore {
    pub fn new(config: GcsConfig, client: HttpClient, token: Box<dyn TokenProvider>) -> Self {
        Self {
            config,
            client,
            token,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.client.config().max_retries)
    }

    fn upload_url(&self, key: &str) -> Result<Url, RemoteError> {
        let mut url = endpoint(&self.config.upload_base, &["b", &self.config.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    /// Names of every bucket in `project` the credentials can see.
    pub fn list_buckets(&self, project: &str, pb: &ProgressBar) -> Result<Vec<String>, RemoteError> {
        let token = self.token.access_token()?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = endpoint(&self.config.api_base, &["b"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("project", project);
                if let Some(t) = page_token.as_deref() {
                    query.append_pair("pageToken", t);
                }
            }
            let page: BucketList = retry_with_backoff("list buckets", self.retry_policy(), pb, || {
                self.client.get_json(url.clone(), &token)
            })?;
            names.extend(page.items.into_iter().map(|b| b.name));
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }
        Ok(names)
    }
}

impl ObjectStore for GcsStore {
    fn describe(&self) -> String {
        format!("gs://{}", self.config.bucket)
    }

    fn put_file(&self, key: &str, path: &Path, pb: &ProgressBar) -> Result<(), RemoteError> {
        let token = self.token.access_token()?;
        let url = self.upload_url(key)?;
        let body = std::fs::read(path)?;
        let content_type = content_type(path);
        let object: ObjectResource = retry_with_backoff("upload", self.retry_policy(), pb, || {
            self.client
                .post_bytes(url.clone(), &token, content_type, body.clone())
        })?;
        log::debug!("Stored {} ({} bytes)", object.name, body.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathe_core::{HttpConfig, StaticToken};

    fn store() -> GcsStore {
        GcsStore::new(
            GcsConfig::new("bio-med"),
            HttpClient::new(HttpConfig::default()).unwrap(),
            Box::new(StaticToken::new("t")),
        )
    }

    #[test]
    fn upload_url_encodes_key() {
        let url = store()
            .upload_url("data/sample_0/breathe_dataset_offset_0.csv")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/upload/storage/v1/b/bio-med/o\
             ?uploadType=media&name=data%2Fsample_0%2Fbreathe_dataset_offset_0.csv"
        );
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a/b.csv")), "text/csv");
        assert_eq!(content_type(Path::new("b.json")), "application/json");
        assert_eq!(content_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn describe_is_gs_url() {
        assert_eq!(store().describe(), "gs://bio-med");
    }

    #[test]
    fn bucket_list_parses_pages() {
        let page: BucketList = serde_json::from_str(
            r#"{"kind":"storage#buckets","items":[{"name":"bio-med"},{"name":"other"}],"nextPageToken":"abc"}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let empty: BucketList = serde_json::from_str(r#"{"kind":"storage#buckets"}"#).unwrap();
        assert!(empty.items.is_empty());
    }
}
