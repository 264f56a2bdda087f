//! Credential file inspection and OAuth access-token providers.
//!
//! Minting tokens from a service-account key is delegated to an external
//! provider: either a pre-issued token in the environment or the `gcloud` CLI.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use serde::Deserialize;

use crate::error::RemoteError;

/// Environment variable holding a pre-issued OAuth access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// The fields of a Google credential JSON file the pipeline cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialFile {
    /// `service_account`, `authorized_user`, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub project_id: Option<String>,
    pub client_email: Option<String>,
}

impl CredentialFile {
    /// Read and validate a credential file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("cannot read credentials {}: {e}", path.display()),
            )
        })?;
        serde_json::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid credentials {}: {e}", path.display()),
            )
        })
    }

    /// Human-readable principal for logs.
    pub fn principal(&self) -> &str {
        self.client_email.as_deref().unwrap_or(&self.kind)
    }
}

/// Source of bearer tokens for Google APIs.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String, RemoteError>;
}

/// A token handed in from outside (env var, tests).
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Result<String, RemoteError> {
        Ok(self.0.clone())
    }
}

/// Asks `gcloud auth print-access-token` for a token, pointing it at the
/// configured credential file. The token is cached for the process lifetime.
#[derive(Debug)]
pub struct GcloudToken {
    credentials_path: PathBuf,
    cached: Mutex<Option<String>>,
}

impl GcloudToken {
    pub fn new(credentials_path: &Path) -> Self {
        Self {
            credentials_path: credentials_path.to_path_buf(),
            cached: Mutex::new(None),
        }
    }

    fn mint(&self) -> Result<String, RemoteError> {
        log::debug!(
            "Requesting access token from gcloud for {}",
            self.credentials_path.display()
        );
        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .env(
                "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE",
                &self.credentials_path,
            )
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemoteError::Http {
                status: Some(401),
                message: format!("gcloud could not mint a token: {}", stderr.trim()),
            });
        }
        parse_token_output(&output.stdout)
    }
}

impl TokenProvider for GcloudToken {
    fn access_token(&self) -> Result<String, RemoteError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| RemoteError::Decode("token cache poisoned".into()))?;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.mint()?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

fn parse_token_output(stdout: &[u8]) -> Result<String, RemoteError> {
    let token = String::from_utf8_lossy(stdout).trim().to_string();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(RemoteError::Decode(
            "gcloud returned an empty or malformed token".into(),
        ));
    }
    Ok(token)
}

/// Pick a provider: explicit token wins, otherwise gcloud with the credential file.
pub fn token_provider(
    credentials_path: &Path,
    env_token: Option<String>,
) -> Box<dyn TokenProvider> {
    match env_token.filter(|t| !t.trim().is_empty()) {
        Some(token) => {
            log::debug!("Using access token from {ACCESS_TOKEN_ENV}");
            Box::new(StaticToken::new(token.trim()))
        }
        None => Box::new(GcloudToken::new(credentials_path)),
    }
}
