//! Error type for calls against remote Google APIs

use std::fmt;

/// Failure talking to a remote service (BigQuery, Cloud Storage, token provider).
///
/// Carries just enough to decide whether retrying the whole request is useful.
#[derive(Debug)]
pub enum RemoteError {
    /// HTTP error with optional status code (None = connect/timeout/transport)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Local I/O while preparing or streaming a request
    Io(std::io::Error),
    /// Response arrived but could not be understood
    Decode(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Decode(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl RemoteError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            // No status: connection refused, reset, timed out
            Self::Http { status: None, .. } => true,
            Self::Http {
                status: Some(s), ..
            } => matches!(s, 408 | 429 | 500..=599),
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
            Self::Decode(_) => false,
        }
    }

    /// Authentication or authorization was rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Http {
                status: Some(401 | 403),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    fn http_err(status: u16) -> RemoteError {
        RemoteError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn client_errors_not_retryable() {
        for status in [400, 401, 403, 404] {
            assert!(!http_err(status).is_retryable(), "{status}");
        }
    }

    #[test]
    fn server_errors_and_throttling_retryable() {
        for status in [408, 429, 500, 502, 503] {
            assert!(http_err(status).is_retryable(), "{status}");
        }
    }

    #[test]
    fn transport_error_retryable() {
        let err = RemoteError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn storage_full_not_retryable() {
        let err = RemoteError::Io(std::io::Error::new(ErrorKind::StorageFull, "disk full"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn decode_not_retryable() {
        assert!(!RemoteError::Decode("missing rows".into()).is_retryable());
    }

    #[test]
    fn auth_failure_detection() {
        assert!(http_err(401).is_auth_failure());
        assert!(http_err(403).is_auth_failure());
        assert!(!http_err(500).is_auth_failure());
    }

    #[test]
    fn display_formats() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
        let err = RemoteError::Http {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: timeout");
        assert!(format!("{}", RemoteError::Decode("x".into())).contains("malformed"));
    }
}
