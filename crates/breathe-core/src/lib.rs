//! Breathe Core - shared infrastructure for the breathe pipeline
//!
//! Logging, progress display, the blocking HTTP facade used to talk to
//! Google APIs, credential handling, retry policy and crash-safe file sinks.

pub mod credentials;
pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod sink;

// Re-exports for convenience
pub use credentials::{CredentialFile, GcloudToken, StaticToken, TokenProvider, token_provider};
pub use error::RemoteError;
pub use http::{HttpClient, HttpConfig, SHARED_RUNTIME};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use sink::{AtomicFile, CsvSink, JsonLinesSink, cleanup_tmp_files, write_json_atomic};
