//! Backend adapters
//!
//! A [`Sink`] accepts structured entries produced by correlation nodes and the
//! request middleware and writes them to one backend. Three backends are
//! provided:
//!
//! - [`stream::StreamSink`] - one JSON object per line (stdout by default)
//! - [`cloud::CloudSink`] - cloud logging API entries with a five-level severity
//! - [`console::ConsoleSink`] - human-readable, optionally colored lines
//!
//! [`memory::MemorySink`] records entries in memory for tests.

pub mod cloud;
pub mod console;
pub mod memory;
pub mod stream;

pub use cloud::{CloudClient, CloudEntry, CloudHttpRequest, CloudSink, JsonLinesClient};
pub use console::ConsoleSink;
pub use memory::MemorySink;
pub use stream::StreamSink;

use crate::attributes::{Attributes, ReservedKeys};
use crate::config::{ExporterConfig, ExporterKind};
use crate::severity::Severity;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Message of every parent (summary) entry.
pub const PARENT_LOG_ENTRY: &str = "Parent Log Entry";

/// Field names populated by the middleware.
pub mod keys {
    pub const TRACE_ID: &str = "trace_id";
    pub const SPAN_ID: &str = "span_id";
    pub const HTTP_ELAPSED: &str = "http.elapsed";
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const HTTP_RESPONSE_LENGTH: &str = "http.response.length";
    pub const HTTP_USER_AGENT: &str = "http.user_agent";
    pub const HTTP_REMOTE_IP: &str = "http.remote_ip";
    pub const HTTP_SCHEME: &str = "http.scheme";
    pub const HTTP_PROTO: &str = "http.proto";
}

/// Request keys reserved on every backend.
pub const COMMON_REQUEST_KEYS: [&str; 11] = [
    keys::TRACE_ID,
    keys::SPAN_ID,
    keys::HTTP_ELAPSED,
    keys::HTTP_METHOD,
    keys::HTTP_URL,
    keys::HTTP_STATUS_CODE,
    keys::HTTP_RESPONSE_LENGTH,
    keys::HTTP_USER_AGENT,
    keys::HTTP_REMOTE_IP,
    keys::HTTP_SCHEME,
    keys::HTTP_PROTO,
];

/// Errors raised while writing an entry.
///
/// Sinks report them, but callers in this crate never propagate them:
/// a failed write must not change how a request is handled.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Cloud logging client error: {0}")]
    Client(String),
}

/// A child (trace) log entry: one per Debug/Info/Warn/Error call.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: &'a str,
    /// Correlation ID of the request
    pub trace_id: &'a str,
    pub span_id: &'a str,
    pub sampled: bool,
    pub attributes: &'a Attributes,
}

/// HTTP metadata of a finished request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequestInfo {
    pub method: String,
    pub url: String,
    pub path: String,
    pub status: u16,
    pub request_size: u64,
    pub response_size: u64,
    pub user_agent: String,
    pub remote_ip: String,
    pub scheme: String,
    pub protocol: String,
    pub latency: Duration,
}

/// The parent (summary) entry emitted once per request.
#[derive(Debug, Clone)]
pub struct ParentEntry<'a> {
    /// When the request started
    pub timestamp: DateTime<Utc>,
    /// Aggregate severity after the status floor; `None` renders as the
    /// backend's baseline
    pub severity: Option<Severity>,
    pub message: &'a str,
    pub trace_id: &'a str,
    pub span_id: &'a str,
    pub sampled: bool,
    pub log_count: usize,
    pub http: &'a HttpRequestInfo,
    pub attributes: &'a Attributes,
}

/// Destination for correlated log entries.
pub trait Sink: Send + Sync + 'static {
    /// Short backend name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Keys this backend populates itself.
    fn reserved_keys(&self) -> ReservedKeys;

    /// Format a trace ID into the correlation ID written on every entry.
    fn correlation_id(&self, trace_id: &str) -> String {
        trace_id.to_string()
    }

    /// Trace ID from a backend-specific legacy propagation header.
    fn legacy_trace_id(&self, _headers: &HeaderMap) -> Option<String> {
        None
    }

    /// Write a child entry.
    fn log(&self, entry: &Entry<'_>) -> Result<(), SinkError>;

    /// Write the parent entry of a request.
    fn log_parent(&self, entry: &ParentEntry<'_>) -> Result<(), SinkError>;
}

/// Output stream shared by every request handled by a sink.
///
/// Each entry is written and flushed under one lock so lines never interleave.
pub struct SharedWriter {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl SharedWriter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedWriter").finish_non_exhaustive()
    }
}

/// Build the sink selected by `config`, writing to the process streams.
pub fn from_config(config: &ExporterConfig) -> Arc<dyn Sink> {
    match config.kind {
        ExporterKind::Stream => Arc::new(StreamSink::stdout()),
        ExporterKind::Cloud => Arc::new(CloudSink::new(
            JsonLinesClient::new(SharedWriter::stdout()),
            config.project_id.clone(),
        )),
        ExporterKind::Console => Arc::new(ConsoleSink::stderr().no_color(config.no_color)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExporterConfig;

    #[test]
    fn test_from_config_selects_backend() {
        let mut config = ExporterConfig::default();
        assert_eq!(from_config(&config).name(), "stream");

        config.kind = ExporterKind::Cloud;
        config.project_id = Some("my-project".to_string());
        let sink = from_config(&config);
        assert_eq!(sink.name(), "cloud");
        assert_eq!(
            sink.correlation_id("abc"),
            "projects/my-project/traces/abc"
        );

        config.kind = ExporterKind::Console;
        assert_eq!(from_config(&config).name(), "console");
    }

    #[test]
    fn test_shared_writer_appends_newline() {
        let capture = testing::Capture::default();
        let writer = capture.writer();
        writer.write_line("one").unwrap();
        writer.write_line("two").unwrap();
        assert_eq!(capture.lines(), vec!["one", "two"]);
    }
}
