//! Cloud logging API backend
//!
//! Entries carry the cloud's five-level severity, a project-scoped trace
//! reference and, for parent entries, a separate `httpRequest` object. The
//! transport is behind [`CloudClient`]; [`JsonLinesClient`] writes the
//! structured-logging JSON format that the cloud's logging agents ingest from
//! stdout.

use super::{Entry, ParentEntry, SharedWriter, Sink, SinkError, COMMON_REQUEST_KEYS};
use crate::attributes::{Attributes, ReservedKeys};
use crate::severity::CloudSeverity;
use crate::trace::is_hex_id;
use axum::http::HeaderMap;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Log receiving parent (summary) entries.
pub const PARENT_LOG_NAME: &str = "request_parent_log";
/// Log receiving child (trace) entries.
pub const CHILD_LOG_NAME: &str = "request_child_log";
/// Legacy propagation header: `TRACE_ID/SPAN_ID;o=OPTIONS`.
pub const CLOUD_TRACE_HEADER: &str = "x-cloud-trace-context";

const MESSAGE_KEY: &str = "message";
const SEVERITY_KEY: &str = "severity";
const TIME_KEY: &str = "time";
const TRACE_KEY: &str = "logging.googleapis.com/trace";
const SPAN_ID_KEY: &str = "logging.googleapis.com/spanId";
const TRACE_SAMPLED_KEY: &str = "logging.googleapis.com/trace_sampled";
const LABELS_KEY: &str = "logging.googleapis.com/labels";
const HTTP_REQUEST_KEY: &str = "httpRequest";

// Top-level fields written by `JsonLinesClient`; the payload is flattened
// beside them.
const RESERVED_ATTRIBUTE_KEYS: [&str; 8] = [
    MESSAGE_KEY,
    SEVERITY_KEY,
    TIME_KEY,
    TRACE_KEY,
    SPAN_ID_KEY,
    TRACE_SAMPLED_KEY,
    LABELS_KEY,
    HTTP_REQUEST_KEY,
];

const RESERVED_REQUEST_KEYS: [&str; 19] = [
    MESSAGE_KEY,
    SEVERITY_KEY,
    TIME_KEY,
    TRACE_KEY,
    SPAN_ID_KEY,
    TRACE_SAMPLED_KEY,
    LABELS_KEY,
    HTTP_REQUEST_KEY,
    COMMON_REQUEST_KEYS[0],
    COMMON_REQUEST_KEYS[1],
    COMMON_REQUEST_KEYS[2],
    COMMON_REQUEST_KEYS[3],
    COMMON_REQUEST_KEYS[4],
    COMMON_REQUEST_KEYS[5],
    COMMON_REQUEST_KEYS[6],
    COMMON_REQUEST_KEYS[7],
    COMMON_REQUEST_KEYS[8],
    COMMON_REQUEST_KEYS[9],
    COMMON_REQUEST_KEYS[10],
];

/// HTTP metadata attached to a parent entry, kept apart from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudHttpRequest {
    pub request_method: String,
    pub request_url: String,
    pub request_size: u64,
    pub status: u16,
    pub response_size: u64,
    pub user_agent: String,
    pub remote_ip: String,
    pub protocol: String,
    /// Duration in seconds with an `s` suffix, e.g. `0.005s`
    pub latency: String,
}

/// One entry as handed to the cloud logging client.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudEntry {
    pub log_name: &'static str,
    pub timestamp: DateTime<Utc>,
    pub severity: CloudSeverity,
    pub trace: String,
    pub span_id: String,
    pub trace_sampled: bool,
    pub payload: Attributes,
    pub http_request: Option<CloudHttpRequest>,
}

/// Transport to the cloud logging service.
pub trait CloudClient: Send + Sync + 'static {
    fn write(&self, entry: CloudEntry) -> Result<(), SinkError>;
}

impl<C: CloudClient + ?Sized> CloudClient for Arc<C> {
    fn write(&self, entry: CloudEntry) -> Result<(), SinkError> {
        (**self).write(entry)
    }
}

/// Backend translating entries into cloud logging API entries.
#[derive(Debug)]
pub struct CloudSink<C> {
    client: C,
    project_id: Option<String>,
}

impl<C: CloudClient> CloudSink<C> {
    /// Create a sink. With a project ID, correlation IDs are formatted as
    /// `projects/<project>/traces/<trace-id>` so entries link to the trace.
    pub fn new(client: C, project_id: Option<String>) -> Self {
        Self { client, project_id }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: CloudClient> Sink for CloudSink<C> {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn reserved_keys(&self) -> ReservedKeys {
        ReservedKeys::new(&RESERVED_ATTRIBUTE_KEYS, &RESERVED_REQUEST_KEYS)
    }

    fn correlation_id(&self, trace_id: &str) -> String {
        match &self.project_id {
            Some(project) => format!("projects/{}/traces/{}", project, trace_id),
            None => trace_id.to_string(),
        }
    }

    fn legacy_trace_id(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(CLOUD_TRACE_HEADER)?.to_str().ok()?;
        let trace_id = value.split('/').next()?.trim().to_ascii_lowercase();
        is_hex_id(&trace_id, 32).then_some(trace_id)
    }

    fn log(&self, entry: &Entry<'_>) -> Result<(), SinkError> {
        let mut payload = entry.attributes.clone();
        payload.insert(MESSAGE_KEY, entry.message);

        self.client.write(CloudEntry {
            log_name: CHILD_LOG_NAME,
            timestamp: entry.timestamp,
            severity: entry.severity.into(),
            trace: entry.trace_id.to_string(),
            span_id: entry.span_id.to_string(),
            trace_sampled: entry.sampled,
            payload,
            http_request: None,
        })
    }

    fn log_parent(&self, entry: &ParentEntry<'_>) -> Result<(), SinkError> {
        let mut payload = entry.attributes.clone();
        payload.insert(MESSAGE_KEY, entry.message);
        let http = entry.http;

        self.client.write(CloudEntry {
            log_name: PARENT_LOG_NAME,
            timestamp: entry.timestamp,
            severity: entry.severity.into(),
            trace: entry.trace_id.to_string(),
            span_id: entry.span_id.to_string(),
            trace_sampled: entry.sampled,
            payload,
            http_request: Some(CloudHttpRequest {
                request_method: http.method.clone(),
                request_url: http.url.clone(),
                request_size: http.request_size,
                status: http.status,
                response_size: http.response_size,
                user_agent: http.user_agent.clone(),
                remote_ip: http.remote_ip.clone(),
                protocol: http.protocol.clone(),
                latency: format!("{}s", http.latency.as_secs_f64()),
            }),
        })
    }
}

#[derive(Serialize)]
struct StructuredRecord<'a> {
    severity: CloudSeverity,
    time: String,
    #[serde(rename = "logging.googleapis.com/trace")]
    trace: &'a str,
    #[serde(rename = "logging.googleapis.com/spanId")]
    span_id: &'a str,
    #[serde(rename = "logging.googleapis.com/trace_sampled")]
    trace_sampled: bool,
    #[serde(rename = "logging.googleapis.com/labels")]
    labels: BTreeMap<&'static str, &'static str>,
    #[serde(rename = "httpRequest", skip_serializing_if = "Option::is_none")]
    http_request: Option<&'a CloudHttpRequest>,
    #[serde(flatten)]
    payload: &'a Attributes,
}

/// Client writing structured-logging JSON lines, one per entry.
#[derive(Debug)]
pub struct JsonLinesClient {
    writer: SharedWriter,
}

impl JsonLinesClient {
    pub fn new(writer: SharedWriter) -> Self {
        Self { writer }
    }
}

impl CloudClient for JsonLinesClient {
    fn write(&self, entry: CloudEntry) -> Result<(), SinkError> {
        let record = StructuredRecord {
            severity: entry.severity,
            time: entry.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            trace: &entry.trace,
            span_id: &entry.span_id,
            trace_sampled: entry.trace_sampled,
            labels: BTreeMap::from([("log_name", entry.log_name)]),
            http_request: entry.http_request.as_ref(),
            payload: &entry.payload,
        };
        let line = serde_json::to_string(&record)?;
        self.writer.write_line(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use crate::sink::testing::{http_info, Capture};
    use crate::sink::PARENT_LOG_ENTRY;
    use axum::http::HeaderValue;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CloudEntry>>);

    impl CloudClient for Recorder {
        fn write(&self, entry: CloudEntry) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(entry);
            Ok(())
        }
    }

    fn child<'a>(severity: Severity, attributes: &'a Attributes) -> Entry<'a> {
        Entry {
            timestamp: Utc::now(),
            severity,
            message: "Message",
            trace_id: "projects/my-project/traces/105445aa7843bc8bf206b12000100000",
            span_id: "00f067aa0ba902b7",
            sampled: true,
            attributes,
        }
    }

    #[test]
    fn test_correlation_id_with_project() {
        let sink = CloudSink::new(Recorder::default(), Some("my-project".to_string()));
        assert_eq!(
            sink.correlation_id("105445aa7843bc8bf206b12000100000"),
            "projects/my-project/traces/105445aa7843bc8bf206b12000100000"
        );

        let bare = CloudSink::new(Recorder::default(), None);
        assert_eq!(bare.correlation_id("abc"), "abc");
    }

    #[test]
    fn test_legacy_trace_header() {
        let sink = CloudSink::new(Recorder::default(), None);
        let mut headers = HeaderMap::new();
        assert!(sink.legacy_trace_id(&headers).is_none());

        headers.insert(
            CLOUD_TRACE_HEADER,
            HeaderValue::from_static("105445aa7843bc8bf206b12000100000/1;o=1"),
        );
        assert_eq!(
            sink.legacy_trace_id(&headers).as_deref(),
            Some("105445aa7843bc8bf206b12000100000")
        );

        headers.insert(CLOUD_TRACE_HEADER, HeaderValue::from_static("not-hex/1"));
        assert!(sink.legacy_trace_id(&headers).is_none());

        headers.insert(CLOUD_TRACE_HEADER, HeaderValue::from_static("1/1;o=1"));
        assert!(sink.legacy_trace_id(&headers).is_none());

        headers.insert(
            CLOUD_TRACE_HEADER,
            HeaderValue::from_static("00000000000000000000000000000000/1;o=1"),
        );
        assert!(sink.legacy_trace_id(&headers).is_none());

        headers.insert(
            CLOUD_TRACE_HEADER,
            HeaderValue::from_static("105445AA7843BC8BF206B12000100000/1"),
        );
        assert_eq!(
            sink.legacy_trace_id(&headers).as_deref(),
            Some("105445aa7843bc8bf206b12000100000")
        );
    }

    #[test]
    fn test_child_entry_severity_and_payload() {
        let recorder = Arc::new(Recorder::default());
        let sink = CloudSink::new(Arc::clone(&recorder), Some("my-project".to_string()));
        let mut attrs = Attributes::new();
        attrs.insert("user", "alice");

        for severity in [Severity::Debug, Severity::Info, Severity::Warn, Severity::Error] {
            sink.log(&child(severity, &attrs)).unwrap();
        }

        let entries = recorder.0.lock().unwrap();
        let severities: Vec<CloudSeverity> = entries.iter().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            vec![
                CloudSeverity::Debug,
                CloudSeverity::Info,
                CloudSeverity::Warning,
                CloudSeverity::Error
            ]
        );
        let first = &entries[0];
        assert_eq!(first.log_name, CHILD_LOG_NAME);
        assert_eq!(first.payload.get("message"), Some(&json!("Message")));
        assert_eq!(first.payload.get("user"), Some(&json!("alice")));
        assert!(first.http_request.is_none());
        assert!(first.trace_sampled);
    }

    #[test]
    fn test_parent_entry_keeps_http_apart_from_payload() {
        let recorder = Arc::new(Recorder::default());
        let sink = CloudSink::new(Arc::clone(&recorder), None);
        let http = http_info();
        let mut attrs = Attributes::new();
        attrs.insert("tenant", "acme");

        sink.log_parent(&ParentEntry {
            timestamp: Utc::now(),
            severity: None,
            message: PARENT_LOG_ENTRY,
            trace_id: "abc",
            span_id: "00f067aa0ba902b7",
            sampled: false,
            log_count: 0,
            http: &http,
            attributes: &attrs,
        })
        .unwrap();

        let entries = recorder.0.lock().unwrap();
        let parent = &entries[0];
        assert_eq!(parent.log_name, PARENT_LOG_NAME);
        assert_eq!(parent.severity, CloudSeverity::Default);
        assert_eq!(parent.payload.len(), 2);
        assert_eq!(parent.payload.get("message"), Some(&json!(PARENT_LOG_ENTRY)));
        let request = parent.http_request.as_ref().unwrap();
        assert_eq!(request.request_method, "GET");
        assert_eq!(request.status, 200);
        assert_eq!(request.request_size, 12);
        assert_eq!(request.response_size, 34);
        assert_eq!(request.latency, "0.005s");
    }

    #[test]
    fn test_json_lines_client_format() {
        let capture = Capture::default();
        let sink = CloudSink::new(
            JsonLinesClient::new(capture.writer()),
            Some("my-project".to_string()),
        );
        let attrs = Attributes::new();
        sink.log(&child(Severity::Warn, &attrs)).unwrap();

        let record: Value = serde_json::from_str(&capture.lines()[0]).unwrap();
        assert_eq!(record["severity"], "WARNING");
        assert_eq!(record["message"], "Message");
        assert_eq!(
            record["logging.googleapis.com/trace"],
            "projects/my-project/traces/105445aa7843bc8bf206b12000100000"
        );
        assert_eq!(record["logging.googleapis.com/spanId"], "00f067aa0ba902b7");
        assert_eq!(record["logging.googleapis.com/trace_sampled"], true);
        assert_eq!(record["logging.googleapis.com/labels"]["log_name"], CHILD_LOG_NAME);
        assert!(record.get("httpRequest").is_none());
    }

    #[test]
    fn test_client_fields_are_reserved() {
        let reserved = CloudSink::new(Recorder::default(), None).reserved_keys();
        for key in [
            "severity",
            "time",
            "logging.googleapis.com/trace",
            "logging.googleapis.com/spanId",
            "logging.googleapis.com/trace_sampled",
            "logging.googleapis.com/labels",
            "httpRequest",
        ] {
            assert_eq!(reserved.attribute_key(key), format!("custom_{}", key));
            assert_eq!(reserved.request_key(key), format!("custom_{}", key));
        }
        assert_eq!(reserved.attribute_key("http.method"), "http.method");
        assert_eq!(reserved.request_key("http.method"), "custom_http.method");
    }

    #[test]
    fn test_renamed_attributes_do_not_shadow_client_fields() {
        let capture = Capture::default();
        let sink = CloudSink::new(JsonLinesClient::new(capture.writer()), None);
        let reserved = sink.reserved_keys();

        let mut attrs = Attributes::new();
        attrs.insert(reserved.attribute_key("severity"), "DEBUG");
        sink.log(&child(Severity::Error, &attrs)).unwrap();

        let http = http_info();
        let mut request_attrs = Attributes::new();
        request_attrs.insert(reserved.request_key("httpRequest"), "spoof");
        sink.log_parent(&ParentEntry {
            timestamp: Utc::now(),
            severity: None,
            message: PARENT_LOG_ENTRY,
            trace_id: "abc",
            span_id: "00f067aa0ba902b7",
            sampled: false,
            log_count: 0,
            http: &http,
            attributes: &request_attrs,
        })
        .unwrap();

        let lines = capture.lines();
        assert_eq!(lines[0].matches("\"severity\":").count(), 1);
        let record: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["severity"], "ERROR");
        assert_eq!(record["custom_severity"], "DEBUG");

        assert_eq!(lines[1].matches("\"httpRequest\":").count(), 1);
        let parent: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(parent["httpRequest"]["requestMethod"], "GET");
        assert_eq!(parent["custom_httpRequest"], "spoof");
    }
}
