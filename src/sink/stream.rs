//! Structured JSON stream backend
//!
//! Writes one JSON object per line, suitable for log shippers that tail
//! stdout (CloudWatch, Loki, Vector and the like).

use super::{keys, Entry, ParentEntry, SharedWriter, Sink, SinkError, COMMON_REQUEST_KEYS};
use crate::attributes::{Attributes, ReservedKeys};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

const TIME_KEY: &str = "time";
const LEVEL_KEY: &str = "level";
const MESSAGE_KEY: &str = "msg";

const RESERVED_ATTRIBUTE_KEYS: [&str; 5] =
    [TIME_KEY, LEVEL_KEY, MESSAGE_KEY, keys::TRACE_ID, keys::SPAN_ID];

const RESERVED_REQUEST_KEYS: [&str; 14] = [
    TIME_KEY,
    LEVEL_KEY,
    MESSAGE_KEY,
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

/// Level written for a parent entry of a request that made no log calls.
const BASELINE_LEVEL: &str = "INFO";

#[derive(Serialize)]
struct Record<'a> {
    time: String,
    level: &'static str,
    msg: &'a str,
    trace_id: &'a str,
    span_id: &'a str,
    #[serde(flatten)]
    http: Option<HttpFields<'a>>,
    #[serde(flatten)]
    attributes: &'a Attributes,
}

#[derive(Serialize)]
struct HttpFields<'a> {
    #[serde(rename = "http.elapsed")]
    elapsed: String,
    #[serde(rename = "http.method")]
    method: &'a str,
    #[serde(rename = "http.url")]
    url: &'a str,
    #[serde(rename = "http.status_code")]
    status_code: u16,
    #[serde(rename = "http.response.length")]
    response_length: u64,
    #[serde(rename = "http.user_agent")]
    user_agent: &'a str,
    #[serde(rename = "http.remote_ip")]
    remote_ip: &'a str,
    #[serde(rename = "http.scheme")]
    scheme: &'a str,
    #[serde(rename = "http.proto")]
    proto: &'a str,
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Backend writing JSON lines to a shared stream.
#[derive(Debug)]
pub struct StreamSink {
    writer: SharedWriter,
}

impl StreamSink {
    pub fn new(writer: SharedWriter) -> Self {
        Self { writer }
    }

    pub fn stdout() -> Self {
        Self::new(SharedWriter::stdout())
    }

    fn write(&self, record: &Record<'_>) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        self.writer.write_line(&line)
    }
}

impl Sink for StreamSink {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn reserved_keys(&self) -> ReservedKeys {
        ReservedKeys::new(&RESERVED_ATTRIBUTE_KEYS, &RESERVED_REQUEST_KEYS)
    }

    fn log(&self, entry: &Entry<'_>) -> Result<(), SinkError> {
        self.write(&Record {
            time: timestamp(entry.timestamp),
            level: entry.severity.as_str(),
            msg: entry.message,
            trace_id: entry.trace_id,
            span_id: entry.span_id,
            http: None,
            attributes: entry.attributes,
        })
    }

    fn log_parent(&self, entry: &ParentEntry<'_>) -> Result<(), SinkError> {
        let http = entry.http;
        self.write(&Record {
            time: timestamp(entry.timestamp),
            level: entry.severity.map_or(BASELINE_LEVEL, |s| s.as_str()),
            msg: entry.message,
            trace_id: entry.trace_id,
            span_id: entry.span_id,
            http: Some(HttpFields {
                elapsed: format!("{:?}", http.latency),
                method: &http.method,
                url: &http.url,
                status_code: http.status,
                response_length: http.response_size,
                user_agent: &http.user_agent,
                remote_ip: &http.remote_ip,
                scheme: &http.scheme,
                proto: &http.protocol,
            }),
            attributes: entry.attributes,
        })
    }
}
