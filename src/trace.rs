//! Trace context extraction and correlation ID generation
//!
//! The middleware asks a [`TraceProvider`] for the span context of the
//! incoming request. The default provider understands the W3C
//! `traceparent` header; services running behind an OpenTelemetry propagator
//! can plug in their own provider instead.

use axum::http::HeaderMap;
use uuid::Uuid;

/// W3C trace context header name.
pub const TRACEPARENT: &str = "traceparent";

/// Span ID rendered for entries without a valid span.
pub const INVALID_SPAN_ID: &str = "0000000000000000";

/// Identifiers of the span a log call belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    /// 32 lowercase hex characters
    pub trace_id: String,
    /// 16 lowercase hex characters
    pub span_id: String,
    pub sampled: bool,
}

impl SpanContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>, sampled: bool) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            sampled,
        }
    }

    /// A span context is valid when both IDs are well-formed and non-zero.
    pub fn is_valid(&self) -> bool {
        is_hex_id(&self.trace_id, 32) && is_hex_id(&self.span_id, 16)
    }
}

pub(crate) fn is_hex_id(id: &str, len: usize) -> bool {
    id.len() == len
        && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        && id.bytes().any(|b| b != b'0')
}

/// Source of the distributed-tracing context of an inbound request.
pub trait TraceProvider: Send + Sync + 'static {
    /// Return the span context carried by `headers`, if a valid one exists.
    fn span_context(&self, headers: &HeaderMap) -> Option<SpanContext>;
}

/// Reads the W3C `traceparent` header (`00-<trace-id>-<span-id>-<flags>`).
#[derive(Debug, Clone, Copy, Default)]
pub struct W3cTraceContext;

impl TraceProvider for W3cTraceContext {
    fn span_context(&self, headers: &HeaderMap) -> Option<SpanContext> {
        let value = headers.get(TRACEPARENT)?.to_str().ok()?;
        parse_traceparent(value)
    }
}

/// Provider for services that do not propagate trace context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceProvider for NoTrace {
    fn span_context(&self, _headers: &HeaderMap) -> Option<SpanContext> {
        None
    }
}

/// Parse a `traceparent` header value.
///
/// Returns `None` for malformed values, the forbidden version `ff`, and
/// all-zero trace or span IDs.
pub fn parse_traceparent(value: &str) -> Option<SpanContext> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let span_id = parts.next()?;
    let flags = parts.next()?;

    if version.len() != 2 || version == "ff" || u8::from_str_radix(version, 16).is_err() {
        return None;
    }
    // Version 00 has exactly four fields; later versions may append more.
    if version == "00" && parts.next().is_some() {
        return None;
    }
    if flags.len() != 2 {
        return None;
    }
    let flags = u8::from_str_radix(flags, 16).ok()?;

    let span = SpanContext::new(trace_id, span_id, flags & 0x01 == 0x01);
    span.is_valid().then_some(span)
}

/// Generate a correlation ID in trace ID format: 16 random bytes, hex encoded.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
