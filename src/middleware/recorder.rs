//! Request metadata capture and the counting response body

use super::CLIENT_CLOSED_REQUEST_STATUS;
use crate::context::Context;
use crate::node::CorrelationNode;
use crate::severity::Severity;
use crate::sink::{HttpRequestInfo, ParentEntry, Sink, PARENT_LOG_ENTRY};
use crate::trace::INVALID_SPAN_ID;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

/// Request fields captured before the inner service runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RequestInfo {
    pub method: String,
    pub url: String,
    pub path: String,
    pub request_size: u64,
    pub user_agent: String,
    pub remote_ip: String,
    pub scheme: String,
    pub protocol: String,
}

impl RequestInfo {
    pub fn capture<B>(req: &Request<B>) -> Self {
        let headers = req.headers();
        Self {
            method: req.method().to_string(),
            url: req.uri().to_string(),
            path: req.uri().path().to_string(),
            request_size: request_size(headers),
            user_agent: header_str(headers, header::USER_AGENT.as_str())
                .unwrap_or_default()
                .to_string(),
            remote_ip: remote_ip(req),
            scheme: req
                .uri()
                .scheme_str()
                .or_else(|| header_str(headers, "x-forwarded-proto"))
                .unwrap_or("http")
                .to_string(),
            protocol: format!("{:?}", req.version()),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Declared request body size. Missing or malformed `Content-Length` is 0.
pub(crate) fn request_size(headers: &HeaderMap) -> u64 {
    header_str(headers, header::CONTENT_LENGTH.as_str())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Client address: first `X-Forwarded-For` hop, else the peer address.
pub(crate) fn remote_ip<B>(req: &Request<B>) -> String {
    if let Some(forwarded) = header_str(req.headers(), "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return first.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Everything needed to emit the parent entry once the response is done.
pub(crate) struct Finalizer {
    pub sink: Arc<dyn Sink>,
    pub root: CorrelationNode,
    pub ctx: Context,
    pub request: RequestInfo,
    pub status: u16,
    pub log_all: bool,
    pub error_status_threshold: u16,
    pub started: Instant,
    pub timestamp: DateTime<Utc>,
}

impl Finalizer {
    pub fn finish(self, response_size: u64) {
        let snapshot = self.root.snapshot();
        if !self.log_all && snapshot.log_count == 0 {
            return;
        }

        let mut severity = snapshot.max_severity;
        if self.status >= self.error_status_threshold && severity < Some(Severity::Error) {
            severity = Some(Severity::Error);
        }

        let RequestInfo {
            method,
            url,
            path,
            request_size,
            user_agent,
            remote_ip,
            scheme,
            protocol,
        } = self.request;
        let http = HttpRequestInfo {
            method,
            url,
            path,
            status: self.status,
            request_size,
            response_size,
            user_agent,
            remote_ip,
            scheme,
            protocol,
            latency: self.started.elapsed(),
        };

        let (span_id, sampled) = self
            .ctx
            .span()
            .map_or((INVALID_SPAN_ID, false), |span| {
                (span.span_id.as_str(), span.sampled)
            });

        let entry = ParentEntry {
            timestamp: self.timestamp,
            severity,
            message: PARENT_LOG_ENTRY,
            trace_id: self.root.correlation_id(),
            span_id,
            sampled,
            log_count: snapshot.log_count,
            http: &http,
            attributes: &snapshot.request_attributes,
        };
        if let Err(err) = self.sink.log_parent(&entry) {
            tracing::debug!(sink = self.sink.name(), error = %err, "Dropped parent log entry");
        }
    }
}

/// Holds the finalizer while the inner service runs. Dropping it before a
/// response arrives emits the parent with [`CLIENT_CLOSED_REQUEST_STATUS`].
pub(crate) struct InFlight {
    finalizer: Option<Finalizer>,
}

impl InFlight {
    pub fn new(finalizer: Finalizer) -> Self {
        Self {
            finalizer: Some(finalizer),
        }
    }

    /// Hand the finalizer over to the response body.
    pub fn respond(mut self, status: u16) -> Option<Finalizer> {
        self.finalizer.take().map(|mut finalizer| {
            finalizer.status = status;
            finalizer
        })
    }

    /// Inner service failed; its error passes through without a parent entry.
    pub fn abandon(mut self) {
        self.finalizer = None;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer.finish(0);
        }
    }
}

/// Response body that counts streamed bytes and emits the parent entry when
/// the stream ends, fails or is dropped.
pub(crate) struct RecordedBody {
    inner: Body,
    bytes: u64,
    finalizer: Option<Finalizer>,
}

impl RecordedBody {
    pub fn new(inner: Body, finalizer: Finalizer) -> Self {
        Self {
            inner,
            bytes: 0,
            finalizer: Some(finalizer),
        }
    }

    fn finish(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer.finish(self.bytes);
        }
    }
}

impl HttpBody for RecordedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for RecordedBody {
    fn drop(&mut self) {
        self.finish();
    }
}
