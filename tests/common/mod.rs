//! Shared test utilities for correlog integration tests.
//!
//! Provides a demo router with handlers exercising every logging pattern,
//! an in-memory writer for the formatting sinks, and request helpers.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use correlog::sink::SharedWriter;
use correlog::{Logger, RequestLoggerLayer};
use std::convert::Infallible;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// =============================================================================
// Well-Known Test Constants
// =============================================================================

pub const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
pub const SPAN_ID: &str = "00f067aa0ba902b7";

/// Sampled `traceparent` header value for [`TRACE_ID`] / [`SPAN_ID`].
pub fn traceparent() -> String {
    format!("00-{}-{}-01", TRACE_ID, SPAN_ID)
}

// =============================================================================
// Captured Output
// =============================================================================

/// Cloneable in-memory writer.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn writer(&self) -> SharedWriter {
        SharedWriter::new(self.clone())
    }

    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Demo Router
// =============================================================================

async fn quiet() -> &'static str {
    "quiet"
}

async fn warn_then_info(log: Logger) -> &'static str {
    log.warn("w");
    log.info("i");
    "done"
}

async fn fail() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn not_found_with_log(log: Logger) -> StatusCode {
    log.debug("looking up widget");
    StatusCode::NOT_FOUND
}

async fn child(log: Logger) -> &'static str {
    let scoped = log
        .with_attribute("user", "alice")
        .add_attribute("http.method", "shadowed")
        .logger();
    scoped.info("scoped");
    scoped.add_request_attribute("tenant", "acme");
    log.info("unscoped");
    "child"
}

async fn request_attributes(log: Logger) -> &'static str {
    log.add_request_attribute("http.method", "x");
    log.add_request_attribute("k", 1);
    log.add_request_attribute("k", 2);
    log.add_request_attribute("drop", true);
    log.remove_request_attributes(["drop"]);
    "attrs"
}

async fn streamed(log: Logger) -> Body {
    log.info("streaming");
    let chunks = vec![
        Ok::<_, Infallible>(Bytes::from_static(b"hello ")),
        Ok(Bytes::from_static(b"streamed ")),
        Ok(Bytes::from_static(b"world")),
    ];
    Body::from_stream(futures::stream::iter(chunks))
}

async fn shadow_cloud_fields(log: Logger) -> &'static str {
    log.with_attribute("severity", "DEBUG").logger().error("boom");
    log.add_request_attribute("httpRequest", "spoof");
    "shadow"
}

async fn stalled(log: Logger) -> &'static str {
    log.error("db failed");
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    "late"
}

/// Router with one route per logging pattern, wrapped in `layer`.
pub fn app(layer: RequestLoggerLayer) -> Router {
    Router::new()
        .route("/quiet", get(quiet))
        .route("/warn-info", get(warn_then_info))
        .route("/fail", get(fail))
        .route("/missing", get(not_found_with_log))
        .route("/child", get(child))
        .route("/attrs", get(request_attributes))
        .route("/stream", get(streamed))
        .route("/shadow", get(shadow_cloud_fields))
        .route("/stalled", get(stalled))
        .layer(layer)
}

// =============================================================================
// Request Helpers
// =============================================================================

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("user-agent", "correlog-test")
        .body(Body::empty())
        .unwrap()
}

/// Send `req` and read the whole response body, which completes the request.
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}
