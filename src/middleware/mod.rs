//! Request logging middleware
//!
//! [`RequestLoggerLayer`] wraps a service so that every request gets a root
//! [`CorrelationNode`] bound into its [`Context`]. Handlers log through it;
//! when the response body has been streamed (or dropped) the middleware
//! emits one parent entry summarizing the request.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use correlog::{Logger, RequestLoggerLayer, sink::StreamSink};
//! use std::sync::Arc;
//!
//! async fn index(log: Logger) -> &'static str {
//!     log.info("hello");
//!     "hi"
//! }
//!
//! let app: Router = Router::new()
//!     .route("/", get(index))
//!     .layer(RequestLoggerLayer::new(Arc::new(StreamSink::stdout())));
//! ```

mod recorder;

use crate::config::ExporterConfig;
use crate::context::{bind, Context};
use crate::node::{CorrelationNode, Node};
use crate::sink::{self, Sink};
use crate::trace::{generate_id, TraceProvider, W3cTraceContext};
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::Utc;
use futures::future::BoxFuture;
use recorder::{Finalizer, InFlight, RecordedBody, RequestInfo};
use std::fmt;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Default status from which the parent entry is forced to Error.
pub const DEFAULT_ERROR_STATUS_THRESHOLD: u16 = 400;

/// Status recorded when the request is cancelled before the inner service
/// responds, e.g. on client disconnect or an outer timeout.
pub const CLIENT_CLOSED_REQUEST_STATUS: u16 = 499;

#[derive(Clone)]
struct Settings {
    sink: Arc<dyn Sink>,
    trace_provider: Arc<dyn TraceProvider>,
    log_all: bool,
    error_status_threshold: u16,
    id_generator: fn() -> String,
}

/// Layer installing the request logger.
#[derive(Clone)]
pub struct RequestLoggerLayer {
    settings: Settings,
}

impl RequestLoggerLayer {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self {
            settings: Settings {
                sink,
                trace_provider: Arc::new(W3cTraceContext),
                log_all: true,
                error_status_threshold: DEFAULT_ERROR_STATUS_THRESHOLD,
                id_generator: generate_id,
            },
        }
    }

    /// Build the layer and its sink from the exporter section of the config.
    pub fn from_config(config: &ExporterConfig) -> Self {
        Self::new(sink::from_config(config))
            .log_all(config.log_all)
            .error_status_threshold(config.error_status_threshold)
    }

    /// Emit a parent entry for requests that logged nothing. Defaults to true.
    pub fn log_all(mut self, log_all: bool) -> Self {
        self.settings.log_all = log_all;
        self
    }

    pub fn trace_provider(mut self, provider: impl TraceProvider) -> Self {
        self.settings.trace_provider = Arc::new(provider);
        self
    }

    pub fn error_status_threshold(mut self, status: u16) -> Self {
        self.settings.error_status_threshold = status;
        self
    }

    /// Generator for correlation IDs of requests without trace context.
    pub fn id_generator(mut self, generator: fn() -> String) -> Self {
        self.settings.id_generator = generator;
        self
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.settings.sink
    }
}

impl fmt::Debug for RequestLoggerLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLoggerLayer")
            .field("sink", &self.settings.sink.name())
            .field("log_all", &self.settings.log_all)
            .field("error_status_threshold", &self.settings.error_status_threshold)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for RequestLoggerLayer {
    type Service = RequestLogger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogger {
            inner,
            settings: Arc::new(self.settings.clone()),
        }
    }
}

/// Service produced by [`RequestLoggerLayer`].
#[derive(Clone)]
pub struct RequestLogger<S> {
    inner: S,
    settings: Arc<Settings>,
}

impl<S> RequestLogger<S> {
    /// Root node and context for a new request.
    fn start(&self, req: &Request<Body>) -> (CorrelationNode, Context) {
        let settings = &self.settings;
        let headers = req.headers();

        let mut ctx = Context::of(req);
        let trace_id = match settings.trace_provider.span_context(headers) {
            Some(span) => {
                let trace_id = span.trace_id.clone();
                ctx = ctx.with_span(span);
                trace_id
            }
            None => settings
                .sink
                .legacy_trace_id(headers)
                .unwrap_or_else(settings.id_generator),
        };

        let root = CorrelationNode::root(
            Arc::clone(&settings.sink),
            settings.sink.correlation_id(&trace_id),
        );
        let ctx = bind(&ctx, Node::Correlated(root.clone()));
        (root, ctx)
    }
}

impl<S> Service<Request<Body>> for RequestLogger<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let started = Instant::now();
        let timestamp = Utc::now();

        let (root, ctx) = self.start(&req);
        let request = RequestInfo::capture(&req);
        req.extensions_mut().insert(ctx.clone());

        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let settings = &self.settings;
        let in_flight = InFlight::new(Finalizer {
            sink: Arc::clone(&settings.sink),
            root,
            ctx,
            request,
            status: CLIENT_CLOSED_REQUEST_STATUS,
            log_all: settings.log_all,
            error_status_threshold: settings.error_status_threshold,
            started,
            timestamp,
        });

        Box::pin(async move {
            let response = match inner.call(req).await {
                Ok(response) => response,
                Err(err) => {
                    in_flight.abandon();
                    return Err(err);
                }
            };
            let (parts, body) = response.into_parts();
            let body = match in_flight.respond(parts.status.as_u16()) {
                Some(finalizer) => Body::new(RecordedBody::new(body, finalizer)),
                None => body,
            };
            Ok(Response::from_parts(parts, body))
        })
    }
}
