//! correlog - request-scoped correlated logging
//!
//! Every request that passes through [`RequestLoggerLayer`] gets a root
//! [`CorrelationNode`]. Handlers log through it (or through child nodes
//! carrying extra attributes); each call becomes one child entry tagged with
//! the request's trace ID. When the response has been sent, one parent entry
//! summarizes the request: HTTP metadata, elapsed time, the number of child
//! entries and the highest severity among them.
//!
//! Entries are written by a [`Sink`]: JSON lines ([`sink::StreamSink`]),
//! cloud logging entries ([`sink::CloudSink`]) or colored console lines
//! ([`sink::ConsoleSink`]).

pub mod attributes;
pub mod cli;
pub mod config;
pub mod context;
pub mod logger;
pub mod logging;
pub mod middleware;
pub mod node;
pub mod severity;
pub mod sink;
pub mod trace;

pub use attributes::Attributes;
pub use context::{bind, from_context, from_request, Context};
pub use logger::{AttributerLogger, Logger};
pub use middleware::{RequestLogger, RequestLoggerLayer};
pub use node::{Attributer, CorrelationNode, DirectLogger, Node};
pub use severity::Severity;
pub use sink::Sink;
pub use trace::{SpanContext, TraceProvider};
