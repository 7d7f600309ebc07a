//! Correlation nodes bound to one request

use crate::attributes::{Attributes, ReservedKeys};
use crate::context::Context;
use crate::severity::Severity;
use crate::sink::{Entry, Sink};
use crate::trace::INVALID_SPAN_ID;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Per-request aggregate. Lives only in the root state.
#[derive(Debug, Default)]
struct Aggregate {
    max_severity: Option<Severity>,
    log_count: usize,
    request_attributes: Attributes,
}

/// State shared by every node of one request tree.
struct Root {
    sink: Arc<dyn Sink>,
    correlation_id: String,
    reserved: ReservedKeys,
    aggregate: Mutex<Aggregate>,
}

impl Root {
    fn lock(&self) -> MutexGuard<'_, Aggregate> {
        self.aggregate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Consistent copy of the aggregate, taken under the root's lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub log_count: usize,
    pub max_severity: Option<Severity>,
    pub request_attributes: Attributes,
}

/// A logger bound to one request.
///
/// The node created by the middleware is the root; nodes derived with
/// [`Attributer::logger`](super::Attributer::logger) are children. All of
/// them point at the same root state, which holds the aggregate severity,
/// the call count and the request attributes. A node's own attributes are
/// immutable: deriving a child copies them.
#[derive(Clone)]
pub struct CorrelationNode {
    root: Arc<Root>,
    attributes: Arc<Attributes>,
}

impl CorrelationNode {
    /// Create the root node of a request.
    pub fn root(sink: Arc<dyn Sink>, correlation_id: impl Into<String>) -> Self {
        let reserved = sink.reserved_keys();
        Self {
            root: Arc::new(Root {
                sink,
                correlation_id: correlation_id.into(),
                reserved,
                aggregate: Mutex::new(Aggregate::default()),
            }),
            attributes: Arc::new(Attributes::new()),
        }
    }

    pub(crate) fn child(&self, attributes: Attributes) -> Self {
        Self {
            root: Arc::clone(&self.root),
            attributes: Arc::new(attributes),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.root.correlation_id
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.root.sink
    }

    pub fn reserved_keys(&self) -> ReservedKeys {
        self.root.reserved
    }

    /// This node's own child-log attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Whether both nodes belong to the same request tree.
    pub fn shares_root(&self, other: &CorrelationNode) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// Record a call in the aggregate and emit one child entry.
    pub fn log(&self, ctx: &Context, severity: Severity, message: &str) {
        {
            let mut aggregate = self.root.lock();
            if aggregate.max_severity < Some(severity) {
                aggregate.max_severity = Some(severity);
            }
            aggregate.log_count += 1;
        }

        let (span_id, sampled) = ctx
            .span()
            .map_or((INVALID_SPAN_ID, false), |span| {
                (span.span_id.as_str(), span.sampled)
            });

        let entry = Entry {
            timestamp: Utc::now(),
            severity,
            message,
            trace_id: &self.root.correlation_id,
            span_id,
            sampled,
            attributes: &self.attributes,
        };
        if let Err(err) = self.root.sink.log(&entry) {
            tracing::debug!(sink = self.root.sink.name(), error = %err, "Dropped child log entry");
        }
    }

    /// Set an attribute on the parent (request) entry.
    ///
    /// Reserved keys are stored with the `custom_` prefix; an existing value
    /// is overwritten.
    pub fn add_request_attribute(&self, key: &str, value: impl Into<Value>) {
        let key = self.root.reserved.request_key(key);
        self.root.lock().request_attributes.insert(key, value);
    }

    /// Remove parent entry attributes. Unknown keys are ignored.
    pub fn remove_request_attributes<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut aggregate = self.root.lock();
        for key in keys {
            let key = self.root.reserved.request_key(key.as_ref());
            aggregate.request_attributes.remove(&key);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let aggregate = self.root.lock();
        Snapshot {
            log_count: aggregate.log_count,
            max_severity: aggregate.max_severity,
            request_attributes: aggregate.request_attributes.clone(),
        }
    }

    /// Number of log calls made across the whole tree.
    pub fn log_count(&self) -> usize {
        self.root.lock().log_count
    }

    /// Highest severity logged across the whole tree, `None` before any call.
    pub fn max_severity(&self) -> Option<Severity> {
        self.root.lock().max_severity
    }

    pub fn request_attributes(&self) -> Attributes {
        self.root.lock().request_attributes.clone()
    }
}

impl fmt::Debug for CorrelationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationNode")
            .field("sink", &self.root.sink.name())
            .field("correlation_id", &self.root.correlation_id)
            .field("attributes", &self.attributes)
            .finish()
    }
}
