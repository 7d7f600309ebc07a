//! Request-bound loggers
//!
//! A [`Node`] is what handlers log through. Inside a request wrapped by the
//! request logger it is a [`CorrelationNode`] that feeds the per-request
//! aggregate; anywhere else it degrades to a [`DirectLogger`].

mod correlated;
mod direct;


pub use correlated::{CorrelationNode, Snapshot};
pub use direct::DirectLogger;

use crate::attributes::{Attributes, ReservedKeys};
use crate::context::Context;
use crate::severity::Severity;
use crate::sink::Sink;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Node {
    Correlated(CorrelationNode),
    Direct(DirectLogger),
}

impl Default for Node {
    fn default() -> Self {
        Node::direct()
    }
}

impl From<CorrelationNode> for Node {
    fn from(node: CorrelationNode) -> Self {
        Node::Correlated(node)
    }
}

impl From<DirectLogger> for Node {
    fn from(logger: DirectLogger) -> Self {
        Node::Direct(logger)
    }
}

impl Node {
    /// Root node of a new request tree.
    pub fn root(sink: Arc<dyn Sink>, correlation_id: impl Into<String>) -> Self {
        Node::Correlated(CorrelationNode::root(sink, correlation_id))
    }

    pub fn direct() -> Self {
        Node::Direct(DirectLogger::new())
    }

    pub fn is_correlated(&self) -> bool {
        matches!(self, Node::Correlated(_))
    }

    pub fn as_correlated(&self) -> Option<&CorrelationNode> {
        match self {
            Node::Correlated(node) => Some(node),
            Node::Direct(_) => None,
        }
    }

    /// This node's own child-log attributes.
    pub fn attributes(&self) -> &Attributes {
        match self {
            Node::Correlated(node) => node.attributes(),
            Node::Direct(logger) => logger.attributes(),
        }
    }

    pub fn log(&self, ctx: &Context, severity: Severity, message: impl fmt::Display) {
        let message = message.to_string();
        match self {
            Node::Correlated(node) => node.log(ctx, severity, &message),
            Node::Direct(logger) => logger.log(severity, &message),
        }
    }

    pub fn debug(&self, ctx: &Context, message: impl fmt::Display) {
        self.log(ctx, Severity::Debug, message);
    }

    pub fn info(&self, ctx: &Context, message: impl fmt::Display) {
        self.log(ctx, Severity::Info, message);
    }

    pub fn warn(&self, ctx: &Context, message: impl fmt::Display) {
        self.log(ctx, Severity::Warn, message);
    }

    pub fn error(&self, ctx: &Context, message: impl fmt::Display) {
        self.log(ctx, Severity::Error, message);
    }

    /// `node.debugf(&ctx, format_args!("took {}ms", ms))`
    pub fn debugf(&self, ctx: &Context, args: fmt::Arguments<'_>) {
        self.log(ctx, Severity::Debug, args);
    }

    pub fn infof(&self, ctx: &Context, args: fmt::Arguments<'_>) {
        self.log(ctx, Severity::Info, args);
    }

    pub fn warnf(&self, ctx: &Context, args: fmt::Arguments<'_>) {
        self.log(ctx, Severity::Warn, args);
    }

    pub fn errorf(&self, ctx: &Context, args: fmt::Arguments<'_>) {
        self.log(ctx, Severity::Error, args);
    }

    /// Set an attribute on the request's parent entry. No-op on a direct node.
    pub fn add_request_attribute(&self, key: &str, value: impl Into<Value>) {
        if let Node::Correlated(node) = self {
            node.add_request_attribute(key, value);
        }
    }

    /// Remove attributes from the request's parent entry. No-op on a direct node.
    pub fn remove_request_attributes<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        if let Node::Correlated(node) = self {
            node.remove_request_attributes(keys);
        }
    }

    /// Start building a child node seeded with a copy of this node's attributes.
    pub fn with_attributes(&self) -> Attributer {
        let reserved = match self {
            Node::Correlated(node) => node.reserved_keys(),
            Node::Direct(_) => ReservedKeys::NONE,
        };
        Attributer {
            base: self.clone(),
            reserved,
            attributes: self.attributes().clone(),
        }
    }

    pub fn with_attribute(&self, key: &str, value: impl Into<Value>) -> Attributer {
        self.with_attributes().add_attribute(key, value)
    }

    /// Calls made across the request tree. Always 0 for a direct node.
    pub fn log_count(&self) -> usize {
        self.as_correlated().map_or(0, CorrelationNode::log_count)
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.as_correlated().and_then(CorrelationNode::max_severity)
    }

    pub fn request_attributes(&self) -> Attributes {
        self.as_correlated()
            .map(CorrelationNode::request_attributes)
            .unwrap_or_default()
    }
}

/// Builder for a child node with additional attributes.
#[derive(Debug, Clone)]
pub struct Attributer {
    base: Node,
    reserved: ReservedKeys,
    attributes: Attributes,
}

impl Attributer {
    /// Add an attribute, renaming reserved keys and overwriting duplicates.
    pub fn add_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes
            .insert(self.reserved.attribute_key(key), value);
        self
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Materialize the child node.
    pub fn logger(self) -> Node {
        match self.base {
            Node::Correlated(node) => Node::Correlated(node.child(self.attributes)),
            Node::Direct(_) => Node::Direct(DirectLogger::with_attributes(self.attributes)),
        }
    }
}
