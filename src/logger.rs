//! Handler-facing logger facade
//!
//! [`Logger`] pairs a [`Node`] with the [`Context`] it was taken from so
//! handlers do not have to thread the context through every call:
//!
//! ```no_run
//! use correlog::Logger;
//!
//! async fn handler(log: Logger) -> &'static str {
//!     log.info("loading widgets");
//!     log.add_request_attribute("tenant", "acme");
//!     let scoped = log.with_attribute("widget", 7).logger();
//!     scoped.warnf(format_args!("{} retries left", 2));
//!     "ok"
//! }
//! ```

use crate::context::{bind, Context};
use crate::node::{Attributer, Node};
use crate::severity::Severity;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Request;
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct Logger {
    ctx: Context,
    node: Node,
}

impl Logger {
    pub fn from_context(ctx: &Context) -> Self {
        Self {
            node: crate::context::from_context(Some(ctx)),
            ctx: ctx.clone(),
        }
    }

    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::from_context(&Context::of(req))
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn log(&self, severity: Severity, message: impl fmt::Display) {
        self.node.log(&self.ctx, severity, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.node.debug(&self.ctx, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.node.info(&self.ctx, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.node.warn(&self.ctx, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.node.error(&self.ctx, message);
    }

    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.node.debugf(&self.ctx, args);
    }

    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.node.infof(&self.ctx, args);
    }

    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.node.warnf(&self.ctx, args);
    }

    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.node.errorf(&self.ctx, args);
    }

    pub fn add_request_attribute(&self, key: &str, value: impl Into<Value>) {
        self.node.add_request_attribute(key, value);
    }

    pub fn remove_request_attributes<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.node.remove_request_attributes(keys);
    }

    pub fn with_attributes(&self) -> AttributerLogger {
        AttributerLogger {
            ctx: self.ctx.clone(),
            attributer: self.node.with_attributes(),
        }
    }

    pub fn with_attribute(&self, key: &str, value: impl Into<Value>) -> AttributerLogger {
        self.with_attributes().add_attribute(key, value)
    }
}

/// [`Attributer`] that yields a [`Logger`] bound to the new child node.
#[derive(Debug, Clone)]
pub struct AttributerLogger {
    ctx: Context,
    attributer: Attributer,
}

impl AttributerLogger {
    pub fn add_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributer = self.attributer.add_attribute(key, value);
        self
    }

    pub fn logger(self) -> Logger {
        let node = self.attributer.logger();
        Logger {
            ctx: bind(&self.ctx, node.clone()),
            node,
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Logger
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Logger::from_context(&Context::of_parts(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::json;
    use std::sync::Arc;

    fn bound(sink: &Arc<MemorySink>) -> Context {
        bind(&Context::new(), Node::root(sink.clone(), "trace-1"))
    }

    #[test]
    fn test_logger_logs_through_bound_node() {
        let sink = Arc::new(MemorySink::new());
        let log = Logger::from_context(&bound(&sink));

        log.info("one");
        log.errorf(format_args!("two {}", 2));

        let children = sink.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].message, "two 2");
        assert_eq!(children[1].trace_id, "trace-1");
        assert_eq!(log.node().log_count(), 2);
        assert_eq!(log.node().max_severity(), Some(Severity::Error));
    }

    #[test]
    fn test_attributer_logger_binds_child() {
        let sink = Arc::new(MemorySink::new());
        let log = Logger::from_context(&bound(&sink));

        let child = log
            .with_attribute("user", "alice")
            .add_attribute("attempt", 1)
            .logger();
        child.warn("retry");
        child.add_request_attribute("tenant", "acme");

        let children = sink.children();
        assert_eq!(children[0].attributes.get("user"), Some(&json!("alice")));
        assert_eq!(log.node().log_count(), 1);
        assert_eq!(log.node().request_attributes().get("tenant"), Some(&json!("acme")));
        assert!(child.context().node().is_some());
        assert!(log.node().attributes().is_empty());
    }

    #[test]
    fn test_logger_without_context_is_direct() {
        let log = Logger::from_request(&Request::new(()));
        assert!(!log.node().is_correlated());
        log.info("goes to tracing");
        log.add_request_attribute("ignored", true);
        assert!(log.node().request_attributes().is_empty());
    }

    #[tokio::test]
    async fn test_extractor_reads_extensions() {
        let sink = Arc::new(MemorySink::new());
        let mut req = Request::new(());
        req.extensions_mut().insert(bound(&sink));
        let (mut parts, _) = req.into_parts();

        let log = Logger::from_request_parts(&mut parts, &()).await.unwrap();
        log.debug("x");
        assert_eq!(sink.children().len(), 1);
    }
}
