//! Request context carrying the active node and span
//!
//! The middleware stores a [`Context`] in the request extensions. Handlers
//! retrieve the node with [`from_request`] (or the [`Logger`](crate::Logger)
//! extractor) and pass the context back on every log call so child entries
//! carry the right span.

use crate::node::Node;
use crate::trace::SpanContext;
use axum::http::request::Parts;
use axum::http::Request;
use std::sync::Arc;

/// Immutable association of a logger node and a span.
///
/// Cloning is cheap. Binding a node or a span returns a new context and
/// leaves the original untouched.
#[derive(Debug, Clone, Default)]
pub struct Context {
    node: Option<Node>,
    span: Option<Arc<SpanContext>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this context with `span` as the active span.
    pub fn with_span(&self, span: SpanContext) -> Self {
        Self {
            node: self.node.clone(),
            span: Some(Arc::new(span)),
        }
    }

    pub fn span(&self) -> Option<&SpanContext> {
        self.span.as_deref()
    }

    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    /// Context stored in the request extensions, or an empty one.
    pub fn of<B>(req: &Request<B>) -> Self {
        req.extensions().get::<Context>().cloned().unwrap_or_default()
    }

    /// Same as [`Context::of`] for already split request parts.
    pub fn of_parts(parts: &Parts) -> Self {
        parts.extensions.get::<Context>().cloned().unwrap_or_default()
    }
}

/// A new context carrying `node`, layered over `ctx`.
pub fn bind(ctx: &Context, node: Node) -> Context {
    Context {
        node: Some(node),
        span: ctx.span.clone(),
    }
}

/// Node bound to `ctx`, or a direct node when there is none.
pub fn from_context(ctx: Option<&Context>) -> Node {
    ctx.and_then(Context::node).cloned().unwrap_or_default()
}

/// Node bound to the request's context, or a direct node when the request
/// did not pass through the request logger.
pub fn from_request<B>(req: Option<&Request<B>>) -> Node {
    from_context(req.and_then(|req| req.extensions().get::<Context>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn root() -> Node {
        Node::root(Arc::new(MemorySink::new()), "trace")
    }

    #[test]
    fn test_from_context_falls_back_to_direct() {
        assert!(!from_context(None).is_correlated());
        assert!(!from_context(Some(&Context::new())).is_correlated());
    }

    #[test]
    fn test_bind_then_retrieve() {
        let node = root();
        let ctx = bind(&Context::new(), node.clone());

        let found = from_context(Some(&ctx));
        assert!(found
            .as_correlated()
            .unwrap()
            .shares_root(node.as_correlated().unwrap()));
    }

    #[test]
    fn test_bind_keeps_span_and_original_context() {
        let span = SpanContext::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true);
        let ctx = Context::new().with_span(span.clone());
        let bound = bind(&ctx, root());

        assert_eq!(bound.span(), Some(&span));
        assert!(ctx.node().is_none());
    }

    #[test]
    fn test_from_request() {
        let mut req = Request::new(());
        assert!(!from_request(Some(&req)).is_correlated());
        assert!(!from_request::<()>(None).is_correlated());

        req.extensions_mut().insert(bind(&Context::new(), root()));
        assert!(from_request(Some(&req)).is_correlated());
        assert!(Context::of(&req).node().is_some());
    }
}
