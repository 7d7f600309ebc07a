//! Fallback logger used outside a correlated request

use crate::attributes::Attributes;
use crate::severity::Severity;
use std::sync::Arc;

/// Logger returned when no correlation node is bound to the context.
///
/// Each call is written immediately as a `tracing` event on the
/// `correlog::direct` target. Nothing is aggregated and no trace ID is
/// attached.
#[derive(Debug, Clone, Default)]
pub struct DirectLogger {
    attributes: Arc<Attributes>,
}

impl DirectLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_attributes(attributes: Attributes) -> Self {
        Self {
            attributes: Arc::new(attributes),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn log(&self, severity: Severity, message: &str) {
        let mut line = message.to_string();
        for token in self.attributes.tokens() {
            line.push_str(", ");
            line.push_str(&token);
        }

        match severity {
            Severity::Debug => tracing::debug!(target: "correlog::direct", "{}", line),
            Severity::Info => tracing::info!(target: "correlog::direct", "{}", line),
            Severity::Warn => tracing::warn!(target: "correlog::direct", "{}", line),
            Severity::Error => tracing::error!(target: "correlog::direct", "{}", line),
        }
    }
}
