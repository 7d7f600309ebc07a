//! In-memory backend for tests

use super::{keys, Entry, HttpRequestInfo, ParentEntry, Sink, SinkError, COMMON_REQUEST_KEYS};
use crate::attributes::{Attributes, ReservedKeys};
use crate::severity::Severity;
use std::io;
use std::sync::{Mutex, PoisonError};

const RESERVED_ATTRIBUTE_KEYS: [&str; 2] = [keys::TRACE_ID, keys::SPAN_ID];

/// A child entry as recorded by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEntry {
    pub severity: Severity,
    pub message: String,
    pub trace_id: String,
    pub span_id: String,
    pub sampled: bool,
    pub attributes: Attributes,
}

/// A parent entry as recorded by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedParent {
    pub severity: Option<Severity>,
    pub message: String,
    pub trace_id: String,
    pub span_id: String,
    pub sampled: bool,
    pub log_count: usize,
    pub http: HttpRequestInfo,
    pub attributes: Attributes,
}

/// Sink that keeps every entry in memory.
///
/// Reserves the same keys as the structured stream backend. A failing sink
/// rejects every write, which lets tests check that errors never reach the
/// caller.
#[derive(Debug)]
pub struct MemorySink {
    reserved: ReservedKeys,
    fail: bool,
    children: Mutex<Vec<RecordedEntry>>,
    parents: Mutex<Vec<RecordedParent>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            reserved: ReservedKeys::new(&RESERVED_ATTRIBUTE_KEYS, &COMMON_REQUEST_KEYS),
            fail: false,
            children: Mutex::new(Vec::new()),
            parents: Mutex::new(Vec::new()),
        }
    }

    /// A sink whose writes all fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_reserved_keys(mut self, reserved: ReservedKeys) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn children(&self) -> Vec<RecordedEntry> {
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn parents(&self) -> Vec<RecordedParent> {
        self.parents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory sink configured to fail",
            )));
        }
        Ok(())
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn reserved_keys(&self) -> ReservedKeys {
        self.reserved
    }

    fn log(&self, entry: &Entry<'_>) -> Result<(), SinkError> {
        self.check()?;
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEntry {
                severity: entry.severity,
                message: entry.message.to_string(),
                trace_id: entry.trace_id.to_string(),
                span_id: entry.span_id.to_string(),
                sampled: entry.sampled,
                attributes: entry.attributes.clone(),
            });
        Ok(())
    }

    fn log_parent(&self, entry: &ParentEntry<'_>) -> Result<(), SinkError> {
        self.check()?;
        self.parents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedParent {
                severity: entry.severity,
                message: entry.message.to_string(),
                trace_id: entry.trace_id.to_string(),
                span_id: entry.span_id.to_string(),
                sampled: entry.sampled,
                log_count: entry.log_count,
                http: entry.http.clone(),
                attributes: entry.attributes.clone(),
            });
        Ok(())
    }
}
