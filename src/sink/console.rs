//! Human-readable console backend

use super::{Entry, ParentEntry, SharedWriter, Sink, SinkError, COMMON_REQUEST_KEYS};
use crate::attributes::ReservedKeys;
use crate::severity::Severity;
use chrono::{DateTime, Local, Utc};
use colored::{Color, Colorize};

pub const REQUEST_SIZE_KEY: &str = "requestSize";
pub const RESPONSE_SIZE_KEY: &str = "responseSize";
pub const LOG_COUNT_KEY: &str = "logCount";

const RESERVED_REQUEST_KEYS: [&str; 14] = [
    COMMON_REQUEST_KEYS[0],
    COMMON_REQUEST_KEYS[1],
    COMMON_REQUEST_KEYS[2],
    COMMON_REQUEST_KEYS[3],
    COMMON_REQUEST_KEYS[4],
    COMMON_REQUEST_KEYS[5],
    COMMON_REQUEST_KEYS[6],
    COMMON_REQUEST_KEYS[7],
    COMMON_REQUEST_KEYS[8],
    COMMON_REQUEST_KEYS[9],
    COMMON_REQUEST_KEYS[10],
    REQUEST_SIZE_KEY,
    RESPONSE_SIZE_KEY,
    LOG_COUNT_KEY,
];

const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// ANSI color of a severity label.
pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Debug => Color::White,
        Severity::Info => Color::Blue,
        Severity::Warn => Color::Yellow,
        Severity::Error => Color::Red,
    }
}

/// Backend writing one line per entry for humans watching a terminal.
///
/// Colors go through `colored`, which also honours `NO_COLOR` and
/// `CLICOLOR_FORCE`.
#[derive(Debug)]
pub struct ConsoleSink {
    writer: SharedWriter,
    no_color: bool,
}

impl ConsoleSink {
    pub fn new(writer: SharedWriter) -> Self {
        Self {
            writer,
            no_color: false,
        }
    }

    pub fn stderr() -> Self {
        Self::new(SharedWriter::stderr())
    }

    /// Disable coloring of the level label.
    pub fn no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    fn label(&self, severity: Severity) -> String {
        if self.no_color {
            severity.padded().to_string()
        } else {
            severity
                .padded()
                .color(severity_color(severity))
                .to_string()
        }
    }

    fn write(&self, time: DateTime<Utc>, severity: Severity, body: &str) -> Result<(), SinkError> {
        let line = format!(
            "{} {}: {}",
            time.with_timezone(&Local).format(TIME_FORMAT),
            self.label(severity),
            body
        );
        self.writer.write_line(&line)
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn reserved_keys(&self) -> ReservedKeys {
        ReservedKeys::new(&[], &RESERVED_REQUEST_KEYS)
    }

    fn log(&self, entry: &Entry<'_>) -> Result<(), SinkError> {
        let mut body = entry.message.to_string();
        for token in entry.attributes.tokens() {
            body.push_str(", ");
            body.push_str(&token);
        }
        self.write(entry.timestamp, entry.severity, &body)
    }

    fn log_parent(&self, entry: &ParentEntry<'_>) -> Result<(), SinkError> {
        let http = entry.http;
        let mut body = format!(
            "{} {} {} {:?} {}={} {}={} {}={}",
            http.method,
            http.path,
            http.status,
            http.latency,
            REQUEST_SIZE_KEY,
            http.request_size,
            RESPONSE_SIZE_KEY,
            http.response_size,
            LOG_COUNT_KEY,
            entry.log_count,
        );
        for token in entry.attributes.tokens() {
            body.push(' ');
            body.push_str(&token);
        }
        self.write(
            entry.timestamp,
            entry.severity.unwrap_or(Severity::Debug),
            &body,
        )
    }
}
