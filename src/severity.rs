//! Severity levels shared by every backend

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log call.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `Debug < Info < Warn < Error`. The aggregate of a request is tracked as an
/// `Option<Severity>`, where `None` means "no calls yet" and each backend
/// renders it as its own baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Upper-case label as written by the structured stream backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Label padded to five columns for aligned console output.
    ///
    /// Warnings use the four-character `WARN` so every label has the same width.
    pub fn padded(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO ",
            Severity::Warn => "WARN ",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

/// The five-level severity enum of the cloud logging API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudSeverity {
    Default,
    Debug,
    Info,
    Warning,
    Error,
}

impl From<Severity> for CloudSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Debug => CloudSeverity::Debug,
            Severity::Info => CloudSeverity::Info,
            Severity::Warn => CloudSeverity::Warning,
            Severity::Error => CloudSeverity::Error,
        }
    }
}

impl From<Option<Severity>> for CloudSeverity {
    fn from(severity: Option<Severity>) -> Self {
        severity.map_or(CloudSeverity::Default, CloudSeverity::from)
    }
}
