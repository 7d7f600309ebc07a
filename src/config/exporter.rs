//! Exporter (backend) configuration

use crate::middleware::DEFAULT_ERROR_STATUS_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Backend that receives correlated entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    /// JSON lines on stdout
    #[default]
    Stream,
    /// Cloud logging structured JSON on stdout
    Cloud,
    /// Human-readable lines on stderr
    Console,
}

impl FromStr for ExporterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream" => Ok(ExporterKind::Stream),
            "cloud" => Ok(ExporterKind::Cloud),
            "console" => Ok(ExporterKind::Console),
            _ => Err(format!("Invalid exporter: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub kind: ExporterKind,
    /// Emit a parent entry even when a request logged nothing
    pub log_all: bool,
    /// Console only
    pub no_color: bool,
    /// Cloud only; formats correlation IDs as `projects/<id>/traces/<trace>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub error_status_threshold: u16,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            kind: ExporterKind::Stream,
            log_all: true,
            no_color: false,
            project_id: None,
            error_status_threshold: DEFAULT_ERROR_STATUS_THRESHOLD,
        }
    }
}
