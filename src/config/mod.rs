//! Configuration for the correlog binary
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CORRELOG_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use correlog::config::{CorrelogConfig, ExporterKind};
//!
//! let toml = r#"
//! [exporter]
//! kind = "console"
//! "#;
//! let config: CorrelogConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.exporter.kind, ExporterKind::Console);
//! assert_eq!(config.server.port, 8000);
//! ```

pub mod error;
pub mod exporter;
pub mod logging;
pub mod server;

pub use error::ConfigError;
pub use exporter::{ExporterConfig, ExporterKind};
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CorrelogConfig {
    /// Demo HTTP server
    pub server: ServerConfig,
    /// Process diagnostics
    pub logging: LoggingConfig,
    /// Correlated request logging backend
    pub exporter: ExporterConfig,
}

impl CorrelogConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `CORRELOG_*` environment variable overrides
    ///
    /// Invalid values are silently ignored (previous values are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("CORRELOG_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("CORRELOG_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("CORRELOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CORRELOG_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(exporter) = std::env::var("CORRELOG_EXPORTER") {
            if let Ok(kind) = exporter.parse() {
                self.exporter.kind = kind;
            }
        }
        if let Ok(log_all) = std::env::var("CORRELOG_LOG_ALL") {
            self.exporter.log_all = log_all.to_lowercase() == "true";
        }
        if let Ok(no_color) = std::env::var("CORRELOG_NO_COLOR") {
            self.exporter.no_color = no_color.to_lowercase() == "true";
        }
        if let Ok(project) = std::env::var("CORRELOG_PROJECT_ID") {
            self.exporter.project_id = Some(project).filter(|p| !p.is_empty());
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }
        if self.server.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "server.request_timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }

        let threshold = self.exporter.error_status_threshold;
        if !(100..=599).contains(&threshold) {
            return Err(ConfigError::Validation {
                field: "exporter.error_status_threshold".to_string(),
                message: format!("{} is not an HTTP status code", threshold),
            });
        }
        if matches!(&self.exporter.project_id, Some(p) if p.trim().is_empty()) {
            return Err(ConfigError::Validation {
                field: "exporter.project_id".to_string(),
                message: "project ID cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}
