//! Client configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [scan]
//! count = 100
//! pattern = "session:*"
//!
//! [observability]
//! collect_trace = false
//! log_topology_changes = true
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section and field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, OptsError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub observability: ObservabilityConfig,
    pub logging: LoggingConfig,
}

/// Defaults applied to keyspace scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// `COUNT` hint sent with every scan step
    pub count: Option<u32>,
    /// `MATCH` pattern sent with every scan step
    pub pattern: Option<String>,
}

/// Diagnostics switches, passed explicitly to the components that use them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Capture a backtrace into errors raised on behalf of the caller
    pub collect_trace: bool,
    /// Log at info level whenever the active topology is replaced
    pub log_topology_changes: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            collect_trace: false,
            log_topology_changes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::new(
                ErrorKind::Opts(OptsError::Invalid),
                format!("failed to read config file {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| {
            Error::new(
                ErrorKind::Opts(OptsError::Invalid),
                format!("failed to parse config: {}", e),
            )
        })
    }
}
