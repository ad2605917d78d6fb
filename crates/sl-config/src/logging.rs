use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

// ---------------------------------------------------------------------------
// LoggingConfig — deserialized from [logging]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `"info"` or `"sl_runtime=debug"`.
    pub level: String,
    pub format: LogFormat,
    /// Optional log file; events also go to stderr.
    pub file: Option<PathBuf>,
    /// How often the ingress stage reports its drop counters.
    pub counter_interval: HumanDuration,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            file: None,
            counter_interval: std::time::Duration::from_secs(30).into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Plain,
    Json,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
