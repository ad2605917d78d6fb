use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Engine settings, loadable from a TOML file. Every section and field
/// has a default, so a missing config file means default behavior.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub channels: ChannelConfig,
    pub csv: CsvConfig,
    pub window: WindowLimits,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for EngineConfig {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

impl EngineConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.channels.capacity == 0 {
            anyhow::bail!("channels.capacity must be at least 1");
        }
        if self.csv.separator.chars().count() != 1 {
            anyhow::bail!(
                "csv.separator must be a single character, got {:?}",
                self.csv.separator
            );
        }
        if self.window.max_rows == Some(0) {
            anyhow::bail!("window.max_rows must be positive when set");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Bounded FIFO capacity between operator tasks. A full channel blocks
/// the producer, which is the engine's backpressure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Field separator for both the input and the output stream.
    pub separator: String,
}

impl CsvConfig {
    pub fn separator_byte(&self) -> u8 {
        self.separator.as_bytes().first().copied().unwrap_or(b',')
    }
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct WindowLimits {
    /// Per-window row cap. A window that reaches the cap is closed and
    /// emitted with `reason=overflow`. Unset means unbounded.
    pub max_rows: Option<usize>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.channels.capacity, 1000);
        assert_eq!(config.csv.separator_byte(), b',');
        assert_eq!(config.window.max_rows, None);
    }

    #[test]
    fn load_full_toml() {
        let config: EngineConfig = "\
[channels]
capacity = 64

[csv]
separator = \";\"

[window]
max_rows = 100000

[logging]
level = \"debug\"
"
        .parse()
        .unwrap();
        assert_eq!(config.channels.capacity, 64);
        assert_eq!(config.csv.separator_byte(), b';');
        assert_eq!(config.window.max_rows, Some(100_000));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: EngineConfig = "[channels]\ncapacity = 8\n".parse().unwrap();
        assert_eq!(config.channels.capacity, 8);
        assert_eq!(config.csv.separator, ",");
    }

    #[test]
    fn reject_zero_capacity() {
        assert!("[channels]\ncapacity = 0\n".parse::<EngineConfig>().is_err());
    }

    #[test]
    fn reject_multi_char_separator() {
        assert!("[csv]\nseparator = \",,\"\n".parse::<EngineConfig>().is_err());
    }

    #[test]
    fn reject_zero_row_cap() {
        assert!("[window]\nmax_rows = 0\n".parse::<EngineConfig>().is_err());
    }
}
