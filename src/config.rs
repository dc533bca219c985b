//! Server configuration.
//!
//! Defaults cover everything; a TOML file and CLI flags can override.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BrookError, Result};
use crate::protocol::ParserLimits;

/// Default listen port
pub const DEFAULT_PORT: u16 = 6379;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network settings
    pub server: ServerConfig,
    /// Protocol parser limits
    pub limits: LimitsConfig,
}

/// Network settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// The bind address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Protocol parser limits (see [`ParserLimits`])
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum bulk string size in bytes
    pub max_bulk_len: usize,
    /// Maximum number of elements in a request array
    pub max_multibulk_len: usize,
    /// Maximum array nesting depth
    pub max_nesting_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let defaults = ParserLimits::default();
        Self {
            max_bulk_len: defaults.max_bulk_string_size,
            max_multibulk_len: defaults.max_array_elements,
            max_nesting_depth: defaults.max_nesting_depth,
        }
    }
}

impl LimitsConfig {
    /// Convert to the parser's limit type
    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            max_bulk_string_size: self.max_bulk_len,
            max_array_elements: self.max_multibulk_len,
            max_nesting_depth: self.max_nesting_depth,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BrookError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&text).map_err(|e| BrookError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.address(), "127.0.0.1:6379");
        assert_eq!(
            config.limits.max_bulk_len,
            ParserLimits::default().max_bulk_string_size
        );
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0"
            port = 7000

            [limits]
            max_bulk_len = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.server.address(), "0.0.0.0:7000");
        assert_eq!(config.limits.max_bulk_len, 1024);
        // Unspecified fields keep their defaults
        assert_eq!(
            config.limits.max_nesting_depth,
            ParserLimits::default().max_nesting_depth
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
    }
}
