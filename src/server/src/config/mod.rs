//! Configuration Management
//!
//! Handles loading and validation of the player server configuration file.

mod parser;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub use parser::ConfigParser;

/// Default listener port
pub const DEFAULT_PORT: u16 = 8888;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Listener configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: IpAddr,
    /// TCP port to bind (0 picks an ephemeral port)
    pub port: u16,
    /// Seconds to wait for the listener to close on stop
    pub shutdown_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            shutdown_timeout: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loopback listener on an ephemeral port
    pub fn loopback() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }

    /// Same settings with a different port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl Config {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let parser = ConfigParser::new();
        parser
            .parse(path)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.shutdown_timeout == 0 {
            anyhow::bail!("shutdown_timeout must be at least 1 second");
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("Unknown log level: {}", other),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.server.socket_addr().to_string(), "0.0.0.0:8888");
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.conf")).unwrap();
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_load_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("player.conf");
        std::fs::write(
            &path,
            "[server]\nhost = 127.0.0.1\nport = 9000\nshutdown_timeout = 3\n\n[logging]\nlevel = debug\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.shutdown_timeout, 3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_shutdown_timeout_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("player.conf");
        std::fs::write(&path, "[server]\nshutdown_timeout = 0\n").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
