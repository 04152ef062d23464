//! INI Configuration Parser

use anyhow::{Context, Result};
use configparser::ini::Ini;
use std::net::IpAddr;
use std::path::Path;

use super::{Config, LoggingConfig, ServerConfig};

/// Configuration file parser
#[derive(Default)]
pub struct ConfigParser;

impl ConfigParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse main configuration file
    pub fn parse(&self, path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        self.parse_str(&content)
    }

    /// Parse configuration from an in-memory INI document
    pub fn parse_str(&self, content: &str) -> Result<Config> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to read config: {}", e))?;

        self.parse_ini(&ini)
    }

    fn parse_ini(&self, ini: &Ini) -> Result<Config> {
        let config = Config {
            server: self.parse_server_section(ini)?,
            logging: self.parse_logging_section(ini),
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_server_section(&self, ini: &Ini) -> Result<ServerConfig> {
        let mut config = ServerConfig::default();

        if let Some(val) = ini.get("server", "host") {
            config.host = val
                .parse::<IpAddr>()
                .map_err(|e| anyhow::anyhow!("Invalid host '{}': {}", val, e))?;
        }
        if let Some(val) = ini
            .getuint("server", "port")
            .map_err(|e| anyhow::anyhow!("Invalid port: {}", e))?
        {
            config.port = u16::try_from(val)
                .map_err(|_| anyhow::anyhow!("Port out of range: {}", val))?;
        }
        if let Some(val) = ini
            .getuint("server", "shutdown_timeout")
            .map_err(|e| anyhow::anyhow!("Invalid shutdown_timeout: {}", e))?
        {
            config.shutdown_timeout = val;
        }

        Ok(config)
    }

    fn parse_logging_section(&self, ini: &Ini) -> LoggingConfig {
        let mut config = LoggingConfig::default();

        if let Some(val) = ini.get("logging", "level") {
            config.level = val;
        }

        config
    }
}
