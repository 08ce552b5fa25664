//! Configuration module for lendx-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use lendx_core::broker::BrokerSubjects;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    pub client_queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub subjects: BrokerSubjects,
    pub publish_timeout: Duration,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub flush_interval: Duration,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        self.build(file_config)
    }

    fn build(&self, mut file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        validate(&file_config)?;

        Ok(LoadedConfig {
            server: ServerSettings {
                listen: file_config.server.listen,
                client_queue_capacity: file_config.server.client_queue_capacity,
            },
            broker: BrokerSettings {
                url: file_config.broker.url,
                subjects: BrokerSubjects {
                    orders: file_config.broker.order_subject,
                    responses: file_config.broker.response_subject,
                },
                publish_timeout: Duration::from_millis(file_config.broker.publish_timeout_ms),
            },
            flush_interval: Duration::from_millis(file_config.aggregator.flush_interval_ms),
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.client_queue_capacity == 0 {
        return invalid("server.client_queue_capacity must be greater than zero");
    }
    if config.broker.publish_timeout_ms == 0 {
        return invalid("broker.publish_timeout_ms must be greater than zero");
    }
    if config.aggregator.flush_interval_ms == 0 {
        return invalid("aggregator.flush_interval_ms must be greater than zero");
    }
    if config.broker.order_subject.trim().is_empty()
        || config.broker.response_subject.trim().is_empty()
    {
        return invalid("broker subjects must not be empty");
    }
    if config.broker.order_subject == config.broker.response_subject {
        return invalid("broker.order_subject and broker.response_subject must differ");
    }
    Ok(())
}

/// Read the database connection string from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> FileConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_listen_override_and_conversion() {
        let override_addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loader = ConfigLoader::new("unused.toml", Some(override_addr));
        let loaded = loader
            .build(parse("[server]\nlisten = \"0.0.0.0:1\"\n[aggregator]\nflush_interval_ms = 200\n"))
            .unwrap();
        assert_eq!(loaded.server.listen, override_addr);
        assert_eq!(loaded.flush_interval, Duration::from_millis(200));
        assert_eq!(loaded.broker.subjects, BrokerSubjects::default());
        assert_eq!(loaded.broker.publish_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_zero_intervals_and_bad_subjects() {
        let loader = ConfigLoader::new("unused.toml", None);
        for bad in [
            "[server]\n[aggregator]\nflush_interval_ms = 0\n",
            "[server]\nclient_queue_capacity = 0\n",
            "[server]\n[broker]\npublish_timeout_ms = 0\n",
            "[server]\n[broker]\norder_subject = \"\"\n",
            "[server]\n[broker]\norder_subject = \"x\"\nresponse_subject = \"x\"\n",
        ] {
            assert!(matches!(
                loader.build(parse(bad)),
                Err(ConfigError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let loader = ConfigLoader::new("/nonexistent/lendx-config.toml", None);
        assert!(matches!(loader.load(), Err(ConfigError::IoError(_))));
    }
}
