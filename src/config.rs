//! Configuration for the quote processor service.
//!
//! Channel wiring is explicit: the `[channels]` section maps the logical
//! bindings ("requests" in, "quotes" out) to concrete broker resources, so
//! queue and exchange names are plain configuration rather than metadata on
//! the processing code.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level service configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessorConfig {
    pub processor: ProcessorSection,
    pub amqp: AmqpSection,
    #[serde(default)]
    pub channels: ChannelsSection,
}

/// Processing stage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessorSection {
    /// Service identifier (must match [a-zA-Z0-9._-]+); used for consumer tags
    pub id: String,
    /// Worker pool size: maximum concurrently in-flight invocations
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Nominal per-request processing delay in milliseconds
    #[serde(default = "default_work_duration_ms")]
    pub work_duration_ms: u64,
}

impl ProcessorSection {
    pub fn work_duration(&self) -> Duration {
        Duration::from_millis(self.work_duration_ms)
    }
}

fn default_workers() -> usize {
    4
}

fn default_work_duration_ms() -> u64 {
    1000
}

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmqpSection {
    /// AMQP broker URL with protocol, host and port
    pub broker_url: String,
    /// Environment variable containing the broker username
    pub username_env: Option<String>,
    /// Environment variable containing the broker password
    pub password_env: Option<String>,
    /// Requeue cancelled deliveries instead of dropping them
    #[serde(default)]
    pub requeue_on_cancel: bool,
}

/// Logical channel bindings mapped to broker resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelsSection {
    /// Queue consumed by the "requests" input binding
    #[serde(default = "default_requests_queue")]
    pub requests_queue: String,
    /// Exchange published to by the "quotes" output binding
    #[serde(default = "default_quotes_exchange")]
    pub quotes_exchange: String,
}

impl Default for ChannelsSection {
    fn default() -> Self {
        Self {
            requests_queue: default_requests_queue(),
            quotes_exchange: default_quotes_exchange(),
        }
    }
}

fn default_requests_queue() -> String {
    "quote-requests".to_string()
}

fn default_quotes_exchange() -> String {
    "quotes".to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid processor ID format: {0}")]
    InvalidProcessorId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProcessorConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ProcessorConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_processor_id(&self.processor.id)?;

        if self.processor.workers == 0 {
            return Err(ConfigError::InvalidConfig(
                "processor.workers must be at least 1".to_string(),
            ));
        }
        if self.channels.requests_queue.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "channels.requests_queue must not be empty".to_string(),
            ));
        }
        if self.channels.quotes_exchange.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "channels.quotes_exchange must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with consistent handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get broker username from environment variable
    pub fn get_amqp_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.amqp.username_env.as_ref())
    }

    /// Get broker password from environment variable
    pub fn get_amqp_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.amqp.password_env.as_ref())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[processor]
id = "test-processor"

[amqp]
broker_url = "amqp://localhost:5672/%2f"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate processor ID format
fn validate_processor_id(id: &str) -> Result<(), ConfigError> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidProcessorId(format!(
            "Processor ID '{id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[processor]
id = "quote-processor"
workers = 8
work_duration_ms = 250

[amqp]
broker_url = "amqp://rabbit:5672/%2f"
username_env = "AMQP_USERNAME"
password_env = "AMQP_PASSWORD"
requeue_on_cancel = true

[channels]
requests_queue = "incoming-requests"
quotes_exchange = "outgoing-quotes"
"#;

        let config: ProcessorConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.processor.id, "quote-processor");
        assert_eq!(config.processor.workers, 8);
        assert_eq!(config.processor.work_duration(), Duration::from_millis(250));
        assert_eq!(config.amqp.broker_url, "amqp://rabbit:5672/%2f");
        assert!(config.amqp.requeue_on_cancel);
        assert_eq!(config.channels.requests_queue, "incoming-requests");
        assert_eq!(config.channels.quotes_exchange, "outgoing-quotes");
    }

    #[test]
    fn test_minimal_config_applies_defaults() {
        let toml_content = r#"
[processor]
id = "minimal"

[amqp]
broker_url = "amqp://localhost:5672/%2f"
"#;

        let config: ProcessorConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.processor.workers, 4);
        assert_eq!(config.processor.work_duration_ms, 1000);
        assert!(!config.amqp.requeue_on_cancel);
        assert_eq!(config.amqp.username_env, None);
        assert_eq!(config.channels.requests_queue, "quote-requests");
        assert_eq!(config.channels.quotes_exchange, "quotes");
    }

    #[test]
    fn test_invalid_processor_id() {
        let result = validate_processor_id("invalid@processor");
        assert!(result.is_err());

        let result = validate_processor_id("valid-processor_123.test");
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = ProcessorConfig::test_config();
        config.processor.workers = 0;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_channel_names_rejected() {
        let mut config = ProcessorConfig::test_config();
        config.channels.requests_queue = String::new();
        assert!(config.validate().is_err());

        let mut config = ProcessorConfig::test_config();
        config.channels.quotes_exchange = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_resolved_from_environment() {
        let mut config = ProcessorConfig::test_config();
        config.amqp.username_env = Some("QUOTE_TEST_AMQP_USER".to_string());

        std::env::set_var("QUOTE_TEST_AMQP_USER", "guest");
        assert_eq!(config.get_amqp_username(), Some("guest".to_string()));
        std::env::remove_var("QUOTE_TEST_AMQP_USER");

        assert_eq!(config.get_amqp_password(), None);
    }
}
