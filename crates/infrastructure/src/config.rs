use std::collections::HashSet;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use domain::binding::bridge_status_topic;
use domain::{DomainError, ProjectorId};
use serde::{Deserialize, Serialize};

use crate::transport::TransportConfig;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
    /// Home Assistant discovery prefix; absent disables discovery
    pub discovery_prefix: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "epson-bridge".to_string()
}
fn default_base_topic() -> String {
    "epson".to_string()
}
fn default_keep_alive() -> u64 {
    20
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            base_topic: default_base_topic(),
            discovery_prefix: None,
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl MqttConfig {
    /// Bridge-level status topic carrying the last will
    pub fn status_topic(&self) -> String {
        bridge_status_topic(&self.base_topic)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProjectorConfig {
    pub name: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    pub transport: TransportConfig,
}

fn default_timeout_ms() -> u64 {
    2000
}
fn default_poll_interval_ms() -> u64 {
    10_000
}
fn default_backoff_initial_ms() -> u64 {
    1000
}
fn default_backoff_max_ms() -> u64 {
    60_000
}
fn default_queue_depth() -> usize {
    32
}

impl ProjectorConfig {
    pub fn new(name: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            name: name.into(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            queue_depth: default_queue_depth(),
            transport,
        }
    }

    pub fn id(&self) -> Result<ProjectorId, DomainError> {
        ProjectorId::new(&self.name)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.id()?;
        if self.timeout_ms == 0 {
            return Err(invalid(&self.name, "timeout_ms must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid(&self.name, "poll_interval_ms must be greater than zero"));
        }
        if self.queue_depth == 0 {
            return Err(invalid(&self.name, "queue_depth must be greater than zero"));
        }
        if self.backoff_initial_ms == 0 {
            return Err(invalid(&self.name, "backoff_initial_ms must be greater than zero"));
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(invalid(
                &self.name,
                "backoff_max_ms must not be lower than backoff_initial_ms",
            ));
        }
        self.transport.validate()
    }
}

fn invalid(projector: &str, reason: &str) -> DomainError {
    DomainError::InvalidConfiguration(format!("Projector '{}': {}", projector, reason))
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub projectors: Vec<ProjectorConfig>,
}

impl BridgeConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default settings
            .set_default("mqtt.host", default_mqtt_host())?
            .set_default("mqtt.port", default_mqtt_port())?
            // Local config file, e.g. config/default.toml
            // We make this REQUIRED to avoid starting with a missing configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            // Per-environment overrides
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. EPSON__MQTT__HOST=10.0.0.1)
            .add_source(Environment::with_prefix("EPSON").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parse a TOML document; no files or environment involved
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.mqtt.base_topic.trim_matches('/').is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "mqtt.base_topic must not be empty".to_string(),
            ));
        }
        if self.projectors.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "At least one projector must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for projector in &self.projectors {
            projector.validate()?;
            if !seen.insert(projector.name.as_str()) {
                return Err(invalid(&projector.name, "duplicate projector name"));
            }
        }
        Ok(())
    }
}
