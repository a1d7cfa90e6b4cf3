//! Infrastructure layer - External integrations
//!
//! Projector transports (ESC/VP.net over TCP, RS-232, in-process simulator),
//! the rumqttc-backed MQTT client and configuration loading.

pub mod config;
pub mod messaging;
pub mod transport;

pub use config::{BridgeConfig, MqttConfig, ProjectorConfig};
pub use messaging::{MqttClient, MqttMessage, MqttPublisherClient, MqttSubscriberClient};
pub use transport::{TransportConfig, TransportFactory};
