//! MQTT side of the bridge: payload mapping, state publication and
//! Home Assistant discovery.

pub mod discovery;
mod engine;
pub mod payload;

pub use discovery::{DiscoveryDocument, discovery_documents};
pub use engine::MqttSyncEngine;
