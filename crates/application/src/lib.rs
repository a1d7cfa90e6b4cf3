//! Application layer - projector schedulers and the MQTT bridge around them

pub mod bridge;
pub mod messaging;
pub mod scheduler;
pub mod state;
pub mod sync;

pub use bridge::{BridgeManager, ProjectorBridge};
pub use messaging::command_listener::CommandListener;
pub use scheduler::{ProjectorScheduler, SchedulerHandle, SchedulerSettings};
pub use state::DeviceStateModel;
pub use sync::MqttSyncEngine;
