mod manager;
mod projector_bridge;

pub use manager::BridgeManager;
pub use projector_bridge::ProjectorBridge;
