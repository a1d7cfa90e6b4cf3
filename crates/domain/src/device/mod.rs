mod projector_id;
mod state;

pub use projector_id::ProjectorId;
pub use state::{DeviceState, StateDelta};
