//! Domain layer - projector model with no I/O
//!
//! This crate contains:
//! - The ESC/VP21 command/response codec and error-code table
//! - Commands, responses and the device state they update
//! - Connection and scheduler state machines
//! - MQTT topic bindings
//! - Domain events and the transport / publisher traits
//!
//! Everything here is testable with synthetic byte streams and values.

pub mod binding;
pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod protocol;
pub mod scheduler_state;

// Re-export commonly used types
pub use binding::{Capability, Direction, TopicBinding, TopicMap};
pub use device::{DeviceState, ProjectorId, StateDelta};
pub use error::DomainError;
pub use event::DomainEvent;
pub use protocol::{Command, CommandKind, CommandOrigin, EscVpCodec, Response, ResponseValue};
pub use scheduler_state::SchedulerState;
