use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod publisher;
pub use publisher::EventPublisher;

use crate::device::{ProjectorId, StateDelta};
use crate::protocol::{CommandKind, CommandOrigin};
use crate::scheduler_state::SchedulerState;

/// Events raised by a projector's scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// At least one observable field of the device state changed
    StateChanged {
        projector: ProjectorId,
        delta: StateDelta,
        timestamp: DateTime<Utc>,
    },

    /// The projector became reachable or unreachable
    AvailabilityChanged {
        projector: ProjectorId,
        available: bool,
        timestamp: DateTime<Utc>,
    },

    /// A command failed twice in a row and was discarded
    CommandFailed {
        projector: ProjectorId,
        command: CommandKind,
        origin: CommandOrigin,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The scheduler moved between phases
    SchedulerTransition {
        projector: ProjectorId,
        from: SchedulerState,
        to: SchedulerState,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn state_changed(projector: ProjectorId, delta: StateDelta) -> Self {
        Self::StateChanged {
            projector,
            delta,
            timestamp: Utc::now(),
        }
    }

    pub fn availability_changed(projector: ProjectorId, available: bool) -> Self {
        Self::AvailabilityChanged {
            projector,
            available,
            timestamp: Utc::now(),
        }
    }

    pub fn command_failed(
        projector: ProjectorId,
        command: CommandKind,
        origin: CommandOrigin,
        error: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            projector,
            command,
            origin,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn scheduler_transition(
        projector: ProjectorId,
        from: SchedulerState,
        to: SchedulerState,
    ) -> Self {
        Self::SchedulerTransition {
            projector,
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    pub fn projector(&self) -> &ProjectorId {
        match self {
            Self::StateChanged { projector, .. }
            | Self::AvailabilityChanged { projector, .. }
            | Self::CommandFailed { projector, .. }
            | Self::SchedulerTransition { projector, .. } => projector,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::StateChanged { timestamp, .. }
            | Self::AvailabilityChanged { timestamp, .. }
            | Self::CommandFailed { timestamp, .. }
            | Self::SchedulerTransition { timestamp, .. } => *timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "StateChanged",
            Self::AvailabilityChanged { .. } => "AvailabilityChanged",
            Self::CommandFailed { .. } => "CommandFailed",
            Self::SchedulerTransition { .. } => "SchedulerTransition",
        }
    }
}
