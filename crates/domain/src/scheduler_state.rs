use serde::{Deserialize, Serialize};

/// Phase of the per-projector poll/command loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Not started, or the connection was just lost
    #[default]
    Idle,
    /// Opening the transport
    Connecting,
    /// Connected and waiting for the poll timer or a queued command
    Polling,
    /// Exactly one command is on the wire
    Executing,
    /// Waiting before the next connection attempt
    Backoff,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Polling => "polling",
            Self::Executing => "executing",
            Self::Backoff => "backoff",
        }
    }

    /// Whether the device should be advertised as reachable
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Polling | Self::Executing)
    }

    pub fn can_transition_to(&self, next: SchedulerState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting)
                | (Self::Connecting, Self::Polling)
                | (Self::Connecting, Self::Backoff)
                | (Self::Polling, Self::Executing)
                | (Self::Executing, Self::Polling)
                | (Self::Executing, Self::Backoff)
                | (Self::Backoff, Self::Connecting)
        )
    }

    /// Validated transition
    pub fn transition(&self, next: SchedulerState) -> Result<Self, &'static str> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err("Illegal scheduler transition")
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        assert_eq!(SchedulerState::default(), SchedulerState::Idle);
        assert!(!SchedulerState::Idle.is_available());
    }

    #[test]
    fn test_happy_path() {
        let state = SchedulerState::Idle;
        let state = state.transition(SchedulerState::Connecting).unwrap();
        let state = state.transition(SchedulerState::Polling).unwrap();
        assert!(state.is_available());
        let state = state.transition(SchedulerState::Executing).unwrap();
        let state = state.transition(SchedulerState::Polling).unwrap();
        assert_eq!(state, SchedulerState::Polling);
    }

    #[test]
    fn test_failure_path() {
        let state = SchedulerState::Executing
            .transition(SchedulerState::Backoff)
            .unwrap();
        assert!(!state.is_available());
        assert_eq!(
            state.transition(SchedulerState::Connecting).unwrap(),
            SchedulerState::Connecting
        );
        assert_eq!(
            SchedulerState::Connecting
                .transition(SchedulerState::Backoff)
                .unwrap(),
            SchedulerState::Backoff
        );
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(SchedulerState::Idle.transition(SchedulerState::Executing).is_err());
        assert!(SchedulerState::Backoff.transition(SchedulerState::Polling).is_err());
        assert!(SchedulerState::Polling.transition(SchedulerState::Backoff).is_err());
        assert!(SchedulerState::Connecting.transition(SchedulerState::Executing).is_err());
    }
}
