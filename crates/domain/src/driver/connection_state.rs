use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state for the projector link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// Not connected, no active connection attempt
    #[default]
    Disconnected,
    /// Currently attempting to establish connection
    Connecting,
    /// Connected and exchanging clean frames
    Connected,
    /// Connected, but the last exchange produced an undecodable frame
    Degraded,
}

impl ConnectionState {
    /// Check if state allows connection attempt
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Check if the link is open (clean or degraded)
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Connected | Self::Degraded)
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting | Self::Degraded | Self::Connected => Ok(Self::Connected),
            Self::Disconnected => Err("Cannot be connected without a connection attempt"),
        }
    }

    /// Transition to degraded state
    pub fn to_degraded(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connected | Self::Degraded => Ok(Self::Degraded),
            _ => Err("Only an open connection can degrade"),
        }
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }
}

/// The single live link to a projector, owned by its scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    endpoint: String,
    state: ConnectionState,
    last_activity: Option<DateTime<Utc>>,
}

impl Connection {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: ConnectionState::Disconnected,
            last_activity: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    pub fn begin_connect(&mut self) {
        // A reconnect may start from any state; the old link is already gone
        if !self.state.can_connect() {
            self.state = self.state.to_disconnected();
        }
        if let Ok(next) = self.state.to_connecting() {
            self.state = next;
        }
    }

    pub fn mark_connected(&mut self) {
        if let Ok(next) = self.state.to_connected() {
            self.state = next;
        }
    }

    pub fn mark_degraded(&mut self) {
        if let Ok(next) = self.state.to_degraded() {
            self.state = next;
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.state = self.state.to_disconnected();
    }

    pub fn touch(&mut self, at: Option<DateTime<Utc>>) {
        if at.is_some() {
            self.last_activity = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(state.can_connect());
        assert!(!state.is_open());
    }

    #[test]
    fn test_transition_disconnected_to_connecting() {
        let next = ConnectionState::Disconnected.to_connecting().unwrap();
        assert_eq!(next, ConnectionState::Connecting);
    }

    #[test]
    fn test_transition_connecting_to_connected() {
        let next = ConnectionState::Connecting.to_connected().unwrap();
        assert_eq!(next, ConnectionState::Connected);
        assert!(next.is_open());
    }

    #[test]
    fn test_cannot_connect_from_connected() {
        assert!(ConnectionState::Connected.to_connecting().is_err());
    }

    #[test]
    fn test_degraded_only_from_open_link() {
        assert_eq!(
            ConnectionState::Connected.to_degraded().unwrap(),
            ConnectionState::Degraded
        );
        assert!(ConnectionState::Connecting.to_degraded().is_err());
        assert!(ConnectionState::Disconnected.to_degraded().is_err());
    }

    #[test]
    fn test_degraded_recovers_to_connected() {
        let next = ConnectionState::Degraded.to_connected().unwrap();
        assert_eq!(next, ConnectionState::Connected);
    }

    #[test]
    fn test_connection_lifecycle() {
        let mut conn = Connection::new("192.168.1.50:3629");
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        conn.begin_connect();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        conn.mark_connected();
        conn.mark_degraded();
        assert_eq!(conn.state(), ConnectionState::Degraded);

        conn.mark_disconnected();
        conn.begin_connect();
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_reconnect_from_open_link() {
        for start in [ConnectionState::Connected, ConnectionState::Degraded] {
            let mut conn = Connection::new("192.168.1.50:3629");
            conn.begin_connect();
            conn.mark_connected();
            if start == ConnectionState::Degraded {
                conn.mark_degraded();
            }
            assert!(!conn.state().can_connect());

            conn.begin_connect();
            assert_eq!(conn.state(), ConnectionState::Connecting);
        }
    }

    #[test]
    fn test_touch_keeps_latest_activity() {
        let mut conn = Connection::new("/dev/ttyUSB0");
        let now = Utc::now();
        conn.touch(Some(now));
        conn.touch(None);
        assert_eq!(conn.last_activity(), Some(now));
    }
}
