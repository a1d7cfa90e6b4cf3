use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    ConnectError { endpoint: String, reason: String },

    #[error("Timed out waiting for a reply after {0} ms")]
    IoTimeout(u64),

    #[error("Connection closed: {0}")]
    IoClosed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unknown device error code 0x{0:02X}")]
    UnknownDeviceError(u8),

    #[error("Device rejected command {0}")]
    CommandRejected(String),

    #[error("Command {command} failed after {attempts} attempts: {reason}")]
    CommandFailed {
        command: String,
        attempts: u32,
        reason: String,
    },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl DomainError {
    pub fn connect(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectError {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Mid-exchange failures that invalidate the connection
    pub fn is_io(&self) -> bool {
        matches!(self, Self::IoTimeout(_) | Self::IoClosed(_))
    }

    /// Failures scoped to a single exchange; the connection stays usable
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse(_) | Self::UnknownDeviceError(_) | Self::CommandRejected(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        assert!(DomainError::IoTimeout(2000).is_io());
        assert!(DomainError::IoClosed("eof".into()).is_io());
        assert!(!DomainError::connect("10.0.0.5:3629", "refused").is_io());
        assert!(!DomainError::MalformedResponse("x".into()).is_io());
    }

    #[test]
    fn test_decode_classification() {
        assert!(DomainError::MalformedResponse("truncated".into()).is_decode());
        assert!(DomainError::UnknownDeviceError(0x42).is_decode());
        assert!(DomainError::CommandRejected("PWR".into()).is_decode());
        assert!(!DomainError::IoTimeout(10).is_decode());
    }

    #[test]
    fn test_unknown_code_display() {
        assert_eq!(
            DomainError::UnknownDeviceError(0x1f).to_string(),
            "Unknown device error code 0x1F"
        );
    }
}
