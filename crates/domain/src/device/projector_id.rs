use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Value object naming one projector; it becomes an MQTT topic level
///
/// Rules:
/// - Must be non-empty
/// - Must contain only alphanumeric, underscore, and hyphen (no `/`, `+`, `#`)
/// - Max length 64 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectorId(String);

impl ProjectorId {
    /// Create a new ProjectorId with validation
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "Projector name cannot be empty".to_string(),
            ));
        }

        if id.len() > 64 {
            return Err(DomainError::InvalidConfiguration(format!(
                "Projector name too long: {} chars (max 64)",
                id.len()
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomainError::InvalidConfiguration(format!(
                "Projector name {id} must contain only alphanumeric, underscore and hyphen"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectorId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ProjectorId> for String {
    fn from(value: ProjectorId) -> Self {
        value.0
    }
}

impl std::fmt::Display for ProjectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
