use serde::{Deserialize, Serialize};

use crate::device::ProjectorId;
use crate::protocol::PictureSetting;
use crate::error::{DomainError, Result};

/// A projector feature exposed over MQTT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Power,
    Input,
    Mute,
    Key,
    LensMemory,
    ImageMemory,
    LampHours,
    Error,
    Picture(PictureSetting),
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Self::Power,
        Self::Input,
        Self::Mute,
        Self::Key,
        Self::LensMemory,
        Self::ImageMemory,
        Self::LampHours,
        Self::Error,
        Self::Picture(PictureSetting::Brightness),
        Self::Picture(PictureSetting::Contrast),
        Self::Picture(PictureSetting::Saturation),
        Self::Picture(PictureSetting::Tint),
        Self::Picture(PictureSetting::Sharpness),
    ];

    /// Topic level under the projector's base topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Input => "input",
            Self::Mute => "mute",
            Self::Key => "key",
            Self::LensMemory => "lens_memory",
            Self::ImageMemory => "image_memory",
            Self::LampHours => "lamp_hours",
            Self::Error => "error",
            Self::Picture(setting) => setting.as_str(),
        }
    }

    pub fn accepts_commands(&self) -> bool {
        matches!(
            self,
            Self::Power
                | Self::Input
                | Self::Mute
                | Self::Key
                | Self::LensMemory
                | Self::ImageMemory
                | Self::Picture(_)
        )
    }

    pub fn publishes_state(&self) -> bool {
        matches!(
            self,
            Self::Power
                | Self::Input
                | Self::Mute
                | Self::LampHours
                | Self::Error
                | Self::Picture(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// MQTT → projector (`.../set`)
    Command,
    /// projector → MQTT (`.../state`, retained)
    State,
}

/// Static mapping of one MQTT topic to a capability and direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBinding {
    pub topic: String,
    pub capability: Capability,
    pub direction: Direction,
}

/// Bridge-wide status topic under `base_topic`, carrying the last will
pub fn bridge_status_topic(base_topic: &str) -> String {
    format!("{}/bridge/status", base_topic.trim().trim_end_matches('/'))
}

/// All topics of one projector, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMap {
    root: String,
    base: String,
    bindings: Vec<TopicBinding>,
}

impl TopicMap {
    pub fn new(base_topic: &str, projector: &ProjectorId) -> Result<Self> {
        let prefix = base_topic.trim().trim_end_matches('/');
        if prefix.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "MQTT base topic cannot be empty".to_string(),
            ));
        }
        if prefix.contains(['+', '#']) {
            return Err(DomainError::InvalidConfiguration(format!(
                "MQTT base topic {prefix} must not contain wildcards"
            )));
        }

        let base = format!("{}/{}", prefix, projector);
        let mut bindings = Vec::new();
        for capability in Capability::ALL {
            if capability.accepts_commands() {
                bindings.push(TopicBinding {
                    topic: format!("{}/{}/set", base, capability.as_str()),
                    capability,
                    direction: Direction::Command,
                });
            }
            if capability.publishes_state() {
                bindings.push(TopicBinding {
                    topic: format!("{}/{}/state", base, capability.as_str()),
                    capability,
                    direction: Direction::State,
                });
            }
        }

        Ok(Self {
            root: prefix.to_string(),
            base,
            bindings,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn bindings(&self) -> &[TopicBinding] {
        &self.bindings
    }

    /// Binding for an inbound command topic
    pub fn command_binding(&self, topic: &str) -> Option<&TopicBinding> {
        self.bindings
            .iter()
            .find(|b| b.direction == Direction::Command && b.topic == topic)
    }

    pub fn command_topics(&self) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(|b| b.direction == Direction::Command)
            .map(|b| b.topic.as_str())
    }

    pub fn command_topic(&self, capability: Capability) -> Option<&str> {
        self.topic(capability, Direction::Command)
    }

    pub fn state_topic(&self, capability: Capability) -> Option<&str> {
        self.topic(capability, Direction::State)
    }

    pub fn availability_topic(&self) -> String {
        format!("{}/availability", self.base)
    }

    pub fn bridge_status_topic(&self) -> String {
        bridge_status_topic(&self.root)
    }

    pub fn command_failed_topic(&self) -> String {
        format!("{}/command_failed", self.base)
    }

    fn topic(&self, capability: Capability, direction: Direction) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.capability == capability && b.direction == direction)
            .map(|b| b.topic.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> TopicMap {
        TopicMap::new("epson/", &ProjectorId::new("cinema").unwrap()).unwrap()
    }

    #[test]
    fn test_command_and_state_topics() {
        let topics = map();
        assert_eq!(topics.base(), "epson/cinema");
        assert_eq!(topics.command_topic(Capability::Power), Some("epson/cinema/power/set"));
        assert_eq!(topics.state_topic(Capability::Power), Some("epson/cinema/power/state"));
        assert_eq!(topics.state_topic(Capability::LampHours), Some("epson/cinema/lamp_hours/state"));
        assert_eq!(topics.availability_topic(), "epson/cinema/availability");
        assert_eq!(topics.bridge_status_topic(), "epson/bridge/status");
        assert_eq!(
            topics.command_topic(Capability::ImageMemory),
            Some("epson/cinema/image_memory/set")
        );
        assert_eq!(
            topics.state_topic(Capability::Picture(PictureSetting::Saturation)),
            Some("epson/cinema/color_saturation/state")
        );
    }

    #[test]
    fn test_read_only_capabilities_have_no_command_topic() {
        let topics = map();
        assert!(topics.command_topic(Capability::LampHours).is_none());
        assert!(topics.command_topic(Capability::Error).is_none());
        assert!(topics.state_topic(Capability::Key).is_none());
    }

    #[test]
    fn test_command_binding_lookup() {
        let topics = map();
        let binding = topics.command_binding("epson/cinema/input/set").unwrap();
        assert_eq!(binding.capability, Capability::Input);
        assert_eq!(binding.direction, Direction::Command);

        assert!(topics.command_binding("epson/cinema/input/state").is_none());
        assert!(topics.command_binding("epson/other/input/set").is_none());
    }

    #[test]
    fn test_command_topics_count() {
        // power, input, mute, key, lens and image memory, five picture settings
        assert_eq!(map().command_topics().count(), 11);
    }

    #[test]
    fn test_invalid_base_topic() {
        let id = ProjectorId::new("cinema").unwrap();
        assert!(TopicMap::new("  ", &id).is_err());
        assert!(TopicMap::new("home/+", &id).is_err());
    }
}
