//! MQTT payload ⇄ command/state mapping

use domain::protocol::{ImageMemory, InputSource, LensMemory, PictureLevel, RemoteKey};
use domain::{Capability, CommandKind, DomainError, StateDelta, TopicMap};

pub const ON: &str = "on";
pub const OFF: &str = "off";
pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// Decode a `.../set` payload for `capability`
pub fn decode_command(capability: Capability, payload: &[u8]) -> Result<CommandKind, DomainError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| DomainError::InvalidPayload("Payload is not UTF-8".to_string()))?
        .trim();

    match capability {
        Capability::Power => parse_switch(text).map(|on| {
            if on {
                CommandKind::PowerOn
            } else {
                CommandKind::PowerOff
            }
        }),
        Capability::Input => InputSource::from_name(text).map(CommandKind::SetInput),
        Capability::Mute => parse_switch(text).map(CommandKind::SetMute),
        Capability::Key => RemoteKey::from_name(text)
            .map(CommandKind::SendKey)
            .ok_or_else(|| DomainError::InvalidPayload(format!("Unknown remote key: {}", text))),
        Capability::LensMemory => {
            let slot = text
                .parse::<u8>()
                .map_err(|_| DomainError::InvalidPayload(format!("Invalid lens memory: {}", text)))?;
            LensMemory::new(slot).map(CommandKind::LoadLensMemory)
        }
        Capability::ImageMemory => {
            let slot = text
                .parse::<u8>()
                .map_err(|_| DomainError::InvalidPayload(format!("Invalid image memory: {}", text)))?;
            ImageMemory::new(slot).map(CommandKind::LoadImageMemory)
        }
        Capability::Picture(setting) => {
            // Home Assistant number entities may send "40.0"
            let level = text
                .parse::<f64>()
                .ok()
                .filter(|l| l.is_finite() && l.fract() == 0.0 && (0.0..=255.0).contains(l))
                .ok_or_else(|| {
                    DomainError::InvalidPayload(format!("Invalid {} level: {}", setting, text))
                })?;
            PictureLevel::new(level as u8).map(|level| CommandKind::SetPicture(setting, level))
        }
        Capability::LampHours | Capability::Error => Err(DomainError::InvalidPayload(format!(
            "{} does not accept commands",
            capability.as_str()
        ))),
    }
}

fn parse_switch(text: &str) -> Result<bool, DomainError> {
    if text.eq_ignore_ascii_case(ON) {
        Ok(true)
    } else if text.eq_ignore_ascii_case(OFF) {
        Ok(false)
    } else {
        Err(DomainError::InvalidPayload(format!(
            "Expected on/off, got {:?}",
            text
        )))
    }
}

pub fn switch_payload(on: bool) -> &'static str {
    if on { ON } else { OFF }
}

pub fn availability_payload(available: bool) -> &'static str {
    if available { ONLINE } else { OFFLINE }
}

/// State topic publications for a delta, in a fixed order.
///
/// Pure: the same delta always renders the same list.
pub fn render_delta(topics: &TopicMap, delta: &StateDelta) -> Vec<(String, String)> {
    let fields = [
        (Capability::Power, delta.power.map(|p| p.as_str().to_string())),
        (Capability::Input, delta.input.map(|i| i.name())),
        (
            Capability::Mute,
            delta.muted.map(|m| switch_payload(m).to_string()),
        ),
        (Capability::LampHours, delta.lamp_hours.map(|h| h.to_string())),
        (
            Capability::Error,
            delta.last_error.map(|e| e.as_str().to_string()),
        ),
    ];

    let pictures = delta
        .picture
        .iter()
        .map(|(setting, level)| (Capability::Picture(*setting), Some(level.level().to_string())));

    fields
        .into_iter()
        .chain(pictures)
        .filter_map(|(capability, payload)| {
            let topic = topics.state_topic(capability)?;
            payload.map(|p| (topic.to_string(), p))
        })
        .collect()
}
