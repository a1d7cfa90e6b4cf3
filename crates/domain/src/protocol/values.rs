use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Projector power state as reported by `PWR?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Off,
    WarmingUp,
    On,
    CoolingDown,
    #[default]
    Unknown,
}

impl PowerState {
    /// Map an ESC/VP21 `PWR=` status code
    pub fn from_code(code: u8) -> Self {
        match code {
            // standby (network off / on), abnormal standby, wireless and A/V standby
            0x00 | 0x04 | 0x05 | 0x07 | 0x09 => Self::Off,
            0x01 => Self::On,
            0x02 => Self::WarmingUp,
            0x03 => Self::CoolingDown,
            _ => Self::Unknown,
        }
    }

    /// Canonical status code, used when acting as the device
    pub fn code(&self) -> u8 {
        match self {
            Self::Off => 0x04,
            Self::On => 0x01,
            Self::WarmingUp => 0x02,
            Self::CoolingDown => 0x03,
            Self::Unknown => 0xFF,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::WarmingUp => "warming_up",
            Self::On => "on",
            Self::CoolingDown => "cooling_down",
            Self::Unknown => "unknown",
        }
    }

    /// Whether `self -> next` follows the power cycle
    /// Off → WarmingUp → On → CoolingDown → Off.
    ///
    /// Leaving or entering `Unknown` is always expected (first observation,
    /// unreadable status). Staying in the same state is trivially valid.
    pub fn is_expected_transition(&self, next: PowerState) -> bool {
        if *self == next || *self == Self::Unknown || next == Self::Unknown {
            return true;
        }
        matches!(
            (self, next),
            (Self::Off, Self::WarmingUp)
                | (Self::WarmingUp, Self::On)
                | (Self::On, Self::CoolingDown)
                | (Self::CoolingDown, Self::Off)
        )
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input source selected with `SOURCE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Computer1,
    Computer2,
    Hdmi1,
    Hdmi2,
    Video,
    SVideo,
    Usb,
    Lan,
    /// A source code this bridge has no name for; kept verbatim
    Other(u8),
}

impl InputSource {
    /// Named sources, in the order offered to MQTT clients
    pub const NAMED: [InputSource; 8] = [
        Self::Hdmi1,
        Self::Hdmi2,
        Self::Computer1,
        Self::Computer2,
        Self::Video,
        Self::SVideo,
        Self::Usb,
        Self::Lan,
    ];

    pub fn from_code(code: u8) -> Self {
        match code {
            0x10 => Self::Computer1,
            0x20 => Self::Computer2,
            0x30 => Self::Hdmi1,
            0xA0 => Self::Hdmi2,
            0x41 => Self::Video,
            0x42 => Self::SVideo,
            0x52 => Self::Usb,
            0x53 => Self::Lan,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Computer1 => 0x10,
            Self::Computer2 => 0x20,
            Self::Hdmi1 => 0x30,
            Self::Hdmi2 => 0xA0,
            Self::Video => 0x41,
            Self::SVideo => 0x42,
            Self::Usb => 0x52,
            Self::Lan => 0x53,
            Self::Other(code) => *code,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Computer1 => "computer1".to_string(),
            Self::Computer2 => "computer2".to_string(),
            Self::Hdmi1 => "hdmi1".to_string(),
            Self::Hdmi2 => "hdmi2".to_string(),
            Self::Video => "video".to_string(),
            Self::SVideo => "s_video".to_string(),
            Self::Usb => "usb".to_string(),
            Self::Lan => "lan".to_string(),
            Self::Other(code) => format!("source_{:02x}", code),
        }
    }

    /// Resolve a name produced by [`InputSource::name`] (case-insensitive)
    pub fn from_name(name: &str) -> Result<Self, DomainError> {
        let lowered = name.trim().to_ascii_lowercase();
        if let Some(source) = Self::NAMED.iter().find(|s| s.name() == lowered) {
            return Ok(*source);
        }
        lowered
            .strip_prefix("source_")
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .map(Self::from_code)
            .ok_or_else(|| DomainError::InvalidPayload(format!("Unknown input source: {}", name)))
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Remote-control keys sent with `KEY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKey {
    Menu,
    Esc,
    Enter,
    Up,
    Down,
    Left,
    Right,
}

impl RemoteKey {
    pub const ALL: [RemoteKey; 7] = [
        Self::Menu,
        Self::Esc,
        Self::Enter,
        Self::Up,
        Self::Down,
        Self::Left,
        Self::Right,
    ];

    pub fn code(&self) -> u8 {
        match self {
            Self::Menu => 0x03,
            Self::Esc => 0x05,
            Self::Enter => 0x16,
            Self::Up => 0x35,
            Self::Down => 0x36,
            Self::Left => 0x37,
            Self::Right => 0x38,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Esc => "esc",
            Self::Enter => "enter",
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|k| k.as_str() == lowered)
    }
}

/// Lens memory slot recalled with `POPLP` (1..=10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LensMemory(u8);

impl LensMemory {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(slot: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&slot) {
            Ok(Self(slot))
        } else {
            Err(DomainError::InvalidPayload(format!(
                "Lens memory slot {} out of range {}..={}",
                slot,
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn slot(&self) -> u8 {
        self.0
    }
}

/// Image memory slot recalled with `POPMEM 02` (1..=10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageMemory(u8);

impl ImageMemory {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(slot: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&slot) {
            Ok(Self(slot))
        } else {
            Err(DomainError::InvalidPayload(format!(
                "Image memory slot {} out of range {}..={}",
                slot,
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn slot(&self) -> u8 {
        self.0
    }
}

/// Picture adjustments with a ranged value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PictureSetting {
    Brightness,
    Contrast,
    Saturation,
    Tint,
    Sharpness,
}

impl PictureSetting {
    pub const ALL: [PictureSetting; 5] = [
        Self::Brightness,
        Self::Contrast,
        Self::Saturation,
        Self::Tint,
        Self::Sharpness,
    ];

    /// ESC/VP21 verb
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Brightness => "BRIGHT",
            Self::Contrast => "CONTRAST",
            Self::Saturation => "DENSITY",
            Self::Tint => "TINT",
            Self::Sharpness => "SHARP",
        }
    }

    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.verb() == verb)
    }

    /// Topic level and entity id
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "color_saturation",
            Self::Tint => "tint",
            Self::Sharpness => "sharpness",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Brightness => "Brightness",
            Self::Contrast => "Contrast",
            Self::Saturation => "Color Saturation",
            Self::Tint => "Tint",
            Self::Sharpness => "Sharpness",
        }
    }
}

impl fmt::Display for PictureSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A picture setting value in percent (0..=100).
///
/// The projector works on a 0..=255 scale; `raw` and `from_raw` convert with
/// rounding, and every level survives the trip to raw and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PictureLevel(u8);

impl PictureLevel {
    pub const MAX: u8 = 100;
    const RAW_MAX: u16 = 255;

    pub fn new(level: u8) -> Result<Self, DomainError> {
        if level <= Self::MAX {
            Ok(Self(level))
        } else {
            Err(DomainError::InvalidPayload(format!(
                "Picture level {} out of range 0..={}",
                level,
                Self::MAX
            )))
        }
    }

    pub fn from_raw(raw: u8) -> Self {
        let max = u16::from(Self::MAX);
        Self(((u16::from(raw) * max + Self::RAW_MAX / 2) / Self::RAW_MAX) as u8)
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn raw(&self) -> u8 {
        let max = u16::from(Self::MAX);
        ((u16::from(self.0) * Self::RAW_MAX + max / 2) / max) as u8
    }
}
