use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Error status reported by `ERR?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceErrorCode {
    None,
    Fan,
    LampFailureAtPowerOn,
    HighInternalTemperature,
    Lamp,
    LampCoverOpen,
    CinemaFilter,
    CapacitorDisconnected,
    AutoIris,
    Subsystem,
    LowAirFlow,
    AirFilterSensor,
    PowerSupply,
    Shutter,
    CoolingSystemPeltier,
    CoolingSystemPump,
}

const TABLE: [(u8, DeviceErrorCode); 16] = [
    (0x00, DeviceErrorCode::None),
    (0x01, DeviceErrorCode::Fan),
    (0x03, DeviceErrorCode::LampFailureAtPowerOn),
    (0x04, DeviceErrorCode::HighInternalTemperature),
    (0x06, DeviceErrorCode::Lamp),
    (0x07, DeviceErrorCode::LampCoverOpen),
    (0x08, DeviceErrorCode::CinemaFilter),
    (0x09, DeviceErrorCode::CapacitorDisconnected),
    (0x0A, DeviceErrorCode::AutoIris),
    (0x0B, DeviceErrorCode::Subsystem),
    (0x0C, DeviceErrorCode::LowAirFlow),
    (0x0D, DeviceErrorCode::AirFilterSensor),
    (0x0E, DeviceErrorCode::PowerSupply),
    (0x0F, DeviceErrorCode::Shutter),
    (0x10, DeviceErrorCode::CoolingSystemPeltier),
    (0x11, DeviceErrorCode::CoolingSystemPump),
];

impl DeviceErrorCode {
    pub fn from_code(code: u8) -> Result<Self, DomainError> {
        TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, e)| *e)
            .ok_or(DomainError::UnknownDeviceError(code))
    }

    pub fn code(&self) -> u8 {
        TABLE
            .iter()
            .find(|(_, e)| e == self)
            .map(|(c, _)| *c)
            .unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fan => "fan",
            Self::LampFailureAtPowerOn => "lamp_failure_at_power_on",
            Self::HighInternalTemperature => "high_internal_temperature",
            Self::Lamp => "lamp",
            Self::LampCoverOpen => "lamp_cover_open",
            Self::CinemaFilter => "cinema_filter",
            Self::CapacitorDisconnected => "capacitor_disconnected",
            Self::AutoIris => "auto_iris",
            Self::Subsystem => "subsystem",
            Self::LowAirFlow => "low_air_flow",
            Self::AirFilterSensor => "air_filter_sensor",
            Self::PowerSupply => "power_supply",
            Self::Shutter => "shutter",
            Self::CoolingSystemPeltier => "cooling_system_peltier",
            Self::CoolingSystemPump => "cooling_system_pump",
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
