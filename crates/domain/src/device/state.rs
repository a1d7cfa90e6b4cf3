use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{DeviceErrorCode, InputSource, PictureLevel, PictureSetting, PowerState};

/// Last known view of a projector
///
/// Fields the bridge has not observed yet are `None` (or `Unknown` for power).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceState {
    pub power: PowerState,
    pub input: Option<InputSource>,
    pub muted: Option<bool>,
    pub lamp_hours: Option<u32>,
    pub last_error: Option<DeviceErrorCode>,
    /// Picture settings read so far; only answered while the lamp is on
    #[serde(default)]
    pub picture: BTreeMap<PictureSetting, PictureLevel>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Compare observable fields only; `last_updated` is bookkeeping
    pub fn diff(&self, next: &DeviceState) -> StateDelta {
        StateDelta {
            power: (self.power != next.power).then_some(next.power),
            input: next.input.filter(|_| self.input != next.input),
            muted: next.muted.filter(|_| self.muted != next.muted),
            lamp_hours: next.lamp_hours.filter(|_| self.lamp_hours != next.lamp_hours),
            last_error: next.last_error.filter(|_| self.last_error != next.last_error),
            picture: next
                .picture
                .iter()
                .filter(|(setting, level)| self.picture.get(*setting) != Some(*level))
                .map(|(setting, level)| (*setting, *level))
                .collect(),
        }
    }

    /// Everything known so far, as a delta from an empty state
    pub fn as_delta(&self) -> StateDelta {
        DeviceState::default().diff(self)
    }
}

/// Observable fields that changed in one update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lamp_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<DeviceErrorCode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub picture: BTreeMap<PictureSetting, PictureLevel>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.input.is_none()
            && self.muted.is_none()
            && self.lamp_hours.is_none()
            && self.last_error.is_none()
            && self.picture.is_empty()
    }
}
