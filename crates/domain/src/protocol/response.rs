use serde::{Deserialize, Serialize};

use super::command::CommandKind;
use super::error_code::DeviceErrorCode;
use super::values::{InputSource, PictureLevel, PictureSetting, PowerState};

/// Typed value carried by a query reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ResponseValue {
    Power(PowerState),
    Input(InputSource),
    Mute(bool),
    LampHours(u32),
    Error(DeviceErrorCode),
    Picture(PictureSetting, PictureLevel),
}

/// Decoded result of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    kind: CommandKind,
    success: bool,
    value: Option<ResponseValue>,
    error_code: Option<u8>,
}

impl Response {
    /// The device accepted a set-command (bare `:` prompt)
    pub fn ack(kind: CommandKind) -> Self {
        Self {
            kind,
            success: true,
            value: None,
            error_code: None,
        }
    }

    pub fn value(kind: CommandKind, value: ResponseValue) -> Self {
        Self {
            kind,
            success: true,
            value: Some(value),
            error_code: None,
        }
    }

    /// The device answered `ERR`. ESC/VP21 does not carry the code in the
    /// rejection itself; it is only known if the caller already read it.
    pub fn rejected(kind: CommandKind, error_code: Option<u8>) -> Self {
        Self {
            kind,
            success: false,
            value: None,
            error_code,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn value_ref(&self) -> Option<&ResponseValue> {
        self.value.as_ref()
    }

    pub fn error_code(&self) -> Option<u8> {
        self.error_code
    }
}
