use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::values::{ImageMemory, InputSource, LensMemory, PictureLevel, PictureSetting, RemoteKey};

/// What to ask of the projector, including the argument when the verb takes one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "arg", rename_all = "snake_case")]
pub enum CommandKind {
    PowerOn,
    PowerOff,
    SetInput(InputSource),
    SetMute(bool),
    SendKey(RemoteKey),
    LoadLensMemory(LensMemory),
    LoadImageMemory(ImageMemory),
    SetPicture(PictureSetting, PictureLevel),
    QueryStatus,
    QueryInput,
    QueryMute,
    QueryLamp,
    QueryError,
    QueryPicture(PictureSetting),
}

impl CommandKind {
    /// ESC/VP21 verb
    pub fn verb(&self) -> &'static str {
        match self {
            Self::PowerOn | Self::PowerOff | Self::QueryStatus => "PWR",
            Self::SetInput(_) | Self::QueryInput => "SOURCE",
            Self::SetMute(_) | Self::QueryMute => "MUTE",
            Self::SendKey(_) => "KEY",
            Self::LoadLensMemory(_) => "POPLP",
            Self::LoadImageMemory(_) => "POPMEM",
            Self::SetPicture(setting, _) | Self::QueryPicture(setting) => setting.verb(),
            Self::QueryLamp => "LAMP",
            Self::QueryError => "ERR",
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::QueryStatus
                | Self::QueryInput
                | Self::QueryMute
                | Self::QueryLamp
                | Self::QueryError
                | Self::QueryPicture(_)
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerOn => f.write_str("power_on"),
            Self::PowerOff => f.write_str("power_off"),
            Self::SetInput(source) => write!(f, "set_input({})", source),
            Self::SetMute(on) => write!(f, "set_mute({})", on),
            Self::SendKey(key) => write!(f, "send_key({})", key.as_str()),
            Self::LoadLensMemory(slot) => write!(f, "load_lens_memory({})", slot.slot()),
            Self::LoadImageMemory(slot) => write!(f, "load_image_memory({})", slot.slot()),
            Self::SetPicture(setting, level) => write!(f, "set_{}({})", setting, level.level()),
            Self::QueryStatus => f.write_str("query_status"),
            Self::QueryInput => f.write_str("query_input"),
            Self::QueryMute => f.write_str("query_mute"),
            Self::QueryLamp => f.write_str("query_lamp"),
            Self::QueryError => f.write_str("query_error"),
            Self::QueryPicture(setting) => write!(f, "query_{}", setting),
        }
    }
}

/// Who asked for a command; decides queue priority and failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOrigin {
    Mqtt,
    Poll,
}

impl CommandOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mqtt => "mqtt",
            Self::Poll => "poll",
        }
    }
}

/// A request queued for the projector. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    id: Uuid,
    kind: CommandKind,
    origin: CommandOrigin,
    created_at: DateTime<Utc>,
}

impl Command {
    pub fn new(kind: CommandKind, origin: CommandOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            origin,
            created_at: Utc::now(),
        }
    }

    pub fn mqtt(kind: CommandKind) -> Self {
        Self::new(kind, CommandOrigin::Mqtt)
    }

    pub fn poll(kind: CommandKind) -> Self {
        Self::new(kind, CommandOrigin::Poll)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn origin(&self) -> CommandOrigin {
        self.origin
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
