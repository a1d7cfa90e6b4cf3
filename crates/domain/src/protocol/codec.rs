//! ESC/VP21 command grammar.
//!
//! Requests are `VERB[ PARAM]\r` or `VERB?\r`. Every reply ends with the `:`
//! prompt: a bare `:` acknowledges a set-command, `VERB=VALUE\r:` answers a
//! query and `ERR\r:` is a rejection.

use super::command::CommandKind;
use super::error_code::DeviceErrorCode;
use super::response::{Response, ResponseValue};
use super::values::{
    ImageMemory, InputSource, LensMemory, PictureLevel, PictureSetting, PowerState, RemoteKey,
};
use crate::error::DomainError;

pub const TERMINATOR: u8 = b'\r';
pub const PROMPT: u8 = b':';
const REJECTION: &str = "ERR";
/// `POPMEM` sub-command that recalls a slot
const IMAGE_MEMORY_LOAD: &str = "02";

/// Wire-level reply, before it is tied to the command that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Rejected,
    Value { verb: String, value: String },
}

/// Stateless ESC/VP21 encoder/decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct EscVpCodec;

impl EscVpCodec {
    pub fn new() -> Self {
        Self
    }

    /// Render a command as request bytes. Total over all command kinds.
    pub fn encode(&self, kind: &CommandKind) -> Vec<u8> {
        let verb = kind.verb();
        let line = match kind {
            CommandKind::PowerOn => format!("{} ON", verb),
            CommandKind::PowerOff => format!("{} OFF", verb),
            CommandKind::SetInput(source) => format!("{} {:02X}", verb, source.code()),
            CommandKind::SetMute(true) => format!("{} ON", verb),
            CommandKind::SetMute(false) => format!("{} OFF", verb),
            CommandKind::SendKey(key) => format!("{} {:02X}", verb, key.code()),
            CommandKind::LoadLensMemory(slot) => format!("{} {:02X}", verb, slot.slot()),
            CommandKind::LoadImageMemory(slot) => {
                format!("{} {} {:02X}", verb, IMAGE_MEMORY_LOAD, slot.slot())
            }
            CommandKind::SetPicture(_, level) => format!("{} {}", verb, level.raw()),
            CommandKind::QueryStatus
            | CommandKind::QueryInput
            | CommandKind::QueryMute
            | CommandKind::QueryLamp
            | CommandKind::QueryError
            | CommandKind::QueryPicture(_) => format!("{}?", verb),
        };

        let mut bytes = line.into_bytes();
        bytes.push(TERMINATOR);
        bytes
    }

    /// Parse request bytes back into a command (the projector's side of the
    /// exchange).
    pub fn parse_request(&self, bytes: &[u8]) -> Result<CommandKind, DomainError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DomainError::MalformedResponse("Request is not ASCII".to_string()))?;
        let line = text
            .strip_suffix(TERMINATOR as char)
            .ok_or_else(|| DomainError::MalformedResponse(format!("Unterminated request: {:?}", text)))?
            .trim();

        if let Some(verb) = line.strip_suffix('?') {
            return match verb {
                "PWR" => Ok(CommandKind::QueryStatus),
                "SOURCE" => Ok(CommandKind::QueryInput),
                "MUTE" => Ok(CommandKind::QueryMute),
                "LAMP" => Ok(CommandKind::QueryLamp),
                "ERR" => Ok(CommandKind::QueryError),
                other => PictureSetting::from_verb(other)
                    .map(CommandKind::QueryPicture)
                    .ok_or_else(|| DomainError::MalformedResponse(format!("Unknown query: {}", other))),
            };
        }

        let (verb, param) = line
            .split_once(' ')
            .ok_or_else(|| DomainError::MalformedResponse(format!("Missing parameter: {}", line)))?;
        let param = param.trim();

        match (verb, param) {
            ("PWR", "ON") => Ok(CommandKind::PowerOn),
            ("PWR", "OFF") => Ok(CommandKind::PowerOff),
            ("MUTE", "ON") => Ok(CommandKind::SetMute(true)),
            ("MUTE", "OFF") => Ok(CommandKind::SetMute(false)),
            ("SOURCE", hex) => parse_hex(hex).map(|c| CommandKind::SetInput(InputSource::from_code(c))),
            ("KEY", hex) => {
                let code = parse_hex(hex)?;
                RemoteKey::from_code(code)
                    .map(CommandKind::SendKey)
                    .ok_or_else(|| DomainError::MalformedResponse(format!("Unknown key code {}", hex)))
            }
            ("POPLP", hex) => {
                let slot = parse_hex(hex)?;
                LensMemory::new(slot)
                    .map(CommandKind::LoadLensMemory)
                    .map_err(|e| DomainError::MalformedResponse(e.to_string()))
            }
            ("POPMEM", param) => {
                let hex = param
                    .strip_prefix(IMAGE_MEMORY_LOAD)
                    .ok_or_else(|| DomainError::MalformedResponse(format!("Unsupported request: {}", line)))?;
                let slot = parse_hex(hex)?;
                ImageMemory::new(slot)
                    .map(CommandKind::LoadImageMemory)
                    .map_err(|e| DomainError::MalformedResponse(e.to_string()))
            }
            (verb, raw) => match PictureSetting::from_verb(verb) {
                Some(setting) => {
                    parse_raw(raw).map(|r| CommandKind::SetPicture(setting, PictureLevel::from_raw(r)))
                }
                None => Err(DomainError::MalformedResponse(format!("Unknown request: {}", line))),
            },
        }
    }

    /// Split a framed reply into its wire-level meaning.
    pub fn decode_reply(&self, frame: &[u8]) -> Result<Reply, DomainError> {
        let Some((&last, body)) = frame.split_last() else {
            return Err(DomainError::MalformedResponse("Empty frame".to_string()));
        };
        if last != PROMPT {
            return Err(DomainError::MalformedResponse(format!(
                "Unterminated frame: {:?}",
                String::from_utf8_lossy(frame)
            )));
        }

        let text = std::str::from_utf8(body)
            .map_err(|_| DomainError::MalformedResponse("Reply is not ASCII".to_string()))?;

        // Some firmware prefixes the reply with blank lines; the last line carries it
        let Some(line) = text
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
        else {
            return Ok(Reply::Ack);
        };

        if line == REJECTION {
            return Ok(Reply::Rejected);
        }

        match line.split_once('=') {
            Some((verb, value)) if !verb.is_empty() && !value.trim().is_empty() => Ok(Reply::Value {
                verb: verb.trim().to_string(),
                value: value.trim().to_string(),
            }),
            Some(_) => Err(DomainError::MalformedResponse(format!("Truncated reply: {}", line))),
            None => Err(DomainError::MalformedResponse(format!("Unexpected reply: {}", line))),
        }
    }

    /// Decode the reply to `kind` into a typed response.
    pub fn decode(&self, kind: &CommandKind, frame: &[u8]) -> Result<Response, DomainError> {
        match self.decode_reply(frame)? {
            Reply::Rejected => Ok(Response::rejected(*kind, None)),
            Reply::Ack if !kind.is_query() => Ok(Response::ack(*kind)),
            Reply::Ack => Err(DomainError::MalformedResponse(format!(
                "{}? answered with a bare prompt",
                kind.verb()
            ))),
            Reply::Value { verb, value } => {
                if !kind.is_query() {
                    return Err(DomainError::MalformedResponse(format!(
                        "Unexpected value {}={} for {}",
                        verb, value, kind
                    )));
                }
                if verb != kind.verb() {
                    return Err(DomainError::MalformedResponse(format!(
                        "Expected {} reply, got {}",
                        kind.verb(),
                        verb
                    )));
                }
                let typed = parse_value(kind, &value)?;
                Ok(Response::value(*kind, typed))
            }
        }
    }

    /// Render a reply (the projector's side of the exchange).
    pub fn encode_reply(&self, reply: &Reply) -> Vec<u8> {
        let mut bytes = match reply {
            Reply::Ack => Vec::new(),
            Reply::Rejected => format!("{}\r", REJECTION).into_bytes(),
            Reply::Value { verb, value } => format!("{}={}\r", verb, value).into_bytes(),
        };
        bytes.push(PROMPT);
        bytes
    }

    /// The query reply a projector would send for `value`
    pub fn value_reply(&self, value: &ResponseValue) -> Reply {
        let (verb, rendered) = match value {
            ResponseValue::Power(power) => ("PWR", format!("{:02X}", power.code())),
            ResponseValue::Input(source) => ("SOURCE", format!("{:02X}", source.code())),
            ResponseValue::Mute(true) => ("MUTE", "ON".to_string()),
            ResponseValue::Mute(false) => ("MUTE", "OFF".to_string()),
            ResponseValue::LampHours(hours) => ("LAMP", hours.to_string()),
            ResponseValue::Error(error) => ("ERR", format!("{:02X}", error.code())),
            ResponseValue::Picture(setting, level) => (setting.verb(), level.raw().to_string()),
        };
        Reply::Value {
            verb: verb.to_string(),
            value: rendered,
        }
    }
}

fn parse_hex(text: &str) -> Result<u8, DomainError> {
    u8::from_str_radix(text.trim(), 16)
        .map_err(|_| DomainError::MalformedResponse(format!("Invalid hex value: {}", text)))
}

fn parse_raw(text: &str) -> Result<u8, DomainError> {
    text.trim()
        .parse::<u8>()
        .map_err(|_| DomainError::MalformedResponse(format!("Invalid setting value: {}", text)))
}

fn parse_value(kind: &CommandKind, value: &str) -> Result<ResponseValue, DomainError> {
    match kind {
        CommandKind::QueryStatus => parse_hex(value).map(|c| ResponseValue::Power(PowerState::from_code(c))),
        CommandKind::QueryInput => parse_hex(value).map(|c| ResponseValue::Input(InputSource::from_code(c))),
        CommandKind::QueryMute => match value {
            "ON" => Ok(ResponseValue::Mute(true)),
            "OFF" => Ok(ResponseValue::Mute(false)),
            other => Err(DomainError::MalformedResponse(format!("Invalid mute value: {}", other))),
        },
        CommandKind::QueryLamp => {
            // Dual-lamp models report one figure per lamp; the first is the active lamp
            let first = value.split_whitespace().next().unwrap_or_default();
            first
                .parse::<u32>()
                .map(ResponseValue::LampHours)
                .map_err(|_| DomainError::MalformedResponse(format!("Invalid lamp hours: {}", value)))
        }
        CommandKind::QueryError => {
            let code = parse_hex(value)?;
            DeviceErrorCode::from_code(code).map(ResponseValue::Error)
        }
        CommandKind::QueryPicture(setting) => {
            parse_raw(value).map(|raw| ResponseValue::Picture(*setting, PictureLevel::from_raw(raw)))
        }
        other => Err(DomainError::MalformedResponse(format!("{} carries no value", other))),
    }
}
