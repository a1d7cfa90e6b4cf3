mod codec;
mod command;
mod error_code;
mod response;
mod values;

pub use codec::{EscVpCodec, PROMPT, Reply, TERMINATOR};
pub use command::{Command, CommandKind, CommandOrigin};
pub use error_code::DeviceErrorCode;
pub use response::{Response, ResponseValue};
pub use values::{
    ImageMemory, InputSource, LensMemory, PictureLevel, PictureSetting, PowerState, RemoteKey,
};
