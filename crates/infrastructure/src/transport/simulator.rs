use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::DomainError;
use domain::driver::Transport;
use domain::protocol::{
    CommandKind, DeviceErrorCode, EscVpCodec, InputSource, PictureLevel, PictureSetting,
    PowerState, Reply, ResponseValue,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_transition_ms")]
    pub warmup_ms: u64,
    #[serde(default = "default_transition_ms")]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub lamp_hours: u32,
    #[serde(default = "default_input")]
    pub input: InputSource,
}

fn default_transition_ms() -> u64 {
    3000
}
fn default_input() -> InputSource {
    InputSource::Hdmi1
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            warmup_ms: default_transition_ms(),
            cooldown_ms: default_transition_ms(),
            lamp_hours: 0,
            input: default_input(),
        }
    }
}

/// Power phase with the instant it ends, if it is a timed one
#[derive(Debug, Clone, Copy)]
enum Phase {
    Standby,
    Warming(Instant),
    Running,
    Cooling(Instant),
}

/// In-process projector speaking ESC/VP21
///
/// Set-commands other than power are only accepted while the lamp is on,
/// like the real device. Warm-up and cool-down complete on `tokio::time`.
pub struct SimulatorTransport {
    config: SimulatorConfig,
    codec: EscVpCodec,
    open: bool,
    phase: Phase,
    input: InputSource,
    muted: bool,
    picture: BTreeMap<PictureSetting, PictureLevel>,
    last_activity: Option<DateTime<Utc>>,
}

impl SimulatorTransport {
    pub fn new(config: SimulatorConfig) -> Self {
        let input = config.input;
        Self {
            config,
            codec: EscVpCodec::new(),
            open: false,
            phase: Phase::Standby,
            input,
            muted: false,
            picture: PictureSetting::ALL
                .iter()
                .map(|setting| (*setting, PictureLevel::from_raw(128)))
                .collect(),
            last_activity: None,
        }
    }

    /// Resolve timed phases against the current instant
    fn power(&mut self) -> PowerState {
        let now = Instant::now();
        self.phase = match self.phase {
            Phase::Warming(until) if now >= until => Phase::Running,
            Phase::Cooling(until) if now >= until => Phase::Standby,
            other => other,
        };
        match self.phase {
            Phase::Standby => PowerState::Off,
            Phase::Warming(_) => PowerState::WarmingUp,
            Phase::Running => PowerState::On,
            Phase::Cooling(_) => PowerState::CoolingDown,
        }
    }

    fn execute(&mut self, kind: CommandKind) -> Reply {
        let power = self.power();
        let running = power == PowerState::On;

        match kind {
            CommandKind::PowerOn => {
                if power == PowerState::Off {
                    self.phase = Phase::Warming(
                        Instant::now() + Duration::from_millis(self.config.warmup_ms),
                    );
                }
                // Already on or warming: the device acknowledges without effect
                if power == PowerState::CoolingDown {
                    Reply::Rejected
                } else {
                    Reply::Ack
                }
            }
            CommandKind::PowerOff => {
                if matches!(power, PowerState::On | PowerState::WarmingUp) {
                    self.phase = Phase::Cooling(
                        Instant::now() + Duration::from_millis(self.config.cooldown_ms),
                    );
                }
                Reply::Ack
            }
            CommandKind::SetInput(source) if running => {
                self.input = source;
                Reply::Ack
            }
            CommandKind::SetMute(muted) if running => {
                self.muted = muted;
                Reply::Ack
            }
            CommandKind::SetPicture(setting, level) if running => {
                self.picture.insert(setting, level);
                Reply::Ack
            }
            CommandKind::SendKey(_)
            | CommandKind::LoadLensMemory(_)
            | CommandKind::LoadImageMemory(_)
                if running =>
            {
                Reply::Ack
            }
            CommandKind::QueryStatus => self.codec.value_reply(&ResponseValue::Power(power)),
            CommandKind::QueryInput if running => {
                self.codec.value_reply(&ResponseValue::Input(self.input))
            }
            CommandKind::QueryMute if running => {
                self.codec.value_reply(&ResponseValue::Mute(self.muted))
            }
            CommandKind::QueryPicture(setting) if running => match self.picture.get(&setting) {
                Some(level) => self
                    .codec
                    .value_reply(&ResponseValue::Picture(setting, *level)),
                None => Reply::Rejected,
            },
            CommandKind::QueryLamp => self
                .codec
                .value_reply(&ResponseValue::LampHours(self.config.lamp_hours)),
            CommandKind::QueryError => self
                .codec
                .value_reply(&ResponseValue::Error(DeviceErrorCode::None)),
            _ => Reply::Rejected,
        }
    }
}

#[async_trait]
impl Transport for SimulatorTransport {
    async fn open(&mut self) -> Result<(), DomainError> {
        tracing::info!(config = ?self.config, "Simulated projector connected");
        self.open = true;
        self.last_activity = Some(Utc::now());
        Ok(())
    }

    async fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, DomainError> {
        if !self.open {
            return Err(DomainError::IoClosed("Simulator not open".to_string()));
        }

        let reply = match self.codec.parse_request(request) {
            Ok(kind) => {
                tracing::debug!(command = %kind, "Simulator received command");
                self.execute(kind)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Simulator rejected request");
                Reply::Rejected
            }
        };

        self.last_activity = Some(Utc::now());
        Ok(self.codec.encode_reply(&reply))
    }

    async fn close(&mut self) -> Result<(), DomainError> {
        if self.open {
            tracing::info!("Simulated projector disconnected");
        }
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    fn endpoint(&self) -> String {
        "simulator".to_string()
    }
}
