use chrono::Utc;
use tracing::warn;

use domain::protocol::{CommandKind, PowerState, ResponseValue};
use domain::{DeviceState, ProjectorId, Response, StateDelta};

/// Single writer of a projector's [`DeviceState`]
///
/// Fed only with decoded responses. Returns a delta when an observable field
/// changed, so replaying an identical response is silent.
pub struct DeviceStateModel {
    projector: ProjectorId,
    state: DeviceState,
}

impl DeviceStateModel {
    pub fn new(projector: ProjectorId) -> Self {
        Self {
            projector,
            state: DeviceState::default(),
        }
    }

    pub fn apply(&mut self, response: &Response) -> Option<StateDelta> {
        if !response.is_success() {
            return None;
        }

        let mut next = self.state.clone();
        match response.value_ref() {
            Some(value) => self.apply_value(&mut next, *value),
            None => apply_ack(&mut next, response.kind()),
        }

        let delta = self.state.diff(&next);
        if delta.is_empty() {
            return None;
        }

        next.last_updated = Some(Utc::now());
        self.state = next;
        Some(delta)
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.clone()
    }

    pub fn power(&self) -> PowerState {
        self.state.power
    }

    fn apply_value(&self, next: &mut DeviceState, value: ResponseValue) {
        match value {
            ResponseValue::Power(power) => {
                if !self.state.power.is_expected_transition(power) {
                    warn!(
                        projector = %self.projector,
                        from = %self.state.power,
                        to = %power,
                        "Power state corrected"
                    );
                }
                next.power = power;
            }
            ResponseValue::Input(source) => next.input = Some(source),
            ResponseValue::Mute(muted) => next.muted = Some(muted),
            ResponseValue::LampHours(hours) => next.lamp_hours = Some(hours),
            ResponseValue::Error(error) => next.last_error = Some(error),
            ResponseValue::Picture(setting, level) => {
                next.picture.insert(setting, level);
            }
        }
    }
}

/// Expected effect of an acknowledged set-command
fn apply_ack(next: &mut DeviceState, kind: CommandKind) {
    match kind {
        CommandKind::PowerOn if matches!(next.power, PowerState::Off | PowerState::Unknown) => {
            next.power = PowerState::WarmingUp;
        }
        CommandKind::PowerOff if matches!(next.power, PowerState::On | PowerState::WarmingUp) => {
            next.power = PowerState::CoolingDown;
        }
        CommandKind::SetInput(source) => next.input = Some(source),
        CommandKind::SetMute(muted) => next.muted = Some(muted),
        CommandKind::SetPicture(setting, level) => {
            next.picture.insert(setting, level);
        }
        _ => {}
    }
}
