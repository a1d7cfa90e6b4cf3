use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use domain::driver::{Connection, Transport};
use domain::event::EventPublisher;
use domain::protocol::{PictureSetting, PowerState};
use domain::{
    Command, CommandKind, CommandOrigin, DeviceState, DomainError, DomainEvent, EscVpCodec,
    ProjectorId, Response, SchedulerState,
};

use super::backoff::BackoffPolicy;
use super::queue::{CommandQueue, PushOutcome};
use crate::state::DeviceStateModel;

/// Rejected by the projector in standby
const POLLED_WHEN_ON: [CommandKind; 7] = [
    CommandKind::QueryInput,
    CommandKind::QueryMute,
    CommandKind::QueryPicture(PictureSetting::Brightness),
    CommandKind::QueryPicture(PictureSetting::Contrast),
    CommandKind::QueryPicture(PictureSetting::Saturation),
    CommandKind::QueryPicture(PictureSetting::Tint),
    CommandKind::QueryPicture(PictureSetting::Sharpness),
];

/// Timing and sizing of one scheduler
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub queue_depth: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            queue_depth: 32,
        }
    }
}

/// Cloneable access to a running scheduler from the MQTT side
#[derive(Clone)]
pub struct SchedulerHandle {
    projector: ProjectorId,
    queue: Arc<CommandQueue>,
    state_rx: watch::Receiver<DeviceState>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    pub fn projector(&self) -> &ProjectorId {
        &self.projector
    }

    /// Queue a command; never waits
    pub fn submit(&self, command: Command) -> PushOutcome {
        let kind = command.kind();
        let outcome = self.queue.push(command);
        match &outcome {
            PushOutcome::Queued => {
                debug!(projector = %self.projector, command = %kind, "Command queued")
            }
            PushOutcome::Displaced(dropped) => warn!(
                projector = %self.projector,
                dropped = %dropped.kind(),
                origin = dropped.origin().as_str(),
                "Command queue full, dropped oldest command"
            ),
            PushOutcome::Rejected(_) => {
                debug!(projector = %self.projector, command = %kind, "Command queue full of MQTT commands")
            }
        }
        outcome
    }

    /// Cancel a command that is still queued. In-flight commands run to completion.
    pub fn cancel(&self, id: Uuid) -> bool {
        self.queue.cancel(id).is_some()
    }

    pub fn state(&self) -> DeviceState {
        self.state_rx.borrow().clone()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Sequential loop owning one projector's transport.
///
/// Interleaves poll cycles with queued commands so that at most one exchange
/// is on the wire. Connection loss moves through `Backoff` back to
/// `Connecting`; a command hit by an I/O failure is retried once after the
/// reconnect.
pub struct ProjectorScheduler {
    projector: ProjectorId,
    transport: Box<dyn Transport>,
    codec: EscVpCodec,
    connection: Connection,
    model: DeviceStateModel,
    queue: Arc<CommandQueue>,
    backoff: BackoffPolicy,
    poll_interval: Duration,
    publisher: Arc<dyn EventPublisher>,
    state: SchedulerState,
    available: bool,
    retry: Option<Command>,
    state_tx: watch::Sender<DeviceState>,
    state_rx: watch::Receiver<DeviceState>,
    cancel: CancellationToken,
}

impl ProjectorScheduler {
    pub fn new(
        projector: ProjectorId,
        transport: Box<dyn Transport>,
        settings: SchedulerSettings,
        publisher: Arc<dyn EventPublisher>,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(DeviceState::default());
        Self {
            connection: Connection::new(transport.endpoint()),
            model: DeviceStateModel::new(projector.clone()),
            projector,
            transport,
            codec: EscVpCodec::new(),
            queue: Arc::new(CommandQueue::new(settings.queue_depth)),
            backoff: BackoffPolicy::new(settings.backoff_initial, settings.backoff_max),
            poll_interval: settings.poll_interval,
            publisher,
            state: SchedulerState::Idle,
            available: false,
            retry: None,
            state_tx,
            state_rx,
            cancel,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            projector: self.projector.clone(),
            queue: self.queue.clone(),
            state_rx: self.state_rx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub async fn run(mut self) {
        info!(
            projector = %self.projector,
            endpoint = %self.connection.endpoint(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Starting projector scheduler"
        );

        let mut timer = tokio::time::interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.cancel.is_cancelled() {
            match self.state {
                SchedulerState::Idle => self.transition(SchedulerState::Connecting).await,
                SchedulerState::Connecting => {
                    self.connect().await;
                    // Poll right after every (re)connect
                    if self.state == SchedulerState::Polling {
                        timer.reset_immediately();
                    }
                }
                SchedulerState::Polling => {
                    if let Some(command) = self.retry.take() {
                        self.execute(command, 2).await;
                    } else if let Some(command) = self.queue.pop() {
                        self.execute(command, 1).await;
                    } else {
                        let cancel = self.cancel.clone();
                        let queue = self.queue.clone();
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = queue.wait() => {}
                            _ = timer.tick() => self.enqueue_poll_cycle(),
                        }
                    }
                }
                // execute() always leaves Executing before returning
                SchedulerState::Executing => self.transition(SchedulerState::Polling).await,
                SchedulerState::Backoff => {
                    let delay = self.backoff.next_delay();
                    info!(
                        projector = %self.projector,
                        delay_ms = delay.as_millis() as u64,
                        failures = self.backoff.failures(),
                        "Waiting before reconnecting"
                    );
                    let cancel = self.cancel.clone();
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            self.transition(SchedulerState::Connecting).await;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn connect(&mut self) {
        self.connection.begin_connect();
        debug!(projector = %self.projector, endpoint = %self.connection.endpoint(), "Opening transport");

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.transport.open() => result,
        };

        match result {
            Ok(()) => {
                self.connection.mark_connected();
                self.connection.touch(self.transport.last_activity());
                self.backoff.reset();
                info!(projector = %self.projector, endpoint = %self.connection.endpoint(), "Projector connected");
                self.transition(SchedulerState::Polling).await;
            }
            Err(e) => {
                self.connection.mark_disconnected();
                warn!(projector = %self.projector, error = %e, "Failed to connect to projector");
                self.transition(SchedulerState::Backoff).await;
            }
        }
    }

    fn enqueue_poll_cycle(&mut self) {
        let mut kinds = vec![CommandKind::QueryStatus];
        if self.model.power() == PowerState::On {
            kinds.extend(POLLED_WHEN_ON);
        }
        kinds.extend([CommandKind::QueryLamp, CommandKind::QueryError]);

        for kind in kinds {
            if self.queue.contains(kind, CommandOrigin::Poll) {
                continue;
            }
            if let PushOutcome::Rejected(_) = self.queue.push(Command::poll(kind)) {
                debug!(projector = %self.projector, command = %kind, "Skipping poll, queue full");
            }
        }
    }

    async fn execute(&mut self, command: Command, attempt: u32) {
        self.transition(SchedulerState::Executing).await;

        let kind = command.kind();
        debug!(projector = %self.projector, command = %kind, attempt, "Executing command");

        let request = self.codec.encode(&kind);
        let result = match self.transport.send(&request).await {
            Ok(frame) => self.codec.decode(&kind, &frame),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                self.connection.mark_connected();
                self.connection.touch(self.transport.last_activity());
                self.handle_response(&command, response).await;
                self.transition(SchedulerState::Polling).await;
            }
            Err(e) if e.is_decode() => {
                // Undecodable reply: drop this exchange, keep the link
                warn!(projector = %self.projector, command = %kind, error = %e, "Discarding undecodable reply");
                self.connection.mark_degraded();
                self.transition(SchedulerState::Polling).await;
            }
            Err(e) => {
                warn!(projector = %self.projector, command = %kind, error = %e, "Connection lost during exchange");
                self.connection.mark_disconnected();
                if let Err(close_err) = self.transport.close().await {
                    debug!(projector = %self.projector, error = %close_err, "Error closing transport");
                }

                match command.origin() {
                    CommandOrigin::Mqtt if attempt < 2 => self.retry = Some(command),
                    CommandOrigin::Mqtt => self.fail_command(&command, &e, attempt).await,
                    // The next poll cycle asks again
                    CommandOrigin::Poll => {}
                }

                self.transition(SchedulerState::Backoff).await;
            }
        }
    }

    async fn handle_response(&mut self, command: &Command, response: Response) {
        if !response.is_success() {
            let rejected = DomainError::CommandRejected(command.kind().to_string());
            warn!(projector = %self.projector, origin = command.origin().as_str(), error = %rejected, "Projector rejected command");
            if command.origin() == CommandOrigin::Mqtt
                && !self.queue.contains(CommandKind::QueryError, CommandOrigin::Poll)
            {
                self.queue.push(Command::poll(CommandKind::QueryError));
            }
            return;
        }

        if let Some(delta) = self.model.apply(&response) {
            debug!(projector = %self.projector, delta = ?delta, "Device state changed");
            self.state_tx.send_replace(self.model.snapshot());
            self.publish(DomainEvent::state_changed(self.projector.clone(), delta))
                .await;
        }
    }

    async fn fail_command(&mut self, command: &Command, cause: &DomainError, attempts: u32) {
        let failure = DomainError::CommandFailed {
            command: command.kind().to_string(),
            attempts,
            reason: cause.to_string(),
        };
        error!(projector = %self.projector, error = %failure, "Command discarded");
        self.publish(DomainEvent::command_failed(
            self.projector.clone(),
            command.kind(),
            command.origin(),
            failure.to_string(),
        ))
        .await;
    }

    async fn transition(&mut self, next: SchedulerState) {
        let from = self.state;
        match from.transition(next) {
            Ok(to) => {
                self.state = to;
                debug!(projector = %self.projector, from = %from, to = %to, "Scheduler transition");
                self.publish(DomainEvent::scheduler_transition(self.projector.clone(), from, to))
                    .await;
                self.set_available(to.is_available()).await;
            }
            Err(e) => {
                error!(projector = %self.projector, from = %from, to = %next, error = e, "Illegal scheduler transition");
            }
        }
    }

    async fn set_available(&mut self, available: bool) {
        if self.available == available {
            return;
        }
        self.available = available;
        self.publish(DomainEvent::availability_changed(
            self.projector.clone(),
            available,
        ))
        .await;
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!(projector = %self.projector, error = %e, "Failed to publish event");
        }
    }

    async fn shutdown(&mut self) {
        let dropped = self.queue.drain();
        if let Some(command) = self.retry.take() {
            debug!(projector = %self.projector, command = %command.kind(), "Dropping pending retry");
        }
        info!(projector = %self.projector, dropped = dropped.len(), "Stopping projector scheduler");

        if let Err(e) = self.transport.close().await {
            warn!(projector = %self.projector, error = %e, "Error closing transport");
        }
        self.connection.mark_disconnected();
        self.set_available(false).await;
    }
}
