#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use application::{ProjectorScheduler, SchedulerHandle, SchedulerSettings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::driver::Transport;
use domain::event::EventPublisher;
use domain::{DomainError, DomainEvent, ProjectorId, SchedulerState};
use infrastructure::MqttPublisherClient;
use infrastructure::transport::{SimulatorConfig, SimulatorTransport};
use rumqttc::QoS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// --- Simulated projector with fault injection ---

#[derive(Clone, Default)]
pub struct Faults {
    connect_failures: Arc<Mutex<usize>>,
    send_failures: Arc<Mutex<VecDeque<DomainError>>>,
    garbage_replies: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<String>>>,
    opens: Arc<Mutex<usize>>,
}

impl Faults {
    pub fn fail_connects(&self, count: usize) {
        *self.connect_failures.lock().unwrap() = count;
    }

    pub fn fail_next_send(&self, error: DomainError) {
        self.send_failures.lock().unwrap().push_back(error);
    }

    pub fn garble_next_replies(&self, count: usize) {
        *self.garbage_replies.lock().unwrap() = count;
    }

    /// Requests that reached the projector, without the terminator
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_requests(&self, request: &str) -> usize {
        self.requests().iter().filter(|r| *r == request).count()
    }

    pub fn opens(&self) -> usize {
        *self.opens.lock().unwrap()
    }
}

pub struct FaultyTransport {
    inner: SimulatorTransport,
    faults: Faults,
}

impl FaultyTransport {
    pub fn new(config: SimulatorConfig, faults: Faults) -> Self {
        Self {
            inner: SimulatorTransport::new(config),
            faults,
        }
    }
}

#[async_trait]
impl Transport for FaultyTransport {
    async fn open(&mut self) -> Result<(), DomainError> {
        {
            let mut remaining = self.faults.connect_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DomainError::connect("simulator", "Simulated connection failure"));
            }
        }
        *self.faults.opens.lock().unwrap() += 1;
        self.inner.open().await
    }

    async fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, DomainError> {
        let injected = self.faults.send_failures.lock().unwrap().pop_front();
        if let Some(error) = injected {
            self.inner.close().await?;
            return Err(error);
        }

        let garble = {
            let mut remaining = self.faults.garbage_replies.lock().unwrap();
            let garble = *remaining > 0;
            *remaining = remaining.saturating_sub(1);
            garble
        };

        let reply = self.inner.send(request).await?;
        self.faults.requests.lock().unwrap().push(
            String::from_utf8_lossy(request)
                .trim_end_matches('\r')
                .to_string(),
        );

        if garble {
            return Ok(b"PWR=\r:".to_vec());
        }
        Ok(reply)
    }

    async fn close(&mut self) -> Result<(), DomainError> {
        self.inner.close().await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.inner.last_activity()
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }
}

// --- Event capture ---

pub struct ChannelEventPublisher {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelEventPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(
        &self,
        event: DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = self.tx.send(event);
        Ok(())
    }
}

/// Published MQTT message: topic, payload, retain
pub type Published = (String, String, bool);

pub struct ChannelMqttClient {
    tx: mpsc::UnboundedSender<Published>,
}

impl ChannelMqttClient {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Published>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl MqttPublisherClient for ChannelMqttClient {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        _qos: QoS,
        retain: bool,
    ) -> Result<()> {
        let _ = self.tx.send((
            topic.to_string(),
            String::from_utf8_lossy(payload).to_string(),
            retain,
        ));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

// --- Scheduler harness ---

pub const WAIT: Duration = Duration::from_secs(600);

pub fn projector() -> ProjectorId {
    ProjectorId::new("lr").unwrap()
}

pub fn settings() -> SchedulerSettings {
    SchedulerSettings {
        poll_interval: Duration::from_secs(10),
        backoff_initial: Duration::from_secs(1),
        backoff_max: Duration::from_secs(8),
        queue_depth: 16,
    }
}

pub fn simulator() -> SimulatorConfig {
    SimulatorConfig {
        warmup_ms: 3000,
        cooldown_ms: 3000,
        lamp_hours: 1200,
        ..Default::default()
    }
}

pub struct Harness {
    pub handle: SchedulerHandle,
    pub events: mpsc::UnboundedReceiver<DomainEvent>,
    pub faults: Faults,
    pub task: JoinHandle<()>,
}

impl Harness {
    /// Build a scheduler without starting it, so commands can be queued first
    pub fn build(faults: Faults) -> (ProjectorScheduler, Self) {
        let (publisher, events) = ChannelEventPublisher::new();
        let scheduler = ProjectorScheduler::new(
            projector(),
            Box::new(FaultyTransport::new(simulator(), faults.clone())),
            settings(),
            Arc::new(publisher),
            CancellationToken::new(),
        );
        let handle = scheduler.handle();
        let harness = Self {
            handle,
            events,
            faults,
            task: tokio::spawn(async {}),
        };
        (scheduler, harness)
    }

    pub fn start(faults: Faults) -> Self {
        let (scheduler, mut harness) = Self::build(faults);
        harness.task = tokio::spawn(scheduler.run());
        harness
    }

    pub fn run(mut self, scheduler: ProjectorScheduler) -> Self {
        self.task = tokio::spawn(scheduler.run());
        self
    }

    /// Receive events until one matches, returning everything seen so far
    pub async fn until(
        &mut self,
        mut matches: impl FnMut(&DomainEvent) -> bool,
    ) -> Vec<DomainEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(WAIT, self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            let done = matches(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }

    pub async fn stop(mut self) -> Vec<DomainEvent> {
        self.handle.stop();
        (&mut self.task).await.unwrap();
        self.drain()
    }
}

pub fn is_available(event: &DomainEvent, expected: bool) -> bool {
    matches!(event, DomainEvent::AvailabilityChanged { available, .. } if *available == expected)
}

pub fn availability(events: &[DomainEvent]) -> Vec<bool> {
    events
        .iter()
        .filter_map(|e| match e {
            DomainEvent::AvailabilityChanged { available, .. } => Some(*available),
            _ => None,
        })
        .collect()
}

pub fn transitions(events: &[DomainEvent]) -> Vec<(SchedulerState, SchedulerState)> {
    events
        .iter()
        .filter_map(|e| match e {
            DomainEvent::SchedulerTransition { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

pub fn command_failures(events: &[DomainEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, DomainEvent::CommandFailed { .. }))
        .count()
}
