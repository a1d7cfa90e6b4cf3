use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use domain::driver::Transport;
use domain::{DomainError, ProjectorId};
use infrastructure::{MqttConfig, MqttPublisherClient, ProjectorConfig, TransportFactory};

use crate::scheduler::{ProjectorScheduler, SchedulerHandle, SchedulerSettings};
use crate::sync::MqttSyncEngine;

impl From<&ProjectorConfig> for SchedulerSettings {
    fn from(config: &ProjectorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            backoff_initial: std::time::Duration::from_millis(config.backoff_initial_ms),
            backoff_max: std::time::Duration::from_millis(config.backoff_max_ms),
            queue_depth: config.queue_depth,
        }
    }
}

/// One projector wired to MQTT: a scheduler task plus its sync engine
pub struct ProjectorBridge {
    config: ProjectorConfig,
    projector: ProjectorId,
    engine: Arc<MqttSyncEngine>,
    handle: Option<SchedulerHandle>,
    task: Option<JoinHandle<()>>,
}

impl ProjectorBridge {
    pub fn new(
        config: ProjectorConfig,
        mqtt: &MqttConfig,
        client: Arc<dyn MqttPublisherClient>,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        let projector = config.id()?;
        let engine = MqttSyncEngine::new(
            projector.clone(),
            &mqtt.base_topic,
            client,
            mqtt.discovery_prefix.clone(),
        )?;

        Ok(Self {
            config,
            projector,
            engine: Arc::new(engine),
            handle: None,
            task: None,
        })
    }

    pub fn projector(&self) -> &ProjectorId {
        &self.projector
    }

    pub fn engine(&self) -> Arc<MqttSyncEngine> {
        self.engine.clone()
    }

    pub fn handle(&self) -> Option<SchedulerHandle> {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start with the transport described by the configuration
    pub async fn start(&mut self) -> Result<SchedulerHandle> {
        let transport = TransportFactory::create(&self.config.transport, self.config.timeout());
        self.start_with(transport).await
    }

    pub async fn start_with(&mut self, transport: Box<dyn Transport>) -> Result<SchedulerHandle> {
        if self.is_running() {
            bail!("Bridge for {} is already running", self.projector);
        }

        // Broker may still be connecting; rumqttc queues the publishes
        if let Err(e) = self.engine.announce().await {
            warn!(projector = %self.projector, error = %e, "Failed to announce projector");
        }

        let scheduler = ProjectorScheduler::new(
            self.projector.clone(),
            transport,
            SchedulerSettings::from(&self.config),
            self.engine.clone(),
            CancellationToken::new(),
        );
        let handle = scheduler.handle();

        info!(
            projector = %self.projector,
            transport = self.config.transport.kind().as_str(),
            "Starting projector bridge"
        );
        self.task = Some(tokio::spawn(scheduler.run()));
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Stop the scheduler and wait for it to close the transport
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(projector = %self.projector, error = %e, "Scheduler task failed");
            }
            info!(projector = %self.projector, "Projector bridge stopped");
        }
    }
}
