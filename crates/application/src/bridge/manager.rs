use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rumqttc::QoS;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use infrastructure::{MqttConfig, MqttPublisherClient, MqttSubscriberClient, ProjectorConfig};

use super::ProjectorBridge;
use crate::sync::payload::ONLINE;
use crate::messaging::command_listener::{CommandListener, CommandRoute};
use crate::scheduler::SchedulerHandle;

/// Manages the lifecycle of every configured projector bridge
pub struct BridgeManager {
    bridges: Mutex<HashMap<String, ProjectorBridge>>,
    listener: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    publisher: Arc<dyn MqttPublisherClient>,
    subscriber: Arc<dyn MqttSubscriberClient>,
    mqtt: MqttConfig,
}

impl BridgeManager {
    pub fn new(
        mqtt: MqttConfig,
        publisher: Arc<dyn MqttPublisherClient>,
        subscriber: Arc<dyn MqttSubscriberClient>,
    ) -> Self {
        Self {
            bridges: Mutex::new(HashMap::new()),
            listener: Mutex::new(None),
            publisher,
            subscriber,
            mqtt,
        }
    }

    /// Start a bridge per projector, then (re)start the command listener
    /// over all running bridges. Returns how many bridges were started.
    pub async fn start_all(&self, projectors: Vec<ProjectorConfig>) -> Result<usize> {
        let mut started = 0;
        {
            let mut bridges = self.bridges.lock().await;
            for config in projectors {
                if bridges.contains_key(&config.name) {
                    warn!(projector = %config.name, "Projector bridge already running");
                    continue;
                }

                let name = config.name.clone();
                let mut bridge = match ProjectorBridge::new(config, &self.mqtt, self.publisher.clone())
                {
                    Ok(bridge) => bridge,
                    Err(e) => {
                        error!(projector = %name, error = %e, "Invalid projector configuration");
                        continue;
                    }
                };

                match bridge.start().await {
                    Ok(_) => {
                        bridges.insert(name, bridge);
                        started += 1;
                    }
                    Err(e) => error!(projector = %name, error = %e, "Failed to start projector bridge"),
                }
            }
        }

        self.restart_listener().await;
        Ok(started)
    }

    async fn restart_listener(&self) {
        let routes: Vec<CommandRoute> = self
            .bridges
            .lock()
            .await
            .values()
            .filter_map(|bridge| {
                bridge.handle().map(|handle| CommandRoute {
                    engine: bridge.engine(),
                    handle,
                })
            })
            .collect();

        let mut listener = self.listener.lock().await;
        if let Some((cancel, task)) = listener.take() {
            cancel.cancel();
            let _ = task.await;
        }

        let cancel = CancellationToken::new();
        let command_listener = CommandListener::new(self.subscriber.clone(), routes, cancel.clone());
        let task = tokio::spawn(async move {
            command_listener.start().await;
        });
        *listener = Some((cancel, task));
    }

    /// Retained `online` on the bridge status topic, replacing the last will
    pub async fn publish_online(&self) -> Result<()> {
        self.publisher
            .publish_bytes(&self.mqtt.status_topic(), ONLINE.as_bytes(), QoS::AtLeastOnce, true)
            .await
    }

    /// Publish every bridge's retained topics again
    pub async fn republish(&self) -> usize {
        let engines: Vec<_> = self
            .bridges
            .lock()
            .await
            .values()
            .map(|bridge| bridge.engine())
            .collect();

        let mut sent = 0;
        for engine in engines {
            match engine.republish().await {
                Ok(count) => sent += count,
                Err(e) => {
                    warn!(projector = %engine.projector(), error = %e, "Failed to republish retained state")
                }
            }
        }
        sent
    }

    /// Restore the broker's view after every reconnect.
    ///
    /// `connections` counts ConnAcks. The first connection is covered by
    /// startup; each later one follows a drop that may have fired the last
    /// will or lost the broker's retained store.
    pub async fn watch_broker(&self, mut connections: watch::Receiver<u64>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = connections.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let count = *connections.borrow_and_update();
                    if count <= 1 {
                        continue;
                    }

                    info!(connections = count, "Broker reconnected, restoring retained state");
                    if let Err(e) = self.publish_online().await {
                        warn!(error = %e, "Failed to publish ONLINE status");
                    }
                    let sent = self.republish().await;
                    debug!(sent, "Retained state restored");
                }
            }
        }
    }

    pub async fn handle(&self, name: &str) -> Option<SchedulerHandle> {
        self.bridges.lock().await.get(name).and_then(|b| b.handle())
    }

    pub async fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bridges
            .lock()
            .await
            .iter()
            .filter(|(_, bridge)| bridge.is_running())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub async fn stop_all(&self) {
        if let Some((cancel, task)) = self.listener.lock().await.take() {
            cancel.cancel();
            let _ = task.await;
        }

        let mut bridges = self.bridges.lock().await;
        for (name, mut bridge) in bridges.drain() {
            info!(projector = %name, "Stopping projector bridge");
            bridge.stop().await;
        }
    }
}
