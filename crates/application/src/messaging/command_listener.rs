use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use domain::Command;
use infrastructure::{MqttMessage, MqttSubscriberClient};

use crate::scheduler::{PushOutcome, SchedulerHandle};
use crate::sync::MqttSyncEngine;

/// Inbound path for one projector: its topic decoder and its queue
#[derive(Clone)]
pub struct CommandRoute {
    pub engine: Arc<MqttSyncEngine>,
    pub handle: SchedulerHandle,
}

/// Turns messages on `.../set` topics into MQTT-origin commands
pub struct CommandListener {
    mqtt_client: Arc<dyn MqttSubscriberClient>,
    routes: Vec<CommandRoute>,
    cancel: CancellationToken,
}

impl CommandListener {
    pub fn new(
        mqtt_client: Arc<dyn MqttSubscriberClient>,
        routes: Vec<CommandRoute>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            mqtt_client,
            routes,
            cancel,
        }
    }

    pub async fn start(&self) {
        // Listen before subscribing so retained commands are not missed
        let mut rx = self.mqtt_client.subscribe_messages();

        for route in &self.routes {
            for topic in route.engine.topics().command_topics() {
                if let Err(e) = self.mqtt_client.subscribe(topic).await {
                    error!(projector = %route.engine.projector(), topic = %topic, error = %e, "Failed to subscribe to commands");
                }
            }
        }

        info!(projectors = self.routes.len(), "Listening for commands");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Command listener stopped");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(msg) => {
                        self.handle_message(&msg);
                        if let Err(e) = self.mqtt_client.ack(&msg.topic, msg.pkid, msg.qos).await {
                            warn!(topic = %msg.topic, error = %e, "Failed to ack command");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!(skipped = count, "Command listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Command channel closed");
                        break;
                    }
                }
            }
        }
    }

    /// Route one message. Returns whether a command was queued.
    pub fn handle_message(&self, msg: &MqttMessage) -> bool {
        for route in &self.routes {
            let Some(decoded) = route.engine.decode(&msg.topic, &msg.payload) else {
                continue;
            };

            return match decoded {
                Ok(kind) => {
                    info!(projector = %route.engine.projector(), command = %kind, "Received command");
                    !matches!(
                        route.handle.submit(Command::mqtt(kind)),
                        PushOutcome::Rejected(_)
                    )
                }
                Err(e) => {
                    warn!(
                        projector = %route.engine.projector(),
                        topic = %msg.topic,
                        payload = %String::from_utf8_lossy(&msg.payload),
                        error = %e,
                        "Dropping invalid command payload"
                    );
                    false
                }
            };
        }

        debug!(topic = %msg.topic, "Message on unbound topic");
        false
    }
}
