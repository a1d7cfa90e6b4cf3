use anyhow::{Result, anyhow};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;

#[derive(Clone, Debug)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub pkid: u16,
    /// Delivery QoS; only QoS 1 and 2 messages are acknowledged
    pub qos: QoS,
}

#[async_trait::async_trait]
pub trait MqttPublisherClient: Send + Sync {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()>;
    fn is_connected(&self) -> bool;
}

/// Inbound side of the broker connection
#[async_trait::async_trait]
pub trait MqttSubscriberClient: Send + Sync {
    /// Subscribe now and again after every reconnect
    async fn subscribe(&self, topic: &str) -> Result<()>;
    fn subscribe_messages(&self) -> broadcast::Receiver<MqttMessage>;
    async fn ack(&self, topic: &str, pkid: u16, qos: QoS) -> Result<()>;
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    tx: broadcast::Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
    connections: Arc<watch::Sender<u64>>,
    subscriptions: Arc<std::sync::RwLock<Vec<String>>>,
}

impl MqttClient {
    pub async fn new(config: &MqttConfig, last_will: Option<LastWill>) -> Result<Self> {
        let mut mqttoptions = MqttOptions::new(&config.client_id, &config.host, config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        mqttoptions.set_clean_session(false); // Persistent session for commands
        mqttoptions.set_manual_acks(true);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqttoptions.set_credentials(username, password);
        }

        if let Some(will) = last_will {
            mqttoptions.set_last_will(will);
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
        let (tx, _) = broadcast::channel(250);
        let tx_clone = tx.clone();
        let connected = Arc::new(AtomicBool::new(false));
        let connected_clone = connected.clone();
        let connections = Arc::new(watch::Sender::new(0u64));
        let connections_clone = connections.clone();

        let subscriptions = Arc::new(std::sync::RwLock::new(Vec::<String>::new()));
        let subscriptions_clone = subscriptions.clone();
        let client_clone = client.clone();
        let broker = format!("{}:{}", config.host, config.port);

        // Spawn a task to handle the event loop
        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(notification) => match notification {
                        Event::Incoming(Packet::Publish(publish)) => {
                            let msg = MqttMessage {
                                topic: publish.topic,
                                payload: publish.payload.to_vec(),
                                pkid: publish.pkid,
                                qos: publish.qos,
                            };
                            // No receiver yet during startup; the broker redelivers unacked messages
                            if let Err(broadcast::error::SendError(returned)) = tx_clone.send(msg) {
                                debug!(topic = %returned.topic, "Dropped MQTT message with no listener");
                            }
                        }
                        Event::Incoming(Packet::ConnAck(_)) => {
                            info!(broker = %broker, "MQTT Connected");
                            connected_clone.store(true, Ordering::Relaxed);
                            connections_clone.send_modify(|count| *count += 1);

                            // Re-subscribe to all topics
                            let subs = subscriptions_clone
                                .read()
                                .unwrap_or_else(|e| e.into_inner())
                                .clone();
                            if !subs.is_empty() {
                                info!("Re-subscribing to {} topics...", subs.len());
                                for topic in subs {
                                    if let Err(e) =
                                        client_clone.subscribe(&topic, QoS::AtLeastOnce).await
                                    {
                                        error!(topic = %topic, error = %e, "Failed to re-subscribe");
                                    }
                                }
                            }
                        }
                        Event::Outgoing(rumqttc::Outgoing::Disconnect) => {
                            connected_clone.store(false, Ordering::Relaxed);
                        }
                        _ => {}
                    },
                    Err(e) => {
                        if connected_clone.swap(false, Ordering::Relaxed) {
                            warn!(broker = %broker, error = %e, "MQTT connection lost");
                        } else {
                            debug!(broker = %broker, error = %e, "MQTT connection error");
                        }
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            tx,
            connected,
            connections,
            subscriptions,
        })
    }

    /// Number of ConnAcks received so far; changes on every (re)connect
    pub fn connections(&self) -> watch::Receiver<u64> {
        self.connections.subscribe()
    }

    pub async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.publish_bytes(topic, payload.as_bytes(), QoS::AtLeastOnce, retain)
            .await
    }

    /// Send DISCONNECT so the broker does not fire the last will
    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| anyhow!("Failed to disconnect from broker: {}", e))
    }
}

#[async_trait::async_trait]
impl MqttPublisherClient for MqttClient {
    async fn publish_bytes(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| anyhow!("Failed to publish MQTT message: {}", e))?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl MqttSubscriberClient for MqttClient {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        {
            let mut subs = self
                .subscriptions
                .write()
                .unwrap_or_else(|e| e.into_inner());
            if !subs.iter().any(|s| s == topic) {
                subs.push(topic.to_string());
            }
        }

        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| anyhow!("Failed to subscribe to topic {}: {}", topic, e))?;
        Ok(())
    }

    fn subscribe_messages(&self) -> broadcast::Receiver<MqttMessage> {
        self.tx.subscribe()
    }

    async fn ack(&self, topic: &str, pkid: u16, qos: QoS) -> Result<()> {
        // QoS 0 has no acknowledgement and no packet id
        if qos == QoS::AtMostOnce {
            return Ok(());
        }

        let publish = rumqttc::Publish {
            pkid,
            topic: topic.to_string(),
            qos,
            payload: bytes::Bytes::new(),
            retain: false,
            dup: false,
        };

        self.client
            .ack(&publish)
            .await
            .map_err(|e| anyhow!("Failed to ack packet {}: {}", pkid, e))
    }
}

/// Retained `offline` will for a status topic
pub fn offline_will(topic: &str) -> LastWill {
    LastWill::new(topic, "offline", QoS::AtLeastOnce, true)
}
