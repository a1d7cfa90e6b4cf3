use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use rumqttc::QoS;
use serde_json::json;
use tracing::{debug, info, warn};

use domain::event::EventPublisher;
use domain::{CommandKind, DomainError, DomainEvent, ProjectorId, StateDelta, TopicMap};
use infrastructure::MqttPublisherClient;

use super::discovery::discovery_documents;
use super::payload::{availability_payload, decode_command, render_delta};

/// Maps one projector's state and events onto MQTT topics.
///
/// Retained state topics are deduplicated: a payload identical to the last
/// one published on the same topic is skipped.
pub struct MqttSyncEngine {
    projector: ProjectorId,
    topics: TopicMap,
    client: Arc<dyn MqttPublisherClient>,
    discovery_prefix: Option<String>,
    published: DashMap<String, String>,
}

impl MqttSyncEngine {
    pub fn new(
        projector: ProjectorId,
        base_topic: &str,
        client: Arc<dyn MqttPublisherClient>,
        discovery_prefix: Option<String>,
    ) -> Result<Self, DomainError> {
        let topics = TopicMap::new(base_topic, &projector)?;
        Ok(Self {
            projector,
            topics,
            client,
            discovery_prefix,
            published: DashMap::new(),
        })
    }

    pub fn projector(&self) -> &ProjectorId {
        &self.projector
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    /// Decode an inbound message. `None` when the topic is not one of ours.
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Option<Result<CommandKind, DomainError>> {
        let binding = self.topics.command_binding(topic)?;
        Some(decode_command(binding.capability, payload))
    }

    /// Discovery documents (when enabled) and an initial `offline`
    pub async fn announce(&self) -> Result<()> {
        if let Some(prefix) = &self.discovery_prefix {
            let documents = discovery_documents(prefix, &self.projector, &self.topics);
            info!(projector = %self.projector, count = documents.len(), "Publishing Home Assistant discovery");
            for document in documents {
                self.publish_retained(&document.topic, &document.config.to_string())
                    .await?;
            }
        }
        self.publish_availability(false).await
    }

    pub async fn publish_availability(&self, available: bool) -> Result<()> {
        let topic = self.topics.availability_topic();
        self.publish_retained(&topic, availability_payload(available))
            .await?;
        Ok(())
    }

    /// Send every retained payload again, bypassing deduplication.
    ///
    /// After a broker restart the retained store may be empty; clearing the
    /// cache first means nothing is skipped as a duplicate.
    pub async fn republish(&self) -> Result<usize> {
        let retained: Vec<(String, String)> = self
            .published
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.published.clear();

        let mut sent = 0;
        for (topic, payload) in retained {
            if self.publish_retained(&topic, &payload).await? {
                sent += 1;
            }
        }
        debug!(projector = %self.projector, sent, "Republished retained topics");
        Ok(sent)
    }

    pub async fn publish_delta(&self, delta: &StateDelta) -> Result<usize> {
        let mut sent = 0;
        for (topic, payload) in render_delta(&self.topics, delta) {
            if self.publish_retained(&topic, &payload).await? {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Publish unless `payload` is already the last value on `topic`
    async fn publish_retained(&self, topic: &str, payload: &str) -> Result<bool> {
        if self
            .published
            .get(topic)
            .is_some_and(|last| last.value() == payload)
        {
            debug!(topic = %topic, "Skipping duplicate publish");
            return Ok(false);
        }

        self.client
            .publish_bytes(topic, payload.as_bytes(), QoS::AtLeastOnce, true)
            .await?;
        self.published.insert(topic.to_string(), payload.to_string());
        Ok(true)
    }

    async fn publish_command_failed(&self, event: &DomainEvent) -> Result<()> {
        let DomainEvent::CommandFailed {
            command,
            origin,
            error,
            timestamp,
            ..
        } = event
        else {
            return Ok(());
        };

        let payload = json!({
            "command": command.to_string(),
            "origin": origin.as_str(),
            "error": error,
            "ts": timestamp.to_rfc3339(),
        });
        self.client
            .publish_bytes(
                &self.topics.command_failed_topic(),
                payload.to_string().as_bytes(),
                QoS::AtLeastOnce,
                false,
            )
            .await
    }
}

#[async_trait]
impl EventPublisher for MqttSyncEngine {
    async fn publish(
        &self,
        event: DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if event.projector() != &self.projector {
            warn!(projector = %self.projector, other = %event.projector(), "Ignoring event for another projector");
            return Ok(());
        }

        match &event {
            DomainEvent::StateChanged { delta, .. } => {
                self.publish_delta(delta).await?;
            }
            DomainEvent::AvailabilityChanged { available, .. } => {
                info!(projector = %self.projector, available, "Projector availability changed");
                self.publish_availability(*available).await?;
            }
            DomainEvent::CommandFailed { .. } => {
                self.publish_command_failed(&event).await?;
            }
            DomainEvent::SchedulerTransition { from, to, .. } => {
                debug!(projector = %self.projector, from = %from, to = %to, "Scheduler transition");
            }
        }
        Ok(())
    }
}
