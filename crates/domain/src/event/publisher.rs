use crate::DomainEvent;
use async_trait::async_trait;

/// Sink for scheduler events (the MQTT sync engine in production)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
