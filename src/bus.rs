//! Domain event publishing.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::events::DomainEvent;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to publish event: {0}")]
    Publish(String),
}

#[automock]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), BusError>;
}

/// Publishes JSON events to `{prefix}.{subject}`.
#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }

    fn subject_for(&self, event: &DomainEvent) -> String { format!("{}.{}", self.prefix, event.subject()) }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), BusError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(self.subject_for(event), payload.into())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), BusError> {
        tracing::debug!(subject = event.subject(), ?event, "domain event");
        Ok(())
    }
}

/// Publishes every event. Failures are logged and skipped.
pub async fn publish_all(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    for event in events {
        if let Err(error) = publisher.publish(&event).await {
            tracing::warn!(%error, subject = event.subject(), "event not published");
        }
    }
}
