//! Domain event publishing

use async_trait::async_trait;

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Delivery is best effort; failures are logged, never returned.
    async fn publish(&self, events: Vec<DomainEvent>);
}

/// Publishes to NATS when a client is configured, otherwise only logs.
#[derive(Clone, Debug, Default)]
pub struct NatsPublisher {
    client: Option<async_nats::Client>,
}

impl NatsPublisher {
    pub fn new(client: Option<async_nats::Client>) -> Self { Self { client } }

    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::default() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(url, "connected to NATS");
                Self { client: Some(client) }
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "NATS unavailable, events will only be logged");
                Self::default()
            }
        }
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            tracing::debug!(%subject, ?event, "domain event");
            let Some(client) = &self.client else { continue };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(%subject, error = %e, "could not encode event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                tracing::warn!(%subject, error = %e, "could not publish event");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps published events for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<DomainEvent>>,
    }

    impl RecordingPublisher {
        pub fn subjects(&self) -> Vec<String> { self.events.lock().iter().map(DomainEvent::subject).collect() }
        pub fn events(&self) -> Vec<DomainEvent> { self.events.lock().clone() }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, events: Vec<DomainEvent>) { self.events.lock().extend(events); }
    }
}
