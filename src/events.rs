//! Domain event publishing.

use tracing::{info, warn};

use crate::domain::events::DomainEvent;

/// Logs every domain event and forwards it to NATS when a client is connected.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Publish failures are logged and dropped.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            info!(%subject, ?event, "domain event");

            let Some(client) = &self.nats else { continue };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%subject, error = %e, "failed to encode event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}
