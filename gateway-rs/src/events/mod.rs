//! Gateway event fan-out.
//!
//! Subscribers (the SSE console, webhook dispatchers) attach through
//! [`EventBus::subscribe`]. Emission never fails delivery: a bus with no
//! subscribers or a lagging receiver just drops events.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventTopic {
    #[serde(rename = "email.new")]
    EmailNew,
    #[serde(rename = "email.received")]
    EmailReceived,
    #[serde(rename = "email.stored")]
    EmailStored,
    #[serde(rename = "certificate.reloaded")]
    CertificateReloaded,
}

impl std::fmt::Display for EventTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EventTopic::EmailNew => "email.new",
            EventTopic::EmailReceived => "email.received",
            EventTopic::EmailStored => "email.stored",
            EventTopic::CertificateReloaded => "certificate.reloaded",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub topic: EventTopic,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, topic: EventTopic, payload: serde_json::Value) {
        let delivered = self.sender.send(Event { topic, payload }).unwrap_or(0);
        debug!(%topic, delivered, "event emitted");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_labels() {
        assert_eq!(EventTopic::EmailNew.to_string(), "email.new");
        assert_eq!(
            EventTopic::CertificateReloaded.to_string(),
            "certificate.reloaded"
        );
        let json = serde_json::to_value(EventTopic::EmailStored).unwrap();
        assert_eq!(json, "email.stored");
    }

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(
            EventTopic::EmailNew,
            serde_json::json!({"email_id": "m1"}),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, EventTopic::EmailNew);
        assert_eq!(event.payload["email_id"], "m1");
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(16);
        bus.emit(EventTopic::EmailStored, serde_json::json!({}));
    }
}
