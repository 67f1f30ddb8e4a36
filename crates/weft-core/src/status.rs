use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{Result, WeftError};
use crate::types::{NodeKind, RunId};

/// The one topic the engine publishes on.
pub const STATUS_TOPIC: &str = "status";

/// Per-node lifecycle status, published to the owning UI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Loading,
    Success,
    Error,
}

/// One lifecycle record. All executors share the single `status` topic; the
/// node kind travels in the payload so the UI can route per-kind if its
/// transport wants to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub run_id: RunId,
    pub node_id: String,
    pub node_kind: NodeKind,
    pub status: NodeStatus,
}

/// Short-lived capability to subscribe to one topic. The engine only
/// enforces the check; issuing tokens to end users is the gateway's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelToken {
    pub topic: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ChannelToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Named pub/sub topics over tokio broadcast channels.
///
/// Delivery is per-subscriber FIFO and at-least-once from the engine's
/// viewpoint; publishing to a topic nobody subscribes to is not an error.
pub struct StatusHub {
    topics: Mutex<HashMap<String, broadcast::Sender<StatusEvent>>>,
    capacity: usize,
}

impl StatusHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<StatusEvent> {
        let mut topics = self.topics.lock().expect("status hub lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub fn publisher(&self, topic: &str) -> StatusPublisher {
        StatusPublisher {
            tx: self.sender(topic),
        }
    }

    /// Issue a short-lived subscribe token for a topic.
    pub fn issue_token(&self, topic: &str, ttl: Duration) -> ChannelToken {
        ChannelToken {
            topic: topic.to_string(),
            token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    /// Subscribe with a token. Expired tokens are refused.
    pub fn subscribe(&self, token: &ChannelToken) -> Result<broadcast::Receiver<StatusEvent>> {
        if token.is_expired() {
            return Err(WeftError::Channel(format!(
                "token for topic '{}' has expired",
                token.topic
            )));
        }
        Ok(self.sender(&token.topic).subscribe())
    }
}

impl Default for StatusHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Publishing half of one topic.
#[derive(Clone)]
pub struct StatusPublisher {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusPublisher {
    pub fn publish(&self, event: StatusEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

/// A publisher bound to one run. Executors receive this as their `publish`
/// handle; they never see the hub itself.
#[derive(Clone)]
pub struct RunPublisher {
    publisher: StatusPublisher,
    run_id: RunId,
}

impl RunPublisher {
    pub fn new(publisher: StatusPublisher, run_id: RunId) -> Self {
        Self { publisher, run_id }
    }

    pub fn emit(&self, node_id: &str, node_kind: NodeKind, status: NodeStatus) {
        self.publisher.publish(StatusEvent {
            run_id: self.run_id.clone(),
            node_id: node_id.to_string(),
            node_kind,
            status,
        });
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(node_id: &str, status: NodeStatus) -> StatusEvent {
        StatusEvent {
            run_id: RunId::from_str("run-1"),
            node_id: node_id.into(),
            node_kind: NodeKind::HttpRequest,
            status,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_fifo_order() {
        let hub = StatusHub::default();
        let token = hub.issue_token(STATUS_TOPIC, Duration::seconds(60));
        let mut rx = hub.subscribe(&token).unwrap();

        let publisher = hub.publisher(STATUS_TOPIC);
        publisher.publish(event("n1", NodeStatus::Loading));
        publisher.publish(event("n1", NodeStatus::Success));

        assert_eq!(rx.recv().await.unwrap().status, NodeStatus::Loading);
        assert_eq!(rx.recv().await.unwrap().status, NodeStatus::Success);
    }

    #[tokio::test]
    async fn test_expired_token_is_refused() {
        let hub = StatusHub::default();
        let token = hub.issue_token(STATUS_TOPIC, Duration::seconds(-1));
        assert!(hub.subscribe(&token).is_err());
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let hub = StatusHub::default();
        let token = hub.issue_token("other", Duration::seconds(60));
        let mut rx = hub.subscribe(&token).unwrap();

        hub.publisher(STATUS_TOPIC).publish(event("n1", NodeStatus::Loading));
        hub.publisher("other").publish(event("n2", NodeStatus::Success));

        let got = rx.recv().await.unwrap();
        assert_eq!(got.node_id, "n2");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let hub = StatusHub::default();
        hub.publisher(STATUS_TOPIC).publish(event("n1", NodeStatus::Loading));
    }

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(event("n1", NodeStatus::Error)).unwrap();
        assert_eq!(json["nodeId"], "n1");
        assert_eq!(json["status"], "error");
        assert_eq!(json["nodeKind"], "HTTP_REQUEST");
    }
}
