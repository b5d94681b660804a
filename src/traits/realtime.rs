use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::db_types::Notification;

/// Realtime event names that are part of the wire contract with clients.
pub const EVENT_RECEIVE_MESSAGE: &str = "receive_message";
pub const EVENT_USER_TYPING: &str = "user_typing";
pub const EVENT_USER_STATUS_CHANGE: &str = "user_status_change";

/// A channel an actor can be subscribed to: their personal channel, or the channel of an order they are viewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    User(i64),
    Order(i64),
}

impl Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelName::User(id) => write!(f, "user_{id}"),
            ChannelName::Order(id) => write!(f, "order_{id}"),
        }
    }
}

/// A single event published to a channel: a stable event name plus a JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event: String,
    pub payload: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new<S: Into<String>>(event: S, payload: serde_json::Value) -> Self {
        Self { event: event.into(), payload }
    }

    /// Wraps a persisted notification for live delivery; the event name is the notification type.
    pub fn from_notification(n: &Notification) -> Self {
        let payload = json!({
            "id": n.id,
            "type": n.ntype.as_str(),
            "title": n.title,
            "message": n.message,
            "data": n.data,
            "created_at": n.created_at,
        });
        Self::new(n.ntype.as_str(), payload)
    }
}

#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("The realtime transport rejected the publish: {0}")]
    Transport(String),
}

/// Publish-side of the realtime transport. The engine only ever publishes; joining channels, socket lifecycles and
/// delivery are owned by the transport implementation.
#[allow(async_fn_in_trait)]
pub trait RealtimePublisher: Clone + Send + Sync {
    async fn publish(&self, channel: ChannelName, event: RealtimeEvent) -> Result<(), PublishError>;
}

/// A message as observed by a [`MemoryPublisher`] subscriber.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub event: RealtimeEvent,
}

/// In-process transport over a tokio broadcast channel. Subscribers receive every published event tagged with its
/// channel name; publishing with no subscribers is fine (delivery is best-effort by contract).
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    tx: broadcast::Sender<ChannelMessage>,
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MemoryPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.tx.subscribe()
    }
}

impl RealtimePublisher for MemoryPublisher {
    async fn publish(&self, channel: ChannelName, event: RealtimeEvent) -> Result<(), PublishError> {
        // A send error only means there are no subscribers right now, which is not a failure.
        let _ = self.tx.send(ChannelMessage { channel: channel.to_string(), event });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_names() {
        assert_eq!(ChannelName::User(7).to_string(), "user_7");
        assert_eq!(ChannelName::Order(42).to_string(), "order_42");
    }

    #[tokio::test]
    async fn memory_publisher_delivers_to_subscribers() {
        let publisher = MemoryPublisher::default();
        let mut rx = publisher.subscribe();
        publisher.publish(ChannelName::User(1), RealtimeEvent::new("ping", json!({"n": 1}))).await.unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.channel, "user_1");
        assert_eq!(msg.event.event, "ping");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_ok() {
        let publisher = MemoryPublisher::default();
        let res = publisher.publish(ChannelName::Order(5), RealtimeEvent::new("ping", json!({}))).await;
        assert!(res.is_ok());
    }
}
