use std::{collections::HashSet, fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db_types::{Actor, Notification, NotificationType},
    traits::{
        ChannelName,
        MarketplaceDatabase,
        MarketplaceError,
        NewNotification,
        RealtimeEvent,
        RealtimePublisher,
        EVENT_RECEIVE_MESSAGE,
        EVENT_USER_STATUS_CHANGE,
        EVENT_USER_TYPING,
    },
};

/// One chat message in an order's room. Chat is ephemeral: rooms live in memory and vanish with the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub order_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// `NotificationHub` is the delivery side of the engine. Every notification is persisted first and then pushed to
/// the recipient's personal channel; realtime delivery is best-effort, so a publish failure is logged and swallowed
/// rather than failing the operation that triggered it.
///
/// The hub also owns the live state that never touches the database:
/// * presence, as a connection count per user (a user with two tabs open stays online until both close);
/// * per-order chat rooms and their message logs;
/// * typing indicators.
pub struct NotificationHub<B, P> {
    db: B,
    publisher: P,
    /// user_id → open connection count.
    online: Arc<DashMap<i64, u32>>,
    /// order_id → users currently in the room.
    rooms: Arc<DashMap<i64, HashSet<i64>>>,
    /// order_id → chat log, oldest first.
    chats: Arc<DashMap<i64, Vec<ChatMessage>>>,
}

impl<B: Clone, P: Clone> Clone for NotificationHub<B, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            publisher: self.publisher.clone(),
            online: Arc::clone(&self.online),
            rooms: Arc::clone(&self.rooms),
            chats: Arc::clone(&self.chats),
        }
    }
}

impl<B, P> Debug for NotificationHub<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationHub ({} online)", self.online.len())
    }
}

impl<B, P> NotificationHub<B, P>
where
    B: MarketplaceDatabase,
    P: RealtimePublisher,
{
    pub fn new(db: B, publisher: P) -> Self {
        Self {
            db,
            publisher,
            online: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
            chats: Arc::new(DashMap::new()),
        }
    }

    //----------------------------------- durable notifications -----------------------------------

    /// Persists the notification and pushes it to the recipient's channel. The stored record is the source of
    /// truth; an offline recipient sees it on their next fetch.
    pub async fn notify(&self, notification: NewNotification) -> Result<Notification, MarketplaceError> {
        let stored = self.db.insert_notification(notification).await?;
        let event = RealtimeEvent::from_notification(&stored);
        self.publish_best_effort(ChannelName::User(stored.user_id), event).await;
        Ok(stored)
    }

    pub async fn notifications_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, MarketplaceError> {
        self.db.fetch_notifications_for_user(user_id, unread_only).await
    }

    pub async fn mark_read(&self, user_id: i64, notification_id: i64) -> Result<bool, MarketplaceError> {
        self.db.mark_notification_read(user_id, notification_id).await
    }

    pub async fn delete(&self, user_id: i64, notification_id: i64) -> Result<bool, MarketplaceError> {
        self.db.delete_notification(user_id, notification_id).await
    }

    /// Notifies every listed vendor that a supplier has joined their market.
    pub async fn announce_new_supplier(&self, supplier: &Actor, recipients: &[i64]) -> Result<(), MarketplaceError> {
        for &vendor_id in recipients {
            let n = NewNotification::new(
                vendor_id,
                NotificationType::NewSupplier,
                "New supplier in your area".to_string(),
                format!("{} is now supplying from {}", supplier.name, supplier.city),
            )
            .with_data(json!({ "supplier_id": supplier.id, "city": supplier.city, "state": supplier.state }));
            self.notify(n).await?;
        }
        debug!("🔔️ Announced supplier {} to {} vendor(s)", supplier.id, recipients.len());
        Ok(())
    }

    //----------------------------------- presence -----------------------------------

    /// Registers a connection for the user. The first connection flips them online and broadcasts the change.
    pub async fn connect(&self, user_id: i64) {
        let mut entry = self.online.entry(user_id).or_insert(0);
        *entry += 1;
        let came_online = *entry == 1;
        drop(entry);
        if came_online {
            trace!("🔔️ User {user_id} came online");
            self.broadcast_status(user_id, true).await;
        }
    }

    /// Deregisters a connection. The last disconnect flips the user offline, removes them from every chat room and
    /// broadcasts the change.
    pub async fn disconnect(&self, user_id: i64) {
        let went_offline = match self.online.get_mut(&user_id) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            },
            None => return,
        };
        if went_offline {
            self.online.remove(&user_id);
            for mut room in self.rooms.iter_mut() {
                room.value_mut().remove(&user_id);
            }
            trace!("🔔️ User {user_id} went offline");
            self.broadcast_status(user_id, false).await;
        }
    }

    pub fn is_user_online(&self, user_id: i64) -> bool {
        self.online.get(&user_id).map(|c| *c > 0).unwrap_or(false)
    }

    async fn broadcast_status(&self, user_id: i64, online: bool) {
        let payload = json!({ "user_id": user_id, "online": online });
        let event = RealtimeEvent::new(EVENT_USER_STATUS_CHANGE, payload);
        self.publish_best_effort(ChannelName::User(user_id), event).await;
    }

    //----------------------------------- order chat -----------------------------------

    /// Joins the user to an order's chat room. Only the two parties to the order may join.
    pub async fn join_order_channel(&self, order_id: i64, user_id: i64) -> Result<(), MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if !order.is_party(user_id) {
            return Err(MarketplaceError::Unauthorized {
                actor_id: user_id,
                detail: format!("not a party to order {}", order.order_number),
            });
        }
        self.rooms.entry(order_id).or_default().insert(user_id);
        Ok(())
    }

    pub fn leave_order_channel(&self, order_id: i64, user_id: i64) {
        if let Some(mut room) = self.rooms.get_mut(&order_id) {
            room.remove(&user_id);
        }
    }

    /// Sends a chat message to the order's room: appended to the in-memory log and pushed to the room's channel.
    pub async fn send_chat_message(
        &self,
        order_id: i64,
        sender_id: i64,
        body: String,
    ) -> Result<ChatMessage, MarketplaceError> {
        let in_room = self.rooms.get(&order_id).map(|r| r.contains(&sender_id)).unwrap_or(false);
        if !in_room {
            self.join_order_channel(order_id, sender_id).await?;
        }
        let message = ChatMessage { order_id, sender_id, body, sent_at: Utc::now() };
        self.chats.entry(order_id).or_default().push(message.clone());
        let payload = json!({
            "order_id": order_id,
            "sender_id": sender_id,
            "body": message.body,
            "sent_at": message.sent_at,
        });
        self.publish_best_effort(ChannelName::Order(order_id), RealtimeEvent::new(EVENT_RECEIVE_MESSAGE, payload))
            .await;
        Ok(message)
    }

    pub fn chat_history(&self, order_id: i64) -> Vec<ChatMessage> {
        self.chats.get(&order_id).map(|log| log.clone()).unwrap_or_default()
    }

    /// Pushes a typing indicator to the order's room. Nothing is stored.
    pub async fn set_typing(&self, order_id: i64, user_id: i64, typing: bool) {
        let payload = json!({ "order_id": order_id, "user_id": user_id, "typing": typing });
        self.publish_best_effort(ChannelName::Order(order_id), RealtimeEvent::new(EVENT_USER_TYPING, payload)).await;
    }

    async fn publish_best_effort(&self, channel: ChannelName, event: RealtimeEvent) {
        if let Err(e) = self.publisher.publish(channel, event).await {
            warn!("🔔️ Realtime publish to {channel} failed: {e}");
        }
    }
}
