use std::time::Duration;

use mandi_engine::{
    db_types::{NotificationType, PaymentMethod},
    events::EventProducers,
    traits::{ChannelMessage, MemoryPublisher, StaticGateway, EVENT_RECEIVE_MESSAGE, EVENT_USER_TYPING},
    MarketplaceError,
    MarketReader,
    OrderFlowApi,
    SqliteDatabase,
};
use tokio::sync::broadcast;

mod support;
use support::seed::{new_db, order_request, seed_market, tear_down};

type Api = OrderFlowApi<SqliteDatabase, MemoryPublisher, StaticGateway>;

fn api_with_publisher(db: &SqliteDatabase) -> (Api, MemoryPublisher) {
    let publisher = MemoryPublisher::default();
    let api = OrderFlowApi::new(db.clone(), publisher.clone(), StaticGateway::approving(), EventProducers::default());
    (api, publisher)
}

/// Pulls messages off the subscription until one matches, or the well runs dry.
async fn expect_event(
    rx: &mut broadcast::Receiver<ChannelMessage>,
    channel: &str,
    event: &str,
) -> ChannelMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {event} on {channel}"))
            .expect("Subscription closed");
        if msg.channel == channel && msg.event.event == event {
            return msg;
        }
    }
}

#[tokio::test]
async fn notifications_are_stored_then_pushed() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let (api, publisher) = api_with_publisher(&db);
    let mut rx = publisher.subscribe();

    let req = order_request(&market, PaymentMethod::PayLater, &[(market.onions.id, 2)]);
    let (order, _) = api.create_order(req).await.unwrap();

    // Live copy lands on the supplier's personal channel, named after the notification type.
    let channel = format!("user_{}", market.supplier.id);
    let msg = expect_event(&mut rx, &channel, "order_received").await;
    assert_eq!(msg.event.payload["data"], serde_json::json!(format!(
        "{{\"order_id\":{},\"order_number\":\"{}\"}}",
        order.id, order.order_number
    )));

    // The durable copy is the source of truth.
    let hub = api.hub();
    let unread = hub.notifications_for_user(market.supplier.id, true).await.unwrap();
    let stored = unread.iter().find(|n| n.ntype == NotificationType::OrderReceived).expect("stored notification");

    assert!(hub.mark_read(market.supplier.id, stored.id).await.unwrap());
    assert!(hub.notifications_for_user(market.supplier.id, true)
        .await
        .unwrap()
        .iter()
        .all(|n| n.id != stored.id));

    // Only the owner may delete, and only once.
    assert!(!hub.delete(market.vendor.id, stored.id).await.unwrap());
    assert!(hub.delete(market.supplier.id, stored.id).await.unwrap());
    assert!(!hub.delete(market.supplier.id, stored.id).await.unwrap());
    tear_down(&mut db).await;
}

#[tokio::test]
async fn presence_counts_connections() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let (api, publisher) = api_with_publisher(&db);
    let mut rx = publisher.subscribe();
    let hub = api.hub();
    let user = market.vendor.id;

    assert!(!hub.is_user_online(user));
    hub.connect(user).await;
    hub.connect(user).await; // second tab
    assert!(hub.is_user_online(user));

    let channel = format!("user_{user}");
    let msg = expect_event(&mut rx, &channel, "user_status_change").await;
    assert_eq!(msg.event.payload["online"], serde_json::json!(true));

    hub.disconnect(user).await;
    assert!(hub.is_user_online(user), "one tab is still open");
    hub.disconnect(user).await;
    assert!(!hub.is_user_online(user));
    let msg = expect_event(&mut rx, &channel, "user_status_change").await;
    assert_eq!(msg.event.payload["online"], serde_json::json!(false));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn order_chat_is_for_the_parties_only() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let (api, publisher) = api_with_publisher(&db);
    let mut rx = publisher.subscribe();
    let hub = api.hub();

    let req = order_request(&market, PaymentMethod::PayLater, &[(market.onions.id, 2)]);
    let (order, _) = api.create_order(req).await.unwrap();

    hub.join_order_channel(order.id, market.vendor.id).await.unwrap();
    let err = hub.join_order_channel(order.id, 31337).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Unauthorized { .. }));

    let sent = hub
        .send_chat_message(order.id, market.vendor.id, "Bhaiya, please pack extra green chillies".to_string())
        .await
        .expect("Error sending chat message");

    let channel = format!("order_{}", order.id);
    let msg = expect_event(&mut rx, &channel, EVENT_RECEIVE_MESSAGE).await;
    assert_eq!(msg.event.payload["sender_id"], serde_json::json!(market.vendor.id));
    assert_eq!(msg.event.payload["body"], serde_json::json!(sent.body));

    // The supplier can reply without an explicit join; strangers cannot.
    hub.send_chat_message(order.id, market.supplier.id, "Done!".to_string()).await.unwrap();
    let err = hub.send_chat_message(order.id, 31337, "sup".to_string()).await.unwrap_err();
    assert!(matches!(err, MarketplaceError::Unauthorized { .. }));

    let history = hub.chat_history(order.id);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender_id, market.vendor.id);
    assert_eq!(history[1].sender_id, market.supplier.id);

    hub.set_typing(order.id, market.supplier.id, true).await;
    let msg = expect_event(&mut rx, &channel, EVENT_USER_TYPING).await;
    assert_eq!(msg.event.payload["typing"], serde_json::json!(true));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn new_suppliers_are_announced_to_vendors() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let (api, _publisher) = api_with_publisher(&db);
    let hub = api.hub();

    hub.announce_new_supplier(&market.supplier, &[market.vendor.id]).await.unwrap();
    let inbox = db.fetch_notifications_for_user(market.vendor.id, true).await.unwrap();
    let n = inbox.iter().find(|n| n.ntype == NotificationType::NewSupplier).expect("announcement stored");
    assert!(n.message.contains("Fresh Farms"));
    tear_down(&mut db).await;
}
