use std::sync::Arc;

use mandi_engine::{
    db_types::{NotificationType, OrderStatusType, PaymentMethod},
    order_objects::{ApproveOrderRequest, CreateOrderRequest, OrderItemRequest},
    traits::StaticGateway,
    MarketReader,
    MarketplaceError,
    OrderFlowError,
};
use tokio::task::JoinSet;

mod support;
use support::seed::{new_db, order_flow, order_request, seed_market, tear_down};

#[tokio::test]
async fn order_totals_and_stock_reservation() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 3), (market.tomatoes.id, 2)]);
    let (order, contract) = api.create_order(req).await.expect("Error creating order");

    // 3×₹25 + 2×₹40, exact to the paisa.
    assert_eq!(order.total_amount.value(), 3 * 2500 + 2 * 4000);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.items.len(), 2);
    // The contract is drafted with the order and linked back to it.
    assert_eq!(order.contract_id, Some(contract.id));
    assert_eq!(contract.order_id, order.id);
    assert_eq!(contract.total_amount, order.total_amount);

    let onions = db.fetch_product(market.onions.id).await.unwrap().unwrap();
    let tomatoes = db.fetch_product(market.tomatoes.id).await.unwrap().unwrap();
    assert_eq!(onions.stock_quantity, 97);
    assert_eq!(tomatoes.stock_quantity, 8);

    // The supplier heard about it.
    let inbox = db.fetch_notifications_for_user(market.supplier.id, true).await.unwrap();
    assert!(inbox.iter().any(|n| n.ntype == NotificationType::OrderReceived));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn insufficient_stock_rolls_everything_back() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    // Tomatoes have 10 in stock; onions would fit, but the whole order must fail as a unit.
    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 5), (market.tomatoes.id, 11)]);
    let err = api.create_order(req).await.expect_err("Order should not fit");
    match err {
        OrderFlowError::Storage(MarketplaceError::InsufficientStock { product_id, requested, available }) => {
            assert_eq!(product_id, market.tomatoes.id);
            assert_eq!(requested, 11);
            assert_eq!(available, 10);
        },
        other => panic!("Expected InsufficientStock, got {other}"),
    }
    // Nothing was reserved and no order row survived.
    let onions = db.fetch_product(market.onions.id).await.unwrap().unwrap();
    assert_eq!(onions.stock_quantity, 100);
    let orders = db.search_orders(Default::default()).await.unwrap();
    assert!(orders.is_empty());
    tear_down(&mut db).await;
}

#[tokio::test]
async fn oversell_is_impossible() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    // First order drains the tomatoes exactly.
    let req = order_request(&market, PaymentMethod::PayLater, &[(market.tomatoes.id, 10)]);
    api.create_order(req).await.expect("Error creating order");
    let tomatoes = db.fetch_product(market.tomatoes.id).await.unwrap().unwrap();
    assert_eq!(tomatoes.stock_quantity, 0);

    // A later order for even the minimum quantity must fail, never go negative.
    let req = order_request(&market, PaymentMethod::PayLater, &[(market.tomatoes.id, 2)]);
    let err = api.create_order(req).await.expect_err("Stock is gone");
    assert!(matches!(
        err,
        OrderFlowError::Storage(MarketplaceError::InsufficientStock { available: 0, requested: 2, .. })
    ));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn concurrent_orders_never_oversell() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = Arc::new(order_flow(&db, StaticGateway::approving()));

    // Ten tomatoes, eight buyers racing for three each: only three orders fit.
    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let api = Arc::clone(&api);
        let (vendor_id, supplier_id, product_id) = (market.vendor.id, market.supplier.id, market.tomatoes.id);
        tasks.spawn(async move {
            let req = CreateOrderRequest {
                vendor_id,
                supplier_id,
                payment_method: PaymentMethod::PayLater,
                delivery_address: "Stall 12, Juhu Beach".to_string(),
                notes: None,
                items: vec![OrderItemRequest { product_id, quantity: 3 }],
            };
            api.create_order(req).await
        });
    }
    let (mut won, mut lost) = (0, 0);
    while let Some(result) = tasks.join_next().await {
        match result.expect("Order task panicked") {
            Ok(_) => won += 1,
            Err(OrderFlowError::Storage(MarketplaceError::InsufficientStock { .. })) => lost += 1,
            Err(other) => panic!("Expected InsufficientStock, got {other}"),
        }
    }
    assert_eq!(won, 3);
    assert_eq!(lost, 5);
    let tomatoes = db.fetch_product(market.tomatoes.id).await.unwrap().unwrap();
    assert_eq!(tomatoes.stock_quantity, 1);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn reject_restores_reserved_stock() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 40)]);
    let (order, contract) = api.create_order(req).await.expect("Error creating order");
    assert_eq!(db.fetch_product(market.onions.id).await.unwrap().unwrap().stock_quantity, 60);

    let reason = Some("Truck broke down".to_string());
    let rejected = api.reject_order(order.id, market.supplier.id, reason).await.expect("Error rejecting order");
    assert_eq!(rejected.status, OrderStatusType::Rejected);
    assert_eq!(db.fetch_product(market.onions.id).await.unwrap().unwrap().stock_quantity, 100);

    // The unsigned contract dies with the order.
    let contract = db.fetch_contract(contract.id).await.unwrap().unwrap();
    assert_eq!(contract.status.to_string(), "cancelled");

    let inbox = db.fetch_notifications_for_user(market.vendor.id, true).await.unwrap();
    let rejection = inbox.iter().find(|n| n.ntype == NotificationType::OrderRejected).expect("No rejection notice");
    assert!(rejection.message.contains("Truck broke down"));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn delivery_chain_is_strict() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 5)]);
    let (order, _) = api.create_order(req).await.expect("Error creating order");

    // Cannot skip straight to out_for_delivery from pending.
    let err = api.advance_order(order.id, market.supplier.id, OrderStatusType::OutForDelivery).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::InvalidTransition { .. })));

    let approved = api.approve_order(order.id, market.supplier.id, ApproveOrderRequest::default()).await.unwrap();
    assert_eq!(approved.status, OrderStatusType::Accepted);

    // Approving twice loses the race against itself.
    let err = api.approve_order(order.id, market.supplier.id, ApproveOrderRequest::default()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::InvalidTransition { .. })));

    for status in [OrderStatusType::InProgress, OrderStatusType::OutForDelivery, OrderStatusType::Delivered] {
        let order = api.advance_order(order.id, market.supplier.id, status).await.expect("Error advancing order");
        assert_eq!(order.status, status);
    }

    // Delivered is terminal.
    let err = api.advance_order(order.id, market.supplier.id, OrderStatusType::InProgress).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::InvalidTransition { .. })));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn only_the_right_party_may_act() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 5)]);
    let (order, _) = api.create_order(req).await.expect("Error creating order");

    // The vendor cannot approve their own order.
    let err = api.approve_order(order.id, market.vendor.id, ApproveOrderRequest::default()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::Unauthorized { .. })));

    // A stranger cannot cancel it.
    let err = api.cancel_order(order.id, 9999).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::Unauthorized { .. })));

    // The supplier cannot rate it.
    let err = api.rate_order(order.id, market.supplier.id, 5).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::Unauthorized { .. })));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn rating_feeds_the_supplier_average() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 5)]);
    let (order, _) = api.create_order(req).await.unwrap();

    // Not delivered yet.
    let err = api.rate_order(order.id, market.vendor.id, 4).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::Validation(_))));

    api.approve_order(order.id, market.supplier.id, ApproveOrderRequest::default()).await.unwrap();
    for status in [OrderStatusType::InProgress, OrderStatusType::OutForDelivery, OrderStatusType::Delivered] {
        api.advance_order(order.id, market.supplier.id, status).await.unwrap();
    }
    let rated = api.rate_order(order.id, market.vendor.id, 4).await.expect("Error rating order");
    assert_eq!(rated.supplier_rating, Some(4));
    let supplier = db.fetch_actor(market.supplier.id).await.unwrap().unwrap();
    assert_eq!(supplier.rating, Some(4.0));

    // One rating per order.
    let err = api.rate_order(order.id, market.vendor.id, 1).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Storage(MarketplaceError::Validation(_))));
    tear_down(&mut db).await;
}

#[tokio::test]
async fn cancel_restores_stock_and_kills_the_contract() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 10)]);
    let (order, contract) = api.create_order(req).await.unwrap();
    api.approve_order(order.id, market.supplier.id, ApproveOrderRequest::default()).await.unwrap();

    let cancelled = api.cancel_order(order.id, market.vendor.id).await.expect("Error cancelling order");
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(db.fetch_product(market.onions.id).await.unwrap().unwrap().stock_quantity, 100);

    let contract = db.fetch_contract(contract.id).await.unwrap().unwrap();
    assert_eq!(contract.status.to_string(), "cancelled");
    tear_down(&mut db).await;
}
