use mandi_engine::{
    db_types::{Money, NewActor, NewProduct, OrderStatusType, PaymentMethod, Role},
    order_objects::ApproveOrderRequest,
    traits::StaticGateway,
    MarketplaceDatabase,
    MatchingApi,
    SqliteDatabase,
};

mod support;
use support::seed::{new_db, order_flow, order_request, seed_market, tear_down};

/// About 2km and 1km due north of the test vendor at (19.0760, 72.8777).
const TWO_KM_NORTH: (f64, f64) = (19.093986, 72.8777);
const ONE_KM_NORTH: (f64, f64) = (19.084993, 72.8777);

async fn add_supplier(db: &SqliteDatabase, name: &str, at: (f64, f64), products: usize) -> i64 {
    let supplier = db
        .insert_actor(NewActor::new(name, Role::Supplier, "mumbai", "maharashtra").with_coordinates(at.0, at.1))
        .await
        .expect("Error inserting supplier");
    for i in 0..products {
        db.insert_product(NewProduct::new(
            supplier.id,
            format!("Veg {i}").as_str(),
            "vegetables",
            Money::from_rupees(30),
            50,
        ))
        .await
        .expect("Error inserting product");
    }
    supplier.id
}

#[tokio::test]
async fn closer_is_not_always_better() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let a = add_supplier(&db, "Wholesale A", TWO_KM_NORTH, 3).await;
    let b = add_supplier(&db, "Wholesale B", ONE_KM_NORTH, 1).await;

    let api = MatchingApi::new(db.clone());
    let ranked = api
        .rank_suppliers(market.vendor.id, "vegetables", &[market.supplier.id])
        .await
        .expect("Error ranking suppliers");
    assert_eq!(ranked.len(), 2);

    // Both are unproven (trust 50), so the catalogue edge outweighs B's extra kilometre:
    // A = 0.40·50 + 0.35·98 + 0.25·15 = 58.05, B = 0.40·50 + 0.35·99 + 0.25·5 = 55.90.
    assert_eq!(ranked[0].supplier_id, a);
    assert!((ranked[0].score - 58.05).abs() < 1e-6, "A scored {}", ranked[0].score);
    assert_eq!(ranked[1].supplier_id, b);
    assert!((ranked[1].score - 55.90).abs() < 1e-6, "B scored {}", ranked[1].score);

    let best = api.find_best_supplier(market.vendor.id, "vegetables", &[market.supplier.id]).await.unwrap();
    assert_eq!(best.unwrap().supplier_id, a);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn excluded_and_empty_categories() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let a = add_supplier(&db, "Wholesale A", TWO_KM_NORTH, 3).await;
    let b = add_supplier(&db, "Wholesale B", ONE_KM_NORTH, 1).await;

    let api = MatchingApi::new(db.clone());
    // Excluding the top pick promotes the runner-up.
    let best = api
        .find_best_supplier(market.vendor.id, "vegetables", &[market.supplier.id, a])
        .await
        .unwrap()
        .expect("B should remain");
    assert_eq!(best.supplier_id, b);

    // Nobody sells spices.
    let best = api.find_best_supplier(market.vendor.id, "spices", &[]).await.unwrap();
    assert!(best.is_none());
    tear_down(&mut db).await;
}

#[tokio::test]
async fn out_of_stock_suppliers_do_not_match() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());

    // Drain everything the seeded supplier has.
    let req = order_request(&market, PaymentMethod::PayLater, &[(market.onions.id, 100), (market.tomatoes.id, 10)]);
    api.create_order(req).await.expect("Error creating order");

    let matching = MatchingApi::new(db.clone());
    let best = matching.find_best_supplier(market.vendor.id, "vegetables", &[]).await.unwrap();
    assert!(best.is_none());
    tear_down(&mut db).await;
}

#[tokio::test]
async fn identical_candidates_tie_break_on_id() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let first = add_supplier(&db, "Twin One", TWO_KM_NORTH, 2).await;
    let second = add_supplier(&db, "Twin Two", TWO_KM_NORTH, 2).await;
    assert!(first < second);

    let api = MatchingApi::new(db.clone());
    let best = api
        .find_best_supplier(market.vendor.id, "vegetables", &[market.supplier.id])
        .await
        .unwrap()
        .expect("A twin should match");
    assert_eq!(best.supplier_id, first);
    tear_down(&mut db).await;
}

#[tokio::test]
async fn a_perfect_history_earns_full_trust() {
    let mut db = new_db().await;
    let market = seed_market(&db).await;
    let api = order_flow(&db, StaticGateway::approving());
    let matching = MatchingApi::new(db.clone());

    // No history yet: the neutral default.
    assert_eq!(matching.supplier_trust_score(market.supplier.id).await.unwrap(), 50);

    let req = order_request(&market, PaymentMethod::Upi, &[(market.onions.id, 5)]);
    let (order, _) = api.create_order(req).await.unwrap();
    api.approve_order(order.id, market.supplier.id, ApproveOrderRequest::default()).await.unwrap();
    for status in [OrderStatusType::InProgress, OrderStatusType::OutForDelivery, OrderStatusType::Delivered] {
        api.advance_order(order.id, market.supplier.id, status).await.unwrap();
    }
    api.rate_order(order.id, market.vendor.id, 5).await.unwrap();

    // One delivered, five-star order, sole (hence perfectly priced) supplier in the category: every component maxes.
    assert_eq!(matching.supplier_trust_score(market.supplier.id).await.unwrap(), 100);
    tear_down(&mut db).await;
}
