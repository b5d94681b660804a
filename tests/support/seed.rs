//! Shared fixtures: a small seeded market on a throwaway database.
use log::error;
use mandi_engine::{
    db_types::{Actor, Money, NewActor, NewProduct, PaymentMethod, Product, Role},
    events::EventProducers,
    order_objects::{CreateOrderRequest, OrderItemRequest},
    traits::{MemoryPublisher, StaticGateway},
    MarketplaceDatabase,
    OrderFlowApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::prepare_env::{prepare_test_env, random_db_path};

pub struct Market {
    pub db: SqliteDatabase,
    pub vendor: Actor,
    pub supplier: Actor,
    pub onions: Product,
    pub tomatoes: Product,
}

pub async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    // A single connection keeps reads strictly ordered after writes on the throwaway file.
    SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database")
}

/// One vendor in Mumbai, one supplier a few km away, two vegetable products.
pub async fn seed_market(db: &SqliteDatabase) -> Market {
    let vendor = db
        .insert_actor(
            NewActor::new("Chaat Corner", Role::Vendor, "mumbai", "maharashtra").with_coordinates(19.0760, 72.8777),
        )
        .await
        .expect("Error inserting vendor");
    let supplier = db
        .insert_actor(
            NewActor::new("Fresh Farms", Role::Supplier, "mumbai", "maharashtra")
                .with_coordinates(19.1136, 72.8697)
                .with_payment_terms(30),
        )
        .await
        .expect("Error inserting supplier");
    let onions = db
        .insert_product(NewProduct::new(supplier.id, "Onions", "vegetables", Money::from_rupees(25), 100))
        .await
        .expect("Error inserting product");
    let tomatoes = db
        .insert_product(
            NewProduct::new(supplier.id, "Tomatoes", "vegetables", Money::from_rupees(40), 10)
                .with_min_order_quantity(2),
        )
        .await
        .expect("Error inserting product");
    Market { db: db.clone(), vendor, supplier, onions, tomatoes }
}

pub type TestApi = OrderFlowApi<SqliteDatabase, MemoryPublisher, StaticGateway>;

pub fn order_flow(db: &SqliteDatabase, gateway: StaticGateway) -> TestApi {
    OrderFlowApi::new(db.clone(), MemoryPublisher::default(), gateway, EventProducers::default())
}

pub fn order_request(market: &Market, method: PaymentMethod, items: &[(i64, i64)]) -> CreateOrderRequest {
    CreateOrderRequest {
        vendor_id: market.vendor.id,
        supplier_id: market.supplier.id,
        payment_method: method,
        delivery_address: "Stall 12, Juhu Beach".to_string(),
        notes: None,
        items: items.iter().map(|&(product_id, quantity)| OrderItemRequest { product_id, quantity }).collect(),
    }
}

pub async fn tear_down(db: &mut SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.ok();
}
