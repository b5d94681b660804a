use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::MarketplaceError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (supplier_id, name, category, unit_price, stock_quantity, min_order_quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(product.supplier_id)
    .bind(product.name)
    .bind(product.category)
    .bind(product.unit_price)
    .bind(product.stock_quantity)
    .bind(product.min_order_quantity)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await
}

/// Attempts to reserve `quantity` units. The decrement only applies when enough stock is on hand; the caller must
/// treat `false` as a failed reservation and roll back its enclosing transaction.
pub async fn try_reserve_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $1, updated_at = datetime('now')
            WHERE id = $2 AND is_available = 1 AND stock_quantity >= $1
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .execute(conn)
    .await?;
    let reserved = result.rows_affected() == 1;
    trace!("🧺️ Reservation of {quantity} units of product {product_id}: {reserved}");
    Ok(reserved)
}

/// Returns reserved units to stock. The inverse of [`try_reserve_stock`]; used by reject and cancel flows.
pub async fn restore_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $1, updated_at = datetime('now')
            WHERE id = $2
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn add_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $1, updated_at = datetime('now')
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await
}

/// Products on the order whose remaining stock sits below their minimum order quantity.
pub async fn low_stock_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT p.* FROM products p
            JOIN order_items i ON i.product_id = p.id
            WHERE i.order_id = $1 AND p.stock_quantity < p.min_order_quantity
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}
