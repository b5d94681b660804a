use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderItem, OrderPaymentStatus, OrderStatusType},
    mde_api::order_objects::OrderQueryFilter,
    traits::MarketplaceError,
};

/// Inserts the order row and its items. Stock reservation is the caller's job (same transaction); this function
/// only persists the records.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    let mut inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                vendor_id,
                supplier_id,
                payment_method,
                total_amount,
                delivery_address,
                notes,
                payment_due_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(&order.order_number)
    .bind(order.vendor_id)
    .bind(order.supplier_id)
    .bind(order.payment_method)
    .bind(order.total_amount)
    .bind(&order.delivery_address)
    .bind(&order.notes)
    .bind(order.payment_due_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(inserted.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .execute(&mut *conn)
        .await?;
    }
    inserted.items = fetch_items(inserted.id, conn).await?;
    debug!("📦️ Order [{}] inserted with id {}", inserted.order_number, inserted.id);
    Ok(inserted)
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    with_items(order, conn).await
}

pub async fn fetch_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(&mut *conn)
        .await?;
    with_items(order, conn).await
}

async fn with_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(mut order) => {
            order.items = fetch_items(order.id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

/// Compare-and-set status transition. Returns `None` when the order was not in `from` at the instant of the update,
/// which is how concurrent transitions lose cleanly.
pub async fn transition(
    order_id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = $1, updated_at = datetime('now')
            WHERE id = $2 AND status = $3
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(order_id)
    .bind(from)
    .fetch_optional(&mut *conn)
    .await?;
    trace!("📦️ Transition of order {order_id} from {from} to {to}: applied={}", order.is_some());
    with_items(order, conn).await
}

/// The approve transition, which also records the delivery estimate and revised terms.
pub async fn approve(
    order_id: i64,
    eta: Option<DateTime<Utc>>,
    payment_due_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = 'accepted',
                expected_delivery_at = COALESCE($1, expected_delivery_at),
                payment_due_at = COALESCE($2, payment_due_at),
                notes = COALESCE($3, notes),
                updated_at = datetime('now')
            WHERE id = $4 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(eta)
    .bind(payment_due_at)
    .bind(notes)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

/// Cancels the order if it is still in a non-terminal state.
pub async fn cancel(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET status = 'cancelled', updated_at = datetime('now')
            WHERE id = $1 AND status IN ('pending', 'accepted', 'in_progress', 'out_for_delivery')
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

pub async fn set_contract_id(order_id: i64, contract_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET contract_id = $1, updated_at = datetime('now') WHERE id = $2")
        .bind(contract_id)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Records the vendor's rating; applies only to delivered, not-yet-rated orders.
pub async fn apply_rating(
    order_id: i64,
    rating: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET supplier_rating = $1, updated_at = datetime('now')
            WHERE id = $2 AND status = 'delivered' AND supplier_rating IS NULL
            RETURNING *;
        "#,
    )
    .bind(rating)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

pub async fn set_payment_status(
    order_id: i64,
    payment_status: OrderPaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_status = $1, updated_at = datetime('now')
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(payment_status)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    with_items(order, conn).await
}

/// Fetches orders according to the filter criteria, ordered by `created_at` ascending. Items are not populated.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_number) = query.order_number {
        where_clause.push("order_number = ");
        where_clause.push_bind_unseparated(order_number);
    }
    if let Some(vendor_id) = query.vendor_id {
        where_clause.push("vendor_id = ");
        where_clause.push_bind_unseparated(vendor_id);
    }
    if let Some(supplier_id) = query.supplier_id {
        where_clause.push("supplier_id = ");
        where_clause.push_bind_unseparated(supplier_id);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("📦️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}
