use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, NewPayment, Payment},
    traits::MarketplaceError,
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, MarketplaceError> {
    let inserted: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, vendor_id, supplier_id, amount, method, status, gateway_ref, due_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.vendor_id)
    .bind(payment.supplier_id)
    .bind(payment.amount)
    .bind(payment.method)
    .bind(payment.status)
    .bind(&payment.gateway_ref)
    .bind(payment.due_at)
    .fetch_one(conn)
    .await?;
    debug!("💰️ Payment {} recorded for order {} ({})", inserted.id, inserted.order_id, inserted.amount);
    Ok(inserted)
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await
}

pub async fn fetch_payments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_payment_by_gateway_ref(
    gateway_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE gateway_ref = $1").bind(gateway_ref).fetch_optional(conn).await
}

/// Completes a processing payment. The status guard makes repeated gateway callbacks no-ops.
pub async fn mark_completed(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments
            SET status = 'completed', paid_at = datetime('now'), updated_at = datetime('now')
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    trace!("💰️ Completion of payment {payment_id}: applied={}", payment.is_some());
    Ok(payment)
}

pub async fn mark_failed(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments
            SET status = 'failed', updated_at = datetime('now')
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await
}

/// Refunds a completed payment. A partial amount replaces the recorded amount so the books reflect what actually
/// moved back.
pub async fn mark_refunded(
    payment_id: i64,
    amount: Option<Money>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments
            SET status = 'refunded', amount = COALESCE($1, amount), updated_at = datetime('now')
            WHERE id = $2 AND status = 'completed'
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(payment_id)
    .fetch_optional(conn)
    .await
}

/// Pending pay-later payments falling due on or before the cutoff.
pub async fn due_payments(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM payments
            WHERE status = 'pending' AND due_at IS NOT NULL AND due_at <= $1
            ORDER BY due_at ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await
}
