use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Contract, NewContract, Role},
    traits::MarketplaceError,
};

/// Inserts a contract for the order, unless one already exists, in which case the existing contract is returned.
/// The boolean is true when a new row was created.
pub async fn idempotent_insert(
    contract: NewContract,
    conn: &mut SqliteConnection,
) -> Result<(Contract, bool), MarketplaceError> {
    if let Some(existing) = fetch_contract_for_order(contract.order_id, &mut *conn).await? {
        trace!("📜️ Order {} already has contract [{}]", contract.order_id, existing.contract_number);
        return Ok((existing, false));
    }
    let inserted: Contract = sqlx::query_as(
        r#"
            INSERT INTO contracts (contract_number, order_id, vendor_id, supplier_id, terms, payment_terms_days,
                                   total_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(&contract.contract_number)
    .bind(contract.order_id)
    .bind(contract.vendor_id)
    .bind(contract.supplier_id)
    .bind(&contract.terms)
    .bind(contract.payment_terms_days)
    .bind(contract.total_amount)
    .fetch_one(conn)
    .await?;
    debug!("📜️ Contract [{}] created for order {}", inserted.contract_number, inserted.order_id);
    Ok((inserted, true))
}

pub async fn fetch_contract(contract_id: i64, conn: &mut SqliteConnection) -> Result<Option<Contract>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM contracts WHERE id = $1").bind(contract_id).fetch_optional(conn).await
}

pub async fn fetch_contract_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Contract>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM contracts WHERE order_id = $1").bind(order_id).fetch_optional(conn).await
}

/// Records the signature for the given role. The guard on the signed flag makes a repeated signature a no-op
/// (`None` is returned and the original `signed_at` timestamp is preserved).
pub async fn apply_signature(
    contract_id: i64,
    role: Role,
    conn: &mut SqliteConnection,
) -> Result<Option<Contract>, sqlx::Error> {
    let sql = match role {
        Role::Vendor => {
            r#"
            UPDATE contracts
            SET vendor_signed = 1, vendor_signed_at = datetime('now'), updated_at = datetime('now')
            WHERE id = $1 AND vendor_signed = 0 AND status = 'sent'
            RETURNING *;
        "#
        },
        Role::Supplier => {
            r#"
            UPDATE contracts
            SET supplier_signed = 1, supplier_signed_at = datetime('now'), updated_at = datetime('now')
            WHERE id = $1 AND supplier_signed = 0 AND status = 'sent'
            RETURNING *;
        "#
        },
    };
    sqlx::query_as(sql).bind(contract_id).fetch_optional(conn).await
}

/// Promotes the contract to `signed` once both parties have signed. Returns the contract iff the promotion
/// happened in this call.
pub async fn mark_signed_if_complete(
    contract_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Contract>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE contracts
            SET status = 'signed', updated_at = datetime('now')
            WHERE id = $1 AND status = 'sent' AND vendor_signed = 1 AND supplier_signed = 1
            RETURNING *;
        "#,
    )
    .bind(contract_id)
    .fetch_optional(conn)
    .await
}

/// Cancels a not-yet-completed contract when its order is rejected or cancelled.
pub async fn cancel_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Contract>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE contracts
            SET status = 'cancelled', updated_at = datetime('now')
            WHERE order_id = $1 AND status IN ('draft', 'sent')
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

/// Sweeps `sent` contracts that nobody has signed and that predate the cutoff into the `expired` state, returning
/// them.
pub async fn expire_stale(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Contract>, sqlx::Error> {
    let expired: Vec<Contract> = sqlx::query_as(
        r#"
            UPDATE contracts
            SET status = 'expired', updated_at = datetime('now')
            WHERE status = 'sent' AND vendor_signed = 0 AND supplier_signed = 0 AND created_at <= $1
            RETURNING *;
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    if !expired.is_empty() {
        debug!("📜️ Expired {} stale contract(s)", expired.len());
    }
    Ok(expired)
}
