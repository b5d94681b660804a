use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Actor, NewActor},
    traits::{MarketplaceError, SupplierCandidate, SupplierStats, VendorStats},
};

pub async fn insert_actor(actor: NewActor, conn: &mut SqliteConnection) -> Result<Actor, MarketplaceError> {
    let actor = sqlx::query_as(
        r#"
            INSERT INTO actors (name, role, city, state, lat, lng, payment_terms_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(actor.name)
    .bind(actor.role)
    .bind(actor.city)
    .bind(actor.state)
    .bind(actor.lat)
    .bind(actor.lng)
    .bind(actor.payment_terms_days)
    .fetch_one(conn)
    .await?;
    Ok(actor)
}

pub async fn fetch_actor(actor_id: i64, conn: &mut SqliteConnection) -> Result<Option<Actor>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM actors WHERE id = $1").bind(actor_id).fetch_optional(conn).await
}

/// Recomputes the supplier's rating aggregate from their rated orders.
pub async fn refresh_rating(supplier_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE actors
            SET rating = (SELECT AVG(supplier_rating) FROM orders
                          WHERE supplier_id = $1 AND supplier_rating IS NOT NULL)
            WHERE id = $1
        "#,
    )
    .bind(supplier_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Suppliers with at least one available, in-stock product in the category, excluding the given ids.
pub async fn supplier_candidates(
    category: &str,
    exclude: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<SupplierCandidate>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT a.id, a.name, a.city, a.state, a.lat, a.lng, COUNT(p.id) AS product_count
    FROM actors a
    JOIN products p ON p.supplier_id = a.id
    WHERE a.role = 'supplier'
      AND p.category = "#,
    );
    builder.push_bind(category);
    builder.push(" AND p.is_available = 1 AND p.stock_quantity > 0");
    if !exclude.is_empty() {
        builder.push(" AND a.id NOT IN (");
        let mut ids = builder.separated(", ");
        for id in exclude {
            ids.push_bind(*id);
        }
        builder.push(")");
    }
    builder.push(" GROUP BY a.id ORDER BY a.id ASC");
    trace!("🏪️ Executing candidate query: {}", builder.sql());
    let rows: Vec<(i64, String, String, String, Option<f64>, Option<f64>, i64)> =
        builder.build_query_as().fetch_all(conn).await?;
    let candidates = rows
        .into_iter()
        .map(|(supplier_id, name, city, state, lat, lng, product_count)| SupplierCandidate {
            supplier_id,
            name,
            city,
            state,
            lat,
            lng,
            product_count,
        })
        .collect();
    Ok(candidates)
}

pub async fn supplier_stats(supplier_id: i64, conn: &mut SqliteConnection) -> Result<SupplierStats, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT
                COUNT(*) AS total_orders,
                COALESCE(SUM(CASE WHEN status = 'delivered' THEN 1 ELSE 0 END), 0) AS delivered_orders,
                COALESCE(SUM(CASE WHEN status IN ('rejected', 'cancelled') THEN 1 ELSE 0 END), 0) AS annulled_orders,
                AVG(supplier_rating) AS avg_rating,
                (SELECT AVG(p.unit_price * 1.0 / c.cat_avg)
                 FROM products p
                 JOIN (SELECT category, AVG(unit_price) AS cat_avg FROM products GROUP BY category) c
                   ON c.category = p.category
                 WHERE p.supplier_id = $1) AS price_ratio
            FROM orders
            WHERE supplier_id = $1
        "#,
    )
    .bind(supplier_id)
    .fetch_one(conn)
    .await
}

pub async fn vendor_stats(vendor_id: i64, conn: &mut SqliteConnection) -> Result<VendorStats, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT
                (SELECT COUNT(*) FROM orders WHERE vendor_id = $1) AS total_orders,
                (SELECT COUNT(*) FROM payments WHERE vendor_id = $1) AS total_payments,
                (SELECT COUNT(*) FROM payments WHERE vendor_id = $1 AND status = 'completed') AS completed_payments
        "#,
    )
    .bind(vendor_id)
    .fetch_one(conn)
    .await
}
