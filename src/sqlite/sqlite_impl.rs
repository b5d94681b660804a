//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every write-side method runs as a single transaction, so the atomicity contract of
//! [`MarketplaceDatabase`] holds even under concurrent callers hitting the same rows.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{actors, contracts, db_url, new_pool, notifications, orders, payments, products};
use crate::{
    db_types::{
        Actor,
        Contract,
        ContractStatusType,
        Money,
        NewActor,
        NewContract,
        NewOrder,
        NewPayment,
        NewProduct,
        Notification,
        Order,
        OrderPaymentStatus,
        OrderStatusType,
        Payment,
        PaymentStatus,
        Product,
        Role,
    },
    mde_api::order_objects::OrderQueryFilter,
    traits::{
        MarketReader,
        MarketplaceDatabase,
        MarketplaceError,
        NewNotification,
        ReservationResult,
        SettlementOutcome,
        SignOutcome,
        SupplierCandidate,
        SupplierStats,
        VendorStats,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl MarketReader for SqliteDatabase {
    async fn fetch_actor(&self, actor_id: i64) -> Result<Option<Actor>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let actor = actors::fetch_actor(actor_id, &mut conn).await?;
        Ok(actor)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_contract(&self, contract_id: i64) -> Result<Option<Contract>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let contract = contracts::fetch_contract(contract_id, &mut conn).await?;
        Ok(contract)
    }

    async fn fetch_contract_for_order(&self, order_id: i64) -> Result<Option<Contract>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let contract = contracts::fetch_contract_for_order(order_id, &mut conn).await?;
        Ok(contract)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let result = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_notifications_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::fetch_for_user(user_id, unread_only, &mut conn).await?;
        Ok(result)
    }

    async fn supplier_candidates(
        &self,
        category: &str,
        exclude: &[i64],
    ) -> Result<Vec<SupplierCandidate>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let result = actors::supplier_candidates(category, exclude, &mut conn).await?;
        Ok(result)
    }

    async fn supplier_stats(&self, supplier_id: i64) -> Result<SupplierStats, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let stats = actors::supplier_stats(supplier_id, &mut conn).await?;
        Ok(stats)
    }

    async fn vendor_stats(&self, vendor_id: i64) -> Result<VendorStats, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let stats = actors::vendor_stats(vendor_id, &mut conn).await?;
        Ok(stats)
    }

    async fn due_payments(&self, within: Duration) -> Result<Vec<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let cutoff = Utc::now() + within;
        let result = payments::due_payments(cutoff, &mut conn).await?;
        Ok(result)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_actor(&self, actor: NewActor) -> Result<Actor, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        actors::insert_actor(actor, &mut conn).await
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn restock_product(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError> {
        if quantity <= 0 {
            return Err(MarketplaceError::Validation(format!("Restock quantity must be positive, got {quantity}")));
        }
        let mut conn = self.pool.acquire().await?;
        products::add_stock(product_id, quantity, &mut conn)
            .await?
            .ok_or(MarketplaceError::ProductNotFound(product_id))
    }

    /// Takes a new order, and in a single atomic transaction,
    /// * stores the order and its items in the database,
    /// * decrements each product's stock with a `stock_quantity >= quantity` guard,
    /// * collects the products the reservation pushed below their minimum order quantity.
    ///
    /// If any item cannot be reserved the transaction rolls back and `InsufficientStock` is returned, so no partial
    /// reservation ever persists.
    async fn create_order_with_reservation(&self, order: NewOrder) -> Result<ReservationResult, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let inserted = orders::insert_order(order, &mut tx).await?;
        for item in &inserted.items {
            let reserved = products::try_reserve_stock(item.product_id, item.quantity, &mut tx).await?;
            if !reserved {
                let available = products::fetch_product(item.product_id, &mut tx)
                    .await?
                    .map(|p| p.stock_quantity)
                    .ok_or(MarketplaceError::ProductNotFound(item.product_id))?;
                debug!(
                    "🧺️ Reservation for order [{}] failed on product {}. Rolling back.",
                    inserted.order_number, item.product_id
                );
                // Dropping the transaction rolls everything back, including the order row.
                return Err(MarketplaceError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available,
                });
            }
        }
        let low_stock = products::low_stock_for_order(inserted.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🧺️ Order [{}] created and stock reserved for {} item(s)", inserted.order_number, inserted.items.len());
        Ok(ReservationResult { order: inserted, low_stock })
    }

    async fn approve_order(
        &self,
        order_id: i64,
        eta: Option<DateTime<Utc>>,
        payment_due_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let approved = orders::approve(order_id, eta, payment_due_at, notes, &mut tx).await?;
        let order = match approved {
            Some(order) => order,
            None => return Err(transition_error(order_id, OrderStatusType::Accepted, &mut tx).await),
        };
        tx.commit().await?;
        debug!("🗃️ Order [{}] approved", order.order_number);
        Ok(order)
    }

    /// Rejects a pending order and restores every item's reserved stock in the same transaction.
    async fn reject_order(&self, order_id: i64) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let rejected =
            orders::transition(order_id, OrderStatusType::Pending, OrderStatusType::Rejected, &mut tx).await?;
        let order = match rejected {
            Some(order) => order,
            None => return Err(transition_error(order_id, OrderStatusType::Rejected, &mut tx).await),
        };
        for item in &order.items {
            products::restore_stock(item.product_id, item.quantity, &mut tx).await?;
        }
        if let Some(contract) = contracts::cancel_for_order(order_id, &mut tx).await? {
            debug!("📜️ Contract [{}] cancelled along with its rejected order", contract.contract_number);
        }
        tx.commit().await?;
        debug!("🗃️ Order [{}] rejected and stock restored", order.order_number);
        Ok(order)
    }

    async fn advance_order(&self, order_id: i64, new_status: OrderStatusType) -> Result<Order, MarketplaceError> {
        let from = match new_status {
            OrderStatusType::InProgress => OrderStatusType::Accepted,
            OrderStatusType::OutForDelivery => OrderStatusType::InProgress,
            OrderStatusType::Delivered => OrderStatusType::OutForDelivery,
            other => {
                let from = self
                    .fetch_order(order_id)
                    .await?
                    .ok_or(MarketplaceError::OrderNotFound(order_id))?
                    .status;
                return Err(MarketplaceError::InvalidTransition { order_id, from, to: other });
            },
        };
        let mut tx = self.pool.begin().await?;
        let advanced = orders::transition(order_id, from, new_status, &mut tx).await?;
        let order = match advanced {
            Some(order) => order,
            None => return Err(transition_error(order_id, new_status, &mut tx).await),
        };
        tx.commit().await?;
        debug!("🗃️ Order [{}] advanced to {new_status}", order.order_number);
        Ok(order)
    }

    /// Cancels a non-terminal order, restoring reserved stock and cancelling any unsigned contract, all in one
    /// transaction.
    async fn cancel_order(&self, order_id: i64) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = orders::cancel(order_id, &mut tx).await?;
        let order = match cancelled {
            Some(order) => order,
            None => return Err(transition_error(order_id, OrderStatusType::Cancelled, &mut tx).await),
        };
        for item in &order.items {
            products::restore_stock(item.product_id, item.quantity, &mut tx).await?;
        }
        if let Some(contract) = contracts::cancel_for_order(order_id, &mut tx).await? {
            debug!("📜️ Contract [{}] cancelled along with its order", contract.contract_number);
        }
        tx.commit().await?;
        debug!("🗃️ Order [{}] cancelled and stock restored", order.order_number);
        Ok(order)
    }

    async fn rate_order(&self, order_id: i64, rating: i64) -> Result<Order, MarketplaceError> {
        if !(1..=5).contains(&rating) {
            return Err(MarketplaceError::Validation(format!("Rating must be between 1 and 5, got {rating}")));
        }
        let mut tx = self.pool.begin().await?;
        let rated = orders::apply_rating(order_id, rating, &mut tx).await?;
        let order = match rated {
            Some(order) => order,
            None => {
                let order =
                    orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
                let detail = if order.supplier_rating.is_some() {
                    "order has already been rated".to_string()
                } else {
                    format!("only delivered orders can be rated, status is {}", order.status)
                };
                return Err(MarketplaceError::Validation(detail));
            },
        };
        actors::refresh_rating(order.supplier_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] rated {rating}/5", order.order_number);
        Ok(order)
    }

    async fn insert_contract(&self, contract: NewContract) -> Result<(Contract, bool), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let (contract, created) = contracts::idempotent_insert(contract, &mut tx).await?;
        if created {
            orders::set_contract_id(contract.order_id, contract.id, &mut tx).await?;
        }
        tx.commit().await?;
        Ok((contract, created))
    }

    /// Applies one party's signature. A repeated signature is a no-op that preserves the original timestamp; the
    /// second distinct signature flips the contract to `signed` in the same transaction.
    async fn sign_contract(&self, contract_id: i64, role: Role) -> Result<SignOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let signed = contracts::apply_signature(contract_id, role, &mut tx).await?;
        let outcome = match signed {
            Some(contract) => {
                let completed = contracts::mark_signed_if_complete(contract.id, &mut tx).await?;
                let completed_now = completed.is_some();
                SignOutcome { contract: completed.unwrap_or(contract), newly_signed: true, completed: completed_now }
            },
            None => {
                let contract = contracts::fetch_contract(contract_id, &mut tx)
                    .await?
                    .ok_or(MarketplaceError::ContractNotFound(contract_id))?;
                match contract.status {
                    // The only way the guarded update misses a live contract is that this role already signed.
                    ContractStatusType::Sent | ContractStatusType::Signed => {
                        SignOutcome { contract, newly_signed: false, completed: false }
                    },
                    other => {
                        return Err(MarketplaceError::Validation(format!(
                            "Contract {} cannot be signed in the {other} state",
                            contract.contract_number
                        )))
                    },
                }
            },
        };
        tx.commit().await?;
        if outcome.completed {
            info!("📜️ Contract [{}] is now fully signed", outcome.contract.contract_number);
        }
        Ok(outcome)
    }

    async fn expire_stale_contracts(&self, older_than: Duration) -> Result<Vec<Contract>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let cutoff = Utc::now() - older_than;
        let expired = contracts::expire_stale(cutoff, &mut conn).await?;
        Ok(expired)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(payment, &mut conn).await
    }

    /// Settles the payment carrying `gateway_ref`. On success the payment completes and the order flips to `paid` in
    /// the same transaction; on failure only the payment is marked. A payment already in a final state comes back as
    /// a duplicate with nothing changed.
    async fn settle_payment(&self, gateway_ref: &str, success: bool) -> Result<SettlementOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment_by_gateway_ref(gateway_ref, &mut tx).await?.ok_or_else(|| {
            MarketplaceError::PaymentStatusUpdateError(format!("No payment carries gateway reference {gateway_ref}"))
        })?;
        if matches!(payment.status, PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded) {
            debug!("💰️ Duplicate settlement for gateway reference {gateway_ref}. Ignoring.");
            return Ok(SettlementOutcome { payment, order: None, duplicate: true });
        }
        let outcome = if success {
            let payment = payments::mark_completed(payment.id, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::PaymentStatusUpdateError("Payment settled concurrently".into()))?;
            let order = orders::set_payment_status(payment.order_id, OrderPaymentStatus::Paid, &mut tx).await?;
            SettlementOutcome { payment, order, duplicate: false }
        } else {
            let payment = payments::mark_failed(payment.id, &mut tx)
                .await?
                .ok_or_else(|| MarketplaceError::PaymentStatusUpdateError("Payment settled concurrently".into()))?;
            SettlementOutcome { payment, order: None, duplicate: false }
        };
        tx.commit().await?;
        debug!("💰️ Payment {} settled (success={success})", outcome.payment.id);
        Ok(outcome)
    }

    async fn refund_payment(&self, payment_id: i64, amount: Option<Money>) -> Result<Payment, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let refunded = payments::mark_refunded(payment_id, amount, &mut tx).await?;
        let payment = match refunded {
            Some(payment) => payment,
            None => {
                let payment = payments::fetch_payment(payment_id, &mut tx)
                    .await?
                    .ok_or(MarketplaceError::PaymentNotFound(payment_id))?;
                return Err(MarketplaceError::PaymentStatusUpdateError(format!(
                    "Only completed payments can be refunded, payment {payment_id} is {}",
                    payment.status
                )));
            },
        };
        tx.commit().await?;
        info!("💰️ Payment {payment_id} refunded ({})", payment.amount);
        Ok(payment)
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        notifications::insert_notification(notification, &mut conn).await
    }

    async fn mark_notification_read(&self, user_id: i64, notification_id: i64) -> Result<bool, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let updated = notifications::mark_read(user_id, notification_id, &mut conn).await?;
        Ok(updated)
    }

    async fn delete_notification(&self, user_id: i64, notification_id: i64) -> Result<bool, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = notifications::delete_notification(user_id, notification_id, &mut conn).await?;
        Ok(deleted)
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Builds the error for a compare-and-set transition that matched no row: either the order does not exist, or it was
/// in the wrong state at the instant of the update.
async fn transition_error(
    order_id: i64,
    to: OrderStatusType,
    conn: &mut sqlx::SqliteConnection,
) -> MarketplaceError {
    match orders::fetch_order(order_id, conn).await {
        Ok(Some(order)) => MarketplaceError::InvalidTransition { order_id, from: order.status, to },
        Ok(None) => MarketplaceError::OrderNotFound(order_id),
        Err(e) => e.into(),
    }
}
