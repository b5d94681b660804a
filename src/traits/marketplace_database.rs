use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        Actor,
        Contract,
        Money,
        NewActor,
        NewContract,
        NewOrder,
        NewPayment,
        NewProduct,
        Notification,
        Order,
        OrderStatusType,
        Payment,
        Product,
        Role,
    },
    traits::{MarketReader, NewNotification, ReservationResult, SettlementOutcome, SignOutcome},
};

/// The write-side persistence contract for the marketplace engine.
///
/// Each method is a complete unit of work: backends must execute it as a single transaction (or equivalent atomic
/// primitive), because the engine performs **no** locking of its own. In particular:
///
/// * stock reservation and restoration are conditional updates that can never leave `stock_quantity` negative or a
///   partially reserved order behind;
/// * order transitions are compare-and-set on the current status, so a lost race surfaces as
///   [`MarketplaceError::InvalidTransition`] rather than a double application;
/// * contract signing flips the `signed` status in the same transaction that records the second signature.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + MarketReader {
    /// The URL of the backing store.
    fn url(&self) -> &str;

    //----------------------------------- actors & products -----------------------------------

    async fn insert_actor(&self, actor: NewActor) -> Result<Actor, MarketplaceError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;

    /// Adds stock to a product (supplier restock). `quantity` must be positive.
    async fn restock_product(&self, product_id: i64, quantity: i64) -> Result<Product, MarketplaceError>;

    //----------------------------------- order flow -----------------------------------

    /// Inserts the order and its items and reserves stock for every item, all in one transaction.
    ///
    /// Each item decrements its product's stock with a `stock_quantity >= quantity` guard. If any item cannot be
    /// reserved the whole transaction rolls back and [`MarketplaceError::InsufficientStock`] is returned: no partial
    /// reservation ever persists.
    async fn create_order_with_reservation(&self, order: NewOrder) -> Result<ReservationResult, MarketplaceError>;

    /// Compare-and-set `pending` → `accepted`, recording the delivery estimate and any revised payment terms.
    async fn approve_order(
        &self,
        order_id: i64,
        eta: Option<DateTime<Utc>>,
        payment_due_at: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<Order, MarketplaceError>;

    /// Compare-and-set `pending` → `rejected`, restoring every item's reserved stock and cancelling an unsigned
    /// contract in the same transaction.
    async fn reject_order(&self, order_id: i64) -> Result<Order, MarketplaceError>;

    /// Compare-and-set transition to `new_status`, which must be the single next step along the delivery chain
    /// (`accepted` → `in_progress` → `out_for_delivery` → `delivered`).
    async fn advance_order(&self, order_id: i64, new_status: OrderStatusType) -> Result<Order, MarketplaceError>;

    /// Cancels a non-terminal order, restoring reserved stock and cancelling an unsigned contract in the same
    /// transaction.
    async fn cancel_order(&self, order_id: i64) -> Result<Order, MarketplaceError>;

    /// Records the vendor's rating (1-5) for a delivered, not-yet-rated order and refreshes the supplier's rating
    /// aggregate.
    async fn rate_order(&self, order_id: i64, rating: i64) -> Result<Order, MarketplaceError>;

    //----------------------------------- contracts -----------------------------------

    /// Inserts the contract for an order and back-links it, idempotently: if the order already has a contract the
    /// existing record is returned with `false`.
    async fn insert_contract(&self, contract: NewContract) -> Result<(Contract, bool), MarketplaceError>;

    /// Applies one party's signature. Re-signing is a no-op preserving the original timestamp. When the second
    /// signature lands, the status flips to `signed` in the same transaction.
    async fn sign_contract(&self, contract_id: i64, role: Role) -> Result<SignOutcome, MarketplaceError>;

    /// Marks `sent` contracts with no signatures that have been idle longer than `older_than` as `expired`,
    /// returning the contracts that were expired.
    async fn expire_stale_contracts(&self, older_than: Duration) -> Result<Vec<Contract>, MarketplaceError>;

    //----------------------------------- payments -----------------------------------

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, MarketplaceError>;

    /// Settles the `processing` payment carrying `gateway_ref` according to the gateway outcome. On success the
    /// payment completes and the order's payment status flips to `paid` in the same transaction; on failure only the
    /// payment is marked `failed`. A payment already in a final state is a no-op (`duplicate` in the outcome).
    async fn settle_payment(&self, gateway_ref: &str, success: bool) -> Result<SettlementOutcome, MarketplaceError>;

    /// Marks a `completed` payment as `refunded`. The order record is not touched; partial refund amounts are the
    /// caller's bookkeeping.
    async fn refund_payment(&self, payment_id: i64, amount: Option<Money>) -> Result<Payment, MarketplaceError>;

    //----------------------------------- notifications -----------------------------------

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, MarketplaceError>;

    /// Marks a notification read, scoped to its owner. Returns false when no such notification belongs to the user.
    async fn mark_notification_read(&self, user_id: i64, notification_id: i64) -> Result<bool, MarketplaceError>;

    async fn delete_notification(&self, user_id: i64, notification_id: i64) -> Result<bool, MarketplaceError>;

    /// Closes the backing store.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested actor {0} does not exist")]
    ActorNotFound(i64),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested contract {0} does not exist")]
    ContractNotFound(i64),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Actor {actor_id} is not permitted to do this: {detail}")]
    Unauthorized { actor_id: i64, detail: String },
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Illegal payment status change. {0}")]
    PaymentStatusUpdateError(String),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
