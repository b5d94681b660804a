use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::{Contract, NotificationType, Order, Payment, Product};

/// Aggregated order history for a supplier, as needed by the trust engine. `annulled_orders` counts rejected and
/// cancelled orders together.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct SupplierStats {
    pub total_orders: i64,
    pub delivered_orders: i64,
    pub annulled_orders: i64,
    /// Mean of the order ratings this supplier has received, if any.
    pub avg_rating: Option<f64>,
    /// Supplier's mean unit price over the mean unit price of the categories they sell in.
    pub price_ratio: Option<f64>,
}

/// Aggregated order/payment history for a vendor.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct VendorStats {
    pub total_orders: i64,
    pub total_payments: i64,
    pub completed_payments: i64,
}

/// A supplier eligible for matching: has at least one available product with positive stock in the requested
/// category.
#[derive(Debug, Clone)]
pub struct SupplierCandidate {
    pub supplier_id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Available products in the requested category with stock on hand, capped by the matcher at 20.
    pub product_count: i64,
}

/// Result of the atomic order-insert + stock-reservation transaction.
#[derive(Debug, Clone)]
pub struct ReservationResult {
    pub order: Order,
    /// Products whose remaining stock dropped below their minimum order quantity during reservation. The order flow
    /// raises a stock alert for each.
    pub low_stock: Vec<Product>,
}

/// Result of applying one party's signature to a contract.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub contract: Contract,
    /// False when this role had already signed; the original timestamp is untouched in that case.
    pub newly_signed: bool,
    /// True when this call completed the contract (both flags now set and status flipped to `signed`).
    pub completed: bool,
}

/// Result of settling a payment, either from the synchronous gateway response or a callback.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub payment: Payment,
    /// The order as left by the settlement, when it was touched.
    pub order: Option<Order>,
    /// True when the payment was already in a final state and nothing changed.
    pub duplicate: bool,
}

/// A notification about to be persisted and fanned out.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub ntype: NotificationType,
    pub title: String,
    pub message: String,
    pub data: Option<String>,
}

impl NewNotification {
    pub fn new<S: Into<String>>(user_id: i64, ntype: NotificationType, title: S, message: S) -> Self {
        Self { user_id, ntype, title: title.into(), message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data.to_string());
        self
    }
}
