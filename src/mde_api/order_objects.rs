use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderStatusType, PaymentMethod};

/// Filter for order searches. Empty fields are unconstrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_number: Option<String>,
    pub vendor_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub status: Option<Vec<OrderStatusType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_order_number<S: Into<String>>(mut self, order_number: S) -> Self {
        self.order_number = Some(order_number.into());
        self
    }

    pub fn with_vendor_id(mut self, vendor_id: i64) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn with_supplier_id(mut self, supplier_id: i64) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_number.is_none() &&
            self.vendor_id.is_none() &&
            self.supplier_id.is_none() &&
            self.status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

/// One line of an incoming order request. The engine prices it from the product record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

/// An order as submitted by a vendor. Totals and per-line prices are computed server-side; the vendor only says
/// what and how much.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub vendor_id: i64,
    pub supplier_id: i64,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<OrderItemRequest>,
}

/// Supplier's response when accepting an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveOrderRequest {
    pub expected_delivery_at: Option<DateTime<Utc>>,
    /// Revised payment deadline, when the supplier extends or shortens the default terms.
    pub payment_due_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filter_emptiness() {
        let q = OrderQueryFilter::default();
        assert!(q.is_empty());
        let q = q.with_vendor_id(12).with_status(OrderStatusType::Pending).with_status(OrderStatusType::Accepted);
        assert!(!q.is_empty());
        assert_eq!(q.status.as_ref().map(|s| s.len()), Some(2));
    }
}
