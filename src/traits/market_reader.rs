use chrono::Duration;

use crate::{
    db_types::{Actor, Contract, Notification, Order, Payment, Product},
    mde_api::order_objects::OrderQueryFilter,
    traits::{MarketplaceError, SupplierCandidate, SupplierStats, VendorStats},
};

/// Query-side contract: fetches, searches and the history aggregates that feed trust scoring and matching.
#[allow(async_fn_in_trait)]
pub trait MarketReader {
    async fn fetch_actor(&self, actor_id: i64) -> Result<Option<Actor>, MarketplaceError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    /// Fetches an order with its items populated.
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError>;

    /// Fetches an order by its human-readable number, items populated.
    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, MarketplaceError>;

    /// Searches orders by filter. Items are **not** populated on search results.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketplaceError>;

    async fn fetch_contract(&self, contract_id: i64) -> Result<Option<Contract>, MarketplaceError>;

    async fn fetch_contract_for_order(&self, order_id: i64) -> Result<Option<Contract>, MarketplaceError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, MarketplaceError>;

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, MarketplaceError>;

    async fn fetch_notifications_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, MarketplaceError>;

    /// Suppliers with at least one available, in-stock product in the category, excluding the given ids.
    async fn supplier_candidates(
        &self,
        category: &str,
        exclude: &[i64],
    ) -> Result<Vec<SupplierCandidate>, MarketplaceError>;

    async fn supplier_stats(&self, supplier_id: i64) -> Result<SupplierStats, MarketplaceError>;

    async fn vendor_stats(&self, vendor_id: i64) -> Result<VendorStats, MarketplaceError>;

    /// Pending pay-later payments falling due within the window, for the reminder sweep.
    async fn due_payments(&self, within: Duration) -> Result<Vec<Payment>, MarketplaceError>;
}
