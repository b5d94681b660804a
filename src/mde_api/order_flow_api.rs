use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use serde_json::json;

use crate::{
    db_types::{
        Contract,
        Money,
        NewOrder,
        NotificationType,
        Order,
        OrderStatusType,
        Payment,
        PricedOrderItem,
        Role,
    },
    events::{ContractSignedEvent, EventProducers, OrderCreatedEvent, OrderStatusChangedEvent, PaymentSettledEvent},
    helpers::new_order_number,
    mde_api::{
        contract_api::ContractApi,
        errors::OrderFlowError,
        order_objects::{ApproveOrderRequest, CreateOrderRequest},
        payment_api::{PaymentApi, PaymentOutcome},
    },
    notifications::NotificationHub,
    traits::{
        MarketplaceDatabase,
        MarketplaceError,
        NewNotification,
        PaymentGateway,
        RealtimePublisher,
        SettlementOutcome,
    },
};

/// `OrderFlowApi` is the primary API of the engine: it drives orders through their lifecycle and fans the side
/// effects out to contracts, payments, notifications and the host's event hooks. The atomic parts (stock
/// reservation, status transitions, signatures, settlement) live in the backend; this layer adds authorization,
/// pricing and orchestration.
pub struct OrderFlowApi<B, P, G> {
    db: B,
    hub: NotificationHub<B, P>,
    contracts: ContractApi<B>,
    payments: PaymentApi<B, G>,
    producers: EventProducers,
}

impl<B, P, G> Debug for OrderFlowApi<B, P, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, P, G> OrderFlowApi<B, P, G>
where
    B: MarketplaceDatabase,
    P: RealtimePublisher,
    G: PaymentGateway,
{
    pub fn new(db: B, publisher: P, gateway: G, producers: EventProducers) -> Self {
        let hub = NotificationHub::new(db.clone(), publisher);
        let contracts = ContractApi::new(db.clone());
        let payments = PaymentApi::new(db.clone(), gateway);
        Self { db, hub, contracts, payments, producers }
    }

    /// The notification hub, for presence, chat and direct notification access.
    pub fn hub(&self) -> &NotificationHub<B, P> {
        &self.hub
    }

    //----------------------------------- order lifecycle -----------------------------------

    /// Submits a new order.
    ///
    /// Items are priced from the current product records, the order total is their exact sum, and stock for every
    /// item is reserved atomically with the order insert. The supply contract is drafted in the same breath and
    /// both parties are told it is ready to sign; a pay-later order also gets its deferred payment recorded, due
    /// on the order's payment deadline. The supplier is notified of the new order, and of any product the
    /// reservation pushed below its minimum order quantity.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<(Order, Contract), OrderFlowError> {
        if request.items.is_empty() {
            return Err(MarketplaceError::Validation("An order needs at least one item".to_string()).into());
        }
        let vendor = self
            .db
            .fetch_actor(request.vendor_id)
            .await?
            .ok_or(MarketplaceError::ActorNotFound(request.vendor_id))?;
        if vendor.role != Role::Vendor {
            return Err(MarketplaceError::Validation(format!("Actor {} is not a vendor", vendor.id)).into());
        }
        let supplier = self
            .db
            .fetch_actor(request.supplier_id)
            .await?
            .ok_or(MarketplaceError::ActorNotFound(request.supplier_id))?;
        if supplier.role != Role::Supplier {
            return Err(MarketplaceError::Validation(format!("Actor {} is not a supplier", supplier.id)).into());
        }
        let mut items = Vec::with_capacity(request.items.len());
        let mut total = Money::default();
        for item in &request.items {
            if item.quantity <= 0 {
                return Err(MarketplaceError::Validation(format!(
                    "Quantity for product {} must be positive",
                    item.product_id
                ))
                .into());
            }
            let product = self
                .db
                .fetch_product(item.product_id)
                .await?
                .ok_or(MarketplaceError::ProductNotFound(item.product_id))?;
            if product.supplier_id != supplier.id {
                return Err(MarketplaceError::Validation(format!(
                    "Product {} does not belong to supplier {}",
                    product.id, supplier.id
                ))
                .into());
            }
            if item.quantity < product.min_order_quantity {
                return Err(MarketplaceError::Validation(format!(
                    "Product {} has a minimum order quantity of {}",
                    product.id, product.min_order_quantity
                ))
                .into());
            }
            let total_price = product.unit_price * item.quantity;
            total += total_price;
            items.push(PricedOrderItem {
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.unit_price,
                total_price,
            });
        }
        let order = NewOrder {
            order_number: new_order_number(),
            vendor_id: vendor.id,
            supplier_id: supplier.id,
            payment_method: request.payment_method,
            total_amount: total,
            delivery_address: request.delivery_address,
            notes: request.notes,
            payment_due_at: Utc::now() + Duration::days(supplier.payment_terms_days),
            items,
        };
        let result = self.db.create_order_with_reservation(order).await?;
        let order = result.order;
        info!("🔄️📦️ Order [{}] created for {} ({} items)", order.order_number, order.total_amount, order.items.len());
        let n = NewNotification::new(
            order.supplier_id,
            NotificationType::OrderReceived,
            "New order received".to_string(),
            format!("Order {} for {} from {}", order.order_number, order.total_amount, vendor.name),
        )
        .with_data(json!({ "order_id": order.id, "order_number": order.order_number }));
        self.hub.notify(n).await?;
        for product in &result.low_stock {
            let n = NewNotification::new(
                order.supplier_id,
                NotificationType::StockAlert,
                "Low stock".to_string(),
                format!("{} is down to {} units", product.name, product.stock_quantity),
            )
            .with_data(json!({ "product_id": product.id, "stock_quantity": product.stock_quantity }));
            self.hub.notify(n).await?;
        }
        let (contract, created) = self.contracts.generate_for_order(order.id).await?;
        if created {
            self.notify_contract_sent(&order, &contract).await?;
        }
        if order.payment_method.is_deferred() {
            self.payments.initiate(&order).await?;
        }
        // Pick up the contract back-link written during generation.
        let order = self.db.fetch_order(order.id).await?.ok_or(MarketplaceError::OrderNotFound(order.id))?;
        self.call_order_created_hook(&order).await;
        Ok((order, contract))
    }

    /// The supplier accepts a pending order, optionally revising the delivery estimate and payment deadline.
    pub async fn approve_order(
        &self,
        order_id: i64,
        actor_id: i64,
        request: ApproveOrderRequest,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order_for_party(order_id, actor_id).await?;
        if order.supplier_id != actor_id {
            return Err(unauthorized(actor_id, "only the supplier can approve an order").into());
        }
        let old_status = order.status;
        let order = self
            .db
            .approve_order(order_id, request.expected_delivery_at, request.payment_due_at, request.notes)
            .await?;
        let n = NewNotification::new(
            order.vendor_id,
            NotificationType::OrderApproved,
            "Order approved".to_string(),
            format!("Order {} was accepted by the supplier", order.order_number),
        )
        .with_data(json!({ "order_id": order.id }));
        self.hub.notify(n).await?;
        self.call_order_status_hook(&order, old_status).await;
        Ok(order)
    }

    /// The supplier turns a pending order down. Reserved stock goes back on the shelf and the unsigned contract is
    /// cancelled, atomically.
    pub async fn reject_order(
        &self,
        order_id: i64,
        actor_id: i64,
        reason: Option<String>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order_for_party(order_id, actor_id).await?;
        if order.supplier_id != actor_id {
            return Err(unauthorized(actor_id, "only the supplier can reject an order").into());
        }
        let old_status = order.status;
        let order = self.db.reject_order(order_id).await?;
        let message = match &reason {
            Some(reason) => format!("Order {} was declined by the supplier: {reason}", order.order_number),
            None => format!("Order {} was declined by the supplier", order.order_number),
        };
        let n = NewNotification::new(
            order.vendor_id,
            NotificationType::OrderRejected,
            "Order rejected".to_string(),
            message,
        )
        .with_data(json!({ "order_id": order.id, "reason": reason }));
        self.hub.notify(n).await?;
        self.call_order_status_hook(&order, old_status).await;
        Ok(order)
    }

    /// The supplier moves an accepted order one step along the delivery chain
    /// (`accepted` → `in_progress` → `out_for_delivery` → `delivered`). Skipping a step is an invalid transition.
    pub async fn advance_order(
        &self,
        order_id: i64,
        actor_id: i64,
        new_status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order_for_party(order_id, actor_id).await?;
        if order.supplier_id != actor_id {
            return Err(unauthorized(actor_id, "only the supplier can advance an order").into());
        }
        let old_status = order.status;
        let order = self.db.advance_order(order_id, new_status).await?;
        self.call_order_status_hook(&order, old_status).await;
        Ok(order)
    }

    /// Either party cancels a non-terminal order. Stock is restored and an unsigned contract dies with the order.
    pub async fn cancel_order(&self, order_id: i64, actor_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order_for_party(order_id, actor_id).await?;
        let old_status = order.status;
        let order = self.db.cancel_order(order_id).await?;
        self.call_order_status_hook(&order, old_status).await;
        Ok(order)
    }

    /// The vendor rates a delivered order (1-5). Feeds the supplier's running average and thus their trust score.
    pub async fn rate_order(&self, order_id: i64, actor_id: i64, rating: i64) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order_for_party(order_id, actor_id).await?;
        if order.vendor_id != actor_id {
            return Err(unauthorized(actor_id, "only the vendor can rate an order").into());
        }
        let order = self.db.rate_order(order_id, rating).await?;
        Ok(order)
    }

    //----------------------------------- contracts -----------------------------------

    /// A party signs the order's contract. When the second signature lands, both parties hear that the contract is
    /// complete.
    pub async fn sign_contract(&self, contract_id: i64, actor_id: i64) -> Result<Contract, OrderFlowError> {
        let outcome = self.contracts.sign(contract_id, actor_id).await?;
        if outcome.completed {
            for user_id in [outcome.contract.vendor_id, outcome.contract.supplier_id] {
                let n = NewNotification::new(
                    user_id,
                    NotificationType::ContractCompleted,
                    "Contract fully signed".to_string(),
                    format!("Contract {} is now in force", outcome.contract.contract_number),
                )
                .with_data(json!({ "contract_id": outcome.contract.id }));
                self.hub.notify(n).await?;
            }
        }
        if outcome.newly_signed {
            self.call_contract_signed_hook(&outcome.contract, outcome.completed).await;
        }
        Ok(outcome.contract)
    }

    /// Sweeps `sent` contracts nobody signed within the window into the `expired` state.
    pub async fn expire_stale_contracts(&self, older_than: Duration) -> Result<Vec<Contract>, OrderFlowError> {
        let expired = self.contracts.expire_stale(older_than).await?;
        Ok(expired)
    }

    //----------------------------------- payments -----------------------------------

    /// The vendor pays for an order. Pay-later creates a deferred payment due on the order's deadline; other
    /// methods charge the gateway on the spot and settle immediately.
    pub async fn initiate_payment(&self, order_id: i64, actor_id: i64) -> Result<PaymentOutcome, OrderFlowError> {
        let order = self.fetch_order_for_party(order_id, actor_id).await?;
        if order.vendor_id != actor_id {
            return Err(unauthorized(actor_id, "only the vendor can pay for an order").into());
        }
        let outcome = self.payments.initiate(&order).await?;
        if let PaymentOutcome::Settled(settlement) = &outcome {
            self.call_payment_settled_hook(&settlement.payment, true).await;
        }
        Ok(outcome)
    }

    /// Applies an asynchronous gateway callback. Duplicate callbacks are no-ops and fire no hooks.
    pub async fn process_gateway_callback(
        &self,
        gateway_ref: &str,
        success: bool,
    ) -> Result<SettlementOutcome, OrderFlowError> {
        let outcome = self.payments.process_callback(gateway_ref, success).await?;
        if !outcome.duplicate {
            self.call_payment_settled_hook(&outcome.payment, success).await;
        }
        Ok(outcome)
    }

    pub async fn refund_payment(&self, payment_id: i64, amount: Option<Money>) -> Result<Payment, OrderFlowError> {
        let payment = self.payments.refund(payment_id, amount).await?;
        Ok(payment)
    }

    /// Reminds every vendor with a pay-later payment falling due within the window. Returns the payments reminded
    /// about.
    pub async fn send_due_payment_reminders(&self, within: Duration) -> Result<Vec<Payment>, OrderFlowError> {
        let due = self.payments.due_within(within).await?;
        for payment in &due {
            let n = NewNotification::new(
                payment.vendor_id,
                NotificationType::PaymentReminder,
                "Payment due soon".to_string(),
                format!("{} is due by {}", payment.amount, payment.due_at.map(|d| d.to_rfc3339()).unwrap_or_default()),
            )
            .with_data(json!({ "payment_id": payment.id, "order_id": payment.order_id }));
            self.hub.notify(n).await?;
        }
        if !due.is_empty() {
            info!("🔄️💰️ Sent {} payment reminder(s)", due.len());
        }
        Ok(due)
    }

    //----------------------------------- support -----------------------------------

    async fn notify_contract_sent(&self, order: &Order, contract: &Contract) -> Result<(), OrderFlowError> {
        for user_id in [contract.vendor_id, contract.supplier_id] {
            let n = NewNotification::new(
                user_id,
                NotificationType::ContractSent,
                "Contract ready to sign".to_string(),
                format!(
                    "Contract {} for order {} awaits your signature",
                    contract.contract_number, order.order_number
                ),
            )
            .with_data(json!({ "contract_id": contract.id }));
            self.hub.notify(n).await?;
        }
        Ok(())
    }

    async fn fetch_order_for_party(&self, order_id: i64, actor_id: i64) -> Result<Order, MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if !order.is_party(actor_id) {
            return Err(unauthorized(actor_id, &format!("not a party to order {}", order.order_number)));
        }
        Ok(order)
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producers {
            debug!("🔄️📦️ Notifying order created hook subscribers");
            let event = OrderCreatedEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_status_hook(&self, order: &Order, old_status: OrderStatusType) {
        for emitter in &self.producers.order_status_producers {
            debug!("🔄️📦️ Notifying order status hook subscribers");
            let event = OrderStatusChangedEvent::new(order.clone(), old_status);
            emitter.publish_event(event).await;
        }
    }

    async fn call_contract_signed_hook(&self, contract: &Contract, completed: bool) {
        for emitter in &self.producers.contract_signed_producers {
            debug!("🔄️📜️ Notifying contract signed hook subscribers");
            let event = ContractSignedEvent::new(contract.clone(), completed);
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_settled_hook(&self, payment: &Payment, success: bool) {
        for emitter in &self.producers.payment_settled_producers {
            debug!("🔄️💰️ Notifying payment settled hook subscribers");
            let event = PaymentSettledEvent::new(payment.clone(), success);
            emitter.publish_event(event).await;
        }
    }
}

fn unauthorized(actor_id: i64, detail: &str) -> MarketplaceError {
    MarketplaceError::Unauthorized { actor_id, detail: detail.to_string() }
}
