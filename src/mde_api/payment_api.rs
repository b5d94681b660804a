use std::fmt::Debug;

use log::*;
use tokio::time::{timeout, Duration as StdDuration};

use crate::{
    db_types::{Money, NewPayment, Order, Payment, PaymentStatus},
    helpers::new_gateway_ref,
    mde_api::errors::OrderFlowError,
    traits::{ChargeRequest, GatewayError, MarketplaceDatabase, MarketplaceError, PaymentGateway, SettlementOutcome},
};

/// How long we wait for the gateway before treating the charge as failed. A timed-out charge is marked `failed`;
/// if the gateway did process it, its callback settles the record idempotently later.
const GATEWAY_TIMEOUT: StdDuration = StdDuration::from_secs(15);

/// What came of initiating a payment.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// Pay-later: a pending payment with a due date, no gateway involved.
    Deferred(Payment),
    /// An immediate method: the gateway answered and the payment is settled one way or the other.
    Settled(SettlementOutcome),
}

impl PaymentOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            PaymentOutcome::Deferred(p) => p,
            PaymentOutcome::Settled(o) => &o.payment,
        }
    }
}

/// `PaymentApi` drives money across the external gateway: initiating charges, absorbing callbacks, and refunds.
/// The gateway is injected, so hosts pick the real processor and tests pick a deterministic stand-in.
pub struct PaymentApi<B, G> {
    db: B,
    gateway: G,
}

impl<B, G> Debug for PaymentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B, G> PaymentApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    pub fn new(db: B, gateway: G) -> Self {
        Self { db, gateway }
    }

    /// Initiates payment for the order.
    ///
    /// Pay-later orders get a pending payment due on the order's payment deadline and never touch the gateway.
    /// Every other method charges the gateway synchronously (bounded by [`GATEWAY_TIMEOUT`]) and settles the
    /// payment on the spot. A declined or timed-out charge leaves a `failed` payment behind and surfaces the
    /// gateway error; the caller may retry, which creates a fresh payment record.
    pub async fn initiate(&self, order: &Order) -> Result<PaymentOutcome, OrderFlowError> {
        if order.payment_status == crate::db_types::OrderPaymentStatus::Paid {
            return Err(MarketplaceError::Validation(format!("Order {} is already paid", order.order_number)).into());
        }
        if order.payment_method.is_deferred() {
            let payment = self
                .db
                .insert_payment(NewPayment {
                    order_id: order.id,
                    vendor_id: order.vendor_id,
                    supplier_id: order.supplier_id,
                    amount: order.total_amount,
                    method: order.payment_method,
                    status: PaymentStatus::Pending,
                    gateway_ref: None,
                    due_at: Some(order.payment_due_at),
                })
                .await?;
            info!("💳️ Deferred payment {} recorded for order [{}]", payment.id, order.order_number);
            return Ok(PaymentOutcome::Deferred(payment));
        }
        let gateway_ref = new_gateway_ref();
        let payment = self
            .db
            .insert_payment(NewPayment {
                order_id: order.id,
                vendor_id: order.vendor_id,
                supplier_id: order.supplier_id,
                amount: order.total_amount,
                method: order.payment_method,
                status: PaymentStatus::Processing,
                gateway_ref: Some(gateway_ref.clone()),
                due_at: None,
            })
            .await?;
        let request = ChargeRequest {
            order_id: order.id,
            gateway_ref: gateway_ref.clone(),
            amount: order.total_amount,
            method: order.payment_method,
        };
        let charge = match timeout(GATEWAY_TIMEOUT, self.gateway.charge(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };
        match charge {
            Ok(receipt) => {
                let outcome = self.db.settle_payment(&receipt.gateway_ref, true).await?;
                info!("💳️ Payment {} completed for order [{}]", payment.id, order.order_number);
                Ok(PaymentOutcome::Settled(outcome))
            },
            Err(e) => {
                warn!("💳️ Gateway refused charge for order [{}]: {e}", order.order_number);
                self.db.settle_payment(&gateway_ref, false).await?;
                Err(e.into())
            },
        }
    }

    /// Applies an asynchronous gateway callback. Repeated callbacks for the same reference are no-ops flagged as
    /// duplicates in the outcome.
    pub async fn process_callback(
        &self,
        gateway_ref: &str,
        success: bool,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        self.db.settle_payment(gateway_ref, success).await
    }

    /// Refunds a completed payment, partially if `amount` is given.
    pub async fn refund(&self, payment_id: i64, amount: Option<Money>) -> Result<Payment, MarketplaceError> {
        self.db.refund_payment(payment_id, amount).await
    }

    /// Pending pay-later payments falling due within the window.
    pub async fn due_within(&self, within: chrono::Duration) -> Result<Vec<Payment>, MarketplaceError> {
        self.db.due_payments(within).await
    }
}
