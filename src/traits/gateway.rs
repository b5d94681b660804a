use chrono::{DateTime, Utc};
use log::debug;
use rand::Rng;
use thiserror::Error;

use crate::db_types::{Money, PaymentMethod};

/// A charge request sent to the external payment processor.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: i64,
    /// Engine-generated reference the gateway echoes back in callbacks.
    pub gateway_ref: String,
    pub amount: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub gateway_ref: String,
    pub paid_at: DateTime<Utc>,
}

/// All gateway failures are transient from the engine's perspective: the caller may retry, and each retry creates a
/// fresh payment record. A timed-out call maps to [`GatewayError::Timeout`] — never to silent success.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The gateway declined the charge: {0}")]
    Declined(String),
    #[error("The gateway did not respond in time")]
    Timeout,
    #[error("The gateway is unavailable: {0}")]
    Unavailable(String),
}

/// The external payment processor, as the engine sees it. Injected so that tests can force either outcome.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone + Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayReceipt, GatewayError>;
}

/// Stand-in for a real processor integration: charges succeed with a fixed probability (0.95 by default) and
/// declines are indistinguishable from any other transient gateway failure.
#[derive(Debug, Clone)]
pub struct MockGateway {
    success_rate: f64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self { success_rate: 0.95 }
    }
}

impl MockGateway {
    pub fn new(success_rate: f64) -> Self {
        Self { success_rate: success_rate.clamp(0.0, 1.0) }
    }
}

impl PaymentGateway for MockGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayReceipt, GatewayError> {
        let roll = rand::thread_rng().gen::<f64>();
        if roll < self.success_rate {
            debug!("💳️ Mock gateway approved {} for order {}", request.amount, request.order_id);
            Ok(GatewayReceipt { gateway_ref: request.gateway_ref.clone(), paid_at: Utc::now() })
        } else {
            debug!("💳️ Mock gateway declined {} for order {}", request.amount, request.order_id);
            Err(GatewayError::Declined("mock gateway declined the charge".to_string()))
        }
    }
}

/// A gateway with a fixed answer. Lets tests drive both settlement paths deterministically.
#[derive(Debug, Clone)]
pub struct StaticGateway {
    approve: bool,
}

impl StaticGateway {
    pub fn approving() -> Self {
        Self { approve: true }
    }

    pub fn declining() -> Self {
        Self { approve: false }
    }
}

impl PaymentGateway for StaticGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayReceipt, GatewayError> {
        if self.approve {
            Ok(GatewayReceipt { gateway_ref: request.gateway_ref.clone(), paid_at: Utc::now() })
        } else {
            Err(GatewayError::Declined("static gateway declines everything".to_string()))
        }
    }
}
