use thiserror::Error;

use crate::traits::{GatewayError, MarketplaceError, PublishError};

/// Errors surfaced by the engine APIs. Everything funnels into this type so callers have one thing to match on.
#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Storage error: {0}")]
    Storage(#[from] MarketplaceError),
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Realtime publish error: {0}")]
    Publish(#[from] PublishError),
}

impl OrderFlowError {
    /// True when the failure is the gateway's, meaning the payment record exists in a `failed` state and the caller
    /// may retry the charge.
    pub fn is_gateway_failure(&self) -> bool {
        matches!(self, OrderFlowError::Gateway(_))
    }
}
