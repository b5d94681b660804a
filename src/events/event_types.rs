use serde::{Deserialize, Serialize};

use crate::db_types::{Contract, Order, OrderStatusType, Payment};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        let new_status = order.status;
        Self { order, old_status, new_status }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSignedEvent {
    pub contract: Contract,
    /// True when this signature completed the contract.
    pub completed: bool,
}

impl ContractSignedEvent {
    pub fn new(contract: Contract, completed: bool) -> Self {
        Self { contract, completed }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettledEvent {
    pub payment: Payment,
    pub success: bool,
}

impl PaymentSettledEvent {
    pub fn new(payment: Payment, success: bool) -> Self {
        Self { payment, success }
    }
}
