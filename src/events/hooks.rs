use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    ContractSignedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderCreatedEvent,
    OrderStatusChangedEvent,
    PaymentSettledEvent,
};

/// The producer ends handed to the engine APIs. Each list usually holds zero or one producer; multiple handlers per
/// event are supported by pushing more.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producers: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_status_producers: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub contract_signed_producers: Vec<EventProducer<ContractSignedEvent>>,
    pub payment_settled_producers: Vec<EventProducer<PaymentSettledEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_contract_signed: Option<EventHandler<ContractSignedEvent>>,
    pub on_payment_settled: Option<EventHandler<PaymentSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_created: hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f)),
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_contract_signed: hooks.on_contract_signed.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_settled: hooks.on_payment_settled.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_contract_signed {
            result.contract_signed_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_settled {
            result.payment_settled_producers.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_contract_signed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_settled {
            tokio::spawn(handler.start_handler());
        }
    }
}

/// Builder for the set of hook functions the hosting process wants to install.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_contract_signed: Option<Handler<ContractSignedEvent>>,
    pub on_payment_settled: Option<Handler<PaymentSettledEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_contract_signed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ContractSignedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_contract_signed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_settled = Some(Arc::new(f));
        self
    }
}
